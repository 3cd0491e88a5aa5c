use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::face_region::{FaceBox, RawBox};

const RAW_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const SQUARED_COLOR: Rgb<u8> = Rgb([255, 220, 0]);
const REGION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Boxes drawn for a single face in debug mode
#[derive(Debug, Clone)]
pub struct OverlayFace {
    pub raw_box: RawBox,
    pub squared: Option<FaceBox>,
    pub region: Option<FaceBox>,
}

/// Draw detector boxes (red), squared boxes (yellow) and final regions
/// (green) on a copy of `img`.
pub fn draw_debug_overlay(img: &RgbImage, faces: &[OverlayFace]) -> RgbImage {
    let mut canvas = img.clone();
    let thickness = (img.width().min(img.height()) / 300).max(1) as i64;

    for face in faces {
        let raw = FaceBox::new(
            face.raw_box.left as i64,
            face.raw_box.top as i64,
            face.raw_box.right as i64,
            face.raw_box.bottom as i64,
        );
        draw_box(&mut canvas, raw, RAW_COLOR, thickness);

        if let Some(squared) = face.squared {
            draw_box(&mut canvas, squared, SQUARED_COLOR, thickness);
        }
        if let Some(region) = face.region {
            draw_box(&mut canvas, region, REGION_COLOR, thickness);
        }
    }

    canvas
}

fn draw_box(canvas: &mut RgbImage, b: FaceBox, color: Rgb<u8>, thickness: i64) {
    for inset in 0..thickness {
        let inner = FaceBox::new(b.left + inset, b.top + inset, b.right - inset, b.bottom - inset);
        if let Some(rect) = clip_to_canvas(inner, canvas.width(), canvas.height()) {
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }
}

/// Intersect a box with the canvas, `None` when nothing is left
fn clip_to_canvas(b: FaceBox, width: u32, height: u32) -> Option<Rect> {
    let left = b.left.max(0);
    let top = b.top.max(0);
    let right = b.right.min(width as i64);
    let bottom = b.bottom.min(height as i64);

    if right <= left || bottom <= top {
        return None;
    }

    Some(Rect::at(left as i32, top as i32).of_size((right - left) as u32, (bottom - top) as u32))
}
