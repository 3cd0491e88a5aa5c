//! Face region geometry.
//!
//! Turns a raw detector box into a square crop region around the face,
//! scaled by a margin that never lets the region outgrow the image, and
//! produces a fixed-size crop of that region.

use image::RgbImage;

use super::resize::{crop_image, resize_image};
use crate::error::FaceRegionError;

/// Side of the square crop handed to per-face processing.
pub const FACE_REGION_SIZE: u32 = 512;

/// Largest accepted magnitude for a detector coordinate.
pub const MAX_COORDINATE: f32 = i32::MAX as f32;

/// Bounding box as reported by a face detector, in pixel coordinates.
///
/// Detectors often append confidence or landmarks after the four edges;
/// only the edges are kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RawBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build from `[left, top, right, bottom, ...]`, ignoring anything past
    /// the fourth value.
    pub fn from_slice(values: &[f32]) -> Result<Self, FaceRegionError> {
        match values {
            [left, top, right, bottom, ..] => Ok(Self::new(*left, *top, *right, *bottom)),
            _ => Err(FaceRegionError::invalid_box(format!(
                "expected at least 4 coordinates, got {}",
                values.len()
            ))),
        }
    }

    fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite()
    }

    /// Every edge within `MAX_COORDINATE`, so integer geometry cannot overflow
    fn is_in_range(&self) -> bool {
        [self.left, self.top, self.right, self.bottom]
            .iter()
            .all(|v| v.abs() <= MAX_COORDINATE)
    }
}

/// Integer rectangle used between the geometry stages.
///
/// Edges may be negative or beyond the image until [`clamp_to_image`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl FaceBox {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    fn truncated(raw: &RawBox) -> Self {
        // `as` truncates toward zero
        Self::new(
            raw.left as i64,
            raw.top as i64,
            raw.right as i64,
            raw.bottom as i64,
        )
    }
}

/// Square a detector box around its center.
///
/// Odd dimensions are first evened out on their high edge so the half
/// difference is exact, then the shorter axis grows to match the longer one.
pub fn square_box(raw: &RawBox) -> Result<FaceBox, FaceRegionError> {
    if !raw.is_finite() {
        return Err(FaceRegionError::invalid_box(format!(
            "non-finite coordinates {:?}",
            raw
        )));
    }

    if !raw.is_in_range() {
        return Err(FaceRegionError::invalid_box(format!(
            "coordinates out of range {:?}",
            raw
        )));
    }

    let mut b = FaceBox::truncated(raw);
    if b.width() <= 0 || b.height() <= 0 {
        return Err(FaceRegionError::invalid_box(format!(
            "degenerate box ({},{},{},{})",
            b.left, b.top, b.right, b.bottom
        )));
    }

    if b.width() % 2 == 1 {
        b.right += 1;
    }
    if b.height() % 2 == 1 {
        b.bottom += 1;
    }

    let diff = (b.width() - b.height()).abs() / 2;
    if b.width() > b.height() {
        b.top -= diff;
        b.bottom += diff;
    } else {
        b.left -= diff;
        b.right += diff;
    }

    Ok(b)
}

/// Scale a square box by `margin` around its center.
///
/// The margin is capped so the scaled side never exceeds the shorter image
/// axis; when the box is already larger than that, the cap drops below 1.0
/// and the box shrinks.
pub fn apply_margin(b: FaceBox, margin: f64, image_width: u32, image_height: u32) -> FaceBox {
    let side = b.width();
    if side <= 0 {
        return b;
    }

    let shorter = image_width.min(image_height) as f64;
    let effective = margin.min(shorter / side as f64);
    let side = side as f64;
    let diff = ((side * effective - side) / 2.0) as i64;

    FaceBox::new(b.left - diff, b.top - diff, b.right + diff, b.bottom + diff)
}

fn clamp_axis(mut low: i64, mut high: i64, extent: i64) -> (i64, i64) {
    if low < 0 {
        high -= low;
        low = 0;
    }
    if high > extent {
        low -= high - extent;
        high = extent;
    }
    (low.max(0), high.min(extent))
}

/// Move a box back inside the image, then intersect it with the image.
///
/// Each axis is translated independently (vertical first), so the box keeps
/// its size whenever the image is large enough to hold it.
pub fn clamp_to_image(b: FaceBox, image_width: u32, image_height: u32) -> FaceBox {
    let (top, bottom) = clamp_axis(b.top, b.bottom, image_height as i64);
    let (left, right) = clamp_axis(b.left, b.right, image_width as i64);
    FaceBox::new(left, top, right, bottom)
}

/// A square face crop and where it came from in the entire image.
#[derive(Debug, Clone)]
pub struct FaceRegion {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub width: u32,
    pub height: u32,
    /// `FACE_REGION_SIZE` x `FACE_REGION_SIZE` RGB crop of the region.
    pub image: RgbImage,
}

impl FaceRegion {
    /// Square `face_box`, grow it by `face_margin`, keep it inside
    /// `entire_image` and resample the covered pixels to a 512x512 crop.
    pub fn new(
        entire_image: &RgbImage,
        face_box: &RawBox,
        face_margin: f32,
    ) -> Result<Self, FaceRegionError> {
        let (image_width, image_height) = entire_image.dimensions();
        let b = Self::bounds(image_width, image_height, face_box, face_margin)?;

        let (left, top) = (b.left as u32, b.top as u32);
        let (width, height) = (b.width() as u32, b.height() as u32);

        let cropped = crop_image(entire_image, left, top, width, height)?;
        let image = resize_image(&cropped, FACE_REGION_SIZE, FACE_REGION_SIZE)?;

        Ok(Self {
            left,
            top,
            right: b.right as u32,
            bottom: b.bottom as u32,
            width,
            height,
            image,
        })
    }

    /// Final region for `face_box` without cropping anything.
    pub fn bounds(
        image_width: u32,
        image_height: u32,
        face_box: &RawBox,
        face_margin: f32,
    ) -> Result<FaceBox, FaceRegionError> {
        if !face_margin.is_finite() || face_margin < 1.0 {
            return Err(FaceRegionError::InvalidMargin {
                margin: face_margin,
            });
        }

        let squared = square_box(face_box)?;

        let (w, h) = (image_width as i64, image_height as i64);
        if squared.right <= 0 || squared.bottom <= 0 || squared.left >= w || squared.top >= h {
            return Err(FaceRegionError::invalid_box(format!(
                "box ({},{},{},{}) lies outside {}x{} image",
                squared.left, squared.top, squared.right, squared.bottom, image_width, image_height
            )));
        }

        let expanded = apply_margin(squared, face_margin as f64, image_width, image_height);
        let clamped = clamp_to_image(expanded, image_width, image_height);

        if clamped.width() <= 0 || clamped.height() <= 0 {
            return Err(FaceRegionError::invalid_box(format!(
                "region collapsed to {}x{} in {}x{} image",
                clamped.width(),
                clamped.height(),
                image_width,
                image_height
            )));
        }

        Ok(clamped)
    }

    pub fn as_face_box(&self) -> FaceBox {
        FaceBox::new(
            self.left as i64,
            self.top as i64,
            self.right as i64,
            self.bottom as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * 3 + y) % 256) as u8])
        })
    }

    fn assert_inside(b: &FaceBox, width: u32, height: u32) {
        assert!(0 <= b.left && b.left <= b.right && b.right <= width as i64, "{:?}", b);
        assert!(0 <= b.top && b.top <= b.bottom && b.bottom <= height as i64, "{:?}", b);
    }

    #[test]
    fn test_raw_box_ignores_auxiliary_values() {
        let raw = RawBox::from_slice(&[1.5, 2.5, 30.9, 40.1, 0.98, 12.0, 13.0]).unwrap();
        assert_eq!(raw, RawBox::new(1.5, 2.5, 30.9, 40.1));
        assert!(RawBox::from_slice(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_square_wide_box() {
        let squared = square_box(&RawBox::new(80.0, 40.0, 120.0, 60.0)).unwrap();
        assert_eq!(squared, FaceBox::new(80, 30, 120, 70));
    }

    #[test]
    fn test_square_tall_box() {
        let squared = square_box(&RawBox::new(10.0, 10.0, 30.0, 70.0)).unwrap();
        assert_eq!(squared, FaceBox::new(-10, 10, 50, 70));
    }

    #[test]
    fn test_square_evens_out_odd_dimensions() {
        // 41 wide, 20 tall: right grows to 121, then diff is (42 - 20) / 2
        let squared = square_box(&RawBox::new(80.0, 40.0, 121.0, 60.0)).unwrap();
        assert_eq!(squared, FaceBox::new(80, 29, 122, 71));
        assert_eq!(squared.width(), squared.height());
    }

    #[test]
    fn test_square_truncates_fractional_coordinates() {
        let squared = square_box(&RawBox::new(10.9, 10.2, 50.7, 50.99)).unwrap();
        assert_eq!(squared, FaceBox::new(10, 10, 50, 50));
    }

    #[test]
    fn test_squared_box_is_square_for_many_boxes() {
        for left in [0.0f32, 3.3, 17.0] {
            for w in [1.0f32, 2.0, 9.5, 40.0, 121.0] {
                for h in [1.0f32, 7.0, 40.0, 300.25] {
                    let squared = square_box(&RawBox::new(left, 5.0, left + w, 5.0 + h)).unwrap();
                    assert_eq!(squared.width(), squared.height(), "w={} h={}", w, h);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_boxes_are_rejected() {
        for raw in [
            RawBox::new(10.0, 10.0, 10.0, 50.0),
            RawBox::new(10.0, 10.0, 50.0, 10.5),
            RawBox::new(50.0, 10.0, 10.0, 50.0),
            RawBox::new(f32::NAN, 10.0, 50.0, 50.0),
            RawBox::new(0.0, 0.0, f32::INFINITY, 50.0),
        ] {
            let err = square_box(&raw).unwrap_err();
            assert!(matches!(err, FaceRegionError::InvalidBox { .. }));
        }
    }

    #[test]
    fn test_huge_finite_coordinates_are_rejected() {
        for raw in [
            RawBox::new(-5.0e18, 0.0, 5.0e18, 10.0),
            RawBox::new(0.0, 0.0, 1.0e20, 10.0),
            RawBox::new(0.0, -3.0e9, 10.0, 10.0),
        ] {
            let err = square_box(&raw).unwrap_err();
            assert!(matches!(err, FaceRegionError::InvalidBox { .. }));

            let err = FaceRegion::bounds(100, 100, &raw, 1.6).unwrap_err();
            assert!(matches!(err, FaceRegionError::InvalidBox { .. }));
        }

        // largest accepted box still squares without overflow
        let edge = RawBox::new(-MAX_COORDINATE, -MAX_COORDINATE, MAX_COORDINATE, 10.0);
        let squared = square_box(&edge).unwrap();
        assert_eq!(squared.width(), squared.height());
    }

    #[test]
    fn test_invalid_margins_are_rejected() {
        let raw = RawBox::new(40.0, 40.0, 60.0, 60.0);
        for margin in [f32::NAN, f32::INFINITY, 0.5, 0.0, -1.6] {
            let err = FaceRegion::bounds(100, 100, &raw, margin).unwrap_err();
            assert!(matches!(err, FaceRegionError::InvalidMargin { .. }));
        }

        let img = create_test_image(100, 100);
        assert!(FaceRegion::new(&img, &raw, 0.5).is_err());
        assert_eq!(
            FaceRegion::bounds(100, 100, &raw, 1.0).unwrap(),
            FaceBox::new(40, 40, 60, 60)
        );
    }

    #[test]
    fn test_apply_margin_scales_around_center() {
        let expanded = apply_margin(FaceBox::new(80, 30, 120, 70), 1.6, 100, 200);
        assert_eq!(expanded, FaceBox::new(68, 18, 132, 82));
    }

    #[test]
    fn test_apply_margin_is_capped_by_shorter_axis() {
        // 60 * 2.0 = 120 would not fit a 100 px image
        let expanded = apply_margin(FaceBox::new(20, 20, 80, 80), 2.0, 100, 300);
        assert!(expanded.width() <= 100);
        assert_eq!(expanded.width(), expanded.height());
    }

    #[test]
    fn test_apply_margin_shrinks_oversized_box() {
        let expanded = apply_margin(FaceBox::new(0, 0, 200, 200), 1.5, 100, 100);
        assert_eq!(expanded, FaceBox::new(50, 50, 150, 150));
    }

    #[test]
    fn test_clamp_translates_instead_of_clipping() {
        let clamped = clamp_to_image(FaceBox::new(-20, -10, 60, 70), 100, 100);
        assert_eq!(clamped, FaceBox::new(0, 0, 80, 80));

        let clamped = clamp_to_image(FaceBox::new(50, 70, 130, 150), 100, 100);
        assert_eq!(clamped, FaceBox::new(20, 20, 100, 100));
    }

    #[test]
    fn test_clamp_intersects_when_box_is_larger_than_image() {
        let clamped = clamp_to_image(FaceBox::new(-10, -10, 130, 130), 100, 60);
        assert_eq!(clamped, FaceBox::new(0, 0, 100, 60));
    }

    #[test]
    fn test_example_region_on_narrow_image() {
        // 100 wide, 200 tall
        let b = FaceRegion::bounds(100, 200, &RawBox::new(80.0, 40.0, 120.0, 60.0), 1.6).unwrap();
        assert_eq!(b, FaceBox::new(36, 18, 100, 82));
    }

    #[test]
    fn test_example_region_on_wide_enough_image() {
        let b = FaceRegion::bounds(200, 200, &RawBox::new(80.0, 40.0, 120.0, 60.0), 1.6).unwrap();
        assert_eq!(b, FaceBox::new(68, 18, 132, 82));
    }

    #[test]
    fn test_margin_near_corner_stays_inside() {
        let b = FaceRegion::bounds(100, 100, &RawBox::new(0.0, 0.0, 40.0, 40.0), 2.0).unwrap();
        assert_eq!(b, FaceBox::new(0, 0, 80, 80));

        let b = FaceRegion::bounds(100, 100, &RawBox::new(70.0, 65.0, 98.0, 99.0), 2.0).unwrap();
        assert_inside(&b, 100, 100);
        assert_eq!(b.width(), b.height());
    }

    #[test]
    fn test_regions_always_inside_image() {
        let sizes = [(100u32, 100u32), (640, 480), (37, 211), (2000, 90)];
        let boxes = [
            RawBox::new(0.0, 0.0, 10.0, 10.0),
            RawBox::new(-30.0, -30.0, 25.0, 40.0),
            RawBox::new(20.5, 30.2, 80.7, 35.9),
            RawBox::new(5.0, 5.0, 1900.0, 85.0),
            RawBox::new(30.0, 1.0, 36.0, 88.0),
        ];
        for (w, h) in sizes {
            for raw in &boxes {
                for margin in [1.0f32, 1.3, 1.6, 2.0, 4.0] {
                    match FaceRegion::bounds(w, h, raw, margin) {
                        Ok(b) => assert_inside(&b, w, h),
                        Err(err) => assert!(matches!(err, FaceRegionError::InvalidBox { .. })),
                    }
                }
            }
        }
    }

    #[test]
    fn test_box_outside_image_is_rejected() {
        let err = FaceRegion::bounds(100, 100, &RawBox::new(150.0, 10.0, 180.0, 40.0), 1.5).unwrap_err();
        assert!(matches!(err, FaceRegionError::InvalidBox { .. }));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let err = FaceRegion::bounds(0, 0, &RawBox::new(0.0, 0.0, 10.0, 10.0), 1.5).unwrap_err();
        assert!(matches!(err, FaceRegionError::InvalidBox { .. }));
    }

    #[test]
    fn test_small_and_large_faces_yield_fixed_size_crop() {
        let small = create_test_image(200, 200);
        let region = FaceRegion::new(&small, &RawBox::new(80.0, 80.0, 120.0, 120.0), 1.0).unwrap();
        assert_eq!(region.image.dimensions(), (FACE_REGION_SIZE, FACE_REGION_SIZE));
        assert_eq!((region.width, region.height), (40, 40));

        let large = create_test_image(2400, 2400);
        let region = FaceRegion::new(&large, &RawBox::new(200.0, 200.0, 2200.0, 2200.0), 1.0).unwrap();
        assert_eq!(region.image.dimensions(), (FACE_REGION_SIZE, FACE_REGION_SIZE));
        assert_eq!((region.width, region.height), (2000, 2000));
    }

    #[test]
    fn test_region_fields_are_consistent() {
        let img = create_test_image(320, 240);
        let region = FaceRegion::new(&img, &RawBox::new(100.0, 50.0, 160.0, 130.0), 1.6).unwrap();

        assert!(region.right > region.left && region.bottom > region.top);
        assert_eq!(region.width, region.right - region.left);
        assert_eq!(region.height, region.bottom - region.top);
        assert_eq!(region.width, region.height);
        assert!(region.right <= 320 && region.bottom <= 240);
    }

    #[test]
    fn test_whole_crop_is_idempotent() {
        let img = create_test_image(FACE_REGION_SIZE, FACE_REGION_SIZE);
        let full = RawBox::new(0.0, 0.0, FACE_REGION_SIZE as f32, FACE_REGION_SIZE as f32);
        let region = FaceRegion::new(&img, &full, 1.0).unwrap();

        assert_eq!(
            region.as_face_box(),
            FaceBox::new(0, 0, FACE_REGION_SIZE as i64, FACE_REGION_SIZE as i64)
        );
        assert_eq!(region.image, img);
    }

    #[test]
    fn test_crop_matches_source_pixels_at_native_size() {
        let img = create_test_image(1024, 1024);
        let region = FaceRegion::new(&img, &RawBox::new(100.0, 200.0, 612.0, 712.0), 1.0).unwrap();

        assert_eq!((region.left, region.top), (100, 200));
        assert_eq!(region.image.get_pixel(0, 0), img.get_pixel(100, 200));
        assert_eq!(region.image.get_pixel(511, 511), img.get_pixel(611, 711));
    }

    #[test]
    fn test_entire_image_is_not_mutated() {
        let img = create_test_image(120, 90);
        let before = img.clone();
        let _ = FaceRegion::new(&img, &RawBox::new(10.0, 10.0, 50.0, 60.0), 1.6).unwrap();
        assert_eq!(img, before);
    }
}
