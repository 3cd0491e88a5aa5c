use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{imageops, RgbImage};

use crate::error::FaceRegionError;

/// Copy the `width`x`height` rectangle at (`x`, `y`) out of `img`.
pub fn crop_image(
    img: &RgbImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<RgbImage, FaceRegionError> {
    let (img_width, img_height) = img.dimensions();

    if width == 0 || height == 0 {
        return Err(FaceRegionError::invalid_box(format!(
            "empty crop {}x{} at ({},{})",
            width, height, x, y
        )));
    }

    if u64::from(x) + u64::from(width) > u64::from(img_width)
        || u64::from(y) + u64::from(height) > u64::from(img_height)
    {
        return Err(FaceRegionError::invalid_box(format!(
            "crop({},{},{}x{}) exceeds {}x{} image",
            x, y, width, height, img_width, img_height
        )));
    }

    Ok(imageops::crop_imm(img, x, y, width, height).to_image())
}

/// Pick the resampling filter for a resize from `src` to `dst` pixels per side.
///
/// Box (area averaging) when shrinking, bilinear when enlarging. Neither rings.
pub fn filter_for(src: (u32, u32), dst: (u32, u32)) -> FilterType {
    if dst.0 < src.0 || dst.1 < src.1 {
        FilterType::Box
    } else {
        FilterType::Bilinear
    }
}

/// Resize an image to exact dimensions
pub fn resize_image(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage, FaceRegionError> {
    let (src_width, src_height) = img.dimensions();

    if src_width == width && src_height == height {
        return Ok(img.clone());
    }

    let src_image = Image::from_vec_u8(src_width, src_height, img.as_raw().to_vec(), PixelType::U8x3)?;
    let mut dst_image = Image::new(width, height, PixelType::U8x3);

    let filter = filter_for((src_width, src_height), (width, height));
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(filter));

    let mut resizer = Resizer::new();
    resizer.resize(&src_image, &mut dst_image, &options)?;

    RgbImage::from_raw(width, height, dst_image.into_vec())
        .ok_or(FaceRegionError::BufferMismatch { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_crop_image() {
        let img = create_test_image(100, 100);
        let cropped = crop_image(&img, 10, 10, 50, 50).unwrap();

        assert_eq!(cropped.dimensions(), (50, 50));
        assert_eq!(img.get_pixel(15, 15), cropped.get_pixel(5, 5));
    }

    #[test]
    fn test_crop_bounds_validation() {
        let img = create_test_image(50, 50);

        assert!(crop_image(&img, 10, 10, 50, 50).is_err());
        assert!(crop_image(&img, 10, 10, 40, 40).is_ok());
        assert!(crop_image(&img, 0, 0, 0, 10).is_err());
    }

    #[test]
    fn test_resize_image_down_and_up() {
        let img = create_test_image(100, 60);

        let smaller = resize_image(&img, 50, 30).unwrap();
        assert_eq!(smaller.dimensions(), (50, 30));

        let larger = resize_image(&img, 512, 512).unwrap();
        assert_eq!(larger.dimensions(), (512, 512));
    }

    #[test]
    fn test_resize_same_size_is_copy() {
        let img = create_test_image(64, 64);
        let resized = resize_image(&img, 64, 64).unwrap();
        assert_eq!(resized, img);
    }

    #[test]
    fn test_resize_uniform_color_is_preserved() {
        let img: RgbImage = ImageBuffer::from_pixel(37, 37, Rgb([200, 40, 90]));
        let resized = resize_image(&img, 512, 512).unwrap();
        let expected = [200i16, 40, 90];
        for pixel in resized.pixels() {
            for (channel, want) in pixel.0.iter().zip(expected) {
                assert!((*channel as i16 - want).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_filter_choice() {
        assert!(matches!(filter_for((2000, 2000), (512, 512)), FilterType::Box));
        assert!(matches!(filter_for((40, 40), (512, 512)), FilterType::Bilinear));
    }
}
