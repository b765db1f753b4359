use image::{DynamicImage, GrayImage};

/// Convert to a single-channel raster. Single-channel inputs pass through
/// without a conversion pass.
pub fn apply(image: DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray,
        other => other.to_luma8(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn converts_color_and_preserves_dimensions() {
        let mut img = RgbImage::new(100, 50);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let result = apply(DynamicImage::ImageRgb8(img));
        assert_eq!(result.width(), 100);
        assert_eq!(result.height(), 50);
    }

    #[test]
    fn gray_input_passes_through() {
        let img = GrayImage::from_pixel(10, 10, image::Luma([77]));
        let result = apply(DynamicImage::ImageLuma8(img.clone()));
        assert_eq!(result, img);
    }
}
