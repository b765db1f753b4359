use crate::error::MicrError;
use crate::geometry::Rect;
use crate::raster;
use image::GrayImage;

/// Crop window given as half-open fractions of each axis, begin inclusive,
/// end exclusive. The default keeps the lower 40% of the image, where the
/// MICR band lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropFractions {
    pub begin_width: f64,
    pub begin_height: f64,
    pub end_width: f64,
    pub end_height: f64,
}

impl Default for CropFractions {
    fn default() -> Self {
        Self {
            begin_width: 0.0,
            begin_height: 0.6,
            end_width: 1.0,
            end_height: 1.0,
        }
    }
}

impl CropFractions {
    pub fn validate(&self) -> Result<(), MicrError> {
        for (name, v) in [
            ("begin.width", self.begin_width),
            ("begin.height", self.begin_height),
            ("end.width", self.end_width),
            ("end.height", self.end_height),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(MicrError::InvalidRequest(format!(
                    "crop fraction {name} = {v} outside [0, 1]"
                )));
            }
        }
        if self.begin_width >= self.end_width || self.begin_height >= self.end_height {
            return Err(MicrError::InvalidRequest(
                "crop begin fraction must be below end fraction".to_string(),
            ));
        }
        Ok(())
    }
}

/// Crop the configured band out of the image.
pub fn apply(image: &GrayImage, fractions: &CropFractions) -> Result<GrayImage, MicrError> {
    fractions.validate()?;
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(MicrError::InvalidImage("zero-size image".to_string()));
    }
    let x0 = (fractions.begin_width * w as f64).floor() as i32;
    let y0 = (fractions.begin_height * h as f64).floor() as i32;
    let x1 = (fractions.end_width * w as f64).ceil() as i32;
    let y1 = (fractions.end_height * h as f64).ceil() as i32;
    let rect = Rect::new(x0, y0, x1 - x0, y1 - y0);
    Ok(raster::crop(image, &rect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keeps_lower_band() {
        let img = GrayImage::new(200, 100);
        let band = apply(&img, &CropFractions::default()).unwrap();
        assert_eq!(band.width(), 200);
        assert_eq!(band.height(), 40);
    }

    #[test]
    fn out_of_range_fraction_is_rejected() {
        let img = GrayImage::new(10, 10);
        let bad = CropFractions {
            end_height: 1.5,
            ..CropFractions::default()
        };
        assert!(apply(&img, &bad).is_err());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let bad = CropFractions {
            begin_height: 0.9,
            end_height: 0.5,
            ..CropFractions::default()
        };
        assert!(bad.validate().is_err());
    }
}
