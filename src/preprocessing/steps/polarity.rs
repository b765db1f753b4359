use crate::raster;
use image::GrayImage;

/// Number of sample rows/columns in the uniform grid.
const GRID_STEPS: u32 = 10;
/// Mean intensities above this count as a light background.
const LIGHT_LEVEL: f64 = 128.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    LightBackground,
    DarkBackground,
}

/// Estimate background polarity from a uniform 10x10 intensity sample.
pub fn analyze(image: &GrayImage) -> Polarity {
    if raster::grid_mean(image, GRID_STEPS) > LIGHT_LEVEL {
        Polarity::LightBackground
    } else {
        Polarity::DarkBackground
    }
}
