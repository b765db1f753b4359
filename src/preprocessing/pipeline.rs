use crate::error::MicrError;
use crate::preprocessing::steps::{binarize, crop, crop::CropFractions, deskew, grayscale, morph, polarity};
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::time::Instant;

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// A named intermediate raster retained for the lifetime of the request.
#[derive(Debug, Clone)]
pub struct StageImage {
    pub name: &'static str,
    pub image: GrayImage,
}

/// Result of preprocessing including timing stats and stage snapshots.
///
/// Stage snapshots are owned here so every raster produced while servicing
/// a request is released together when the result is dropped.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// The bottom-band crop the detection pipeline runs on
    pub image: GrayImage,
    pub background: polarity::Polarity,
    pub total_time_ms: u64,
    pub steps: Vec<StepTiming>,
    pub stages: Vec<StageImage>,
}

/// Run the fixed preprocessing stage list: grey conversion, deskew,
/// polarity analysis with a morphological clean, bottom-band crop.
pub fn process(
    image: DynamicImage,
    fractions: &CropFractions,
) -> Result<PreprocessResult, MicrError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(MicrError::InvalidImage("zero-size image".to_string()));
    }

    let start = Instant::now();
    let mut steps = Vec::new();
    let mut stages = Vec::new();

    let mut timer = Instant::now();
    let grey = grayscale::apply(image);
    record(&mut steps, "grey", &mut timer);
    stages.push(StageImage { name: "grey", image: grey.clone() });

    let deskewed = deskew::apply(&grey);
    record(&mut steps, "deskew", &mut timer);
    stages.push(StageImage { name: "deskew", image: deskewed.clone() });

    let background = polarity::analyze(&deskewed);
    let cleaned = morph::apply(&deskewed, background);
    record(&mut steps, "clean", &mut timer);
    stages.push(StageImage { name: "clean", image: cleaned.clone() });

    let band = crop::apply(&cleaned, fractions)?;
    record(&mut steps, "band", &mut timer);
    stages.push(StageImage { name: "band", image: band.clone() });

    Ok(PreprocessResult {
        image: band,
        background,
        total_time_ms: start.elapsed().as_millis() as u64,
        steps,
        stages,
    })
}

/// Binarize the band for geometric analysis; foreground comes out bright.
pub fn binarize_band(
    result: &mut PreprocessResult,
    block_size: u32,
    c: i32,
) -> Result<GrayImage, MicrError> {
    let mut timer = Instant::now();
    let binary = binarize::apply(&result.image, block_size, c)?;
    record(&mut result.steps, "binary", &mut timer);
    result.stages.push(StageImage { name: "binary", image: binary.clone() });
    Ok(binary)
}

fn record(steps: &mut Vec<StepTiming>, name: &str, timer: &mut Instant) {
    steps.push(StepTiming {
        name: name.to_string(),
        time_ms: timer.elapsed().as_millis() as u64,
    });
    *timer = Instant::now();
}
