//! ocrs translator implementation
//!
//! Pure Rust third-party OCR backend used as a second opinion on the MICR
//! band and as the cheque-number fallback source. Downloads neural network
//! models automatically on first use.

use crate::config::Config;
use crate::detect::segment::Character;
use crate::error::MicrError;
use crate::micr;
use crate::translator::{Translation, TranslationDetails, Translator};
use image::{GrayImage, RgbImage};
use ocrs::{DecodeMethod, ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

pub struct OcrsTranslator {
    engine: Arc<OcrEngine>,
}

impl OcrsTranslator {
    /// Create the backend, downloading models if needed
    pub fn new(_config: &Config) -> Result<Self, MicrError> {
        let detection_model_path =
            ensure_model_downloaded(DETECTION_MODEL_URL, "text-detection.rten")?;
        let recognition_model_path =
            ensure_model_downloaded(RECOGNITION_MODEL_URL, "text-recognition.rten")?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            MicrError::Configuration(format!("Failed to load detection model: {e}"))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            MicrError::Configuration(format!("Failed to load recognition model: {e}"))
        })?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| MicrError::Configuration(format!("Failed to create OCR engine: {e}")))?;

        tracing::info!("ocrs translator initialized");
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    fn read_text(&self, image: &RgbImage) -> Result<String, MicrError> {
        let failure = |stage: &str, e: String| MicrError::Translator {
            name: "ocrs".to_string(),
            message: format!("{stage}: {e}"),
        };

        let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
            .map_err(|e| failure("image source", e.to_string()))?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| failure("prepare input", e.to_string()))?;
        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|e| failure("detect words", e.to_string()))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let line_texts = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|e| failure("recognize", e.to_string()))?;

        Ok(line_texts
            .iter()
            .filter_map(|line| line.as_ref())
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

impl Translator for OcrsTranslator {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR backend - second opinion and cheque-number fallback"
    }

    fn translate(
        &self,
        image: &GrayImage,
        characters: &[Character],
    ) -> Result<Translation, MicrError> {
        let _ = characters; // reads the whole band, not per-character tiles

        // The band arrives foreground-bright; OCR models expect dark text
        // on a light page.
        let inverted = RgbImage::from_fn(image.width(), image.height(), |x, y| {
            let v = 255 - image.get_pixel(x, y).0[0];
            image::Rgb([v, v, v])
        });

        let text = self.read_text(&inverted)?;
        let value: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, 'T' | 'U' | 'A' | 'D' | 'B' | 'C'))
            .collect();

        Ok(Translation {
            result: micr::parse(&value),
            details: Some(TranslationDetails {
                value,
                score: 0.0,
                chars: Vec::new(),
            }),
        })
    }
}

/// Ensure a model is downloaded and return its path
fn ensure_model_downloaded(url: &str, filename: &str) -> Result<std::path::PathBuf, MicrError> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("micr-scan");

    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        MicrError::Configuration(format!("Failed to create cache directory: {e}"))
    })?;

    let model_path = cache_dir.join(filename);
    if !model_path.exists() {
        tracing::info!("Downloading {} (this may take a moment)...", filename);
        download_file(url, &model_path)?;
    } else {
        tracing::debug!("Using cached model from {:?}", model_path);
    }
    Ok(model_path)
}

/// Download a file from URL to path using ureq
fn download_file(url: &str, path: &Path) -> Result<(), MicrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| MicrError::Configuration(format!("Failed to download model: {e}")))?;

    let mut file = File::create(path)
        .map_err(|e| MicrError::Configuration(format!("Failed to create model file: {e}")))?;

    let buffer = response
        .into_body()
        .read_to_vec()
        .map_err(|e| MicrError::Configuration(format!("Failed to read response body: {e}")))?;

    file.write_all(&buffer)
        .map_err(|e| MicrError::Configuration(format!("Failed to write model file: {e}")))?;

    Ok(())
}
