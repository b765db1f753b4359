//! Image preprocessing for MICR localization
//!
//! Turns an incoming cheque raster into the binarized bottom band the
//! detection pipeline works on.

pub mod pipeline;
pub mod steps;

pub use pipeline::{PreprocessResult, StageImage, StepTiming};
pub use steps::crop::CropFractions;
pub use steps::polarity::Polarity;
