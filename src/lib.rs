//! MICR cheque-line localization, segmentation and reading.
//!
//! The pipeline turns a cheque raster into a located MICR band, an ordered
//! list of per-character regions and, through the translator backends,
//! structured routing/account/cheque-number fields.

pub mod assets;
pub mod config;
pub mod corrections;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod micr;
pub mod preprocessing;
pub mod raster;
pub mod scanner;
pub mod server;
pub mod translator;
pub mod translators;
