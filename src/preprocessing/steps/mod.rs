//! Individual preprocessing steps

pub mod binarize;
pub mod crop;
pub mod deskew;
pub mod grayscale;
pub mod morph;
pub mod polarity;
