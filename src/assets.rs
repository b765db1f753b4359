//! Reference glyph assets for template matching.
//!
//! The reference sheet is one raster holding every E-13B glyph in index
//! order. Slicing follows the descriptor list: a bare label consumes one
//! traced contour, `label:N` consumes the next `N` (the control symbols
//! are printed as multiple marks). Loaded once at startup and shared
//! immutably afterwards.

use crate::detect::anchor::glyph_tile;
use crate::detect::contour::{self, ContourFilter};
use crate::error::MicrError;
use crate::geometry::Rect;
use crate::preprocessing::steps::binarize;
use image::GrayImage;
use std::path::Path;

/// Glyphs in sheet order; `:N` marks a glyph drawn with `N` contours.
pub const GLYPH_DESCRIPTORS: [&str; 14] = [
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "T:3", "U:3", "A:3", "D:3",
];

/// One reference glyph normalized to the comparison tile size.
#[derive(Debug, Clone)]
pub struct ReferenceGlyph {
    pub label: String,
    pub tile: GrayImage,
}

/// The full reference set.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    glyphs: Vec<ReferenceGlyph>,
}

impl ReferenceSet {
    /// Load and slice the reference sheet from disk.
    pub fn load(path: &Path) -> Result<Self, MicrError> {
        let sheet = image::open(path)
            .map_err(|e| {
                MicrError::Configuration(format!(
                    "failed to load reference sheet {}: {e}",
                    path.display()
                ))
            })?
            .to_luma8();
        Self::from_sheet(&sheet)
    }

    /// Slice a reference sheet raster into labelled glyph tiles.
    pub fn from_sheet(sheet: &GrayImage) -> Result<Self, MicrError> {
        let binary = binarize::apply(sheet, 19, 1)?;
        let contours = contour::extract(&binary, &ContourFilter::default());

        let mut glyphs = Vec::new();
        let mut cursor = 0usize;
        for descriptor in GLYPH_DESCRIPTORS {
            let (label, count) = match descriptor.split_once(':') {
                Some((label, n)) => {
                    let count: usize = n.parse().map_err(|_| {
                        MicrError::Configuration(format!(
                            "bad glyph descriptor '{descriptor}'"
                        ))
                    })?;
                    (label, count)
                }
                None => (descriptor, 1),
            };

            if cursor + count > contours.len() {
                return Err(MicrError::Configuration(format!(
                    "reference sheet has {} contours, need {} for glyph '{label}'",
                    contours.len(),
                    cursor + count
                )));
            }

            let rect = contours[cursor..cursor + count]
                .iter()
                .map(|c| c.rect)
                .reduce(|a, b| a.union(&b))
                .unwrap_or(Rect::new(0, 0, 1, 1));
            cursor += count;

            glyphs.push(ReferenceGlyph {
                label: label.to_string(),
                tile: glyph_tile(&binary, &rect),
            });
        }

        Ok(Self { glyphs })
    }

    pub fn glyphs(&self) -> &[ReferenceGlyph] {
        &self.glyphs
    }

    /// The "0" template seeding every anchor search. Its absence is fatal.
    pub fn zero(&self) -> Result<&GrayImage, MicrError> {
        self.glyphs
            .iter()
            .find(|g| g.label == "0")
            .map(|g| &g.tile)
            .ok_or_else(|| {
                MicrError::Configuration("missing \"0\" reference template".to_string())
            })
    }
}

/// Draw a synthetic reference sheet with distinguishable glyph marks.
///
/// Digits are solid blocks with a per-digit notch pattern; control symbols
/// are three separate marks each, matching their descriptors. Real
/// deployments ship a scanned E-13B sheet instead.
pub fn synthetic_sheet() -> GrayImage {
    let mut sheet = GrayImage::from_pixel(620, 60, image::Luma([255]));
    let mut x = 10i32;
    let dark = image::Luma([0u8]);

    let mut block = |sheet: &mut GrayImage, x0: i32, y0: i32, w: i32, h: i32| {
        for yy in 0..h {
            for xx in 0..w {
                sheet.put_pixel((x0 + xx) as u32, (y0 + yy) as u32, dark);
            }
        }
    };

    for digit in 0..10 {
        block(&mut sheet, x, 20, 14, 20);
        // Notch at a digit-specific height keeps the tiles distinct.
        for yy in 0..4 {
            for xx in 0..5 {
                sheet.put_pixel(
                    (x + 4 + xx) as u32,
                    (22 + (digit % 5) * 3 + yy) as u32,
                    image::Luma([255u8]),
                );
            }
        }
        x += 40;
    }
    // Control symbols are printed as three separate marks.
    for _control in 0..4 {
        block(&mut sheet, x, 20, 8, 20);
        block(&mut sheet, x + 12, 20, 6, 8);
        block(&mut sheet, x + 12, 32, 6, 8);
        x += 40;
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::anchor::TILE_SIZE;

    #[test]
    fn synthetic_sheet_slices_into_all_glyphs() {
        let set = ReferenceSet::from_sheet(&synthetic_sheet()).unwrap();
        assert_eq!(set.glyphs().len(), GLYPH_DESCRIPTORS.len());
        assert_eq!(set.glyphs()[0].label, "1");
        assert_eq!(set.glyphs()[9].label, "0");
        assert_eq!(set.glyphs()[10].label, "T");
        let zero = set.zero().unwrap();
        assert_eq!(zero.dimensions(), (TILE_SIZE, TILE_SIZE));
    }

    #[test]
    fn short_sheet_is_a_configuration_error() {
        // A sheet with a single mark cannot satisfy the descriptor list.
        let mut sheet = GrayImage::from_pixel(100, 40, image::Luma([255]));
        for y in 10..30 {
            for x in 10..24 {
                sheet.put_pixel(x, y, image::Luma([0]));
            }
        }
        assert!(ReferenceSet::from_sheet(&sheet).is_err());
    }
}
