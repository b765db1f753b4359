//! Request orchestration: the synchronous geometric pipeline behind the
//! HTTP facade.
//!
//! One `MicrScanner` lives for the process; reference glyphs, translator
//! backends and corrections are loaded once and shared immutably. Every
//! request runs the pipeline to completion on its own data: the outcome
//! value owns all stage rasters produced while servicing it, so they are
//! released together when the response has been built.

use crate::assets::ReferenceSet;
use crate::config::Config;
use crate::corrections::{Correction, CorrectionStore};
use crate::detect::contour::{self, ContourFilter};
use crate::detect::line;
use crate::detect::overlap::{self, OverlapConfig};
use crate::detect::segment::{self, SegmentConfig};
use crate::detect::{anchor, segment::Segmentation};
use crate::error::MicrError;
use crate::preprocessing::{pipeline, CropFractions, StageImage, StepTiming};
use crate::translator::Translation;
use crate::translators::TranslatorRegistry;
use image::{DynamicImage, GrayImage};
use std::collections::BTreeMap;

/// Overlap correction re-enters detection at most this often.
const MAX_DETECT_PASSES: usize = 3;

/// Per-scan options distilled from the request.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub crop: Option<CropFractions>,
    /// Requested translator names; empty selects the default backend
    pub translators: Vec<String>,
    pub correct: bool,
    pub actual: Option<String>,
}

/// Everything a scan produced, including the request-scoped rasters.
#[derive(Debug)]
pub struct ScanOutcome {
    pub overlap: bool,
    pub translations: BTreeMap<String, Translation>,
    pub stages: Vec<StageImage>,
    pub steps: Vec<StepTiming>,
}

pub struct PreprocessOutcome {
    pub image: GrayImage,
    pub stages: Vec<StageImage>,
    pub steps: Vec<StepTiming>,
}

pub struct MicrScanner {
    config: Config,
    references: ReferenceSet,
    zero_template: GrayImage,
    translators: TranslatorRegistry,
    corrections: CorrectionStore,
}

impl MicrScanner {
    /// Load shared assets and initialize all backends.
    pub fn new(config: &Config) -> Result<Self, MicrError> {
        config.validate()?;
        let references = ReferenceSet::load(&config.reference_path)?;
        Self::with_references(config, references)
    }

    /// Build a scanner around an already-sliced reference set.
    pub fn with_references(
        config: &Config,
        references: ReferenceSet,
    ) -> Result<Self, MicrError> {
        let zero_template = references.zero()?.clone();
        let translators = TranslatorRegistry::new(config, &references)?;
        let corrections = CorrectionStore::load(config.corrections_path.as_deref());
        Ok(Self {
            config: config.clone(),
            references,
            zero_template,
            translators,
            corrections,
        })
    }

    pub fn translator_names(&self) -> Vec<&'static str> {
        self.translators.list()
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    /// Run preprocessing alone and hand back the band.
    pub fn preprocess(
        &self,
        image: DynamicImage,
        crop: Option<CropFractions>,
    ) -> Result<PreprocessOutcome, MicrError> {
        let result = pipeline::process(image, &crop.unwrap_or_default())?;
        Ok(PreprocessOutcome {
            image: result.image,
            stages: result.stages,
            steps: result.steps,
        })
    }

    /// Full scan: preprocess, locate the line, segment characters, run the
    /// requested translators.
    pub fn scan(
        &self,
        id: &str,
        image: DynamicImage,
        options: &ScanOptions,
    ) -> Result<ScanOutcome, MicrError> {
        // Resolve translator names up front; an unknown name fails the
        // request before any pixel work.
        let mut requested = options.translators.clone();
        if requested.is_empty() {
            requested.push(self.translators.default_name().to_string());
        }
        let backends = requested
            .iter()
            .map(|name| Ok((name.clone(), self.translators.resolve(name)?)))
            .collect::<Result<Vec<_>, MicrError>>()?;

        let mut pre = pipeline::process(image, &options.crop.unwrap_or_default())?;
        let mut working = pipeline::binarize_band(
            &mut pre,
            self.config.binarize_block_size,
            self.config.binarize_c,
        )?;

        let filter = ContourFilter::from_config(&self.config);
        let overlap_cfg = OverlapConfig::from_config(&self.config);
        let segment_cfg = SegmentConfig::from_config(&self.config);

        let mut overlap_seen = false;
        let mut located: Option<(line::Line, Segmentation)> = None;

        for pass in 0..MAX_DETECT_PASSES {
            let contours = contour::extract(&working, &filter);
            let found = anchor::find_anchor(
                &working,
                &contours,
                &self.zero_template,
                self.config.anchor_stop_score,
            );
            let anchor_match = match found {
                Some(m) => m,
                None => {
                    // Soft detection failure: the response carries empty
                    // translator results.
                    tracing::info!(id, pass, "no anchor found, line not located");
                    break;
                }
            };
            tracing::debug!(
                id,
                pass,
                score = anchor_match.score,
                "anchor selected, building line"
            );

            let built = line::build(
                &working,
                &contours,
                anchor_match.index,
                self.config.max_space_between_chars_of_word,
            );

            if built.overlap && self.config.overlap_correction && pass + 1 < MAX_DETECT_PASSES {
                overlap_seen = true;
                working = overlap::correct(&working, &built, &overlap_cfg);
                pre.stages.push(StageImage {
                    name: "overlap",
                    image: working.clone(),
                });
                continue;
            }
            overlap_seen |= built.overlap;

            let segmentation =
                segment::segment(&working, &built, &segment_cfg, &[built.anchor_rect]);
            located = Some((built, segmentation));
            break;
        }

        let mut translations = BTreeMap::new();
        if let Some((_, segmentation)) = &located {
            for (name, backend) in backends {
                match backend.translate(&working, &segmentation.characters) {
                    Ok(translation) => {
                        self.maybe_record_correction(id, options, &translation);
                        translations.insert(name, translation);
                    }
                    // Backend failure drops this translator from the map;
                    // the others still answer.
                    Err(e) => tracing::warn!(id, translator = %name, "translator failed: {e}"),
                }
            }
        }

        Ok(ScanOutcome {
            overlap: overlap_seen && located.is_some(),
            translations,
            stages: pre.stages,
            steps: pre.steps,
        })
    }

    /// Persist an observed/actual pair when the caller supplied ground
    /// truth and asked for corrections.
    fn maybe_record_correction(&self, id: &str, options: &ScanOptions, translation: &Translation) {
        if !options.correct {
            return;
        }
        let Some(actual) = options.actual.as_deref() else {
            return;
        };
        let value = translation
            .details
            .as_ref()
            .map(|d| d.value.clone())
            .unwrap_or_else(|| translation.result.micr_line.clone());
        if value != actual {
            tracing::info!(id, %actual, %value, "recording operator correction");
        }
        self.corrections.record(&Correction {
            id: id.to_string(),
            actual: actual.to_string(),
            value,
        });
    }
}
