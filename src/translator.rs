use crate::detect::segment::Character;
use crate::error::MicrError;
use crate::micr::MicrFields;
use image::GrayImage;
use serde::Serialize;

/// One alternative reading of a character.
#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub value: String,
    pub score: f64,
}

/// Per-character classification detail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharDetail {
    pub value: String,
    pub score: f64,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationDetails {
    /// The assembled MICR string
    pub value: String,
    /// Mean of the per-character best scores
    pub score: f64,
    pub chars: Vec<CharDetail>,
}

/// One translator's reading of a line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub result: MicrFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<TranslationDetails>,
}

/// Trait that all classifier backends implement
pub trait Translator: Send + Sync {
    /// Returns the translator identifier (e.g., "template")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the backend
    fn description(&self) -> &'static str;

    /// Read the segmented characters of one line
    fn translate(
        &self,
        image: &GrayImage,
        characters: &[Character],
    ) -> Result<Translation, MicrError>;

    /// Lifecycle hooks; most backends need neither.
    fn start(&self) -> Result<(), MicrError> {
        Ok(())
    }

    fn stop(&self) {}
}
