//! Template-match translator.
//!
//! Each segmented character region is normalized to the comparison tile
//! size and scored against every reference glyph with normalized
//! cross-correlation; the best label wins. Scores ride along in the
//! details so callers can judge confidence per character.

use crate::assets::{ReferenceGlyph, ReferenceSet};
use crate::config::Config;
use crate::detect::anchor::{glyph_tile, match_score};
use crate::detect::segment::Character;
use crate::error::MicrError;
use crate::micr;
use crate::translator::{CharDetail, Choice, Translation, TranslationDetails, Translator};
use image::GrayImage;

pub struct TemplateTranslator {
    glyphs: Vec<ReferenceGlyph>,
    max_choices: usize,
}

impl TemplateTranslator {
    pub fn new(config: &Config, references: &ReferenceSet) -> Result<Self, MicrError> {
        if references.glyphs().is_empty() {
            return Err(MicrError::Configuration(
                "reference set holds no glyphs".to_string(),
            ));
        }
        Ok(Self {
            glyphs: references.glyphs().to_vec(),
            max_choices: config.max_translator_choices,
        })
    }

    /// Score one character tile against every reference glyph, best first.
    fn translate_char(&self, image: &GrayImage, character: &Character) -> CharDetail {
        let tile = glyph_tile(image, &character.rect);
        let mut choices: Vec<Choice> = self
            .glyphs
            .iter()
            .map(|glyph| Choice {
                value: glyph.label.clone(),
                score: match_score(&tile, &glyph.tile),
            })
            .collect();
        choices.sort_by(|a, b| b.score.total_cmp(&a.score));
        choices.truncate(self.max_choices);

        let best = choices.first().cloned().unwrap_or(Choice {
            value: String::new(),
            score: 0.0,
        });
        CharDetail {
            value: best.value,
            score: best.score,
            x: character.rect.x,
            y: character.rect.y,
            width: character.rect.width,
            height: character.rect.height,
            choices,
        }
    }
}

impl Translator for TemplateTranslator {
    fn name(&self) -> &'static str {
        "template"
    }

    fn description(&self) -> &'static str {
        "Reference-glyph template matching, the built-in E-13B reader"
    }

    fn translate(
        &self,
        image: &GrayImage,
        characters: &[Character],
    ) -> Result<Translation, MicrError> {
        let chars: Vec<CharDetail> = characters
            .iter()
            .map(|c| self.translate_char(image, c))
            .collect();

        let value: String = chars.iter().map(|c| c.value.as_str()).collect();
        let score = if chars.is_empty() {
            0.0
        } else {
            chars.iter().map(|c| c.score).sum::<f64>() / chars.len() as f64
        };

        Ok(Translation {
            result: micr::parse(&value),
            details: Some(TranslationDetails { value, score, chars }),
        })
    }
}
