//! Classifier backend implementations
//!
//! This module contains implementations of the Translator trait. The
//! template-match backend is always present (its reference set also feeds
//! the anchor finder); third-party OCR backends are conditionally compiled
//! behind feature flags.

pub mod template;

#[cfg(feature = "translator-ocrs")]
pub mod ocrs;

use crate::assets::ReferenceSet;
use crate::config::Config;
use crate::error::MicrError;
use crate::translator::Translator;
use std::sync::Arc;

/// Registry of available translator backends
pub struct TranslatorRegistry {
    translators: Vec<Arc<dyn Translator>>,
    default_translator: String,
}

impl TranslatorRegistry {
    /// Create a registry with all available backends initialized
    pub fn new(config: &Config, references: &ReferenceSet) -> Result<Self, MicrError> {
        let mut translators: Vec<Arc<dyn Translator>> = Vec::new();

        tracing::info!("Initializing template translator...");
        let template = template::TemplateTranslator::new(config, references)?;
        let default_translator = template.name().to_string();
        translators.push(Arc::new(template));

        #[cfg(feature = "translator-ocrs")]
        {
            tracing::info!("Initializing ocrs translator...");
            match ocrs::OcrsTranslator::new(config) {
                Ok(t) => translators.push(Arc::new(t)),
                // A missing third-party backend is soft; the built-in
                // reader still runs.
                Err(e) => tracing::warn!("ocrs translator unavailable: {e}"),
            }
        }

        for t in &translators {
            t.start()?;
        }

        Ok(Self {
            translators,
            default_translator,
        })
    }

    /// Get a translator by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Translator>> {
        self.translators.iter().find(|t| t.name() == name).cloned()
    }

    /// Resolve a requested name, failing the request on unknown names.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Translator>, MicrError> {
        self.get(name)
            .ok_or_else(|| MicrError::Configuration(format!("unknown translator '{name}'")))
    }

    pub fn default_name(&self) -> &str {
        &self.default_translator
    }

    /// List all available translator names
    pub fn list(&self) -> Vec<&'static str> {
        self.translators.iter().map(|t| t.name()).collect()
    }
}

impl Drop for TranslatorRegistry {
    fn drop(&mut self) {
        for t in &self.translators {
            t.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets;

    #[test]
    fn registry_always_carries_the_template_backend() {
        let references = ReferenceSet::from_sheet(&assets::synthetic_sheet()).unwrap();
        let registry = TranslatorRegistry::new(&Config::default(), &references).unwrap();
        assert_eq!(registry.default_name(), "template");
        assert!(registry.get("template").is_some());
        assert!(registry.resolve("nope").is_err());
    }
}
