use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Pattern, PatternError};

/// Builds a pattern instance, optionally from a predecessor's handoff payload.
pub type PatternFactory = Box<dyn Fn(Option<&Value>) -> Box<dyn Pattern>>;

/// How the director picks the pattern that opens a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternSelection {
    /// Use the pattern registered under this identifier.
    Explicit(String),
    /// Use the first identifier, in sorted order, that occurs in the seed
    /// text, ignoring case. Intended for demo and test content.
    DeriveFromSeed(String),
}

/// Pattern identifiers mapped to their factories.
#[derive(Default)]
pub struct PatternCatalog {
    factories: BTreeMap<String, PatternFactory>,
}

impl PatternCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`PatternCatalog::register`].
    #[must_use]
    pub fn with_pattern<F>(mut self, id: &str, factory: F) -> Self
    where
        F: Fn(Option<&Value>) -> Box<dyn Pattern> + 'static,
    {
        self.register(id, factory);
        self
    }

    /// Registers `factory` under `id`, replacing any previous one.
    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(Option<&Value>) -> Box<dyn Pattern> + 'static,
    {
        if self
            .factories
            .insert(id.to_owned(), Box::new(factory))
            .is_some()
        {
            log::debug!("replaced pattern factory `{id}`");
        }
    }

    /// Whether a factory is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Builds the pattern registered under `id`.
    pub fn instantiate(
        &self,
        id: &str,
        payload: Option<&Value>,
    ) -> Result<Box<dyn Pattern>, PatternError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| PatternError::MissingFactory {
                pattern: id.to_owned(),
            })?;
        Ok(factory(payload))
    }

    /// Resolves a selection to a registered identifier.
    pub fn resolve(&self, selection: &PatternSelection) -> Result<String, PatternError> {
        match selection {
            PatternSelection::Explicit(id) if self.contains(id) => Ok(id.clone()),
            PatternSelection::Explicit(id) => Err(PatternError::MissingFactory {
                pattern: id.clone(),
            }),
            PatternSelection::DeriveFromSeed(seed) => {
                let seed_lower = seed.to_lowercase();
                self.ids()
                    .find(|id| seed_lower.contains(&id.to_lowercase()))
                    .map(str::to_owned)
                    .ok_or_else(|| PatternError::NoSeedMatch { seed: seed.clone() })
            }
        }
    }
}

impl std::fmt::Debug for PatternCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternCatalog")
            .field("ids", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}
