//! Boundary to the external content registries that snapshots are validated against.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Identifiers known to each registry category, sorted for stable output.
pub type RegistrySnapshot = BTreeMap<String, Vec<String>>;

/// Content version keyed by `category:id`.
pub type VersionMap = BTreeMap<String, u32>;

/// Collaborator that owns static content definitions.
///
/// The core never inspects content; it only records what a registry reports
/// so that a later resume can detect drift.
pub trait ContentRegistry {
    /// Identifiers per category.
    fn snapshot(&self) -> RegistrySnapshot;

    /// Stable digest over the registry contents.
    fn hash(&self) -> String;

    /// Content versions keyed by `category:id`.
    fn version_map(&self) -> VersionMap;
}

/// In-memory registry backed by sorted maps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticRegistry {
    categories: BTreeMap<String, BTreeMap<String, u32>>,
}

impl StaticRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`StaticRegistry::insert`].
    #[must_use]
    pub fn with_entry(mut self, category: &str, id: &str, version: u32) -> Self {
        let _ = self.insert(category, id, version);
        self
    }

    /// Registers `id` under `category`, returning the version it replaced.
    pub fn insert(&mut self, category: &str, id: &str, version: u32) -> Option<u32> {
        self.categories
            .entry(category.to_owned())
            .or_default()
            .insert(id.to_owned(), version)
    }
}

impl ContentRegistry for StaticRegistry {
    fn snapshot(&self) -> RegistrySnapshot {
        self.categories
            .iter()
            .map(|(category, entries)| (category.clone(), entries.keys().cloned().collect()))
            .collect()
    }

    fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (category, entries) in &self.categories {
            for (id, version) in entries {
                hasher.update(category.as_bytes());
                hasher.update([0_u8]);
                hasher.update(id.as_bytes());
                hasher.update([0_u8]);
                hasher.update(version.to_le_bytes());
                hasher.update([b'\n']);
            }
        }
        format!("{:x}", hasher.finalize())
    }

    fn version_map(&self) -> VersionMap {
        self.categories
            .iter()
            .flat_map(|(category, entries)| {
                entries
                    .iter()
                    .map(move |(id, version)| (format!("{category}:{id}"), *version))
            })
            .collect()
    }
}
