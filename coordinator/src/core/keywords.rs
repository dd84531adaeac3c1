//! Keyword catalog and composite seed construction

use std::collections::BTreeMap;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoordinatorResult;

/// Keywords sampled per unit in random mode
pub const RANDOM_KEYWORDS_PER_UNIT: usize = 3;

/// Category name to keyword list, read from a JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordCatalog {
    categories: BTreeMap<String, Vec<String>>,
}

impl KeywordCatalog {
    pub fn from_json(json: &str) -> CoordinatorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read the catalog file; a missing or unreadable file gives an empty catalog
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path)
            .map_err(Into::into)
            .and_then(|content| Self::from_json(&content))
        {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("⚠️ Failed to load keyword catalog {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    pub fn keywords(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Seed sent to the generator for unit `index` (1-based)
    pub fn composite_seed(&self, seed: &str, index: u64, sequential: bool) -> String {
        self.composite_seed_with(seed, index, sequential, &mut rand::thread_rng())
    }

    /// Sequential mode pairs the category with keyword `(index - 1) mod len`;
    /// random mode appends up to three distinct keywords. Seeds that are not a
    /// non-empty category pass through unchanged.
    pub fn composite_seed_with<R: Rng + ?Sized>(&self, seed: &str, index: u64, sequential: bool, rng: &mut R) -> String {
        let keywords = match self.keywords(seed) {
            Some(keywords) if !keywords.is_empty() => keywords,
            _ => return seed.to_string(),
        };

        if sequential {
            let position = (index.saturating_sub(1) % keywords.len() as u64) as usize;
            return format!("{}, {}", seed, keywords[position]);
        }

        let picks = RANDOM_KEYWORDS_PER_UNIT.min(keywords.len());
        let mut parts: Vec<&str> = Vec::with_capacity(picks + 1);
        parts.push(seed);
        parts.extend(keywords.choose_multiple(rng, picks).map(String::as_str));
        parts.join(", ")
    }
}
