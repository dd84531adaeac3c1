//! Test fixtures and data for coordinator tests

#![allow(dead_code)]

use coordinator::KeywordCatalog;
use shared::{GeneratedArticle, GenerationResult};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const SEED: &'static str = "travel";
    pub const DEFAULT_WORKERS: usize = 3;
    pub const RATE_REMAINING: u32 = 100;

    /// Generated article with the given title
    pub fn article(title: &str) -> GenerationResult {
        Ok(GeneratedArticle {
            title: title.to_string(),
            tags: vec!["travel".to_string(), "guide".to_string()],
            content: format!("# {}\n\nSome words about the trip.", title),
            raw_response: format!("TITLE: {}", title),
        })
    }

    /// Unique title per unit index
    pub fn numbered_article(index: u64) -> GenerationResult {
        Self::article(&format!("Article {}", index))
    }

    /// Catalog with one category of two keywords
    pub fn travel_catalog() -> KeywordCatalog {
        KeywordCatalog::from_json(r#"{"travel": ["beach", "mountain"]}"#).unwrap()
    }
}
