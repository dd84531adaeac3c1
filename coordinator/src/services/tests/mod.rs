//! Service-specific tests
//!
//! Store behaviour is tested against in-memory SQLite; maintenance tests run
//! the engine end to end, including injected faults during renumbering.

#[cfg(test)]
mod maintenance;

// Common test utilities for services
#[cfg(test)]
pub mod common {
    use chrono::{DateTime, TimeZone, Utc};
    use shared::{ArticleStatus, NewArticle};

    use crate::services::SqliteStore;

    pub fn new_article(title: &str, tags: &[&str]) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            content: format!("# {}\n\nBody", title),
            seed: "travel".to_string(),
            status: ArticleStatus::Completed,
            error_message: None,
        }
    }

    pub fn failed_article(title: &str) -> NewArticle {
        NewArticle {
            status: ArticleStatus::Failed,
            error_message: Some("server error".to_string()),
            ..new_article(title, &["travel"])
        }
    }

    /// Fixed timestamp `minute` minutes after a reference point
    pub fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::minutes(minute as i64)
    }

    /// Store seeded with `(title, minute)` rows, inserted in the given order
    pub async fn seeded_store(rows: &[(&str, u32)]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for (title, minute) in rows {
            store
                .insert_article_at(new_article(title, &["travel"]), at(*minute))
                .await
                .unwrap();
        }
        store
    }
}
