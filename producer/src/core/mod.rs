//! Producer core logic

pub mod parser;
pub mod prompt;
pub mod rate_limiter;

pub use parser::{parse_article, ParsedArticle};
pub use prompt::{build_user_prompt, SYSTEM_PROMPT};
pub use rate_limiter::RateLimiter;
