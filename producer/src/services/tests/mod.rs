//! Tests for producer services
//!
//! The HTTP generator is exercised against a wiremock server standing in for
//! the completion endpoint.
