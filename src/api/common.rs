//! Common API utilities and shared types

use serde::Deserialize;

use crate::models::ListParams;

/// Default offset for list endpoints
pub fn default_skip() -> i64 {
    0
}

/// Default page size for list endpoints
pub fn default_limit() -> i64 {
    100
}

/// Offset pagination query parameters
#[derive(Debug, Deserialize)]
pub struct SkipLimitQuery {
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Story list query: pagination plus an optional search term
#[derive(Debug, Deserialize)]
pub struct StoryListQuery {
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub search: Option<String>,
}

impl From<StoryListQuery> for ListParams {
    fn from(query: StoryListQuery) -> Self {
        ListParams::new(query.skip, query.limit, query.search)
    }
}
