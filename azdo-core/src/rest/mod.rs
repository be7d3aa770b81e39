//! REST transport for Azure DevOps.

pub mod client;
pub mod url;

pub use client::{ApiResponse, CONTINUATION_TOKEN_HEADER, RequestBuilder, RestClient, basic_authorization};

use serde::de::{Deserialize, Deserializer, IgnoredAny};
use serde::Serialize;

/// Marker for calls where only success or failure matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoContent;

impl<'de> Deserialize<'de> for NoContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(NoContent)
    }
}

/// Collection envelope `{count, value: [...]}`.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.value
    }
}

/// One page of a list call plus the token for the next page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub continuation_token: Option<String>,
}
