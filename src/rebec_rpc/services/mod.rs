//! Typed clients for the built-in services.
//!
//! Each wraps the generic [`MethodHandle`](crate::client::MethodHandle)s of one service, so
//! typed calls go through the same validation and transport as untyped ones.

use serde::de::{self, Deserializer};
use serde::Deserialize;

pub mod prompt;
pub mod testcase;

pub use prompt::{PromptRunRequest, PromptRunResponse, PromptServiceClient};
pub use testcase::{
    CreateTestcaseRequest, CreateTestcaseResponse, ListTestcasesRequest, ListTestcasesResponse,
    TestcaseServiceClient,
};

/// Accepts an int64 as either a JSON number or a decimal string.
pub(crate) fn int64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Number(i64),
        Text(String),
    }

    match Wire::deserialize(deserializer)? {
        Wire::Number(n) => Ok(n),
        Wire::Text(s) => s.parse().map_err(de::Error::custom),
    }
}
