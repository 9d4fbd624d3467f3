use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::StoryboardError;

/// A reference frame carried through the drafting pipeline.
///
/// Stored as a `data:` URL (mime + base64 payload) so a project document
/// round-trips through JSON without side files. The payload accessor feeds
/// the generation request body; `decode` recovers raw bytes for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
    }

    /// Wraps an already-encoded data URL without validating it; invalid
    /// references surface later from `decode`.
    pub fn from_data_url(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .filter(|m| !m.is_empty())
            .unwrap_or("image/png")
    }

    /// The base64 portion after the comma, as the generation API consumes it.
    pub fn base64_payload(&self) -> &str {
        match self.0.split_once(',') {
            Some((_, payload)) => payload,
            None => &self.0,
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, StoryboardError> {
        if !self.0.starts_with("data:") {
            return Err(StoryboardError::NotDataUrl);
        }
        Ok(STANDARD.decode(self.base64_payload())?)
    }
}
