//! The extraction capability: page images in, exam records out.
//!
//! [`RecordExtractor`] is the only seam between the controller and an AI
//! provider. The native Gemini client ([`crate::pipeline::gemini`]) and the
//! generic `edgequake-llm` client ([`crate::pipeline::llm`]) both implement
//! it, and tests substitute in-process fakes.
//!
//! Whatever the backend, the response text goes through [`parse_records`]:
//! cleanup, then a strict "must be a JSON array of records" parse. Field-level
//! content is not validated beyond that.

use crate::error::ExamError;
use crate::pipeline::encode::PageImage;
use crate::pipeline::postprocess::clean_response;
use crate::record::ExamRecord;
use async_trait::async_trait;
use tracing::warn;

/// Sends all page images in one request and returns the extracted records.
///
/// Implementations must check their credential before any network I/O, and
/// must not retry: one round trip, errors propagate as-is.
#[async_trait]
pub trait RecordExtractor: Send + Sync {
    /// Provider name used in logs and error messages.
    fn name(&self) -> &str;

    async fn extract(&self, images: &[PageImage]) -> Result<Vec<ExamRecord>, ExamError>;
}

/// Parse a model's text response into records.
///
/// `None`, empty or whitespace-only text, and anything that is not a JSON
/// array of objects are all [`ExamError::ResponseFormat`]. An empty array is
/// a valid, empty result.
pub fn parse_records(text: Option<&str>) -> Result<Vec<ExamRecord>, ExamError> {
    let raw = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => {
            warn!("Extraction response contained no text");
            return Err(ExamError::ResponseFormat {
                detail: "response was empty".into(),
            });
        }
    };

    let cleaned = clean_response(raw);
    serde_json::from_str::<Vec<ExamRecord>>(&cleaned).map_err(|e| {
        warn!(
            "Failed to parse extraction response: {} (first 200 chars: {:?})",
            e,
            preview(&cleaned, 200)
        );
        ExamError::ResponseFormat {
            detail: e.to_string(),
        }
    })
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
