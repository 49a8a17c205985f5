//! Observer trait for pipeline status events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::ExamConfigBuilder::observer`] (or
//! [`crate::controller::Pipeline::with_observer`]) to follow a run as it moves
//! through `rendering → extracting → completed`.
//!
//! # Why callbacks instead of polling?
//!
//! The status is what drives a front-end: a spinner label while rendering, a
//! different one while waiting on the model, then the table or the error
//! panel. A callback lets the host forward those transitions to a terminal
//! spinner, a channel, or a UI event loop without the library knowing which.
//!
//! # Example
//!
//! ```rust
//! use edgequake_exam2csv::{ExamConfig, PipelineObserver, ProcessingStatus};
//! use std::sync::Arc;
//!
//! struct PrintStatus;
//!
//! impl PipelineObserver for PrintStatus {
//!     fn on_status_change(&self, _from: ProcessingStatus, to: ProcessingStatus) {
//!         eprintln!("{}", to.label());
//!     }
//! }
//!
//! let config = ExamConfig::builder()
//!     .observer(Arc::new(PrintStatus) as Arc<dyn PipelineObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::controller::ProcessingStatus;
use std::sync::Arc;

/// Called by the [`crate::controller::Pipeline`] as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events are delivered from whatever task drives
/// `Pipeline::process`, hence the `Send + Sync` bound.
pub trait PipelineObserver: Send + Sync {
    /// Called on every state transition, including resets.
    fn on_status_change(&self, from: ProcessingStatus, to: ProcessingStatus) {
        let _ = (from, to);
    }

    /// Called once rasterisation finished.
    ///
    /// # Arguments
    /// * `page_count`: number of page images handed to the extractor
    fn on_pages_rendered(&self, page_count: usize) {
        let _ = page_count;
    }

    /// Called once the extractor returned a record set.
    fn on_records_extracted(&self, record_count: usize) {
        let _ = record_count;
    }

    /// Called when a run fails, with the message the pipeline stored.
    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ExamConfig`].
pub type ObserverRef = Arc<dyn PipelineObserver>;
