//! The pipeline controller: one document in, one record set (or one error) out.
//!
//! [`Pipeline`] owns the [`ProcessingStatus`] state machine:
//!
//! ```text
//!  idle ──process──▶ rendering ──images──▶ extracting ──records──▶ completed
//!   ▲                    │                     │                      │
//!   │                    └──────fail──────┬────┘                      │
//!   │                                     ▼                           │
//!   └──────────────────reset─────────── error ◀───────────────────────┘ (reset)
//! ```
//!
//! The API takes `&self`: state sits behind a `Mutex` that is never held
//! across an `.await`, so an `Arc<Pipeline>` can be shared between the task
//! running a document and a front-end polling [`Pipeline::snapshot`].

use crate::config::ExamConfig;
use crate::error::ExamError;
use crate::pipeline::extractor::RecordExtractor;
use crate::pipeline::gemini::GeminiExtractor;
use crate::pipeline::input::SourceDocument;
use crate::pipeline::llm::LlmExtractor;
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::progress::{NoopObserver, ObserverRef};
use crate::record::{filter_records, ExamRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{info, warn};

/// Message stored when a run's future is dropped mid-flight.
pub const INTERRUPTED_MESSAGE: &str = "processing was interrupted";

/// Where a pipeline is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Idle,
    Rendering,
    Extracting,
    Completed,
    Error,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Idle => "idle",
            ProcessingStatus::Rendering => "rendering",
            ProcessingStatus::Extracting => "extracting",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Error => "error",
        }
    }

    /// Human-facing label for progress displays.
    pub fn label(self) -> &'static str {
        match self {
            ProcessingStatus::Idle => "Waiting for a PDF…",
            ProcessingStatus::Rendering => "Reading PDF pages…",
            ProcessingStatus::Extracting => "AI extracting table data…",
            ProcessingStatus::Completed => "Extraction complete",
            ProcessingStatus::Error => "Extraction failed",
        }
    }

    /// A run is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, ProcessingStatus::Rendering | ProcessingStatus::Extracting)
    }

    /// The run finished; only `reset` leaves this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Error)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of a pipeline's observable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub status: ProcessingStatus,
    pub records: Vec<ExamRecord>,
    pub error_message: Option<String>,
}

#[derive(Default)]
struct State {
    status: ProcessingStatus,
    records: Vec<ExamRecord>,
    error_message: Option<String>,
}

/// Sequences rasterisation and extraction for one document at a time.
pub struct Pipeline {
    rasterizer: Arc<dyn PageRasterizer>,
    extractor: Arc<dyn RecordExtractor>,
    observer: ObserverRef,
    state: Mutex<State>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("extractor", &self.extractor.name())
            .field("status", &self.status())
            .finish()
    }
}

impl Pipeline {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, extractor: Arc<dyn RecordExtractor>) -> Self {
        Self {
            rasterizer,
            extractor,
            observer: Arc::new(NoopObserver),
            state: Mutex::new(State::default()),
        }
    }

    /// pdfium rasteriser plus the extractor the config selects: native Gemini
    /// unless another provider is named or injected.
    pub fn from_config(config: &ExamConfig) -> Result<Self, ExamError> {
        let rasterizer = Arc::new(PdfiumRasterizer::from_config(config));
        let extractor: Arc<dyn RecordExtractor> = if config.uses_native_gemini() {
            Arc::new(GeminiExtractor::from_config(config)?)
        } else {
            Arc::new(LlmExtractor::from_config(config))
        };
        let mut pipeline = Self::new(rasterizer, extractor);
        if let Some(observer) = &config.observer {
            pipeline.observer = Arc::clone(observer);
        }
        Ok(pipeline)
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.observer = observer;
        self
    }

    pub fn status(&self) -> ProcessingStatus {
        self.lock().status
    }

    /// Records of the last completed run; empty in every other state.
    pub fn records(&self) -> Vec<ExamRecord> {
        self.lock().records.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let state = self.lock();
        PipelineSnapshot {
            status: state.status,
            records: state.records.clone(),
            error_message: state.error_message.clone(),
        }
    }

    /// Held records matching `query` (see [`ExamRecord::matches`]).
    pub fn search(&self, query: &str) -> Vec<ExamRecord> {
        let state = self.lock();
        filter_records(&state.records, query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Run one document through rasterisation and extraction.
    ///
    /// Only accepted from `idle`. On success the pipeline is `completed` and
    /// holds the returned records; on failure it is `error` and holds the
    /// error's message. Either way, [`Pipeline::reset`] is needed before the
    /// next document.
    pub async fn process(&self, document: SourceDocument) -> Result<Vec<ExamRecord>, ExamError> {
        {
            let mut state = self.lock();
            if state.status.is_busy() {
                return Err(ExamError::RunInProgress {
                    status: state.status,
                });
            }
            if state.status.is_terminal() {
                return Err(ExamError::ResetRequired {
                    status: state.status,
                });
            }
            state.status = ProcessingStatus::Rendering;
            state.error_message = None;
            state.records.clear();
        }
        self.observer
            .on_status_change(ProcessingStatus::Idle, ProcessingStatus::Rendering);

        let mut guard = RunGuard {
            pipeline: self,
            armed: true,
        };
        let result = self.run(&document).await;
        guard.armed = false;

        match result {
            Ok(records) => Ok(records),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn run(&self, document: &SourceDocument) -> Result<Vec<ExamRecord>, ExamError> {
        let start = Instant::now();
        info!("Processing '{}' ({} bytes)", document.name(), document.len());

        let images = self.rasterizer.rasterize(document).await?;
        info!("Rendered {} page(s) in {:?}", images.len(), start.elapsed());
        self.observer.on_pages_rendered(images.len());
        self.transition(ProcessingStatus::Extracting, |_| {});

        let records = self.extractor.extract(&images).await?;
        self.observer.on_records_extracted(records.len());
        let held = records.clone();
        self.transition(ProcessingStatus::Completed, move |state| {
            state.records = held;
        });

        info!(
            "Completed '{}': {} record(s) in {:?}",
            document.name(),
            records.len(),
            start.elapsed()
        );
        Ok(records)
    }

    /// Return to `idle`, discarding records and any error message.
    ///
    /// A no-op from `idle`; rejected with [`ExamError::RunInProgress`] while
    /// a run is in flight.
    pub fn reset(&self) -> Result<(), ExamError> {
        let from = {
            let mut state = self.lock();
            if state.status.is_busy() {
                return Err(ExamError::RunInProgress {
                    status: state.status,
                });
            }
            if state.status == ProcessingStatus::Idle {
                return Ok(());
            }
            let from = state.status;
            *state = State::default();
            from
        };
        self.observer.on_status_change(from, ProcessingStatus::Idle);
        Ok(())
    }

    fn fail(&self, error: &ExamError) {
        let message = error.to_string();
        warn!("Extraction failed: {}", message);
        let stored = message.clone();
        self.transition(ProcessingStatus::Error, move |state| {
            state.records.clear();
            state.error_message = Some(stored);
        });
        self.observer.on_error(&message);
    }

    /// Apply a state change under the lock, then notify outside it.
    fn transition(&self, to: ProcessingStatus, apply: impl FnOnce(&mut State)) {
        let from = {
            let mut state = self.lock();
            let from = state.status;
            state.status = to;
            apply(&mut state);
            from
        };
        self.observer.on_status_change(from, to);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Moves the pipeline to `error` if a `process` future is dropped mid-run.
struct RunGuard<'a> {
    pipeline: &'a Pipeline,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed || !self.pipeline.status().is_busy() {
            return;
        }
        warn!("Run dropped before finishing");
        self.pipeline.transition(ProcessingStatus::Error, |state| {
            state.records.clear();
            state.error_message = Some(INTERRUPTED_MESSAGE.to_string());
        });
        self.pipeline.observer.on_error(INTERRUPTED_MESSAGE);
    }
}
