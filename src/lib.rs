//! # edgequake-exam2csv
//!
//! Turn scanned exam-schedule PDFs into structured records and CSV using a
//! vision-capable AI model.
//!
//! ## Why this crate?
//!
//! Exam schedules are usually published as scanned or image-only PDFs: there
//! is no text layer to parse, and the tables wrap across pages. This crate
//! rasterises the first pages, sends them to a model in a single request
//! with a strict record schema, and returns typed [`ExamRecord`]s that can be
//! searched and exported as CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    local file or URL, must be application/pdf
//!  ├─ 2. Render   first 10 pages at 2× via pdfium (spawn_blocking)
//!  ├─ 3. Encode   JPEG, quality 85
//!  ├─ 4. Extract  one request, all pages, JSON array of records
//!  └─ 5. Export   filter for display, full set to CSV
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_exam2csv::{extract_records, filter_records, to_csv, ExamConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExamConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let records = extract_records("schedule.pdf", &config).await?;
//!     for r in filter_records(&records, "CS101") {
//!         println!("{} {}", r.register_number, r.student_name);
//!     }
//!     std::fs::write("schedule.csv", to_csv(&records))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Driving the state machine
//!
//! Front-ends that show progress hold a [`Pipeline`] and poll
//! [`Pipeline::snapshot`] or register a [`PipelineObserver`]. A pipeline
//! processes one document at a time and must be [`Pipeline::reset`] between
//! documents.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `exam2csv` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-exam2csv = { version = "0.1", default-features = false }
//! ```
//!
//! ## Providers
//!
//! | Provider | Selected by | Response shape enforced by |
//! |----------|-------------|----------------------------|
//! | Gemini (default) | no provider, or `provider_name("gemini")` | service-side `responseSchema` |
//! | OpenAI, Anthropic, Ollama, … | `provider_name(..)` or `provider(..)` | prompt + strict JSON parse |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExamConfig, ExamConfigBuilder};
pub use controller::{Pipeline, PipelineSnapshot, ProcessingStatus};
pub use error::{ErrorKind, ExamError};
pub use export::{csv_header, parse_csv, to_csv, write_csv};
pub use extract::{extract_records, extract_records_sync, extract_to_csv, inspect, inspect_with};
pub use pipeline::encode::PageImage;
pub use pipeline::extractor::RecordExtractor;
pub use pipeline::gemini::GeminiExtractor;
pub use pipeline::input::{load_document, SourceDocument};
pub use pipeline::llm::LlmExtractor;
pub use pipeline::render::{DocumentMetadata, PageRasterizer, PdfiumRasterizer};
pub use progress::{NoopObserver, ObserverRef, PipelineObserver};
pub use record::{filter_records, ExamRecord};
