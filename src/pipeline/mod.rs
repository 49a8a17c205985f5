//! Pipeline stages for exam-schedule extraction.
//!
//! Each submodule implements one transformation step; the controller in
//! [`crate::controller`] sequences them and owns the status.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ extractor ──▶ postprocess
//! (path/URL) (pdfium)   (JPEG)   (gemini|llm)   (JSON cleanup)
//! ```
//!
//! 1. [`input`]: resolve a path or URL to an in-memory [`input::SourceDocument`]
//! 2. [`render`]: rasterise the first pages; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]: JPEG-encode each page for the multimodal request body
//! 4. [`extractor`]: the provider seam; [`gemini`] and [`llm`] implement it
//!    and are the only stages with network I/O
//! 5. [`postprocess`]: strip fences and invisible characters before parsing

pub mod encode;
pub mod extractor;
pub mod gemini;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
