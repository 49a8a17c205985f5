//! Error types for the edgequake-exam2csv library.
//!
//! Every failure is an [`ExamError`]. There is no partial-success mode: a
//! pipeline run either produces the full record set or fails with exactly one
//! of these, which the [`crate::controller::Pipeline`] stores as its display
//! message when it moves to the `error` state.
//!
//! [`ExamError::kind`] groups the variants into the coarse categories a
//! presentation layer cares about (bad document, missing setup, malformed AI
//! response, network failure, …) so callers can pick a recovery hint without
//! matching every variant.

use crate::controller::ProcessingStatus;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-exam2csv library.
#[derive(Debug, Error)]
pub enum ExamError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file was read, but its bytes are not a PDF.
    #[error("'{name}' is not a PDF file (first bytes: {magic:?})\nPlease upload a PDF file.")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// The caller declared a content type other than `application/pdf`.
    #[error("Unsupported file type '{content_type}' for '{name}'\nPlease upload a PDF file.")]
    UnsupportedContentType { name: String, content_type: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The buffer could not be parsed as a PDF document.
    #[error("Could not read PDF '{name}': {detail}")]
    DocumentParse { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A rendered page could not be JPEG-encoded.
    #[error("Image encoding failed for page {page}: {detail}")]
    ImageEncoding { page: usize, detail: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// No credential is configured for the extraction provider.
    #[error("API key for '{provider}' is missing.\n{hint}")]
    MissingApiKey { provider: String, hint: String },

    /// The provider answered, but not with a JSON record array.
    #[error("The AI response was not in a valid format. Please try again.\nDetail: {detail}")]
    ResponseFormat { detail: String },

    /// Network or service failure underlying the extraction call.
    #[error("Extraction request to '{provider}' failed: {message}")]
    Transport { provider: String, message: String },

    // ── Controller errors ─────────────────────────────────────────────────
    /// A run is already in flight on this pipeline.
    #[error("A document is already being processed (status: {status})")]
    RunInProgress { status: ProcessingStatus },

    /// The previous run finished; `reset()` must be called before a new one.
    #[error("Pipeline is '{status}'; reset it before processing another file")]
    ResetRequired { status: ProcessingStatus },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV text could not be read back into records.
    #[error("Invalid CSV at line {line}: {detail}")]
    CsvParse { line: usize, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Install libpdfium system-wide (e.g. from bblanchon/pdfium-binaries).\n\
  • Place libpdfium next to the executable or in the working directory.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (or --pdfium-lib).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`ExamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The uploaded file could not be rasterised.
    DocumentParse,
    /// Setup problem: missing credential, bad config, no pdfium.
    Configuration,
    /// The extraction service returned empty or non-JSON text.
    ResponseFormat,
    /// Network/service failure during extraction.
    Transport,
    /// The file was rejected before entering the pipeline.
    Input,
    /// The pipeline was asked to do something its current state forbids.
    State,
    /// Writing or reading exported CSV failed.
    Output,
    /// Bug or runtime failure.
    Internal,
}

impl ExamError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExamError::FileNotFound { .. }
            | ExamError::PermissionDenied { .. }
            | ExamError::InvalidInput { .. }
            | ExamError::DownloadFailed { .. }
            | ExamError::DownloadTimeout { .. }
            | ExamError::NotAPdf { .. }
            | ExamError::UnsupportedContentType { .. } => ErrorKind::Input,
            ExamError::DocumentParse { .. }
            | ExamError::PasswordRequired { .. }
            | ExamError::WrongPassword { .. }
            | ExamError::RasterisationFailed { .. }
            | ExamError::ImageEncoding { .. } => ErrorKind::DocumentParse,
            ExamError::MissingApiKey { .. }
            | ExamError::InvalidConfig(_)
            | ExamError::PdfiumBindingFailed(_) => ErrorKind::Configuration,
            ExamError::ResponseFormat { .. } => ErrorKind::ResponseFormat,
            ExamError::Transport { .. } => ErrorKind::Transport,
            ExamError::RunInProgress { .. } | ExamError::ResetRequired { .. } => ErrorKind::State,
            ExamError::OutputWriteFailed { .. } | ExamError::CsvParse { .. } => ErrorKind::Output,
            ExamError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-running the same file might succeed.
    ///
    /// Nothing is retried automatically; this only drives the "try again"
    /// wording in front-ends.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ResponseFormat | ErrorKind::Transport
        )
    }
}
