//! One-call entry points over [`Pipeline`].
//!
//! Each call builds a fresh pipeline from the config, so callers that only
//! need "PDF in, records out" never touch the state machine.

use crate::config::ExamConfig;
use crate::controller::Pipeline;
use crate::error::ExamError;
use crate::export::write_csv;
use crate::pipeline::input::load_document;
use crate::pipeline::render::{DocumentMetadata, PdfiumRasterizer};
use crate::record::ExamRecord;
use std::path::Path;

/// Extract every exam record from a local PDF or an HTTP(S) URL.
///
/// # Example
/// ```rust,no_run
/// use edgequake_exam2csv::{extract_records, ExamConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExamConfig::builder()
///     .api_key(std::env::var("GEMINI_API_KEY")?)
///     .build()?;
/// let records = extract_records("schedule.pdf", &config).await?;
/// for r in &records {
///     println!("{} {} {}", r.register_number, r.subject_code, r.student_name);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract_records(
    input: impl AsRef<str>,
    config: &ExamConfig,
) -> Result<Vec<ExamRecord>, ExamError> {
    let document = load_document(input.as_ref(), config.download_timeout_secs).await?;
    Pipeline::from_config(config)?.process(document).await
}

/// Extract records and write them to `output` as CSV.
///
/// Returns the number of records written. Nothing is written if extraction
/// fails.
pub async fn extract_to_csv(
    input: impl AsRef<str>,
    output: impl AsRef<Path>,
    config: &ExamConfig,
) -> Result<usize, ExamError> {
    let records = extract_records(input, config).await?;
    write_csv(output, &records).await?;
    Ok(records.len())
}

/// Synchronous wrapper around [`extract_records`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_records_sync(
    input: impl AsRef<str>,
    config: &ExamConfig,
) -> Result<Vec<ExamRecord>, ExamError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExamError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_records(input, config))
}

/// Read PDF metadata without extracting anything.
///
/// Does not require an API key.
pub async fn inspect(input: impl AsRef<str>) -> Result<DocumentMetadata, ExamError> {
    inspect_with(input, &ExamConfig::default()).await
}

/// [`inspect`] honouring the config's page cap, password and pdfium path.
pub async fn inspect_with(
    input: impl AsRef<str>,
    config: &ExamConfig,
) -> Result<DocumentMetadata, ExamError> {
    let document = load_document(input.as_ref(), config.download_timeout_secs).await?;
    PdfiumRasterizer::from_config(config).inspect(&document).await
}
