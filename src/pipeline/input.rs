//! Input resolution: turn a user-supplied file or URL into a [`SourceDocument`].
//!
//! pdfium loads documents straight from a byte slice, so the whole file is
//! read into memory once and shared (`Arc<[u8]>`) with the blocking render
//! task. Non-PDF input is rejected here, before it reaches the pipeline:
//! either by its declared content type or, for local files and downloads, by
//! the `%PDF` magic bytes.

use crate::error::ExamError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The only content type the pipeline accepts.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF";

/// A paginated document ready for rasterisation.
#[derive(Clone)]
pub struct SourceDocument {
    name: String,
    bytes: Arc<[u8]>,
}

impl SourceDocument {
    /// Accept a document whose caller declared its content type
    /// (drag-and-drop, multipart upload, …).
    ///
    /// Anything other than `application/pdf` (parameters such as
    /// `; charset=binary` are ignored) is rejected.
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: &str,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<Self, ExamError> {
        let name = name.into();
        let bytes: Vec<u8> = bytes.into();
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence != PDF_CONTENT_TYPE {
            return Err(ExamError::UnsupportedContentType {
                name,
                content_type: content_type.to_string(),
            });
        }
        Ok(Self {
            name,
            bytes: Arc::from(bytes),
        })
    }

    /// Accept bytes whose type is unknown, sniffing the `%PDF` header.
    pub fn sniff(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self, ExamError> {
        let name = name.into();
        let bytes: Vec<u8> = bytes.into();
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(ExamError::NotAPdf {
                name,
                magic: bytes.iter().take(4).copied().collect(),
            });
        }
        Ok(Self {
            name,
            bytes: Arc::from(bytes),
        })
    }

    /// Display name (file name or URL).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap shared handle to the bytes, for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local PDF path or download an HTTP(S) URL.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<SourceDocument, ExamError> {
    if input.trim().is_empty() {
        return Err(ExamError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(Path::new(input)).await
    }
}

/// Read a local file, validating existence, permission and PDF magic bytes.
async fn load_local(path: &Path) -> Result<SourceDocument, ExamError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExamError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ExamError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ExamError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    SourceDocument::sniff(display_name(path), bytes)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, ExamError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExamError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExamError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExamError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExamError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExamError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    SourceDocument::sniff(url, bytes.to_vec())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}
