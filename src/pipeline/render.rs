//! PDF rasterisation: render the first pages of a document to JPEG images.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves rendering and JPEG encoding onto the
//! blocking pool so the runtime's worker threads never stall.
//!
//! ## Why a page cap?
//!
//! Every page image goes into one extraction request. Capping the page count
//! (default 10) bounds the request size and cost; later pages are dropped
//! silently, apart from an `info!` line.
//!
//! ## Why scale, then cap pixels?
//!
//! Pages are rendered at a fixed factor of their native size (default 2×) so
//! small table print stays legible. `max_rendered_pixels` still caps either
//! edge so an oversized page cannot exhaust memory.

use crate::config::ExamConfig;
use crate::error::ExamError;
use crate::pipeline::encode::{encode_page, PageImage};
use crate::pipeline::input::SourceDocument;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns a document into an ordered, bounded sequence of page images.
///
/// Implementations are all-or-nothing: either every page up to the cap is
/// returned, in document order, or the first failure is.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, document: &SourceDocument) -> Result<Vec<PageImage>, ExamError>;
}

/// 0-indexed pages to render for a document of `total_pages`.
pub fn page_range(total_pages: usize, max_pages: usize) -> Range<usize> {
    0..total_pages.min(max_pages)
}

/// pdfium takes the bitmap bound as `i32`; larger caps saturate.
fn pixel_cap(max_rendered_pixels: u32) -> i32 {
    i32::try_from(max_rendered_pixels).unwrap_or(i32::MAX)
}

/// Document-level information, available without an API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    /// Pages that would be sent for extraction under the current cap.
    pub pages_processed: usize,
    pub pdf_version: String,
}

/// [`PageRasterizer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_pages: usize,
    scale: f32,
    jpeg_quality: u8,
    max_rendered_pixels: u32,
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn from_config(config: &ExamConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            scale: config.render_scale,
            jpeg_quality: config.jpeg_quality,
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            library_path: config.pdfium_library_path.clone(),
        }
    }

    /// Read page count and metadata without rendering.
    pub async fn inspect(&self, document: &SourceDocument) -> Result<DocumentMetadata, ExamError> {
        let this = self.clone();
        let name = document.name().to_string();
        let bytes = document.shared_bytes();

        tokio::task::spawn_blocking(move || this.inspect_blocking(&name, &bytes))
            .await
            .map_err(|e| ExamError::Internal(format!("Metadata task panicked: {}", e)))?
    }

    fn rasterize_blocking(&self, name: &str, bytes: &[u8]) -> Result<Vec<PageImage>, ExamError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let document = self.load(&pdfium, name, bytes)?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        let range = page_range(total_pages, self.max_pages);
        info!("PDF loaded: {} pages", total_pages);
        if range.len() < total_pages {
            info!(
                "Only the first {} of {} pages will be processed",
                range.len(),
                total_pages
            );
        }

        let max_px = pixel_cap(self.max_rendered_pixels);
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.scale)
            .set_maximum_width(max_px)
            .set_maximum_height(max_px);

        let mut images = Vec::with_capacity(range.len());
        for idx in range {
            let page_number = idx + 1;
            let page = pages
                .get(idx as u16)
                .map_err(|e| ExamError::RasterisationFailed {
                    page: page_number,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ExamError::RasterisationFailed {
                    page: page_number,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_number,
                image.width(),
                image.height()
            );

            let encoded = encode_page(&image, page_number, self.jpeg_quality).map_err(|e| {
                ExamError::ImageEncoding {
                    page: page_number,
                    detail: e.to_string(),
                }
            })?;
            images.push(encoded);
        }

        Ok(images)
    }

    fn inspect_blocking(&self, name: &str, bytes: &[u8]) -> Result<DocumentMetadata, ExamError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let document = self.load(&pdfium, name, bytes)?;

        let metadata = document.metadata();
        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().trim().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        let page_count = document.pages().len() as usize;
        Ok(DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            page_count,
            pages_processed: page_range(page_count, self.max_pages).len(),
            pdf_version: format!("{:?}", document.version()),
        })
    }

    fn load<'a>(
        &'a self,
        pdfium: &'a Pdfium,
        name: &str,
        bytes: &'a [u8],
    ) -> Result<PdfDocument<'a>, ExamError> {
        pdfium
            .load_pdf_from_byte_slice(bytes, self.password.as_deref())
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if self.password.is_some() {
                        ExamError::WrongPassword {
                            name: name.to_string(),
                        }
                    } else {
                        ExamError::PasswordRequired {
                            name: name.to_string(),
                        }
                    }
                } else {
                    ExamError::DocumentParse {
                        name: name.to_string(),
                        detail: err_str,
                    }
                }
            })
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(&self, document: &SourceDocument) -> Result<Vec<PageImage>, ExamError> {
        let this = self.clone();
        let name = document.name().to_string();
        let bytes = document.shared_bytes();

        tokio::task::spawn_blocking(move || this.rasterize_blocking(&name, &bytes))
            .await
            .map_err(|e| ExamError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Bind to libpdfium.
///
/// Tried in order: the configured path (a library file, or a directory
/// holding the platform library), the executable's directory, the working
/// directory, then the system library search path.
pub fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, ExamError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = library_path {
        if path.is_dir() {
            candidates.push(Pdfium::pdfium_platform_library_name_at_path(path));
        } else {
            candidates.push(path.to_path_buf());
        }
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(&exe_dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    for candidate in &candidates {
        if let Ok(bindings) = Pdfium::bind_to_library(candidate) {
            debug!("Bound pdfium from {}", candidate.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| {
            let tried: Vec<String> = candidates.iter().map(|c| c.display().to_string()).collect();
            ExamError::PdfiumBindingFailed(format!("{:?} (tried: {})", e, tried.join(", ")))
        })
}
