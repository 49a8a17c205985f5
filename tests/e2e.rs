//! End-to-end tests for edgequake-exam2csv.
//!
//! The rasteriser tests synthesise PDFs in memory with pdfium itself, so they
//! need libpdfium but no fixtures and no network. They print SKIP and return
//! when the library cannot be bound.
//!
//! The live extraction test calls Gemini and is gated behind `E2E_ENABLED`.
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture
//!
//! Live test:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e live -- --nocapture

use edgequake_exam2csv::pipeline::render::bind_pdfium;
use edgequake_exam2csv::{
    extract_records, inspect_with, ExamConfig, ExamError, PageRasterizer,
    PdfiumRasterizer, SourceDocument,
};
use pdfium_render::prelude::*;
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn pdfium_lib_path() -> Option<PathBuf> {
    std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from)
}

/// A blank A4 document with `pages` pages, or None when pdfium is unavailable.
fn blank_pdf(pages: usize) -> Option<Vec<u8>> {
    let pdfium = match bind_pdfium(pdfium_lib_path().as_deref()) {
        Ok(p) => p,
        Err(_) => return None,
    };
    let mut document = pdfium.create_new_pdf().unwrap();
    for _ in 0..pages {
        document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .unwrap();
    }
    Some(document.save_to_bytes().unwrap())
}

/// Skip this test if libpdfium cannot be bound.
macro_rules! pdf_or_skip {
    ($pages:expr) => {{
        match blank_pdf($pages) {
            Some(bytes) => SourceDocument::sniff("synthetic.pdf", bytes).unwrap(),
            None => {
                println!("SKIP — libpdfium not found (set PDFIUM_LIB_PATH)");
                return;
            }
        }
    }};
}

fn config(max_pages: usize) -> ExamConfig {
    let mut builder = ExamConfig::builder().max_pages(max_pages);
    if let Some(path) = pdfium_lib_path() {
        builder = builder.pdfium_library_path(path);
    }
    builder.build().unwrap()
}

// ── Rasteriser ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_pages_render_in_order() {
    let doc = pdf_or_skip!(3);
    let images = PdfiumRasterizer::from_config(&config(10))
        .rasterize(&doc)
        .await
        .unwrap();

    let numbers: Vec<usize> = images.iter().map(|i| i.page_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    for img in &images {
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(&img.data[..2], &[0xFF, 0xD8]);
        // A4 is 595×842 pt; at 2× the long edge is well past 1000 px.
        assert!(img.height > 1000, "page {} is {}px tall", img.page_number, img.height);
        assert!(img.height > img.width);
    }
}

#[tokio::test]
async fn pages_beyond_the_cap_are_dropped() {
    let doc = pdf_or_skip!(12);
    let images = PdfiumRasterizer::from_config(&config(10))
        .rasterize(&doc)
        .await
        .unwrap();

    assert_eq!(images.len(), 10);
    assert_eq!(images.first().map(|i| i.page_number), Some(1));
    assert_eq!(images.last().map(|i| i.page_number), Some(10));
}

#[tokio::test]
async fn configured_cap_is_honoured() {
    let doc = pdf_or_skip!(5);
    let images = PdfiumRasterizer::from_config(&config(2))
        .rasterize(&doc)
        .await
        .unwrap();
    assert_eq!(images.len(), 2);
}

#[tokio::test]
async fn zero_page_document_renders_nothing() {
    let doc = pdf_or_skip!(0);
    let images = PdfiumRasterizer::from_config(&config(10))
        .rasterize(&doc)
        .await
        .expect("a zero-page document is not an error");
    assert!(images.is_empty());
}

#[tokio::test]
async fn garbage_after_magic_is_a_parse_error() {
    if blank_pdf(1).is_none() {
        println!("SKIP — libpdfium not found (set PDFIUM_LIB_PATH)");
        return;
    }
    let doc = SourceDocument::sniff("broken.pdf", b"%PDF-1.7 this is not a pdf".to_vec()).unwrap();
    let err = PdfiumRasterizer::from_config(&config(10))
        .rasterize(&doc)
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::DocumentParse { .. }), "got {err:?}");
}

#[tokio::test]
async fn inspect_reports_cap_without_api_key() {
    let Some(bytes) = blank_pdf(12) else {
        println!("SKIP — libpdfium not found (set PDFIUM_LIB_PATH)");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twelve.pdf");
    std::fs::write(&path, bytes).unwrap();

    let meta = inspect_with(path.to_str().unwrap(), &config(10)).await.unwrap();
    assert_eq!(meta.page_count, 12);
    assert_eq!(meta.pages_processed, 10);
}

// ── Live extraction ──────────────────────────────────────────────────────────

#[tokio::test]
async fn live_gemini_extraction() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let Ok(key) = std::env::var("GEMINI_API_KEY") else {
        println!("SKIP — GEMINI_API_KEY not set");
        return;
    };
    let path = test_cases_dir().join("schedule.pdf");
    if !path.exists() {
        println!("SKIP — test file not found: {}", path.display());
        return;
    }

    let mut builder = ExamConfig::builder().api_key(key);
    if let Some(lib) = pdfium_lib_path() {
        builder = builder.pdfium_library_path(lib);
    }
    let records = extract_records(path.to_str().unwrap(), &builder.build().unwrap())
        .await
        .unwrap();

    println!("Extracted {} record(s)", records.len());
    assert!(!records.is_empty(), "a schedule should yield at least one record");
    assert!(
        records.iter().any(|r| !r.register_number.is_empty()),
        "no register numbers extracted"
    );
}
