//! Controller scenarios with in-process fakes.
//!
//! No pdfium and no network: the rasteriser and extractor are replaced by
//! fakes so every transition of the state machine can be driven
//! deterministically.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use edgequake_exam2csv::pipeline::extractor::parse_records;
use edgequake_exam2csv::{
    parse_csv, to_csv, ErrorKind, ExamConfig, ExamError, ExamRecord, GeminiExtractor, PageImage,
    PageRasterizer, Pipeline, PipelineObserver, ProcessingStatus, RecordExtractor,
    SourceDocument,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Produces `pages` tiny page images, or fails like an unparseable PDF.
struct FakeRasterizer {
    pages: usize,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeRasterizer {
    fn pages(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            pages: 0,
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PageRasterizer for FakeRasterizer {
    async fn rasterize(&self, document: &SourceDocument) -> Result<Vec<PageImage>, ExamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ExamError::DocumentParse {
                name: document.name().to_string(),
                detail: "FormatError".into(),
            });
        }
        Ok((1..=self.pages)
            .map(|n| PageImage {
                page_number: n,
                width: 2,
                height: 2,
                mime_type: "image/jpeg",
                data: vec![0xFF, 0xD8, n as u8],
            })
            .collect())
    }
}

/// Answers every request with the same response text.
struct ScriptedExtractor {
    response: Option<String>,
    seen_pages: Mutex<Vec<usize>>,
}

impl ScriptedExtractor {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Some(text.to_string()),
            seen_pages: Mutex::new(Vec::new()),
        })
    }

    fn silent() -> Arc<Self> {
        Arc::new(Self {
            response: None,
            seen_pages: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl RecordExtractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, images: &[PageImage]) -> Result<Vec<ExamRecord>, ExamError> {
        *self.seen_pages.lock().unwrap() = images.iter().map(|i| i.page_number).collect();
        parse_records(self.response.as_deref())
    }
}

/// Blocks inside `extract` until released, so a run can be observed mid-flight.
struct GatedExtractor {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl RecordExtractor for GatedExtractor {
    fn name(&self) -> &str {
        "gated"
    }

    async fn extract(&self, _images: &[PageImage]) -> Result<Vec<ExamRecord>, ExamError> {
        self.entered.notify_one();
        self.release.notified().await;
        parse_records(Some("[]"))
    }
}

#[derive(Default)]
struct RecordingObserver {
    transitions: Mutex<Vec<(ProcessingStatus, ProcessingStatus)>>,
    pages: Mutex<Option<usize>>,
    records: Mutex<Option<usize>>,
    errors: Mutex<Vec<String>>,
}

impl PipelineObserver for RecordingObserver {
    fn on_status_change(&self, from: ProcessingStatus, to: ProcessingStatus) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn on_pages_rendered(&self, page_count: usize) {
        *self.pages.lock().unwrap() = Some(page_count);
    }

    fn on_records_extracted(&self, record_count: usize) {
        *self.records.lock().unwrap() = Some(record_count);
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn pdf() -> SourceDocument {
    SourceDocument::sniff("schedule.pdf", b"%PDF-1.7\n%%EOF\n".to_vec()).unwrap()
}

const ONE_RECORD: &str = r#"[{"slNo":"1","examDate":"12-05-2024","batch":"A1","subjectCode":"CS101","subjectName":"Intro","registerNumber":"REG001","studentName":"Alice"}]"#;

fn alice() -> ExamRecord {
    ExamRecord {
        serial_number: "1".into(),
        exam_date: "12-05-2024".into(),
        batch: "A1".into(),
        subject_code: "CS101".into(),
        subject_name: "Intro".into(),
        register_number: "REG001".into(),
        student_name: "Alice".into(),
    }
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_pages_one_record_completes() {
    let extractor = ScriptedExtractor::replying(ONE_RECORD);
    let pipeline = Pipeline::new(FakeRasterizer::pages(3), extractor.clone());

    let records = pipeline.process(pdf()).await.unwrap();

    assert_eq!(records, vec![alice()]);
    assert_eq!(*extractor.seen_pages.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(pipeline.status(), ProcessingStatus::Completed);
    assert_eq!(pipeline.records(), vec![alice()]);
    assert!(pipeline.error_message().is_none());
}

#[tokio::test]
async fn empty_array_completes_with_no_records() {
    let pipeline = Pipeline::new(FakeRasterizer::pages(2), ScriptedExtractor::replying("[]"));
    let records = pipeline.process(pdf()).await.unwrap();
    assert!(records.is_empty());
    assert_eq!(pipeline.status(), ProcessingStatus::Completed);
}

#[tokio::test]
async fn zero_page_document_still_reaches_extractor() {
    let extractor = ScriptedExtractor::replying("[]");
    let pipeline = Pipeline::new(FakeRasterizer::pages(0), extractor.clone());
    pipeline.process(pdf()).await.unwrap();
    assert!(extractor.seen_pages.lock().unwrap().is_empty());
    assert_eq!(pipeline.status(), ProcessingStatus::Completed);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn prose_response_is_format_error() {
    let pipeline = Pipeline::new(
        FakeRasterizer::pages(1),
        ScriptedExtractor::replying("I could not find any table."),
    );

    let err = pipeline.process(pdf()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ResponseFormat);
    assert_eq!(pipeline.status(), ProcessingStatus::Error);
    let msg = pipeline.error_message().unwrap();
    assert!(msg.contains("not in a valid format"), "got: {msg}");
    assert!(pipeline.records().is_empty());
}

#[tokio::test]
async fn absent_response_text_is_format_error() {
    let pipeline = Pipeline::new(FakeRasterizer::pages(1), ScriptedExtractor::silent());
    let err = pipeline.process(pdf()).await.unwrap_err();
    assert!(matches!(err, ExamError::ResponseFormat { .. }));
    assert_eq!(pipeline.status(), ProcessingStatus::Error);
}

#[tokio::test]
async fn unreadable_document_never_reaches_extractor() {
    let extractor = ScriptedExtractor::replying(ONE_RECORD);
    let pipeline = Pipeline::new(FakeRasterizer::broken(), extractor.clone());

    let err = pipeline.process(pdf()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DocumentParse);
    assert_eq!(pipeline.status(), ProcessingStatus::Error);
    assert!(pipeline.error_message().unwrap().contains("schedule.pdf"));
    assert!(extractor.seen_pages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_credential_fails_the_run() {
    // The base URL points nowhere routable: a request would fail with a
    // transport error, not the configuration error asserted here.
    let config = ExamConfig::builder()
        .api_base_url("http://127.0.0.1:9/v1beta")
        .build()
        .unwrap();
    let extractor = Arc::new(GeminiExtractor::from_config(&config).unwrap());
    let pipeline = Pipeline::new(FakeRasterizer::pages(3), extractor);

    let err = pipeline.process(pdf()).await.unwrap_err();

    assert!(matches!(err, ExamError::MissingApiKey { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(pipeline.status(), ProcessingStatus::Error);
    assert!(pipeline.error_message().unwrap().contains("GEMINI_API_KEY"));
}

// ── State machine rules ──────────────────────────────────────────────────────

#[tokio::test]
async fn second_process_while_busy_is_rejected() {
    let rasterizer = FakeRasterizer::pages(1);
    let gate = Arc::new(GatedExtractor {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let pipeline = Arc::new(Pipeline::new(rasterizer.clone(), gate.clone()));

    let running = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.process(pdf()).await })
    };
    gate.entered.notified().await;
    assert_eq!(pipeline.status(), ProcessingStatus::Extracting);

    let err = pipeline.process(pdf()).await.unwrap_err();
    assert!(matches!(
        err,
        ExamError::RunInProgress {
            status: ProcessingStatus::Extracting
        }
    ));
    let err = pipeline.reset().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    // Neither rejection touched the run in flight.
    assert_eq!(pipeline.status(), ProcessingStatus::Extracting);
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);

    gate.release.notify_one();
    running.await.unwrap().unwrap();
    assert_eq!(pipeline.status(), ProcessingStatus::Completed);
}

#[tokio::test]
async fn terminal_states_require_reset() {
    let pipeline = Pipeline::new(FakeRasterizer::pages(1), ScriptedExtractor::replying(ONE_RECORD));
    pipeline.process(pdf()).await.unwrap();

    let err = pipeline.process(pdf()).await.unwrap_err();
    assert!(matches!(
        err,
        ExamError::ResetRequired {
            status: ProcessingStatus::Completed
        }
    ));
    assert_eq!(pipeline.records(), vec![alice()], "rejection keeps results");

    pipeline.reset().unwrap();
    assert_eq!(pipeline.status(), ProcessingStatus::Idle);
    assert!(pipeline.records().is_empty());

    pipeline.process(pdf()).await.unwrap();
    assert_eq!(pipeline.status(), ProcessingStatus::Completed);
}

#[tokio::test]
async fn reset_after_error_clears_message() {
    let pipeline = Pipeline::new(FakeRasterizer::broken(), ScriptedExtractor::replying("[]"));
    pipeline.process(pdf()).await.unwrap_err();
    assert!(pipeline.error_message().is_some());

    pipeline.reset().unwrap();

    let snap = pipeline.snapshot();
    assert_eq!(snap.status, ProcessingStatus::Idle);
    assert!(snap.error_message.is_none());
    assert!(snap.records.is_empty());
}

#[tokio::test]
async fn observer_sees_every_transition() {
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = Pipeline::new(FakeRasterizer::pages(3), ScriptedExtractor::replying(ONE_RECORD))
        .with_observer(observer.clone());

    pipeline.process(pdf()).await.unwrap();
    pipeline.reset().unwrap();

    use ProcessingStatus::*;
    assert_eq!(
        *observer.transitions.lock().unwrap(),
        vec![
            (Idle, Rendering),
            (Rendering, Extracting),
            (Extracting, Completed),
            (Completed, Idle),
        ]
    );
    assert_eq!(*observer.pages.lock().unwrap(), Some(3));
    assert_eq!(*observer.records.lock().unwrap(), Some(1));
    assert!(observer.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn observer_sees_failure_message() {
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = Pipeline::new(FakeRasterizer::broken(), ScriptedExtractor::replying("[]"))
        .with_observer(observer.clone());

    pipeline.process(pdf()).await.unwrap_err();

    use ProcessingStatus::*;
    assert_eq!(
        *observer.transitions.lock().unwrap(),
        vec![(Idle, Rendering), (Rendering, Error)]
    );
    let errors = observer.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(Some(errors[0].clone()), pipeline.error_message());
}

// ── Search and export over a completed run ───────────────────────────────────

const FIVE_RECORDS: &str = r#"[
  {"slNo":1,"examDate":"12-05-2024","batch":"A1","subjectCode":"CS101","subjectName":"Intro to CS","registerNumber":"REG001","studentName":"Alice"},
  {"slNo":2,"examDate":"12-05-2024","batch":"A1","subjectCode":"MA201","subjectName":"Calculus","registerNumber":"REG002","studentName":"Bob"},
  {"slNo":3,"examDate":"13-05-2024","batch":"B2","subjectCode":"cs101","subjectName":"Intro to CS","registerNumber":"REG003","studentName":"Chen"},
  {"slNo":4,"examDate":"13-05-2024","batch":"B2","subjectCode":"PH110","subjectName":"Physics","registerNumber":"REG004","studentName":"Dana"},
  {"slNo":5,"examDate":"14-05-2024","batch":"C3","subjectCode":"EE150","subjectName":"Follows CS101","registerNumber":"REG005","studentName":"Eve"}
]"#;

#[tokio::test]
async fn search_matches_any_field_case_insensitively() {
    let pipeline = Pipeline::new(FakeRasterizer::pages(2), ScriptedExtractor::replying(FIVE_RECORDS));
    let all = pipeline.process(pdf()).await.unwrap();
    assert_eq!(all.len(), 5);

    let hits = pipeline.search("CS101");
    let serials: Vec<&str> = hits.iter().map(|r| r.serial_number.as_str()).collect();
    assert_eq!(serials, vec!["1", "3", "5"]);

    assert_eq!(pipeline.search("").len(), 5);
    assert!(pipeline.search("zz-no-match").is_empty());
}

#[tokio::test]
async fn export_covers_full_set_and_reads_back() {
    let pipeline = Pipeline::new(FakeRasterizer::pages(2), ScriptedExtractor::replying(FIVE_RECORDS));
    let records = pipeline.process(pdf()).await.unwrap();

    let csv = to_csv(&pipeline.records());
    assert_eq!(csv.lines().count(), 6);
    assert!(csv.starts_with("Sl.no,Exam Date,Batch,Subject Code,Subject Name,Register Number,Student Name\n"));
    assert_eq!(parse_csv(&csv).unwrap(), records);
}
