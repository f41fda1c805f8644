//! Integration tests for the batch processor, driven by in-process fake
//! simplifiers. No network, no LLM, always run.

use async_trait::async_trait;
use easyread::output::{ERROR_TAG, PLACEHOLDER_TEXT};
use easyread::{
    process_document, process_markdown, process_stream, process_sync, process_to_file, BatchEvent,
    BatchProcessor, BatchProgress, BatchProgressListener, BatchState, Document, EasyReadError,
    ImageSetSelection, OutputFormat, PageError, ProcessingConfig, ProcessingStep, SentenceUnit,
    SimplifiedPage, Simplifier, SimplifyRequest, StepSender,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// What the fake should do for a given page.
#[derive(Clone)]
enum Script {
    Ok {
        title: Option<&'static str>,
        sentences: Vec<&'static str>,
    },
    Fail,
    Malformed,
    Hang,
}

fn ok(title: Option<&'static str>, sentences: &[&'static str]) -> Script {
    Script::Ok {
        title,
        sentences: sentences.to_vec(),
    }
}

/// Replays a script keyed by page number and records every request it sees.
/// Unscripted pages echo their text as a single sentence.
struct FakeSimplifier {
    script: HashMap<usize, Script>,
    seen: Mutex<Vec<SimplifyRequest>>,
}

impl FakeSimplifier {
    fn new(script: impl IntoIterator<Item = (usize, Script)>) -> Arc<Self> {
        Arc::new(Self {
            script: script.into_iter().collect(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn echo() -> Arc<Self> {
        Self::new([])
    }

    fn seen(&self) -> Vec<SimplifyRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Simplifier for FakeSimplifier {
    fn name(&self) -> &str {
        "fake"
    }

    async fn simplify(
        &self,
        request: &SimplifyRequest,
        steps: &StepSender,
    ) -> Result<SimplifiedPage, PageError> {
        self.seen.lock().unwrap().push(request.clone());
        steps.send(ProcessingStep::Converting);
        tokio::task::yield_now().await;
        steps.send(ProcessingStep::Validating);
        tokio::task::yield_now().await;
        steps.send(ProcessingStep::Revising);
        let script = self.script.get(&request.page_num).cloned();
        match script {
            None => Ok(SimplifiedPage {
                title: None,
                sentences: Some(vec![SentenceUnit::new(request.page_text.clone(), "echo")]),
            }),
            Some(Script::Ok { title, sentences }) => Ok(SimplifiedPage {
                title: title.map(str::to_string),
                sentences: Some(
                    sentences
                        .into_iter()
                        .map(|s| SentenceUnit::new(s, "tag"))
                        .collect(),
                ),
            }),
            Some(Script::Fail) => Err(PageError::Remote {
                page: 0,
                detail: "HTTP 500".into(),
            }),
            Some(Script::Malformed) => Ok(SimplifiedPage {
                title: Some("ignored".into()),
                sentences: None,
            }),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(SimplifiedPage::default())
            }
        }
    }
}

#[derive(Default)]
struct RecordingListener {
    progress: Mutex<Vec<BatchProgress>>,
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn progress(&self) -> Vec<BatchProgress> {
        self.progress.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl BatchProgressListener for RecordingListener {
    fn on_batch_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }

    fn on_progress(&self, progress: &BatchProgress) {
        self.progress.lock().unwrap().push(progress.clone());
    }

    fn on_page_complete(&self, page_num: usize, _total: usize, sentence_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("ok {page_num} {sentence_count}"));
    }

    fn on_page_error(&self, page_num: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("err {page_num}"));
    }

    fn on_batch_complete(&self, total_pages: usize, failed_pages: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {total_pages} {failed_pages}"));
    }

    fn on_batch_aborted(&self, _reason: &str) {
        self.events.lock().unwrap().push("aborted".into());
    }
}

fn config_with(listener: &Arc<RecordingListener>) -> ProcessingConfig {
    ProcessingConfig::builder()
        .progress_callback(Arc::clone(listener) as Arc<dyn BatchProgressListener>)
        .build()
        .unwrap()
}

const THREE_PAGES: &str = "Page one.\n\n---PAGE_BREAK---\n\nPage two.\n\n---PAGE_BREAK---\n\nPage three.";

/// Route library logs through the test harness. `RUST_LOG=easyread=debug`
/// shows the per-page warnings for a failing test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Page failure isolation ───────────────────────────────────────────────────

#[tokio::test]
async fn failing_middle_page_becomes_one_placeholder() {
    init_tracing();
    let fake = FakeSimplifier::new([
        (1, ok(None, &["A1", "A2"])),
        (2, Script::Fail),
        (3, ok(None, &["C1"])),
    ]);
    let out = process_markdown(
        fake,
        THREE_PAGES,
        &ImageSetSelection::default(),
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();

    let texts: Vec<&str> = out.sentences.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["A1", "A2", PLACEHOLDER_TEXT, "C1"]);
    assert_eq!(out.sentences[2].image_retrieval, ERROR_TAG);
    assert_eq!(
        out.sentences.iter().filter(|s| s.is_placeholder()).count(),
        1
    );
    assert!(out.had_page_error);
    assert_eq!(out.stats.failed_pages, 1);
    assert_eq!(out.stats.processed_pages, 2);
    assert_eq!(
        out.pages[1].error,
        Some(PageError::Remote {
            page: 2,
            detail: "HTTP 500".into()
        })
    );
}

#[tokio::test]
async fn malformed_response_is_a_page_failure() {
    let fake = FakeSimplifier::new([(1, Script::Malformed)]);
    let out = process_markdown(
        fake,
        "Only page.",
        &ImageSetSelection::default(),
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(out.sentences, vec![SentenceUnit::placeholder()]);
    assert!(out.had_page_error);
    // A malformed page never contributes a title.
    assert_eq!(out.title, "");
    assert_eq!(out.pages[0].error, Some(PageError::Malformed { page: 1 }));
}

#[tokio::test]
async fn empty_sentence_list_adds_nothing() {
    let fake = FakeSimplifier::new([(1, ok(Some("Title"), &[])), (2, ok(None, &["B"]))]);
    let out = process_markdown(
        fake,
        "one\n---PAGE_BREAK---\ntwo",
        &ImageSetSelection::default(),
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(out.sentences.len(), 1);
    assert!(!out.had_page_error);
    assert_eq!(out.stats.empty_pages, 1);
    assert_eq!(out.title, "Title");
    assert!(out.into_result().is_ok());
}

#[tokio::test]
async fn page_timeout_becomes_placeholder() {
    let fake = FakeSimplifier::new([(1, ok(None, &["fast"])), (2, Script::Hang)]);
    let config = ProcessingConfig::builder()
        .page_timeout_secs(1)
        .build()
        .unwrap();
    let out = process_markdown(
        fake,
        "one\n---PAGE_BREAK---\ntwo",
        &ImageSetSelection::default(),
        &config,
    )
    .await
    .unwrap();

    assert_eq!(out.sentences.len(), 2);
    assert!(out.sentences[1].is_placeholder());
    assert_eq!(
        out.pages[1].error,
        Some(PageError::Timeout { page: 2, secs: 1 })
    );
    assert!(matches!(
        out.into_result(),
        Err(EasyReadError::PartialFailure { failed: 1, total: 2 })
    ));
}

// ── Title resolution ─────────────────────────────────────────────────────────

#[tokio::test]
async fn first_non_empty_title_wins() {
    let fake = FakeSimplifier::new([
        (1, ok(Some("   "), &["a"])),
        (2, ok(Some("Seeing your doctor"), &["b"])),
        (3, ok(Some("Later title"), &["c"])),
    ]);
    let out = process_markdown(
        fake,
        THREE_PAGES,
        &ImageSetSelection::default(),
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(out.title, "Seeing your doctor");
}

#[tokio::test]
async fn document_title_used_when_no_page_has_one() {
    let doc = Document::from_text("bus timetable", "Buses run every hour.");
    let out = process_document(
        FakeSimplifier::echo(),
        &doc,
        &ImageSetSelection::default(),
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(out.title, "bus timetable");
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotonic_and_bounded() {
    let listener = Arc::new(RecordingListener::default());
    let fake = FakeSimplifier::new([(2, Script::Fail)]);
    process_markdown(
        fake,
        THREE_PAGES,
        &ImageSetSelection::default(),
        &config_with(&listener),
    )
    .await
    .unwrap();

    let progress = listener.progress();
    assert!(!progress.is_empty());
    let mut last = 0.0;
    for p in &progress {
        assert_eq!(p.total_pages, 3);
        assert!(p.pages_completed >= last, "went backwards: {progress:?}");
        assert!(p.pages_completed <= 3.0);
        last = p.pages_completed;
    }
    assert_eq!(last, 3.0);

    // Step offsets show up as fractional progress on each page.
    let values: Vec<f64> = progress.iter().map(|p| p.pages_completed).collect();
    for v in [0.25, 0.5, 0.75, 1.25, 2.75] {
        assert!(values.contains(&v), "missing {v} in {values:?}");
    }
    assert!(progress
        .iter()
        .any(|p| p.step_label == "Page 2/3: Validating"));
}

#[tokio::test]
async fn listener_sees_pages_in_order() {
    let listener = Arc::new(RecordingListener::default());
    let fake = FakeSimplifier::new([(1, ok(None, &["a", "b"])), (2, Script::Fail)]);
    process_markdown(
        fake,
        THREE_PAGES,
        &ImageSetSelection::default(),
        &config_with(&listener),
    )
    .await
    .unwrap();

    assert_eq!(
        listener.events(),
        vec!["start 3", "ok 1 2", "err 2", "ok 3 1", "done 3 1"]
    );
}

// ── State machine ────────────────────────────────────────────────────────────

#[tokio::test]
async fn blank_input_is_rejected_and_stays_idle() {
    let fake = FakeSimplifier::echo();
    let mut processor = BatchProcessor::new(fake.clone(), ProcessingConfig::default());
    let err = processor
        .run("  \n\t ", &ImageSetSelection::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EasyReadError::EmptyInput));
    assert_eq!(processor.state(), BatchState::Idle);
    assert!(fake.seen().is_empty());
}

#[tokio::test]
async fn delimiters_only_aborts_and_resets_progress() {
    let listener = Arc::new(RecordingListener::default());
    let fake = FakeSimplifier::echo();
    let mut processor = BatchProcessor::new(fake.clone(), config_with(&listener));
    let err = processor
        .run(
            "---PAGE_BREAK---\n\n---PAGE_BREAK---",
            &ImageSetSelection::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EasyReadError::NoPages { .. }));
    assert_eq!(processor.state(), BatchState::Aborted);
    assert!(fake.seen().is_empty());

    let progress = listener.progress();
    let reset = progress.last().unwrap();
    assert_eq!(reset.pages_completed, 0.0);
    assert_eq!(reset.total_pages, 0);
    assert_eq!(listener.events(), vec!["aborted"]);
}

#[tokio::test]
async fn processor_completes_and_can_run_again() {
    let mut processor =
        BatchProcessor::new(FakeSimplifier::echo(), ProcessingConfig::default());
    let first = processor
        .run("one", &ImageSetSelection::default())
        .await
        .unwrap();
    assert_eq!(processor.state(), BatchState::Completed);
    assert_eq!(first.sentences[0].text, "one");

    let second = processor
        .run("two\n---PAGE_BREAK---\nthree", &ImageSetSelection::default())
        .await
        .unwrap();
    assert_eq!(second.stats.total_pages, 2);
    assert_eq!(processor.state(), BatchState::Completed);
}

// ── Requests ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn requests_carry_trimmed_pages_and_selection() {
    let fake = FakeSimplifier::echo();
    let mut selection = ImageSetSelection::from_available(["food", "health", "transport"]);
    selection.remove("food");
    let config = ProcessingConfig::builder()
        .prevent_duplicate_images(true)
        .build()
        .unwrap();

    let out = process_markdown(fake.clone(), THREE_PAGES, &selection, &config)
        .await
        .unwrap();

    let seen = fake.seen();
    let pages: Vec<(usize, &str)> = seen
        .iter()
        .map(|r| (r.page_num, r.page_text.as_str()))
        .collect();
    assert_eq!(
        pages,
        vec![(1, "Page one."), (2, "Page two."), (3, "Page three.")]
    );
    for r in &seen {
        assert_eq!(r.image_set_ids, vec!["health", "transport"]);
    }
    assert_eq!(out.selected_sets, vec!["health", "transport"]);
    assert!(out.prevent_duplicate_images);
    assert_eq!(out.original_markdown, THREE_PAGES);
}

#[tokio::test]
async fn custom_delimiter_is_honoured() {
    let fake = FakeSimplifier::echo();
    let config = ProcessingConfig::builder()
        .page_delimiter("<<>>")
        .build()
        .unwrap();
    let out = process_markdown(fake, "a <<>> b", &ImageSetSelection::default(), &config)
        .await
        .unwrap();
    assert_eq!(out.stats.total_pages, 2);
}

// ── Streaming ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_reports_pages_then_completes() {
    let fake = FakeSimplifier::new([(2, Script::Fail)]);
    let events: Vec<BatchEvent> = process_stream(
        fake,
        THREE_PAGES.to_string(),
        ImageSetSelection::default(),
        ProcessingConfig::default(),
    )
    .unwrap()
    .collect()
    .await;

    assert!(matches!(events.first(), Some(BatchEvent::Started { total_pages: 3 })));
    let done: Vec<(usize, bool)> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::PageDone {
                page_num, error, ..
            } => Some((*page_num, error.is_some())),
            _ => None,
        })
        .collect();
    assert_eq!(done, vec![(1, false), (2, true), (3, false)]);

    let last = events.last().unwrap();
    assert!(last.is_terminal());
    match last {
        BatchEvent::Completed(out) => {
            assert!(out.had_page_error);
            assert_eq!(out.sentences.len(), 3);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[test]
fn stream_forwards_to_configured_listener() {
    let listener = Arc::new(RecordingListener::default());
    let events: Vec<BatchEvent> = tokio_test::block_on(async {
        process_stream(
            FakeSimplifier::echo(),
            "only".to_string(),
            ImageSetSelection::default(),
            config_with(&listener),
        )
        .unwrap()
        .collect()
        .await
    });
    assert!(events.last().is_some_and(BatchEvent::is_terminal));
    assert_eq!(listener.events(), vec!["start 1", "ok 1 1", "done 1 0"]);
}

#[test]
fn stream_rejects_blank_input_up_front() {
    let res = process_stream(
        FakeSimplifier::echo(),
        "   ".to_string(),
        ImageSetSelection::default(),
        ProcessingConfig::default(),
    );
    assert!(matches!(res, Err(EasyReadError::EmptyInput)));
}

// ── Blocking entry point ─────────────────────────────────────────────────────

#[test]
fn process_sync_runs_without_a_runtime() {
    init_tracing();
    let fake = FakeSimplifier::new([(2, Script::Fail)]);
    let out = process_sync(
        fake.clone(),
        THREE_PAGES,
        &ImageSetSelection::with_selected(["food"]),
        &ProcessingConfig::default(),
    )
    .unwrap();

    let texts: Vec<&str> = out.sentences.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Page one.", PLACEHOLDER_TEXT, "Page three."]);
    assert!(out.had_page_error);
    assert_eq!(out.stats.failed_pages, 1);
    assert_eq!(fake.seen().len(), 3);
}

#[test]
fn process_sync_rejects_blank_input() {
    let err = process_sync(
        FakeSimplifier::echo(),
        "\n\n",
        &ImageSetSelection::default(),
        &ProcessingConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, EasyReadError::EmptyInput));
}

// ── File output ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn process_to_file_writes_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bus_times.md");
    std::fs::write(&input, "Buses run hourly.\n---PAGE_BREAK---\nNo buses on Sunday.").unwrap();
    let output = dir.path().join("out/bus.md");

    let out = process_to_file(
        FakeSimplifier::echo(),
        input.to_str().unwrap(),
        &output,
        OutputFormat::Markdown,
        &ImageSetSelection::default(),
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, out.to_markdown());
    assert!(written.starts_with("# bus times\n\n"));
    assert!(written.contains("- No buses on Sunday. <!-- image: echo -->"));
    assert!(!output.with_extension("tmp").exists());
}

#[tokio::test]
async fn process_to_file_writes_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("letter.txt");
    std::fs::write(&input, "Dear patient.").unwrap();
    let output = dir.path().join("letter.json");

    process_to_file(
        FakeSimplifier::echo(),
        input.to_str().unwrap(),
        &output,
        OutputFormat::Json,
        &ImageSetSelection::with_selected(["health"]),
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();

    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(v["selected_sets"][0], "health");
    assert_eq!(v["sentences"][0]["text"], "Dear patient.");
    assert_eq!(v["had_page_error"], false);
}

#[tokio::test]
async fn missing_input_file_is_fatal() {
    let err = process_to_file(
        FakeSimplifier::echo(),
        "/definitely/not/here.md",
        "/tmp/never-written.md",
        OutputFormat::Markdown,
        &ImageSetSelection::default(),
        &ProcessingConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EasyReadError::FileNotFound { .. }));
}

// ── Listener plumbing ────────────────────────────────────────────────────────

#[tokio::test]
async fn listener_can_move_into_spawned_task() {
    let listener = Arc::new(RecordingListener::default());
    let cb: Arc<dyn BatchProgressListener> = listener.clone();
    tokio::spawn(async move {
        cb.on_page_error(2, 5, "timeout");
    })
    .await
    .expect("spawn must succeed");
    assert_eq!(listener.events(), vec!["err 2"]);
}
