//! Batch processing: run every page of a document through a [`Simplifier`].
//!
//! ## States
//!
//! ```text
//! Idle ──run()──▶ Running ──last page──▶ Completed
//!   ▲                │
//!   │ blank input    └──setup failure──▶ Aborted
//!   └────────────────
//! ```
//!
//! Pages go out one at a time, in order. That keeps the sentence list in
//! page order and keeps progress monotonic, and the backend may rate-limit
//! anyway. A page that fails (call error, malformed response, timeout)
//! becomes a single placeholder sentence and the batch moves on; nothing is
//! retried. Only failures before the first page abort the batch.

use crate::config::ProcessingConfig;
use crate::error::{EasyReadError, PageError};
use crate::output::{BatchOutput, BatchStats, PageResult, SentenceUnit};
use crate::pipeline::input::{self, Document};
use crate::pipeline::simplify::{SimplifiedPage, Simplifier, SimplifyRequest, StepSender};
use crate::pipeline::split::split_pages;
use crate::progress::{BatchProgress, ProgressTracker};
use crate::selection::ImageSetSelection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where a [`BatchProcessor`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Result of one page's simplification call, before folding.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Ok(SimplifiedPage),
    Failed(PageError),
}

impl PageOutcome {
    /// Classify a simplifier result. A response without a sentence list is
    /// a failure even though the call itself succeeded.
    pub fn from_result(page_num: usize, result: Result<SimplifiedPage, PageError>) -> Self {
        match result {
            Ok(page) if page.sentences.is_some() => PageOutcome::Ok(page),
            Ok(_) => PageOutcome::Failed(PageError::Malformed { page: page_num }),
            Err(e) => PageOutcome::Failed(e.with_page(page_num)),
        }
    }
}

/// Output format for [`process_to_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

/// Running totals folded over page outcomes.
#[derive(Debug, Default)]
struct Accumulator {
    title: Option<String>,
    sentences: Vec<SentenceUnit>,
    pages: Vec<PageResult>,
    had_page_error: bool,
    empty_pages: usize,
}

impl Accumulator {
    /// Fold one page in. Always records exactly one [`PageResult`].
    fn fold(&mut self, page_num: usize, outcome: PageOutcome, duration_ms: u64) -> &PageResult {
        let result = match outcome {
            PageOutcome::Ok(page) => {
                let title = page
                    .title
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());
                if self.title.is_none() {
                    if let Some(ref t) = title {
                        debug!("Page {}: resolved document title {:?}", page_num, t);
                        self.title = Some(t.clone());
                    }
                }
                let sentences = page.sentences.unwrap_or_default();
                if sentences.is_empty() {
                    self.empty_pages += 1;
                }
                self.sentences.extend(sentences.iter().cloned());
                PageResult {
                    page_num,
                    sentences,
                    title,
                    duration_ms,
                    error: None,
                }
            }
            PageOutcome::Failed(err) => {
                let placeholder = SentenceUnit::placeholder();
                self.sentences.push(placeholder.clone());
                self.had_page_error = true;
                PageResult {
                    page_num,
                    sentences: vec![placeholder],
                    title: None,
                    duration_ms,
                    error: Some(err),
                }
            }
        };
        self.pages.push(result);
        &self.pages[self.pages.len() - 1]
    }
}

/// Drives a document through a [`Simplifier`] page by page.
pub struct BatchProcessor {
    simplifier: Arc<dyn Simplifier>,
    config: ProcessingConfig,
    state: BatchState,
}

impl BatchProcessor {
    pub fn new(simplifier: Arc<dyn Simplifier>, config: ProcessingConfig) -> Self {
        Self {
            simplifier,
            config,
            state: BatchState::Idle,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Process `raw_text` against the image sets in `selection`.
    ///
    /// # Errors
    /// - [`EasyReadError::EmptyInput`] if `raw_text` is blank; the processor
    ///   stays (or returns to) `Idle`.
    /// - [`EasyReadError::NoPages`] if splitting leaves nothing; the processor
    ///   moves to `Aborted` and progress is reset.
    ///
    /// Page failures never surface here; see [`BatchOutput::had_page_error`].
    pub async fn run(
        &mut self,
        raw_text: &str,
        selection: &ImageSetSelection,
    ) -> Result<BatchOutput, EasyReadError> {
        if raw_text.trim().is_empty() {
            self.state = BatchState::Idle;
            warn!("Refusing to start a batch on blank input");
            return Err(EasyReadError::EmptyInput);
        }

        let start = Instant::now();
        self.state = BatchState::Running;

        let pages = split_pages(raw_text, &self.config.page_delimiter);
        if pages.is_empty() {
            return Err(self.abort(EasyReadError::NoPages {
                delimiter: self.config.page_delimiter.clone(),
            }));
        }

        let total_pages = pages.len();
        let image_set_ids = selection.ids();
        info!(
            "Processing {} pages with '{}' against {} image sets",
            total_pages,
            self.simplifier.name(),
            image_set_ids.len()
        );

        let mut tracker = ProgressTracker::new(total_pages);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total_pages);
        }
        self.emit(&tracker.snapshot());

        let mut acc = Accumulator::default();
        for (idx, page_text) in pages.into_iter().enumerate() {
            let page_num = idx + 1;
            self.emit(&tracker.page_started(idx));

            let request = SimplifyRequest {
                page_num,
                page_text,
                image_set_ids: image_set_ids.clone(),
            };
            let page_start = Instant::now();
            let outcome = self.simplify_page(&request, idx, &mut tracker).await;
            let duration_ms = page_start.elapsed().as_millis() as u64;

            let result = acc.fold(page_num, outcome, duration_ms);
            match &result.error {
                None => {
                    debug!(
                        "Page {}/{}: {} sentences in {}ms",
                        page_num,
                        total_pages,
                        result.sentences.len(),
                        duration_ms
                    );
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_page_complete(page_num, total_pages, result.sentences.len());
                    }
                }
                Some(e) => {
                    warn!("{}", e);
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_page_error(page_num, total_pages, &e.to_string());
                    }
                }
            }

            self.emit(&tracker.page_finished(idx));
        }

        self.state = BatchState::Completed;

        let failed_pages = acc.pages.iter().filter(|p| p.failed()).count();
        let stats = BatchStats {
            total_pages,
            processed_pages: total_pages - failed_pages,
            failed_pages,
            empty_pages: acc.empty_pages,
            total_sentences: acc.sentences.len(),
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        if acc.had_page_error {
            warn!(
                "Batch finished with errors: {}/{} pages replaced by placeholders",
                failed_pages, total_pages
            );
        }
        info!(
            "Batch complete: {} sentences from {} pages in {}ms",
            stats.total_sentences, total_pages, stats.total_duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total_pages, failed_pages);
        }

        Ok(BatchOutput {
            original_markdown: raw_text.to_string(),
            title: acc.title.unwrap_or_default(),
            sentences: acc.sentences,
            selected_sets: image_set_ids,
            prevent_duplicate_images: self.config.prevent_duplicate_images,
            had_page_error: acc.had_page_error,
            pages: acc.pages,
            stats,
        })
    }

    /// Call the simplifier for one page, turning its step reports into
    /// progress events while the call is in flight.
    async fn simplify_page(
        &self,
        request: &SimplifyRequest,
        page_index: usize,
        tracker: &mut ProgressTracker,
    ) -> PageOutcome {
        let (steps, mut rx) = StepSender::channel();
        let call = self.call_simplifier(request, &steps);
        tokio::pin!(call);

        // Steps are polled first so a step sent just before the call returns
        // is reported before the page is marked finished.
        let result = loop {
            tokio::select! {
                biased;
                Some(step) = rx.recv() => self.emit(&tracker.step(page_index, step)),
                res = &mut call => break res,
            }
        };
        while let Ok(step) = rx.try_recv() {
            self.emit(&tracker.step(page_index, step));
        }

        PageOutcome::from_result(request.page_num, result)
    }

    async fn call_simplifier(
        &self,
        request: &SimplifyRequest,
        steps: &StepSender,
    ) -> Result<SimplifiedPage, PageError> {
        let call = self.simplifier.simplify(request, steps);
        match self.config.page_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), call)
                .await
                .unwrap_or_else(|_| {
                    Err(PageError::Timeout {
                        page: request.page_num,
                        secs,
                    })
                }),
            None => call.await,
        }
    }

    fn emit(&self, progress: &BatchProgress) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_progress(progress);
        }
    }

    fn abort(&mut self, err: EasyReadError) -> EasyReadError {
        self.state = BatchState::Aborted;
        error!("Batch aborted before the first page: {}", err);
        self.emit(&ProgressTracker::default().reset());
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_aborted(&err.to_string());
        }
        err
    }
}

/// Process markdown text in one call.
///
/// # Example
/// ```rust,no_run
/// use easyread::{process_markdown, HttpSimplifier, ImageSetSelection, ProcessingConfig};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Arc::new(HttpSimplifier::new("http://localhost:8000/api", None, None)?);
/// let selection = ImageSetSelection::with_selected(["health"]);
/// let output = process_markdown(
///     backend,
///     "Your appointment is on Monday.",
///     &selection,
///     &ProcessingConfig::default(),
/// )
/// .await?;
/// for s in &output.sentences {
///     println!("{} [{}]", s.text, s.image_retrieval);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn process_markdown(
    simplifier: Arc<dyn Simplifier>,
    raw_text: &str,
    selection: &ImageSetSelection,
    config: &ProcessingConfig,
) -> Result<BatchOutput, EasyReadError> {
    BatchProcessor::new(simplifier, config.clone())
        .run(raw_text, selection)
        .await
}

/// Process a [`Document`]. When no page returns a title, the document's
/// working title (its file name) is used instead.
pub async fn process_document(
    simplifier: Arc<dyn Simplifier>,
    document: &Document,
    selection: &ImageSetSelection,
    config: &ProcessingConfig,
) -> Result<BatchOutput, EasyReadError> {
    let mut output = process_markdown(simplifier, &document.raw_text, selection, config).await?;
    if output.title.is_empty() {
        output.title = document.title.clone();
    }
    Ok(output)
}

/// Resolve a file path, URL or `-` and process it.
pub async fn process_input(
    simplifier: Arc<dyn Simplifier>,
    input_str: impl AsRef<str>,
    selection: &ImageSetSelection,
    config: &ProcessingConfig,
) -> Result<BatchOutput, EasyReadError> {
    let input_str = input_str.as_ref();
    info!("Loading document: {}", input_str);
    let document = input::resolve_input(input_str, config).await?;
    process_document(simplifier, &document, selection, config).await
}

/// Process an input and write the result to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn process_to_file(
    simplifier: Arc<dyn Simplifier>,
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
    selection: &ImageSetSelection,
    config: &ProcessingConfig,
) -> Result<BatchOutput, EasyReadError> {
    let output = process_input(simplifier, input_str, selection, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| EasyReadError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let body = match format {
        OutputFormat::Markdown => output.to_markdown(),
        OutputFormat::Json => serde_json::to_string_pretty(&output)
            .map_err(|e| EasyReadError::Internal(format!("serialise output: {e}")))?,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, body).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(output)
}

/// Synchronous wrapper around [`process_markdown`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    simplifier: Arc<dyn Simplifier>,
    raw_text: &str,
    selection: &ImageSetSelection,
    config: &ProcessingConfig,
) -> Result<BatchOutput, EasyReadError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| EasyReadError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_markdown(simplifier, raw_text, selection, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_page(title: Option<&str>, sentences: &[&str]) -> PageOutcome {
        PageOutcome::Ok(SimplifiedPage {
            title: title.map(str::to_string),
            sentences: Some(sentences.iter().map(|s| SentenceUnit::new(*s, "tag")).collect()),
        })
    }

    #[test]
    fn outcome_classification() {
        let malformed = PageOutcome::from_result(2, Ok(SimplifiedPage::default()));
        assert_eq!(malformed, PageOutcome::Failed(PageError::Malformed { page: 2 }));

        let remote = PageOutcome::from_result(
            3,
            Err(PageError::Remote {
                page: 0,
                detail: "boom".into(),
            }),
        );
        assert!(matches!(remote, PageOutcome::Failed(PageError::Remote { page: 3, .. })));

        let empty = PageOutcome::from_result(
            1,
            Ok(SimplifiedPage {
                title: None,
                sentences: Some(vec![]),
            }),
        );
        assert!(matches!(empty, PageOutcome::Ok(_)));
    }

    #[test]
    fn fold_keeps_first_title_and_order() {
        let mut acc = Accumulator::default();
        acc.fold(1, ok_page(Some("  "), &["a", "b"]), 1);
        acc.fold(2, ok_page(Some("First"), &["c"]), 1);
        acc.fold(3, ok_page(Some("Second"), &["d"]), 1);

        assert_eq!(acc.title.as_deref(), Some("First"));
        let texts: Vec<_> = acc.sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
        assert!(!acc.had_page_error);
    }

    #[test]
    fn fold_failure_adds_one_placeholder() {
        let mut acc = Accumulator::default();
        let r = acc.fold(1, PageOutcome::Failed(PageError::Malformed { page: 1 }), 5);
        assert!(r.failed());
        assert_eq!(r.sentences, vec![SentenceUnit::placeholder()]);
        assert_eq!(acc.sentences.len(), 1);
        assert!(acc.had_page_error);
    }

    #[test]
    fn fold_empty_page_is_not_an_error() {
        let mut acc = Accumulator::default();
        acc.fold(1, ok_page(None, &[]), 1);
        assert!(acc.sentences.is_empty());
        assert_eq!(acc.empty_pages, 1);
        assert!(!acc.had_page_error);
    }
}
