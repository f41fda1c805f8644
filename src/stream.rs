//! Streaming batch API: receive batch events as a `Stream`.
//!
//! [`crate::batch::BatchProcessor::run`] reports progress through a listener
//! and returns only once every page is done. [`process_stream`] runs the same
//! processor on a spawned task and turns everything it reports into
//! [`BatchEvent`]s, which suits callers that already speak streams (a web
//! handler pushing server-sent events, a TUI event loop).

use crate::batch::BatchProcessor;
use crate::config::ProcessingConfig;
use crate::error::EasyReadError;
use crate::output::BatchOutput;
use crate::pipeline::simplify::Simplifier;
use crate::pipeline::split::split_pages;
use crate::progress::{BatchProgress, BatchProgressListener, ProgressCallback};
use crate::selection::ImageSetSelection;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::{error, info};

/// Everything a batch reports, in order.
#[derive(Debug, Clone, Serialize)]
pub enum BatchEvent {
    Started {
        total_pages: usize,
    },
    Progress(BatchProgress),
    PageDone {
        page_num: usize,
        total_pages: usize,
        sentence_count: usize,
        /// Set when the page fell back to a placeholder.
        error: Option<String>,
    },
    /// Terminal: the batch finished. Boxed because it carries the whole document.
    Completed(Box<BatchOutput>),
    /// Terminal: the batch failed before the first page.
    Aborted {
        reason: String,
    },
}

impl BatchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchEvent::Completed(_) | BatchEvent::Aborted { .. })
    }
}

/// A boxed stream of batch events. Ends after the terminal event.
pub type BatchEventStream = Pin<Box<dyn Stream<Item = BatchEvent> + Send>>;

/// Forwards listener calls onto the event channel, and on to the caller's
/// own listener if one was configured.
struct ChannelListener {
    tx: mpsc::UnboundedSender<BatchEvent>,
    inner: Option<ProgressCallback>,
}

impl BatchProgressListener for ChannelListener {
    fn on_batch_start(&self, total_pages: usize) {
        let _ = self.tx.send(BatchEvent::Started { total_pages });
        if let Some(ref cb) = self.inner {
            cb.on_batch_start(total_pages);
        }
    }

    fn on_progress(&self, progress: &BatchProgress) {
        let _ = self.tx.send(BatchEvent::Progress(progress.clone()));
        if let Some(ref cb) = self.inner {
            cb.on_progress(progress);
        }
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, sentence_count: usize) {
        let _ = self.tx.send(BatchEvent::PageDone {
            page_num,
            total_pages,
            sentence_count,
            error: None,
        });
        if let Some(ref cb) = self.inner {
            cb.on_page_complete(page_num, total_pages, sentence_count);
        }
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = self.tx.send(BatchEvent::PageDone {
            page_num,
            total_pages,
            sentence_count: 1,
            error: Some(error.to_string()),
        });
        if let Some(ref cb) = self.inner {
            cb.on_page_error(page_num, total_pages, error);
        }
    }

    fn on_batch_complete(&self, total_pages: usize, failed_pages: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_batch_complete(total_pages, failed_pages);
        }
    }

    fn on_batch_aborted(&self, reason: &str) {
        if let Some(ref cb) = self.inner {
            cb.on_batch_aborted(reason);
        }
    }
}

/// Start a batch on a background task and stream its events.
///
/// Blank input and input with no pages are rejected here, before anything
/// is spawned, so the returned stream always contains at least one page.
///
/// # Example
/// ```rust,no_run
/// use easyread::{process_stream, BatchEvent, HttpSimplifier, ImageSetSelection, ProcessingConfig};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Arc::new(HttpSimplifier::new("http://localhost:8000/api", None, None)?);
/// let mut events = process_stream(
///     backend,
///     "Page one\n---PAGE_BREAK---\nPage two".into(),
///     ImageSetSelection::default(),
///     ProcessingConfig::default(),
/// )?;
/// while let Some(event) = events.next().await {
///     if let BatchEvent::Progress(p) = event {
///         eprintln!("{:.2}/{}", p.pages_completed, p.total_pages);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn process_stream(
    simplifier: Arc<dyn Simplifier>,
    raw_text: String,
    selection: ImageSetSelection,
    config: ProcessingConfig,
) -> Result<BatchEventStream, EasyReadError> {
    if raw_text.trim().is_empty() {
        return Err(EasyReadError::EmptyInput);
    }
    if split_pages(&raw_text, &config.page_delimiter).is_empty() {
        return Err(EasyReadError::NoPages {
            delimiter: config.page_delimiter.clone(),
        });
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let listener = Arc::new(ChannelListener {
        tx: tx.clone(),
        inner: config.progress_callback.clone(),
    });
    let mut config = config;
    config.progress_callback = Some(listener);

    info!("Starting streaming batch");
    tokio::spawn(async move {
        let mut processor = BatchProcessor::new(simplifier, config);
        let terminal = match processor.run(&raw_text, &selection).await {
            Ok(output) => BatchEvent::Completed(Box::new(output)),
            Err(e) => {
                error!("Streaming batch failed: {}", e);
                BatchEvent::Aborted {
                    reason: e.to_string(),
                }
            }
        };
        let _ = tx.send(terminal);
        // Dropping the processor drops the listener's sender, ending the stream.
    });

    Ok(Box::pin(UnboundedReceiverStream::new(rx)))
}
