//! The seam between the batch processor and whatever turns a page into
//! Easy Read sentences.
//!
//! Implementations report sub-step progress by sending [`ProcessingStep`]s
//! on the [`StepSender`] they are handed; the processor drains that channel
//! while the call is in flight.

use crate::error::PageError;
use crate::gallery::ImageRecord;
use crate::output::SentenceUnit;
use crate::progress::ProcessingStep;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One page's worth of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplifyRequest {
    /// 1-indexed page number, for logging and error attribution.
    pub page_num: usize,
    /// Trimmed markdown body of the page.
    pub page_text: String,
    /// Image sets the sentences' retrieval tags should target.
    pub image_set_ids: Vec<String>,
}

/// What a simplifier returned for a page.
///
/// `sentences: None` is the malformed case (the response had no sentence
/// list at all), which the processor treats as a page failure. An empty
/// list is a valid "nothing to add".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedPage {
    pub title: Option<String>,
    pub sentences: Option<Vec<SentenceUnit>>,
}

/// Summary of an image collection, used to populate the selection UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSetSummary {
    pub name: String,
    #[serde(default)]
    pub sample_items: Vec<ImageRecord>,
    #[serde(default)]
    pub item_count: usize,
}

/// Typed channel a simplifier uses to report which step it is on.
#[derive(Debug, Clone)]
pub struct StepSender {
    tx: mpsc::UnboundedSender<ProcessingStep>,
}

impl StepSender {
    /// Create a sender and the receiver the caller drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProcessingStep>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A sender nobody listens to, for calling a simplifier directly.
    pub fn detached() -> Self {
        Self::channel().0
    }

    /// Report a step. Silently ignored once the receiver is gone.
    pub fn send(&self, step: ProcessingStep) {
        let _ = self.tx.send(step);
    }
}

/// Turns one page of markdown into Easy Read sentences.
///
/// Implementations must not retry on their own: a failure is reported as
/// `Err(PageError)` and the processor records a placeholder for the page.
#[async_trait]
pub trait Simplifier: Send + Sync {
    /// Short name for logs, e.g. "http" or "llm".
    fn name(&self) -> &str;

    /// Simplify a single page.
    async fn simplify(
        &self,
        request: &SimplifyRequest,
        steps: &StepSender,
    ) -> Result<SimplifiedPage, PageError>;

    /// Image collections available for retrieval tags. Adapters without a
    /// notion of image sets return an empty list.
    async fn list_image_sets(&self) -> Result<Vec<ImageSetSummary>, crate::error::EasyReadError> {
        Ok(Vec::new())
    }
}
