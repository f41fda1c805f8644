//! Result types produced by a batch run.
//!
//! [`BatchOutput`] is the terminal value handed back to callers: the
//! assembled sentence list, the resolved title, and enough per-page detail
//! ([`PageResult`]) to show which pages fell back to a placeholder.

use crate::error::{EasyReadError, PageError};
use serde::{Deserialize, Serialize};

/// Retrieval tag used for placeholder sentences standing in for a failed page.
pub const ERROR_TAG: &str = "error";

/// Text of the placeholder sentence inserted for a failed page.
pub const PLACEHOLDER_TEXT: &str = "Error processing content on this page.";

/// One simplified sentence and the label used to retrieve its image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceUnit {
    pub text: String,
    pub image_retrieval: String,
}

impl SentenceUnit {
    pub fn new(text: impl Into<String>, image_retrieval: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_retrieval: image_retrieval.into(),
        }
    }

    /// The inline placeholder for a page that could not be simplified.
    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_TEXT, ERROR_TAG)
    }

    /// True only for the exact placeholder; a real sentence that happens to
    /// carry the `"error"` tag is not one.
    pub fn is_placeholder(&self) -> bool {
        self.image_retrieval == ERROR_TAG && self.text == PLACEHOLDER_TEXT
    }
}

/// Outcome of a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Sentences contributed by this page (a single placeholder if it failed).
    pub sentences: Vec<SentenceUnit>,
    /// Title returned for this page, if any.
    pub title: Option<String>,
    /// Wall-clock time spent on the simplification call.
    pub duration_ms: u64,
    /// Set when the page fell back to a placeholder.
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate counters for a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Pages that succeeded but contributed no sentences.
    pub empty_pages: usize,
    pub total_sentences: usize,
    pub total_duration_ms: u64,
}

/// Terminal result of a completed batch.
///
/// A batch completes even when pages fail; `had_page_error` is the
/// non-blocking warning callers should surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// The markdown the batch was started from, unchanged.
    pub original_markdown: String,
    /// First non-empty title returned by any page; empty if none was.
    pub title: String,
    /// All sentences, in page order then response order.
    pub sentences: Vec<SentenceUnit>,
    /// Image sets the batch was run against.
    pub selected_sets: Vec<String>,
    /// Passed through for the downstream image-matching step.
    pub prevent_duplicate_images: bool,
    pub had_page_error: bool,
    pub pages: Vec<PageResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Treat any placeholder page as an error.
    pub fn into_result(self) -> Result<Self, EasyReadError> {
        if self.stats.failed_pages > 0 {
            return Err(EasyReadError::PartialFailure {
                failed: self.stats.failed_pages,
                total: self.stats.total_pages,
            });
        }
        Ok(self)
    }

    /// Render the document as Markdown: the title as a heading, then one
    /// bullet per sentence with its retrieval tag in an HTML comment.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        if !self.title.is_empty() {
            out.push_str(&format!("# {}\n\n", self.title));
        }
        for s in &self.sentences {
            out.push_str(&format!("- {} <!-- image: {} -->\n", s.text, s.image_retrieval));
        }
        if out.is_empty() {
            out.push('\n');
        }
        out
    }
}
