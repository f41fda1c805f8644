//! Progress reporting for batch runs.
//!
//! Inject an [`Arc<dyn BatchProgressListener>`] via
//! [`crate::config::ProcessingConfigBuilder::progress_callback`] to receive
//! events as the batch moves through its pages.
//!
//! Progress is fractional: a page in flight contributes the offset of the
//! last [`ProcessingStep`] its simplifier reported (0.25 / 0.50 / 0.75), and
//! a finished page contributes exactly 1. [`ProgressTracker`] owns that
//! arithmetic and guarantees the reported value never goes backwards and
//! never exceeds the page count.
//!
//! # Example
//!
//! ```rust
//! use easyread::{BatchProgress, BatchProgressListener, ProcessingConfig};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl BatchProgressListener for Printer {
//!     fn on_progress(&self, p: &BatchProgress) {
//!         eprintln!("{:.2}/{} {}", p.pages_completed, p.total_pages, p.step_label);
//!     }
//! }
//!
//! let config = ProcessingConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Sub-steps a simplifier goes through for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStep {
    Converting,
    Validating,
    Revising,
}

impl ProcessingStep {
    /// Fraction of a page considered done once this step has started.
    pub fn offset(self) -> f64 {
        match self {
            ProcessingStep::Converting => 0.25,
            ProcessingStep::Validating => 0.50,
            ProcessingStep::Revising => 0.75,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessingStep::Converting => "Converting",
            ProcessingStep::Validating => "Validating",
            ProcessingStep::Revising => "Revising",
        }
    }
}

impl fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A progress snapshot suitable for driving a progress indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Pages done, including the fractional share of the page in flight.
    pub pages_completed: f64,
    pub total_pages: usize,
    /// Human-readable label for the current step, e.g. "Page 2/5: Validating".
    pub step_label: String,
}

/// Called by the batch processor as it moves through the pages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed one at a time, so events
/// arrive in page order.
pub trait BatchProgressListener: Send + Sync {
    /// Called once the document has been split, before the first page.
    fn on_batch_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called whenever `pages_completed` or the step label changes.
    fn on_progress(&self, progress: &BatchProgress) {
        let _ = progress;
    }

    /// Called when a page produced a well-formed result.
    ///
    /// `sentence_count` may be zero: the page had nothing to add.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, sentence_count: usize) {
        let _ = (page_num, total_pages, sentence_count);
    }

    /// Called when a page fell back to a placeholder.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been attempted.
    fn on_batch_complete(&self, total_pages: usize, failed_pages: usize) {
        let _ = (total_pages, failed_pages);
    }

    /// Called when setup failed before the first page; progress was reset.
    fn on_batch_aborted(&self, reason: &str) {
        let _ = reason;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressListener;

impl BatchProgressListener for NoopProgressListener {}

/// Convenience alias matching the type stored in [`crate::config::ProcessingConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressListener>;

/// Monotonic fractional progress for one batch.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    total_pages: usize,
    pages_completed: f64,
    step_label: String,
}

impl ProgressTracker {
    pub fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            pages_completed: 0.0,
            step_label: format!("Starting {total_pages} pages"),
        }
    }

    /// Page `page_index` (0-based) reported `step`.
    pub fn step(&mut self, page_index: usize, step: ProcessingStep) -> BatchProgress {
        self.step_label = format!(
            "Page {}/{}: {}",
            page_index + 1,
            self.total_pages,
            step.label()
        );
        self.advance_to(page_index as f64 + step.offset());
        self.snapshot()
    }

    /// Page `page_index` (0-based) is about to be submitted.
    pub fn page_started(&mut self, page_index: usize) -> BatchProgress {
        self.step_label = format!("Processing page {}/{}", page_index + 1, self.total_pages);
        self.advance_to(page_index as f64);
        self.snapshot()
    }

    /// Page `page_index` (0-based) finished, successfully or not.
    pub fn page_finished(&mut self, page_index: usize) -> BatchProgress {
        self.step_label = format!("Finished page {}/{}", page_index + 1, self.total_pages);
        self.advance_to((page_index + 1) as f64);
        self.snapshot()
    }

    /// Zero all counters, used when a batch aborts.
    pub fn reset(&mut self) -> BatchProgress {
        self.total_pages = 0;
        self.pages_completed = 0.0;
        self.step_label.clear();
        self.snapshot()
    }

    pub fn snapshot(&self) -> BatchProgress {
        BatchProgress {
            pages_completed: self.pages_completed,
            total_pages: self.total_pages,
            step_label: self.step_label.clone(),
        }
    }

    fn advance_to(&mut self, value: f64) {
        let clamped = value.min(self.total_pages as f64);
        if clamped > self.pages_completed {
            self.pages_completed = clamped;
        }
    }
}
