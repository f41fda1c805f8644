//! # easyread
//!
//! Turn documents into Easy Read: short, plain sentences, each paired with
//! a tag used to find an illustrative image.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / markdown / URL / stdin
//!  │
//!  ├─ 1. Input     resolve the source; PDFs go through pdfium text extraction
//!  ├─ 2. Split     pages on ---PAGE_BREAK---
//!  ├─ 3. Simplify  one page at a time via a Simplifier (REST backend or LLM)
//!  ├─ 4. Fold      sentences in page order; failed pages become placeholders
//!  └─ 5. Output    title + sentences + per-page results and stats
//! ```
//!
//! A failing page never aborts a batch: it contributes a single
//! `"Error processing content on this page."` sentence tagged `"error"`
//! and sets [`BatchOutput::had_page_error`]. Only blank input or a document
//! with no pages is fatal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use easyread::{process_input, HttpSimplifier, ImageSetSelection, ProcessingConfig, Simplifier};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(HttpSimplifier::new("http://localhost:8000/api", None, None)?);
//!     let sets = backend.list_image_sets().await?;
//!     let selection = ImageSetSelection::from_summaries(&sets);
//!
//!     let output = process_input(backend, "leaflet.pdf", &selection, &ProcessingConfig::default()).await?;
//!     println!("{}", output.to_markdown());
//!     if output.had_page_error {
//!         eprintln!("{} pages could not be simplified", output.stats.failed_pages);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `easyread` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod gallery;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod selection;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    process_document, process_input, process_markdown, process_sync, process_to_file,
    BatchProcessor, BatchState, OutputFormat, PageOutcome,
};
pub use config::{ProcessingConfig, ProcessingConfigBuilder};
pub use context::ClientContext;
pub use error::{EasyReadError, PageError};
pub use gallery::{EmbeddingFilter, GalleryPage, GalleryQuery, GallerySort, ImageRecord};
pub use output::{BatchOutput, BatchStats, PageResult, SentenceUnit};
pub use pipeline::http::HttpSimplifier;
pub use pipeline::input::Document;
pub use pipeline::llm::{LlmSimplifier, LlmSimplifierConfig};
pub use pipeline::simplify::{
    ImageSetSummary, SimplifiedPage, Simplifier, SimplifyRequest, StepSender,
};
pub use pipeline::split::{split_pages, PAGE_BREAK};
pub use progress::{
    BatchProgress, BatchProgressListener, NoopProgressListener, ProcessingStep, ProgressCallback,
    ProgressTracker,
};
pub use selection::ImageSetSelection;
pub use stream::{process_stream, BatchEvent, BatchEventStream};
