//! Pipeline stages for turning a document into Easy Read sentences.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ split ──▶ simplify ──▶ postprocess
//! (path/URL)  (pdfium)   (pages)   (http|llm)   (JSON repair)
//! ```
//!
//! 1. [`input`]    — resolve a path, URL or stdin to a [`input::Document`]
//! 2. [`extract`]  — PDF text layer per page, run in `spawn_blocking`
//! 3. [`split`]    — split on the page-break delimiter
//! 4. [`simplify`] — the [`simplify::Simplifier`] seam, implemented by
//!    [`http::HttpSimplifier`] and [`llm::LlmSimplifier`]
//! 5. [`postprocess`] — parse and tidy the response into sentences

pub mod extract;
pub mod http;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod simplify;
pub mod split;
