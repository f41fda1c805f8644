//! Error types for the easyread library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`EasyReadError`] — **Fatal**: the batch cannot start or cannot finish
//!   setting up (blank input, unreadable file, backend not configured).
//!   Returned as `Err(EasyReadError)` from the top-level `process*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (remote error,
//!   malformed response, timeout) while all other pages are fine. Stored inside
//!   [`crate::output::PageResult`] and turned into an inline placeholder
//!   sentence, so one bad page never costs the caller the whole document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the easyread library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum EasyReadError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The document text is empty or whitespace only.
    #[error("Please enter some text or upload a document before processing.")]
    EmptyInput,

    /// The text was non-blank but splitting produced no pages. This is a
    /// setup failure: the batch aborts before the first page.
    #[error("No pages found in the document (delimiter: {delimiter:?})")]
    NoPages { delimiter: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input is neither a readable file, `-`, nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF could not be opened or its text layer could not be read.
    #[error("PDF '{path}' could not be read: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none (or the wrong one) was provided.
    #[error("PDF '{path}' is encrypted.\nProvide the password with --pdf-password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF uploads need libpdfium. Either:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium, or\n\
  • Install pdfium so it is on the system library search path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Backend errors ────────────────────────────────────────────────────
    /// The configured simplification provider is not initialised.
    #[error("Simplification provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A backend call outside the per-page loop failed (e.g. listing image sets).
    #[error("Backend error: {message}")]
    BackendError { message: String },

    /// Some pages succeeded but at least one fell back to a placeholder.
    ///
    /// Returned by [`crate::output::BatchOutput::into_result`] when the
    /// caller wants to treat any page failure as an error.
    #[error("{failed}/{total} pages could not be simplified")]
    PartialFailure { failed: usize, total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read or parse the saved client context.
    #[error("Client context '{path}' could not be loaded: {detail}")]
    ContextLoadFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails. The
/// batch always continues with the next page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The simplification call itself failed (network, HTTP status, LLM error).
    #[error("Page {page}: simplification failed: {detail}")]
    Remote { page: usize, detail: String },

    /// The call succeeded but the response carried no sentence list.
    #[error("Page {page}: response was missing the sentence list")]
    Malformed { page: usize },

    /// The call did not finish within the configured per-page timeout.
    #[error("Page {page}: simplification timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::Remote { page, .. }
            | PageError::Malformed { page }
            | PageError::Timeout { page, .. } => *page,
        }
    }

    /// Re-attribute an error raised by a collaborator that did not know
    /// which page it was working on.
    pub fn with_page(self, page: usize) -> Self {
        match self {
            PageError::Remote { detail, .. } => PageError::Remote { page, detail },
            PageError::Malformed { .. } => PageError::Malformed { page },
            PageError::Timeout { secs, .. } => PageError::Timeout { page, secs },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = EasyReadError::PartialFailure { failed: 1, total: 10 };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn empty_input_is_user_facing() {
        let msg = EasyReadError::EmptyInput.to_string();
        assert!(msg.starts_with("Please enter some text"));
    }

    #[test]
    fn page_error_carries_page_number() {
        let e = PageError::Timeout { page: 3, secs: 30 };
        assert_eq!(e.page(), 3);
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn with_page_rewrites_only_the_page() {
        let e = PageError::Remote {
            page: 0,
            detail: "HTTP 502".into(),
        }
        .with_page(4);
        assert_eq!(
            e,
            PageError::Remote {
                page: 4,
                detail: "HTTP 502".into()
            }
        );
    }
}
