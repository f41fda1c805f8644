//! Configuration types for batch processing.
//!
//! All batch behaviour is controlled through [`ProcessingConfig`], built via
//! its [`ProcessingConfigBuilder`]. Settings for the LLM-backed simplifier
//! live in [`crate::pipeline::llm::LlmSimplifierConfig`] since they only
//! matter to that adapter.

use crate::error::EasyReadError;
use crate::pipeline::split::PAGE_BREAK;
use crate::progress::ProgressCallback;
use std::fmt;

/// Configuration for a batch run.
///
/// Built via [`ProcessingConfig::builder()`] or using
/// [`ProcessingConfig::default()`].
///
/// # Example
/// ```rust
/// use easyread::ProcessingConfig;
///
/// let config = ProcessingConfig::builder()
///     .prevent_duplicate_images(true)
///     .page_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.page_timeout_secs, Some(90));
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// Sentinel separating pages in the raw markdown. Default: `---PAGE_BREAK---`.
    pub page_delimiter: String,

    /// Ask the image-matching step not to reuse an image within a document.
    /// Carried through to [`crate::output::BatchOutput`] unchanged. Default: false.
    pub prevent_duplicate_images: bool,

    /// Upper bound on one page's simplification call. `None` leaves it to the
    /// transport. A timed-out page becomes a placeholder like any other
    /// failure; it is never retried. Default: None.
    pub page_timeout_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Password for encrypted PDF uploads.
    pub pdf_password: Option<String>,

    /// Optional progress listener.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            page_delimiter: PAGE_BREAK.to_string(),
            prevent_duplicate_images: false,
            page_timeout_secs: None,
            download_timeout_secs: 120,
            pdf_password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("page_delimiter", &self.page_delimiter)
            .field("prevent_duplicate_images", &self.prevent_duplicate_images)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("pdf_password", &self.pdf_password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressListener>"),
            )
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn page_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.config.page_delimiter = delimiter.into();
        self
    }

    pub fn prevent_duplicate_images(mut self, v: bool) -> Self {
        self.config.prevent_duplicate_images = v;
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, EasyReadError> {
        let c = &self.config;
        if c.page_delimiter.trim().is_empty() {
            return Err(EasyReadError::InvalidConfig(
                "Page delimiter must not be blank".into(),
            ));
        }
        if c.page_timeout_secs == Some(0) {
            return Err(EasyReadError::InvalidConfig(
                "Page timeout must be ≥ 1 second".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(EasyReadError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
