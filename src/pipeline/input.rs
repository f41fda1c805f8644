//! Input resolution: turn a path, URL or `-` into a [`Document`].
//!
//! Text and markdown files are read as UTF-8. Anything starting with the PDF
//! magic bytes (`%PDF`) goes through [`crate::pipeline::extract`], which
//! needs a file-system path, so downloaded PDFs are written to a `TempDir`
//! that lives until extraction finishes.

use crate::config::ProcessingConfig;
use crate::error::EasyReadError;
use crate::pipeline::extract;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// A document ready for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Working title, taken from the file name. The batch replaces it with
    /// the first title the simplifier returns.
    pub title: String,
    /// Markdown with pages separated by the page-break delimiter.
    pub raw_text: String,
}

impl Document {
    pub fn from_text(title: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a [`Document`].
pub async fn resolve_input(input: &str, config: &ProcessingConfig) -> Result<Document, EasyReadError> {
    if input == "-" {
        read_stdin().await
    } else if is_url(input) {
        download_url(input, config).await
    } else {
        resolve_local(input, config).await
    }
}

async fn read_stdin() -> Result<Document, EasyReadError> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .map_err(|e| EasyReadError::InvalidInput {
            input: "-".into(),
            reason: format!("could not read stdin as UTF-8: {e}"),
        })?;
    Ok(Document::from_text("", text))
}

/// Read a local file, dispatching on its first bytes.
async fn resolve_local(path_str: &str, config: &ProcessingConfig) -> Result<Document, EasyReadError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(EasyReadError::FileNotFound { path });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(EasyReadError::PermissionDenied { path });
        }
        Err(_) => return Err(EasyReadError::FileNotFound { path }),
    };

    let title = title_from_path(&path);
    debug!("Resolved local input: {} ({} bytes)", path.display(), bytes.len());

    if is_pdf(&bytes) {
        let markdown = extract::extract_markdown(
            &path,
            config.pdf_password.as_deref(),
            &config.page_delimiter,
        )
        .await?;
        return Ok(Document::from_text(title, markdown));
    }

    let text = String::from_utf8(bytes).map_err(|_| EasyReadError::InvalidInput {
        input: path_str.to_string(),
        reason: "not a PDF and not valid UTF-8 text".into(),
    })?;
    Ok(Document::from_text(title, text))
}

/// Download a URL; PDFs are extracted, everything else is read as text.
async fn download_url(url: &str, config: &ProcessingConfig) -> Result<Document, EasyReadError> {
    info!("Downloading document from: {}", url);
    let timeout_secs = config.download_timeout_secs;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EasyReadError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            EasyReadError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            EasyReadError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(EasyReadError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| EasyReadError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    let title = title_from_path(Path::new(&filename));

    if !is_pdf(&bytes) {
        let text = String::from_utf8(bytes.to_vec()).map_err(|_| EasyReadError::InvalidInput {
            input: url.to_string(),
            reason: "download is not a PDF and not valid UTF-8 text".into(),
        })?;
        return Ok(Document::from_text(title, text));
    }

    let temp_dir = TempDir::new().map_err(|e| EasyReadError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| EasyReadError::Internal(format!("Failed to write temp file: {}", e)))?;
    info!("Downloaded to: {}", file_path.display());

    let markdown = extract::extract_markdown(
        &file_path,
        config.pdf_password.as_deref(),
        &config.page_delimiter,
    )
    .await?;
    Ok(Document::from_text(title, markdown))
}

fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Last non-empty URL path segment, or a generic name.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded".to_string()
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.md"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filenames_and_titles() {
        assert_eq!(extract_filename("https://x.org/docs/easy_read-guide.pdf"), "easy_read-guide.pdf");
        assert_eq!(extract_filename("https://x.org/"), "downloaded");
        assert_eq!(title_from_path(Path::new("easy_read-guide.pdf")), "easy read guide");
    }

    #[tokio::test]
    async fn reads_markdown_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaflet.md");
        std::fs::write(&path, "Page one\n---PAGE_BREAK---\nPage two").unwrap();

        let doc = resolve_input(path.to_str().unwrap(), &ProcessingConfig::default())
            .await
            .unwrap();
        assert_eq!(doc.title, "leaflet");
        assert_eq!(doc.raw_text, "Page one\n---PAGE_BREAK---\nPage two");
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let err = resolve_input("/definitely/not/here.md", &ProcessingConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EasyReadError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn binary_non_pdf_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x81]).unwrap();
        let err = resolve_input(path.to_str().unwrap(), &ProcessingConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EasyReadError::InvalidInput { .. }));
    }
}
