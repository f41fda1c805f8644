//! PDF text extraction via pdfium.
//!
//! Each PDF page's text layer becomes one page of the markdown document,
//! joined with the page-break delimiter so the splitter sees the original
//! page boundaries. Scanned PDFs without a text layer yield empty pages,
//! which the splitter drops.
//!
//! pdfium is not async-safe, so the work runs inside `spawn_blocking`.

use crate::error::EasyReadError;
use crate::pipeline::split::join_pages;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Extract every page's text from the PDF at `pdf_path` and join the pages
/// with `delimiter`.
pub async fn extract_markdown(
    pdf_path: &Path,
    password: Option<&str>,
    delimiter: &str,
) -> Result<String, EasyReadError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);
    let delimiter = delimiter.to_string();

    let pages = tokio::task::spawn_blocking(move || {
        extract_pages_blocking(&path, password.as_deref())
    })
    .await
    .map_err(|e| EasyReadError::Internal(format!("Extraction task panicked: {}", e)))??;

    Ok(join_pages(&pages, &delimiter))
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the working directory,
/// then the system library search path.
fn bind_pdfium() -> Result<Pdfium, EasyReadError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => Pdfium::bind_to_library(&p),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| EasyReadError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of text extraction.
fn extract_pages_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Vec<String>, EasyReadError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            EasyReadError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        } else {
            EasyReadError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| EasyReadError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?
            .all();
        debug!("Extracted page {} → {} chars", idx + 1, text.len());
        texts.push(normalise_page_text(&text));
    }

    Ok(texts)
}

/// Tidy a page's raw text layer: unify line endings, trim each line, and
/// keep at most one blank line between paragraphs.
pub fn normalise_page_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0;
    for line in unified.lines().map(str::trim) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_line_endings_and_blank_runs() {
        let raw = "  Title \r\n\r\n\r\n\r\nFirst line\rSecond line  \n\n";
        assert_eq!(normalise_page_text(raw), "Title\n\nFirst line\nSecond line");
    }

    #[test]
    fn empty_text_layer_is_empty() {
        assert_eq!(normalise_page_text(" \n \r\n"), "");
    }
}
