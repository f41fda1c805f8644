//! Page splitting on the sentinel delimiter.

/// Delimiter inserted between pages by the upload/extraction step.
pub const PAGE_BREAK: &str = "---PAGE_BREAK---";

/// Split `raw` into ordered, trimmed, non-empty page bodies.
///
/// Input without the delimiter yields a single page when it has any
/// non-whitespace content, and no pages otherwise.
pub fn split_pages(raw: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        let page = raw.trim();
        return if page.is_empty() {
            Vec::new()
        } else {
            vec![page.to_string()]
        };
    }

    raw.split(delimiter)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join page bodies back into a single document with the delimiter between
/// pages, in the layout the splitter expects.
pub fn join_pages<S: AsRef<str>>(pages: &[S], delimiter: &str) -> String {
    let sep = format!("\n\n{}\n\n", delimiter);
    pages
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(&sep)
}
