//! REST backend simplifier.
//!
//! Talks to the EasyRead backend service:
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | `POST {base}/process-page` | `{ markdown_content, selected_sets }` | `{ title?, easy_read_sentences: [{ sentence, image_retrieval }] }` |
//! | `GET {base}/image-sets` | — | `[{ name, sample_items, item_count }]` or `{ "image_sets": [...] }` |
//!
//! The backend runs its own convert/validate/revise steps server-side and
//! does not report them, so this adapter only signals `Converting` as the
//! request goes out.

use crate::context::ClientContext;
use crate::error::{EasyReadError, PageError};
use crate::pipeline::postprocess;
use crate::pipeline::simplify::{
    ImageSetSummary, SimplifiedPage, Simplifier, SimplifyRequest, StepSender,
};
use crate::progress::ProcessingStep;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Serialize)]
struct ProcessPageBody<'a> {
    markdown_content: &'a str,
    selected_sets: &'a [String],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImageSetsResponse {
    Bare(Vec<ImageSetSummary>),
    Wrapped { image_sets: Vec<ImageSetSummary> },
}

/// A [`Simplifier`] backed by the REST service.
#[derive(Clone)]
pub struct HttpSimplifier {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl fmt::Debug for HttpSimplifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSimplifier")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpSimplifier {
    /// Create a client for `base_url` (e.g. `http://localhost:8000/api`).
    ///
    /// `timeout_secs` bounds each request; `None` uses reqwest's default.
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, EasyReadError> {
        let base_url = normalise_base_url(&base_url.into())?;
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| EasyReadError::Internal(format!("HTTP client: {e}")))?;
        info!("Using EasyRead backend at {}", base_url);
        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    /// Build from a saved [`ClientContext`].
    pub fn from_context(ctx: &ClientContext, timeout_secs: Option<u64>) -> Result<Self, EasyReadError> {
        let url = ctx
            .backend_url
            .clone()
            .ok_or_else(|| EasyReadError::ProviderNotConfigured {
                provider: "http".into(),
                hint: "Set EASYREAD_BACKEND_URL or pass --backend-url.".into(),
            })?;
        Self::new(url, ctx.api_token.clone(), timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorised(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl Simplifier for HttpSimplifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn simplify(
        &self,
        request: &SimplifyRequest,
        steps: &StepSender,
    ) -> Result<SimplifiedPage, PageError> {
        let page = request.page_num;
        let remote = |detail: String| PageError::Remote { page, detail };

        steps.send(ProcessingStep::Converting);
        let body = ProcessPageBody {
            markdown_content: &request.page_text,
            selected_sets: &request.image_set_ids,
        };
        let response = self
            .authorised(self.client.post(self.endpoint("process-page")))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    remote(format!("request timed out: {e}"))
                } else {
                    remote(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(remote(format!("HTTP {status}: {}", truncate(&text, 200))));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| remote(format!("invalid JSON: {e}")))?;
        debug!("Page {}: backend responded", page);
        Ok(postprocess::parse_value(&value))
    }

    async fn list_image_sets(&self) -> Result<Vec<ImageSetSummary>, EasyReadError> {
        let url = self.endpoint("image-sets");
        let backend = |message: String| EasyReadError::BackendError { message };

        let response = self
            .authorised(self.client.get(&url))
            .send()
            .await
            .map_err(|e| backend(format!("GET {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(backend(format!("GET {url}: HTTP {}", response.status())));
        }
        let sets: ImageSetsResponse = response
            .json()
            .await
            .map_err(|e| backend(format!("GET {url}: invalid JSON: {e}")))?;
        Ok(match sets {
            ImageSetsResponse::Bare(v) | ImageSetsResponse::Wrapped { image_sets: v } => v,
        })
    }
}

fn normalise_base_url(raw: &str) -> Result<String, EasyReadError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| EasyReadError::InvalidConfig(format!(
        "Backend URL '{raw}' is not valid: {e}"
    )))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(EasyReadError::InvalidConfig(format!(
            "Backend URL '{raw}' must use http or https"
        )));
    }
    Ok(trimmed.to_string())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_removed() {
        let s = HttpSimplifier::new("http://localhost:8000/api/", None, Some(5)).unwrap();
        assert_eq!(s.base_url(), "http://localhost:8000/api");
        assert_eq!(s.endpoint("process-page"), "http://localhost:8000/api/process-page");
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(HttpSimplifier::new("ftp://example.com", None, None).is_err());
        assert!(HttpSimplifier::new("not a url", None, None).is_err());
    }

    #[test]
    fn from_context_requires_url() {
        let err = HttpSimplifier::from_context(&ClientContext::default(), None).unwrap_err();
        assert!(matches!(err, EasyReadError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn request_body_shape() {
        let sets = vec!["food".to_string()];
        let body = ProcessPageBody {
            markdown_content: "# Hi",
            selected_sets: &sets,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["markdown_content"], "# Hi");
        assert_eq!(json["selected_sets"][0], "food");
    }

    #[test]
    fn image_sets_accepts_both_shapes() {
        let bare: ImageSetsResponse =
            serde_json::from_str(r#"[{"name":"food","item_count":3}]"#).unwrap();
        let wrapped: ImageSetsResponse =
            serde_json::from_str(r#"{"image_sets":[{"name":"food"}]}"#).unwrap();
        for r in [bare, wrapped] {
            let (ImageSetsResponse::Bare(v) | ImageSetsResponse::Wrapped { image_sets: v }) = r;
            assert_eq!(v[0].name, "food");
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 10), "ok");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_page_error() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let s = HttpSimplifier::new("http://127.0.0.1:9", None, Some(2)).unwrap();
        let req = SimplifyRequest {
            page_num: 2,
            page_text: "Text".into(),
            image_set_ids: vec![],
        };
        let err = s.simplify(&req, &StepSender::detached()).await.unwrap_err();
        assert_eq!(err.page(), 2);
    }
}
