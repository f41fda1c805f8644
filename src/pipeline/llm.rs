//! LLM-backed simplifier: run the Converting → Validating → Revising steps
//! directly against a chat model.
//!
//! This is intentionally thin. All prompt text lives in [`crate::prompts`]
//! and all response repair lives in [`crate::pipeline::postprocess`].
//!
//! There is no retry loop. A failed conversion call fails the page and the
//! batch records a placeholder; a failed validate or revise call only costs
//! the review, and the converted sentences are kept.

use crate::error::{EasyReadError, PageError};
use crate::output::SentenceUnit;
use crate::pipeline::postprocess::{self, extract_json_object};
use crate::pipeline::simplify::{SimplifiedPage, Simplifier, SimplifyRequest, StepSender};
use crate::progress::ProcessingStep;
use crate::prompts::{
    convert_message, revise_message, validate_message, CONVERT_SYSTEM_PROMPT,
    REVISE_SYSTEM_PROMPT, VALIDATE_SYSTEM_PROMPT,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Settings for [`LlmSimplifier`].
#[derive(Clone)]
pub struct LlmSimplifierConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected from env.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens per chat call. Default: 4096.
    pub max_tokens: usize,

    /// Custom system prompt for the conversion step.
    pub system_prompt: Option<String>,

    /// Run the validation/revision steps. Default: true.
    pub validate: bool,
}

impl Default for LlmSimplifierConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            system_prompt: None,
            validate: true,
        }
    }
}

impl fmt::Debug for LlmSimplifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSimplifierConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("validate", &self.validate)
            .finish()
    }
}

/// Reviewer verdict returned by the validation step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Verdict {
    #[serde(default = "default_valid")]
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

fn default_valid() -> bool {
    true
}

impl Verdict {
    fn needs_revision(&self) -> bool {
        !self.valid && !self.issues.is_empty()
    }
}

#[derive(Serialize)]
struct WirePage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    easy_read_sentences: Vec<WireSentence<'a>>,
}

#[derive(Serialize)]
struct WireSentence<'a> {
    sentence: &'a str,
    image_retrieval: &'a str,
}

/// A [`Simplifier`] that talks to a chat model through edgequake-llm.
pub struct LlmSimplifier {
    provider: Arc<dyn LLMProvider>,
    config: LlmSimplifierConfig,
}

impl LlmSimplifier {
    pub fn new(provider: Arc<dyn LLMProvider>, config: LlmSimplifierConfig) -> Self {
        Self { provider, config }
    }

    /// Resolve a provider from the config (or environment) and wrap it.
    pub fn from_config(config: LlmSimplifierConfig) -> Result<Self, EasyReadError> {
        let provider = resolve_provider(&config)?;
        Ok(Self::new(provider, config))
    }

    async fn chat(&self, page: usize, system: &str, user: String) -> Result<String, PageError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let options = build_options(&self.config);
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| PageError::Remote {
                page,
                detail: e.to_string(),
            })?;
        debug!(
            "Page {}: {} input tokens, {} output tokens",
            page, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }

    async fn validate(&self, request: &SimplifyRequest, current_json: &str) -> Option<Verdict> {
        let raw = match self
            .chat(
                request.page_num,
                VALIDATE_SYSTEM_PROMPT,
                validate_message(&request.page_text, current_json),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                // The converted sentences are still usable without a review.
                warn!("{}; keeping unvalidated sentences", e);
                return None;
            }
        };
        let verdict = parse_verdict(&raw);
        if verdict.is_none() {
            warn!("Page {}: validator reply was not a verdict", request.page_num);
        }
        verdict
    }
}

#[async_trait]
impl Simplifier for LlmSimplifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn simplify(
        &self,
        request: &SimplifyRequest,
        steps: &StepSender,
    ) -> Result<SimplifiedPage, PageError> {
        let page = request.page_num;

        steps.send(ProcessingStep::Converting);
        let system = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(CONVERT_SYSTEM_PROMPT);
        let raw = self
            .chat(
                page,
                system,
                convert_message(&request.page_text, &request.image_set_ids),
            )
            .await?;
        let converted = postprocess::parse_response(&raw);

        let Some(sentences) = converted.sentences.as_deref() else {
            return Ok(converted);
        };
        if !self.config.validate || sentences.is_empty() {
            return Ok(converted);
        }

        steps.send(ProcessingStep::Validating);
        let current_json = to_wire_json(converted.title.as_deref(), sentences);
        let Some(verdict) = self.validate(request, &current_json).await else {
            return Ok(converted);
        };

        steps.send(ProcessingStep::Revising);
        if !verdict.needs_revision() {
            return Ok(converted);
        }
        debug!("Page {}: revising {} issues", page, verdict.issues.len());
        let revised = self
            .chat(
                page,
                REVISE_SYSTEM_PROMPT,
                revise_message(&request.page_text, &current_json, &verdict.issues),
            )
            .await;
        Ok(apply_revision(page, converted, revised))
    }
}

/// Prefer the revision, but fall back to the converted sentences when the
/// revise call failed or returned no sentence list.
fn apply_revision(
    page: usize,
    converted: SimplifiedPage,
    revised: Result<String, PageError>,
) -> SimplifiedPage {
    let raw = match revised {
        Ok(raw) => raw,
        Err(e) => {
            warn!("{}; keeping converted sentences", e);
            return converted;
        }
    };
    let revised = postprocess::parse_response(&raw);
    if revised.sentences.is_none() {
        warn!("Page {}: revision was malformed, keeping converted sentences", page);
        return converted;
    }
    SimplifiedPage {
        title: revised.title.or(converted.title),
        sentences: revised.sentences,
    }
}

/// Parse the validator's JSON verdict.
pub fn parse_verdict(raw: &str) -> Option<Verdict> {
    let json = extract_json_object(raw)?;
    serde_json::from_str(&json).ok()
}

fn to_wire_json(title: Option<&str>, sentences: &[SentenceUnit]) -> String {
    let page = WirePage {
        title,
        easy_read_sentences: sentences
            .iter()
            .map(|s| WireSentence {
                sentence: &s.text,
                image_retrieval: &s.image_retrieval,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&page).unwrap_or_default()
}

/// Build `CompletionOptions` from the simplifier config.
fn build_options(config: &LlmSimplifierConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** `EASYREAD_LLM_PROVIDER` + `EASYREAD_MODEL`.
/// 4. **Full auto-detection** via [`ProviderFactory::from_env`].
fn resolve_provider(config: &LlmSimplifierConfig) -> Result<Arc<dyn LLMProvider>, EasyReadError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EASYREAD_LLM_PROVIDER"),
        std::env::var("EASYREAD_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| EasyReadError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or use --backend-url.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, EasyReadError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        EasyReadError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
