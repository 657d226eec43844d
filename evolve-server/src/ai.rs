//! Remote text generation for the suggestion engine.

use std::time::Duration;

use evolve_core::{EvolveError, ProviderConfig, ProviderKind, SuggestionEngine, TextGenerator};
use log::info;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Value, json};

const DEEPSEEK_MODEL: &str = "deepseek-coder";
const OPENROUTER_MODEL: &str = "meta-llama/llama-3.1-8b-instruct:free";
const OPENROUTER_TITLE: &str = "Self-Evolving Codebase";
const DEFAULT_REFERER: &str = "http://localhost:3000";
const TEMPERATURE: f64 = 0.7;
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Calls Gemini, DeepSeek or OpenRouter with one user prompt.
pub struct RemoteTextGenerator {
    kind: ProviderKind,
    api_key: String,
    base_url: String,
    referer: String,
    client: Client,
}

impl RemoteTextGenerator {
    /// Build a generator for a remote `config`; `None` for the heuristics.
    pub fn new(config: &ProviderConfig, referer: &str) -> Result<Option<Self>, EvolveError> {
        let (Some(api_key), Some(base_url)) = (config.api_key.clone(), config.resolved_base_url())
        else {
            return Ok(None);
        };
        if !config.is_remote() {
            return Ok(None);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| EvolveError::Provider(format!("http client setup failed: {err}")))?;
        Ok(Some(Self {
            kind: config.kind,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            referer: referer.to_string(),
            client,
        }))
    }

    fn request(&self, prompt: &str) -> RequestBuilder {
        match self.kind {
            ProviderKind::Gemini => self
                .client
                .post(format!(
                    "{}/v1beta/models/gemini-pro:generateContent",
                    self.base_url
                ))
                .query(&[("key", self.api_key.as_str())])
                .json(&json!({
                    "contents": [{ "parts": [{ "text": prompt }] }]
                })),
            ProviderKind::OpenRouter => self
                .chat_request(OPENROUTER_MODEL, prompt)
                .header("HTTP-Referer", &self.referer)
                .header("X-Title", OPENROUTER_TITLE),
            ProviderKind::DeepSeek | ProviderKind::Heuristic => {
                self.chat_request(DEEPSEEK_MODEL, prompt)
            }
        }
    }

    fn chat_request(&self, model: &str, prompt: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": TEMPERATURE,
            }))
    }
}

impl TextGenerator for RemoteTextGenerator {
    fn generate(&self, prompt: &str) -> evolve_core::Result<String> {
        let response = self
            .request(prompt)
            .send()
            .map_err(|err| EvolveError::Provider(format!("{} request failed: {err}", self.kind)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EvolveError::Provider(format!(
                "{} API error: {status}",
                self.kind
            )));
        }
        let value: Value = response.json().map_err(|err| {
            EvolveError::Provider(format!("{} response decode failed: {err}", self.kind))
        })?;
        response_text(self.kind, &value).ok_or_else(|| {
            EvolveError::Provider(format!("{} response has no generated text", self.kind))
        })
    }
}

fn response_text(kind: ProviderKind, value: &Value) -> Option<String> {
    let pointer = match kind {
        ProviderKind::Gemini => "/candidates/0/content/parts/0/text",
        _ => "/choices/0/message/content",
    };
    value.pointer(pointer)?.as_str().map(str::to_string)
}

/// Engine for `config`, wired to a remote generator when one is configured.
pub fn build_engine(config: ProviderConfig, referer: &str) -> Result<SuggestionEngine, EvolveError> {
    match RemoteTextGenerator::new(&config, referer)? {
        Some(generator) => {
            info!("suggestions use the {} provider", config.kind);
            Ok(SuggestionEngine::with_generator(config, Box::new(generator)))
        }
        None => {
            info!("suggestions use local heuristics");
            Ok(SuggestionEngine::heuristic())
        }
    }
}

/// Referer sent to OpenRouter, from `EVOLVE_PUBLIC_URL`.
pub fn referer_from_env() -> String {
    std::env::var("EVOLVE_PUBLIC_URL")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_REFERER.to_string())
}
