//! Text-generation provider selection.
//!
//! The engine never reads the environment itself. Binaries build a
//! [`ProviderConfig`] once at startup (usually with
//! [`ProviderConfig::from_env`]) and inject it, together with a
//! [`TextGenerator`] implementation when the provider is remote.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Result;

/// Environment variable that forces the local heuristics.
pub const PROVIDER_OVERRIDE_VAR: &str = "EVOLVE_PROVIDER";
/// Environment variable that overrides the provider base URL.
pub const PROVIDER_URL_VAR: &str = "EVOLVE_PROVIDER_URL";

/// Where suggestions come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local pattern-matching pipeline.
    Heuristic,
    /// Google Gemini.
    Gemini,
    /// DeepSeek chat completions.
    DeepSeek,
    /// OpenRouter chat completions.
    OpenRouter,
}

impl ProviderKind {
    /// Remote providers in precedence order.
    pub const REMOTE: [ProviderKind; 3] = [Self::Gemini, Self::DeepSeek, Self::OpenRouter];

    /// Lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Gemini => "gemini",
            Self::DeepSeek => "deepseek",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Environment variable holding the credential for this provider.
    pub fn credential_var(&self) -> Option<&'static str> {
        match self {
            Self::Heuristic => None,
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
        }
    }

    /// Public API base URL.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Heuristic => None,
            Self::Gemini => Some("https://generativelanguage.googleapis.com"),
            Self::DeepSeek => Some("https://api.deepseek.com"),
            Self::OpenRouter => Some("https://openrouter.ai/api"),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider choice plus the credential needed to call it.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Selected provider.
    pub kind: ProviderKind,
    /// API key for remote providers.
    pub api_key: Option<String>,
    /// Base URL override, mostly for tests and proxies.
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Local heuristics only.
    pub fn heuristic() -> Self {
        Self {
            kind: ProviderKind::Heuristic,
            api_key: None,
            base_url: None,
        }
    }

    /// Resolve the provider through `lookup`, taking the first remote provider
    /// with a non-blank credential and falling back to the heuristics.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let forced = lookup(PROVIDER_OVERRIDE_VAR)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(ProviderKind::Heuristic.as_str()));
        if forced {
            return Self::heuristic();
        }

        let base_url = lookup(PROVIDER_URL_VAR)
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());
        for kind in ProviderKind::REMOTE {
            let Some(var) = kind.credential_var() else {
                continue;
            };
            if let Some(key) = lookup(var).map(|key| key.trim().to_string()) {
                if !key.is_empty() {
                    return Self {
                        kind,
                        api_key: Some(key),
                        base_url,
                    };
                }
            }
        }
        Self::heuristic()
    }

    /// Resolve the provider from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Whether a remote provider is configured.
    pub fn is_remote(&self) -> bool {
        self.kind != ProviderKind::Heuristic && self.api_key.is_some()
    }

    /// Base URL to call, honoring the override.
    pub fn resolved_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .or_else(|| self.kind.default_base_url())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::heuristic()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// A remote model that turns a prompt into text.
#[cfg_attr(test, mockall::automock)]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` and return the raw response text.
    fn generate(&self, prompt: &str) -> Result<String>;
}
