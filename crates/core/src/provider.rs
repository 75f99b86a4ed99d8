//! OpenAI-compatible chat completion backends used for question generation.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing API key for {provider_name}: set {env_var}")]
    MissingApiKey {
        provider_name: &'static str,
        env_var: &'static str,
    },

    #[error("Unknown provider: {0}")]
    Unknown(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Openai,
    Grok,
    Gemini,
}

/// Where and with which model a request goes, after config overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub api_url: String,
    pub model: String,
}

impl Provider {
    fn defaults(self) -> (&'static str, &'static str) {
        match self {
            Provider::Openai => ("https://api.openai.com/v1/chat/completions", "gpt-4o-mini"),
            Provider::Grok => ("https://api.x.ai/v1/chat/completions", "grok-4-fast"),
            Provider::Gemini => (
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                "gemini-2.5-flash",
            ),
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Grok => "XAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::Openai => "OpenAI",
            Provider::Grok => "Grok",
            Provider::Gemini => "Gemini",
        }
    }

    pub fn endpoint(self, api_url: Option<&str>, model: Option<&str>) -> ProviderEndpoint {
        let (default_url, default_model) = self.defaults();
        ProviderEndpoint {
            api_url: api_url.unwrap_or(default_url).to_string(),
            model: model.unwrap_or(default_model).to_string(),
        }
    }

    pub fn api_key(self) -> Result<String, ProviderError> {
        self.api_key_from(|key| std::env::var(key).ok())
    }

    fn api_key_from(self, lookup: impl Fn(&str) -> Option<String>) -> Result<String, ProviderError> {
        lookup(self.env_var())
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey {
                provider_name: self.name(),
                env_var: self.env_var(),
            })
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::Openai),
            "grok" | "xai" => Ok(Provider::Grok),
            "gemini" => Ok(Provider::Gemini),
            other => Err(ProviderError::Unknown(other.to_string())),
        }
    }
}
