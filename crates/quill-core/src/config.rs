// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat configuration and its typed partial-update operation.

use serde::{Deserialize, Serialize};

/// Global chat configuration: endpoint, credential, generation parameters.
///
/// Persisted as a single slot and mutated only through
/// [`ConfigPatch::apply_to`]; unset patch fields retain their prior value.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    /// Base URL of the OpenAI-compatible API server.
    pub api_url: String,
    /// Bearer credential. Redacted from `Debug` output.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Upper bound on generated tokens per reply.
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: "https://ai.huan666.de".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

impl ChatConfig {
    /// Whether a bearer credential has been configured.
    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// Manual Debug so the credential never lands in logs.
impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_url", &self.api_url)
            .field(
                "api_key",
                &if self.api_key.is_empty() {
                    "<unset>"
                } else {
                    "<redacted>"
                },
            )
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Partial configuration update. Fields left `None` keep their prior value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ConfigPatch {
    /// Merges this patch into `config`, field by field.
    pub fn apply_to(&self, config: &mut ChatConfig) {
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = api_key.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
