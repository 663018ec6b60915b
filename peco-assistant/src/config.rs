// PECO Assistant - Chat and analysis client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Assistant configuration

use serde::{Deserialize, Serialize};

/// Environment variables checked for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["PECO_API_KEY", "API_KEY"];

/// Configuration of the remote backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// API key. `None` selects the offline responder.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model used for conversational replies.
    pub chat_model: String,

    /// Model used for data analysis.
    pub analysis_model: String,

    /// Base URL of the generative language API.
    pub endpoint: String,

    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Reasoning token budget for analysis requests.
    pub thinking_budget: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            chat_model: "gemini-2.5-flash".to_string(),
            analysis_model: "gemini-2.5-pro".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_ms: 60_000,
            thinking_budget: 32_768,
        }
    }
}

impl AssistantConfig {
    /// Defaults plus the first non-empty key from [`API_KEY_VARS`].
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = API_KEY_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty());
        Self {
            api_key,
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Whether a usable API key is set.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}
