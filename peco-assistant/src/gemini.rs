// PECO Assistant - Chat and analysis client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Remote backend over the `generateContent` REST endpoint

use crate::backend::{AnalysisRequest, ChatBackend, ChatMessage, Sender};
use crate::config::AssistantConfig;
use crate::error::{AssistantError, Result};
use crate::prompt::CHAT_INSTRUCTION;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ThinkingConfig {
    pub thinking_budget: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated.
    pub(crate) fn into_text(self) -> Result<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            Err(AssistantError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

/// Build a chat request from a conversation.
pub(crate) fn chat_request(history: &[ChatMessage]) -> GenerateContentRequest {
    let contents = history
        .iter()
        .map(|m| {
            let role = match m.sender {
                Sender::User => "user",
                Sender::Bot => "model",
            };
            Content::text(Some(role), &m.text)
        })
        .collect();
    GenerateContentRequest {
        contents,
        system_instruction: Some(Content::text(None, CHAT_INSTRUCTION)),
        generation_config: None,
    }
}

/// Build a single-turn analysis request.
pub(crate) fn analysis_request(prompt: &str, thinking_budget: u32) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::text(Some("user"), prompt)],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            thinking_config: ThinkingConfig { thinking_budget },
        }),
    }
}

/// Backend calling the hosted models.
#[derive(Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    config: AssistantConfig,
    api_key: String,
}

impl GeminiBackend {
    /// Fails with [`AssistantError::MissingApiKey`] when no key is configured.
    pub fn new(config: AssistantConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AssistantError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            model
        )
    }

    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Result<String> {
        debug!("generateContent model={} turns={}", model, request.contents.len());
        let response = self
            .client
            .post(self.url(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssistantError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        body.into_text()
    }
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("endpoint", &self.config.endpoint)
            .field("chat_model", &self.config.chat_model)
            .field("analysis_model", &self.config.analysis_model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn chat(&self, history: &[ChatMessage]) -> Result<String> {
        self.generate(&self.config.chat_model, &chat_request(history))
            .await
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String> {
        let body = analysis_request(&request.prompt, self.config.thinking_budget);
        self.generate(&self.config.analysis_model, &body).await
    }
}
