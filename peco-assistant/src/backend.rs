// PECO Assistant - Chat and analysis client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Backend abstraction

use crate::error::Result;
use async_trait::async_trait;
use peco::LiveStatistics;
use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    User,
    Bot,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn bot(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::Bot,
            text: text.into(),
        }
    }
}

/// Input of an analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// The user's question.
    pub query: String,
    /// Rendered prompt for remote models.
    pub prompt: String,
    /// Local statistics over the same samples, if any.
    pub stats: Option<LiveStatistics>,
}

/// A source of assistant replies.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Reply to a conversation. `history` ends with the new user message.
    async fn chat(&self, history: &[ChatMessage]) -> Result<String>;

    /// Answer an analysis request.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String>;
}
