// PECO Assistant - Chat and analysis client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Chat session and analysis entry points
//!
//! The session is created on first use and discarded by [`Assistant::reset`].
//! Replies are tagged with a [`RequestToken`]; a reply whose token predates
//! the last reset is dropped instead of landing in the new conversation.

use crate::backend::{AnalysisRequest, ChatBackend, ChatMessage};
use crate::canned::CannedResponder;
use crate::config::AssistantConfig;
use crate::error::fallback_message;
use crate::gemini::GeminiBackend;
use crate::prompt::analysis_prompt;
use peco::report::ANALYSIS_SAMPLES;
use peco::{live_statistics, LiveWindow};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// First message of every conversation.
pub const GREETING: &str = "Hi there! I'm PECO-Bot. Ask me anything about your energy usage, \
billing surprises, or how to squeeze a few more watts out of your setup.";

/// Identifies the session a request was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// An open conversation.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    fn new(greeting_id: u64) -> Self {
        Self {
            messages: vec![ChatMessage::bot(greeting_id, GREETING)],
        }
    }

    /// All messages including the greeting.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Messages sent to the backend. The greeting is local only.
    pub fn history(&self) -> &[ChatMessage] {
        self.messages.get(1..).unwrap_or_default()
    }
}

/// A submitted message waiting for its reply.
pub struct PendingReply {
    token: RequestToken,
    history: Vec<ChatMessage>,
    backend: Arc<dyn ChatBackend>,
}

impl PendingReply {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    /// Ask the backend. Failures become a bot message describing the error.
    pub async fn resolve(self) -> CompletedReply {
        let text = match self.backend.chat(&self.history).await {
            Ok(text) => text,
            Err(e) => {
                error!("{} chat request failed: {}", self.backend.name(), e);
                fallback_message(&e)
            }
        };
        CompletedReply {
            token: self.token,
            text,
        }
    }
}

/// Reply text ready to be appended to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedReply {
    pub token: RequestToken,
    pub text: String,
}

/// Chat and analysis front end over a [`ChatBackend`].
pub struct Assistant {
    backend: Arc<dyn ChatBackend>,
    session: Option<ChatSession>,
    epoch: u64,
    next_id: u64,
}

impl Assistant {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            session: None,
            epoch: 0,
            next_id: 1,
        }
    }

    /// Remote backend when a key is configured, offline responder otherwise.
    pub fn from_config(config: AssistantConfig) -> Self {
        if !config.has_api_key() {
            warn!("no API key configured, using the offline responder");
            return Self::new(Arc::new(CannedResponder::default()));
        }
        match GeminiBackend::new(config) {
            Ok(backend) => {
                info!("assistant using remote backend");
                Self::new(Arc::new(backend))
            }
            Err(e) => {
                warn!("remote backend unavailable ({}), using the offline responder", e);
                Self::new(Arc::new(CannedResponder::default()))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    /// Messages of the current session, empty before the first message.
    pub fn transcript(&self) -> &[ChatMessage] {
        self.session.as_ref().map(ChatSession::transcript).unwrap_or_default()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Token for a request issued now.
    pub fn begin_request(&self) -> RequestToken {
        RequestToken(self.epoch)
    }

    /// Whether a reply issued under `token` still belongs to the session.
    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.epoch
    }

    /// Record a user message. Blank input is ignored.
    pub fn submit(&mut self, raw: &str) -> Option<PendingReply> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        if self.session.is_none() {
            let greeting_id = self.next_id();
            self.session = Some(ChatSession::new(greeting_id));
            debug!("chat session opened");
        }
        let id = self.next_id();
        let session = self.session.get_or_insert_with(ChatSession::default);
        session.messages.push(ChatMessage::user(id, text));
        let history = session.history().to_vec();

        Some(PendingReply {
            token: self.begin_request(),
            history,
            backend: Arc::clone(&self.backend),
        })
    }

    /// Append a reply. Stale replies are discarded and `None` is returned.
    pub fn deliver(&mut self, reply: CompletedReply) -> Option<&ChatMessage> {
        if !self.is_current(reply.token) {
            debug!("discarding reply from a closed session");
            return None;
        }
        let id = self.next_id();
        let session = self.session.as_mut()?;
        session.messages.push(ChatMessage::bot(id, reply.text));
        session.messages.last()
    }

    /// Submit, wait for the reply and append it.
    pub async fn send_message(&mut self, raw: &str) -> Option<&ChatMessage> {
        let pending = self.submit(raw)?;
        let reply = pending.resolve().await;
        self.deliver(reply)
    }

    /// Close the session. Replies still in flight are dropped on delivery.
    pub fn reset(&mut self) {
        self.session = None;
        self.epoch += 1;
        info!("chat session reset");
    }

    /// Answer a question about the newest live samples.
    pub async fn analyze(&self, query: &str, window: &LiveWindow) -> String {
        let samples = window.tail(ANALYSIS_SAMPLES);
        let request = AnalysisRequest {
            query: query.trim().to_string(),
            prompt: analysis_prompt(query, &samples),
            stats: live_statistics(window),
        };
        match self.backend.analyze(&request).await {
            Ok(text) => text,
            Err(e) => {
                error!("{} analysis request failed: {}", self.backend.name(), e);
                fallback_message(&e)
            }
        }
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("backend", &self.backend.name())
            .field("session", &self.session)
            .field("epoch", &self.epoch)
            .finish()
    }
}
