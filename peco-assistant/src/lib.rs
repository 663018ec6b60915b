// PECO Assistant - Chat and analysis client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # PECO Assistant - Chat and analysis client
//!
//! Conversational help and data analysis for the PECO dashboard.
//!
//! ## Overview
//!
//! An [`Assistant`] owns one chat session at a time and forwards requests
//! to a [`ChatBackend`]. With an API key the hosted models answer; without
//! one an offline keyword responder takes over. Backend errors never
//! surface as `Err`: they become a readable bot message.
//!
//! ## Features
//!
//! - **Lazy sessions**: Created on the first message, greeting included
//! - **Stale reply guard**: Replies issued before a reset are discarded
//! - **Data analysis**: Prompt built from the newest 24 live samples
//! - **Offline mode**: Keyword rules and local statistics
//!
//! ## Quick Start
//!
//! ```rust
//! use peco_assistant::{Assistant, CannedResponder};
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! let mut assistant = Assistant::new(Arc::new(CannedResponder::deterministic(0)));
//! let reply = assistant.send_message("How is my bill computed?").await.unwrap();
//! assert!(reply.text.starts_with("### Bill Breakdown"));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod assistant;
pub mod backend;
pub mod canned;
pub mod config;
pub mod error;
pub mod gemini;
pub mod prompt;

pub use assistant::{Assistant, ChatSession, CompletedReply, PendingReply, RequestToken, GREETING};
pub use backend::{AnalysisRequest, ChatBackend, ChatMessage, Sender};
pub use canned::CannedResponder;
pub use config::AssistantConfig;
pub use error::{fallback_message, AssistantError, Result};
pub use gemini::GeminiBackend;
