// PECO Assistant - Chat and analysis client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for PECO Assistant

use thiserror::Error;

/// Main error type for assistant backends
#[derive(Error, Debug)]
pub enum AssistantError {
    /// No API key in the configuration or the environment
    #[error("Gemini API key is not configured")]
    MissingApiKey,

    /// Transport failure or undecodable response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The service answered without any text
    #[error("Empty response from the model")]
    EmptyResponse,
}

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

/// Text shown to the user in place of a failed reply.
pub fn fallback_message(error: &AssistantError) -> String {
    match error {
        AssistantError::MissingApiKey => "Error: Gemini API key is not configured.".to_string(),
        other => format!(
            "An error occurred while communicating with the AI model: {}",
            other
        ),
    }
}
