// PECO Assistant - Chat and analysis client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prompt construction

use peco::report::ANALYSIS_SAMPLES;
use peco::DataPoint;

/// System instruction of the conversational model.
pub const CHAT_INSTRUCTION: &str = "You are a helpful and friendly AI assistant for the AI-PECO \
energy management dashboard. Your name is PECO-Bot. Be concise and helpful. You can answer \
questions about energy consumption, provide energy-saving tips, and explain concepts related to \
electricity. Keep responses friendly and easy to understand for a non-technical audience. Use \
markdown for formatting when it improves readability (e.g., lists).";

/// Role given to the analysis model.
pub const ANALYST_INSTRUCTION: &str = "You are AI-PECO, an advanced AI-powered energy consumption \
analyst. Your task is to analyze user queries about their energy usage based on the provided \
data. Provide clear, actionable insights in a well-structured format. Use markdown for \
formatting. Be concise but thorough.";

/// One `Time: <t>, Power: <p> kW` line per sample, for the newest samples.
pub fn data_summary(samples: &[DataPoint]) -> String {
    let skip = samples.len().saturating_sub(ANALYSIS_SAMPLES);
    samples[skip..]
        .iter()
        .map(|p| format!("Time: {}, Power: {:.2} kW", p.display_time, p.power))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full analysis prompt: instruction, recent data and the user's query.
pub fn analysis_prompt(query: &str, samples: &[DataPoint]) -> String {
    format!(
        "System Instruction:\n{}\n\nEnergy Consumption Data (Last 24 hours):\n{}\n\nUser Query:\n\"{}\"\n\nAnalysis and Response:\n",
        ANALYST_INSTRUCTION,
        data_summary(samples),
        query.trim()
    )
}
