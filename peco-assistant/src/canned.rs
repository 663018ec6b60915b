// PECO Assistant - Chat and analysis client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Offline responder
//!
//! Keyword-driven replies and a local statistics summary. Used when no API
//! key is configured, and as a deterministic backend in tests.

use crate::backend::{AnalysisRequest, ChatBackend, ChatMessage, Sender};
use crate::error::Result;
use async_trait::async_trait;
use peco::{LiveStatistics, RandomSource, SequenceSource};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Mutex;
use std::time::Duration;

/// General tips used when no keyword rule matches.
pub const ENERGY_TIPS: [&str; 5] = [
    "Group your high-draw devices on smart schedules so they do not overlap during peak tariff windows.",
    "Fans plus a 24 °C AC setting usually feel the same as blasting 20 °C but use about 15% less power.",
    "Idle electronics still sip power. A smart strip can cut 20-50 W without you noticing.",
    "Try batching laundry after sunset if your utility offers off-peak rates. It is an easy win.",
    "A weekly reminder to clean AC filters keeps airflow strong and prevents runaway consumption.",
];

/// Appliance words picked out of the user's messages.
const DEVICE_WORDS: [&str; 5] = ["ac", "fridge", "computer", "lights", "heater"];

/// Backend answering without any network access.
pub struct CannedResponder {
    rng: Mutex<Box<dyn RandomSource + Send>>,
    delay: Duration,
}

impl std::fmt::Debug for CannedResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CannedResponder")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl Default for CannedResponder {
    fn default() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }
}

impl CannedResponder {
    pub fn with_rng(rng: Box<dyn RandomSource + Send>) -> Self {
        Self {
            rng: Mutex::new(rng),
            delay: Duration::ZERO,
        }
    }

    /// Responder that always picks the same tip.
    pub fn deterministic(tip_index: usize) -> Self {
        let sample = (tip_index % ENERGY_TIPS.len()) as f64 / ENERGY_TIPS.len() as f64;
        Self::with_rng(Box::new(SequenceSource::constant(sample)))
    }

    /// Simulated typing delay before each reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn random_tip(&self) -> &'static str {
        let idx = match self.rng.lock() {
            Ok(mut rng) => rng.pick(ENERGY_TIPS.len()),
            Err(poisoned) => poisoned.into_inner().pick(ENERGY_TIPS.len()),
        };
        ENERGY_TIPS[idx]
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Reply to `prompt` given the conversation so far.
    pub fn craft_response(&self, prompt: &str, history: &[ChatMessage]) -> String {
        let normalized = prompt.to_lowercase();

        if normalized.contains("cost") || normalized.contains("bill") {
            return [
                "### Bill Breakdown",
                "- Recent peaks usually come from cooling loads and anything above 1.5 kW.",
                "- Spread heavy appliances across the day to keep demand charges low.",
                "- Double-check whether your plan has an off-peak window; shifting 2-3 hours can shave noticeable costs.",
            ]
            .join("\n");
        }

        if normalized.contains("device") {
            let mentioned = mentioned_devices(history);
            let subject = if mentioned.is_empty() {
                "your core devices".to_string()
            } else {
                mentioned.join(", ")
            };
            return [
                format!("Here is a quick checklist for {}:", subject),
                "* Track their standby draw. Anything above 30 W idle is worth investigating.".to_string(),
                "* Note when they spike; pairing that with the dashboard timeline makes anomalies much easier to spot.".to_string(),
                "* If something sits in \"Idle\" for hours, consider automating a shutoff rule.".to_string(),
            ]
            .join("\n");
        }

        if normalized.contains("forecast") || normalized.contains("predict") {
            return [
                "Our forecast traces mirror the last 24 h pattern, so you will see a morning ramp, a noon lull, and an evening bump.",
                "When the dashed forecast line drifts above the live curve, you are tracking hotter than usual. Time to trim loads.",
            ]
            .join("\n");
        }

        format!("I love that question. {}", self.random_tip())
    }
}

/// Appliance words from the user's messages, in order of first mention.
pub fn mentioned_devices(history: &[ChatMessage]) -> Vec<&'static str> {
    let mut found: Vec<&'static str> = Vec::new();
    let words = history
        .iter()
        .filter(|m| m.sender == Sender::User)
        .flat_map(|m| {
            m.text
                .split(|c: char| !c.is_alphanumeric())
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
        });
    for word in words {
        if let Some(device) = DEVICE_WORDS.iter().find(|d| **d == word) {
            if !found.contains(device) {
                found.push(device);
            }
        }
    }
    found
}

/// Markdown summary of local statistics.
pub fn local_analysis(query: &str, stats: Option<&LiveStatistics>) -> String {
    let Some(stats) = stats else {
        return "No live data is available yet. Try again once the dashboard has collected a few samples.".to_string();
    };
    [
        "### Offline Analysis".to_string(),
        format!("You asked: \"{}\"", query.trim()),
        String::new(),
        format!(
            "- Average load: {:.2} kW over the last {} samples",
            stats.average_kw, stats.samples
        ),
        format!("- Peak: {:.2} kW at {}", stats.peak_kw, stats.peak_time),
        format!("- Lowest: {:.2} kW at {}", stats.lowest_kw, stats.lowest_time),
        format!("- Energy used: {:.2} kWh", stats.energy_kwh),
        String::new(),
        "Shift flexible loads away from the peak hour to flatten the curve.".to_string(),
    ]
    .join("\n")
}

#[async_trait]
impl ChatBackend for CannedResponder {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn chat(&self, history: &[ChatMessage]) -> Result<String> {
        self.pause().await;
        let prompt = history
            .iter()
            .rev()
            .find(|m| m.sender == Sender::User)
            .map(|m| m.text.as_str())
            .unwrap_or_default();
        Ok(self.craft_response(prompt, history))
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String> {
        self.pause().await;
        Ok(local_analysis(&request.query, request.stats.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> ChatMessage {
        ChatMessage::user(1, text)
    }

    #[test]
    fn test_bill_rule() {
        let responder = CannedResponder::deterministic(0);
        let reply = responder.craft_response("Why is my BILL so high?", &[]);
        assert!(reply.starts_with("### Bill Breakdown"));
    }

    #[test]
    fn test_device_rule_lists_mentions() {
        let responder = CannedResponder::deterministic(0);
        let history = vec![
            user("My heater and AC run all day"),
            ChatMessage::bot(2, "the fridge is fine"),
            user("what about each device? the ac again"),
        ];
        let reply = responder.craft_response("what about each device?", &history);
        assert!(reply.starts_with("Here is a quick checklist for heater, ac:"));
    }

    #[test]
    fn test_device_rule_default_subject() {
        let responder = CannedResponder::deterministic(0);
        let reply = responder.craft_response("device list", &[user("device list")]);
        assert!(reply.starts_with("Here is a quick checklist for your core devices:"));
    }

    #[test]
    fn test_forecast_rule() {
        let responder = CannedResponder::deterministic(0);
        assert!(responder
            .craft_response("can you predict tomorrow?", &[])
            .starts_with("Our forecast traces"));
    }

    #[test]
    fn test_tip_fallback() {
        let responder = CannedResponder::deterministic(2);
        assert_eq!(
            responder.craft_response("hello", &[]),
            format!("I love that question. {}", ENERGY_TIPS[2])
        );
    }

    #[test]
    fn test_local_analysis() {
        let stats = LiveStatistics {
            samples: 24,
            average_kw: 2.1,
            peak_kw: 3.25,
            peak_time: "18:00".into(),
            lowest_kw: 0.8,
            lowest_time: "03:15".into(),
            energy_kwh: 12.6,
        };
        let text = local_analysis("usage?", Some(&stats));
        assert!(text.contains("- Peak: 3.25 kW at 18:00"));
        assert!(text.contains("over the last 24 samples"));
        assert!(local_analysis("usage?", None).starts_with("No live data"));
    }
}
