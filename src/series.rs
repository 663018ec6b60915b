//! Time series structures.
//!
//! Provides [`DataPoint`] and the fixed-length [`LiveWindow`].

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One sample of actual or predicted power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Sample time.
    pub timestamp: DateTime<Utc>,
    /// "HH:MM" label in the configured offset.
    pub display_time: String,
    /// Actual power. Zero on projection-only points.
    pub power: f64,
    /// Predicted power, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<f64>,
}

impl DataPoint {
    /// Create an actual sample.
    pub fn actual(timestamp: DateTime<Utc>, offset: &FixedOffset, power: f64) -> Self {
        Self {
            timestamp,
            display_time: display_time(timestamp, offset),
            power,
            forecast: None,
        }
    }

    /// Create a projection-only sample.
    pub fn projected(timestamp: DateTime<Utc>, offset: &FixedOffset, forecast: f64) -> Self {
        Self {
            timestamp,
            display_time: display_time(timestamp, offset),
            power: 0.0,
            forecast: Some(forecast),
        }
    }

    /// Hour of day (0-23) in the given offset.
    pub fn hour(&self, offset: &FixedOffset) -> u32 {
        self.timestamp.with_timezone(offset).hour()
    }
}

/// "HH:MM" label for a timestamp.
pub fn display_time(timestamp: DateTime<Utc>, offset: &FixedOffset) -> String {
    timestamp.with_timezone(offset).format("%H:%M").to_string()
}

/// Round to a fixed number of decimals.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Fixed-capacity FIFO of live samples.
///
/// Once full, every push evicts the oldest sample so the length stays
/// constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveWindow {
    capacity: usize,
    points: VecDeque<DataPoint>,
}

impl LiveWindow {
    /// Create an empty window.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Create a window from existing samples, keeping the newest `capacity`.
    pub fn from_points(capacity: usize, points: impl IntoIterator<Item = DataPoint>) -> Self {
        let mut window = Self::with_capacity(capacity);
        for point in points {
            window.push(point);
        }
        window
    }

    /// Append a sample, evicting the oldest when full. Returns the evicted sample.
    pub fn push(&mut self, point: DataPoint) -> Option<DataPoint> {
        if self.capacity == 0 {
            return Some(point);
        }
        let evicted = if self.points.len() == self.capacity {
            self.points.pop_front()
        } else {
            None
        };
        self.points.push_back(point);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Newest sample.
    pub fn latest(&self) -> Option<&DataPoint> {
        self.points.back()
    }

    /// Oldest sample.
    pub fn oldest(&self) -> Option<&DataPoint> {
        self.points.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataPoint> {
        self.points.iter()
    }

    /// Samples in chronological order.
    pub fn to_vec(&self) -> Vec<DataPoint> {
        self.points.iter().cloned().collect()
    }

    /// The newest `n` samples, oldest first.
    pub fn tail(&self, n: usize) -> Vec<DataPoint> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip).cloned().collect()
    }
}
