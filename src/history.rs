//! Historical backfill with anomaly injection.
//!
//! Builds hourly per-device history for every device that declares a
//! normal power range. A small share of samples is pushed outside the
//! range and recorded as an [`Anomaly`]. The backfill is generated once
//! and treated as immutable afterwards.

use crate::config::{HistoryConfig, PecoConfig};
use crate::device::{Device, PowerRange};
use crate::random::RandomSource;
use crate::series::{round_to, DataPoint};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Direction of an out-of-range sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    High,
    Low,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::High => "high",
            AnomalyKind::Low => "low",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::High => "High Usage",
            AnomalyKind::Low => "Low Usage",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded out-of-range sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// `<device id>-<timestamp ms>`.
    pub id: String,
    pub device_id: String,
    pub device_name: String,
    pub kind: AnomalyKind,
    pub timestamp: DateTime<Utc>,
    pub duration_minutes: u32,
    /// Anomalous draw in whole watts.
    pub value: f64,
    pub normal_range: PowerRange,
}

/// Classify a historical sample against a normal range.
///
/// Above the range is always `High`. Below the range is `Low` only when the
/// draw stays above `low_floor_w`, so near-zero standby draw is not flagged.
pub fn classify_sample(range: &PowerRange, value: f64, low_floor_w: f64) -> Option<AnomalyKind> {
    if value > range.max {
        Some(AnomalyKind::High)
    } else if value < range.min && value > low_floor_w {
        Some(AnomalyKind::Low)
    } else {
        None
    }
}

/// Thirty days (by default) of hourly history and the anomalies found in it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalBackfill {
    per_device: BTreeMap<String, Vec<DataPoint>>,
    total: Vec<DataPoint>,
    anomalies: Vec<Anomaly>,
}

impl HistoricalBackfill {
    /// Generate history for every device with a normal range.
    pub fn generate<R: RandomSource + ?Sized>(
        devices: &[Device],
        now: DateTime<Utc>,
        config: &PecoConfig,
        rng: &mut R,
    ) -> Self {
        let offset = config.offset();
        let mut per_device = BTreeMap::new();
        let mut anomalies = Vec::new();

        for device in devices {
            if let Some(range) = device.normal_power_range {
                let (points, found) =
                    generate_device_history(device, &range, now, &config.history, &offset, rng);
                anomalies.extend(found);
                per_device.insert(device.id.clone(), points);
            }
        }

        let total = sum_by_timestamp(per_device.values(), &offset);
        anomalies.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Self {
            per_device,
            total,
            anomalies,
        }
    }

    /// Summed series across devices, oldest first.
    pub fn total(&self) -> &[DataPoint] {
        &self.total
    }

    /// History of a single device.
    pub fn device(&self, device_id: &str) -> Option<&[DataPoint]> {
        self.per_device.get(device_id).map(Vec::as_slice)
    }

    /// All per-device series keyed by device id.
    pub fn per_device(&self) -> &BTreeMap<String, Vec<DataPoint>> {
        &self.per_device
    }

    /// Anomalies, newest first.
    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }
}

/// Hourly history of one device, oldest first, with its anomalies.
pub fn generate_device_history<R: RandomSource + ?Sized>(
    device: &Device,
    range: &PowerRange,
    now: DateTime<Utc>,
    config: &HistoryConfig,
    offset: &FixedOffset,
    rng: &mut R,
) -> (Vec<DataPoint>, Vec<Anomaly>) {
    let hours = i64::from(config.days) * 24;
    let mut points = Vec::with_capacity(hours as usize);
    let mut anomalies = Vec::new();

    for hours_ago in (0..hours).rev() {
        let timestamp = now - Duration::hours(hours_ago);
        let mut power = rng.uniform(range.min, range.max);

        if rng.chance(config.anomaly_probability) {
            let high = rng.next_f64() > 0.5;
            power = if high {
                range.max * (config.high_factor_min + rng.next_f64() * config.factor_spread)
            } else {
                range.min * (config.low_factor_max - rng.next_f64() * config.factor_spread)
            };

            if let Some(kind) = classify_sample(range, power, config.low_anomaly_floor_w) {
                let spread = f64::from(config.duration_spread_minutes);
                let duration = config.min_duration_minutes + (rng.next_f64() * spread) as u32;
                anomalies.push(Anomaly {
                    id: format!("{}-{}", device.id, timestamp.timestamp_millis()),
                    device_id: device.id.clone(),
                    device_name: device.name.clone(),
                    kind,
                    timestamp,
                    duration_minutes: duration,
                    value: power.round(),
                    normal_range: *range,
                });
            }
        }

        points.push(DataPoint::actual(timestamp, offset, round_to(power, 2)));
    }

    (points, anomalies)
}

/// Sum several series point-wise by identical timestamp.
pub fn sum_by_timestamp<'a, I>(series: I, offset: &FixedOffset) -> Vec<DataPoint>
where
    I: IntoIterator<Item = &'a Vec<DataPoint>>,
{
    let mut sums: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
    for points in series {
        for point in points {
            *sums.entry(point.timestamp).or_insert(0.0) += point.power;
        }
    }
    sums.into_iter()
        .map(|(timestamp, power)| DataPoint::actual(timestamp, offset, round_to(power, 2)))
        .collect()
}
