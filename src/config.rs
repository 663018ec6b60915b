//! PECO simulation configuration.
//!
//! Every tunable constant of the synthesizer, the device reconciler and the
//! reports lives here. The defaults reproduce the residential demo profile.

use crate::error::{PecoError, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Master configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PecoConfig {
    /// Live window and timer settings.
    pub live: LiveConfig,

    /// Shape of the synthetic household load curve.
    pub load_profile: LoadProfileConfig,

    /// Historical backfill and anomaly injection.
    pub history: HistoryConfig,

    /// Device status thresholds and drift timer.
    pub devices: DeviceConfig,

    /// Notification lifetime.
    pub notifications: NotificationConfig,

    /// Tariff and peak window.
    pub tariff: TariffConfig,

    /// Offset from UTC used for hour-of-day and display labels.
    pub utc_offset_minutes: i32,
}

impl PecoConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file (JSON).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Use the host's current local offset for hour-of-day computations.
    pub fn with_local_offset(mut self) -> Self {
        let offset = chrono::Local::now().offset().local_minus_utc();
        self.utc_offset_minutes = offset / 60;
        self
    }

    /// Fixed offset derived from `utc_offset_minutes`.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or(Utc.fix())
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.live.window_len == 0 {
            return Err(PecoError::InvalidConfig("live.window_len must be > 0".into()));
        }
        if self.live.sample_interval_minutes == 0 {
            return Err(PecoError::InvalidConfig(
                "live.sample_interval_minutes must be > 0".into(),
            ));
        }
        if self.live.tick_interval_ms == 0 || self.devices.drift_interval_ms == 0 {
            return Err(PecoError::InvalidConfig("timer intervals must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.history.anomaly_probability) {
            return Err(PecoError::InvalidConfig(format!(
                "history.anomaly_probability out of range: {}",
                self.history.anomaly_probability
            )));
        }
        if self.tariff.peak_start_hour >= self.tariff.peak_end_hour || self.tariff.peak_end_hour > 24
        {
            return Err(PecoError::InvalidConfig(format!(
                "invalid peak window [{}, {})",
                self.tariff.peak_start_hour, self.tariff.peak_end_hour
            )));
        }
        if FixedOffset::east_opt(self.utc_offset_minutes * 60).is_none() {
            return Err(PecoError::InvalidConfig(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }
}

/// Live window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Samples kept in the sliding window.
    pub window_len: usize,
    /// Spacing between window samples.
    pub sample_interval_minutes: u32,
    /// Wall-clock period of the live tick.
    pub tick_interval_ms: u64,
    /// Points projected by the future forecast.
    pub future_horizon: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            window_len: 96, // 24h at 15 min
            sample_interval_minutes: 15,
            tick_interval_ms: 5_000,
            future_horizon: 96,
        }
    }
}

/// One sinusoidal bump of the daily load curve.
///
/// `amplitude * sin((hour - center_hour) * PI / half_period_hours)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LoadComponent {
    pub amplitude: f64,
    pub center_hour: f64,
    pub half_period_hours: f64,
}

/// Dual-peak residential load curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadProfileConfig {
    /// Constant base load (kW).
    pub baseline_kw: f64,
    /// Morning bump.
    pub morning: LoadComponent,
    /// Evening bump.
    pub evening: LoadComponent,
    /// Peak-to-peak width of the uniform noise on live samples.
    pub live_noise_kw: f64,
    /// Peak-to-peak width of the uniform noise on future projections.
    pub future_noise_kw: f64,
    /// Lower bound of any synthesized sample.
    pub floor_kw: f64,
    /// Peak-to-peak relative jitter of the aligned forecast.
    pub forecast_jitter: f64,
}

impl Default for LoadProfileConfig {
    fn default() -> Self {
        Self {
            baseline_kw: 1.5,
            morning: LoadComponent {
                amplitude: 1.2,
                center_hour: 8.0,
                half_period_hours: 12.0,
            },
            evening: LoadComponent {
                amplitude: 1.5,
                center_hour: 18.0,
                half_period_hours: 8.0,
            },
            live_noise_kw: 0.5,
            future_noise_kw: 0.4,
            floor_kw: 0.5,
            forecast_jitter: 0.2,
        }
    }
}

/// Historical backfill configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Days of hourly history per device.
    pub days: u32,
    /// Probability that a sample is forced outside the normal range.
    pub anomaly_probability: f64,
    /// Low anomalies at or below this draw (W) are not recorded.
    pub low_anomaly_floor_w: f64,
    /// Minimum overshoot factor for high anomalies.
    pub high_factor_min: f64,
    /// Minimum undershoot factor for low anomalies.
    pub low_factor_max: f64,
    /// Random spread added to (high) or removed from (low) the factor.
    pub factor_spread: f64,
    /// Shortest reported anomaly duration.
    pub min_duration_minutes: u32,
    /// Random spread of the anomaly duration.
    pub duration_spread_minutes: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            days: 30,
            anomaly_probability: 0.05,
            low_anomaly_floor_w: 20.0,
            high_factor_min: 1.2,
            low_factor_max: 0.8,
            factor_spread: 0.5,
            min_duration_minutes: 15,
            duration_spread_minutes: 45,
        }
    }
}

/// Device reconciler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Period of the random status drift.
    pub drift_interval_ms: u64,
    /// Draw (W) at and above which a device is Online.
    pub idle_threshold_w: f64,
    /// Lowest idle draw assigned by the drift (W).
    pub idle_min_w: f64,
    /// Power used to turn on a device with no range and no max power.
    pub fallback_on_power_w: f64,
    /// Fraction of `max_power` used to turn on a device without a range.
    pub max_power_on_fraction: f64,
    /// Added to the range minimum when the drift brings a device online.
    pub drift_online_offset_w: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            drift_interval_ms: 10_000,
            idle_threshold_w: 20.0,
            idle_min_w: 10.0,
            fallback_on_power_w: 100.0,
            max_power_on_fraction: 0.6,
            drift_online_offset_w: 50.0,
        }
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Time before an undismissed notification disappears.
    pub ttl_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { ttl_ms: 5_000 }
    }
}

/// Tariff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffConfig {
    /// Price of one kWh.
    pub rate_per_kwh: f64,
    /// Currency label used in formatted output.
    pub currency: String,
    /// First peak hour (inclusive).
    pub peak_start_hour: u32,
    /// Last peak hour (exclusive).
    pub peak_end_hour: u32,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            rate_per_kwh: 30.0,
            currency: "PKR".to_string(),
            peak_start_hour: 7,
            peak_end_hour: 21,
        }
    }
}
