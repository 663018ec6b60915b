//! Device model.
//!
//! A device is a metered appliance with a three-state status and a power
//! draw in watts. The status thresholds live in [`DeviceConfig`].

use crate::config::DeviceConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    Online,
    Offline,
    Idle,
}

impl DeviceStatus {
    /// All statuses, in declaration order.
    pub const ALL: [DeviceStatus; 3] = [
        DeviceStatus::Online,
        DeviceStatus::Offline,
        DeviceStatus::Idle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "Online",
            DeviceStatus::Offline => "Offline",
            DeviceStatus::Idle => "Idle",
        }
    }

    /// Status implied by a power draw.
    ///
    /// `0 -> Offline`, `(0, idle_threshold) -> Idle`, `>= idle_threshold -> Online`.
    pub fn from_power(power_w: f64, idle_threshold_w: f64) -> Self {
        if power_w <= 0.0 {
            DeviceStatus::Offline
        } else if power_w < idle_threshold_w {
            DeviceStatus::Idle
        } else {
            DeviceStatus::Online
        }
    }

    /// Any status other than Offline counts as switched on.
    pub fn is_on(&self) -> bool {
        !matches!(self, DeviceStatus::Offline)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normal operating range of a device, in watts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerRange {
    pub min: f64,
    pub max: f64,
}

impl PowerRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for PowerRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Live usage badge shown for an online device with a known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageHealth {
    Normal,
    High,
    Low,
}

/// A metered appliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub status: DeviceStatus,
    /// Current draw in watts.
    pub power: f64,
    #[serde(default)]
    pub is_adjustable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_power_range: Option<PowerRange>,
    #[serde(default)]
    pub tips: Vec<String>,
}

impl Device {
    /// Create an offline device with no range or limits.
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            status: DeviceStatus::Offline,
            power: 0.0,
            is_adjustable: false,
            max_power: None,
            normal_power_range: None,
            tips: Vec::new(),
        }
    }

    /// Set status and power together.
    pub fn with_state(mut self, status: DeviceStatus, power: f64) -> Self {
        self.status = status;
        self.power = power;
        self
    }

    /// Make the device adjustable up to `max_power` watts.
    pub fn adjustable(mut self, max_power: f64) -> Self {
        self.is_adjustable = true;
        self.max_power = Some(max_power);
        self
    }

    /// Set the normal operating range.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.normal_power_range = Some(PowerRange::new(min, max));
        self
    }

    /// Attach energy saving tips.
    pub fn with_tips<I, S>(mut self, tips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tips = tips.into_iter().map(Into::into).collect();
        self
    }

    /// Power used when the device is switched on from Offline.
    ///
    /// Midpoint of the normal range, else a fraction of the max power,
    /// else a flat fallback. Never below the idle threshold, so the device
    /// comes up Online.
    pub fn turn_on_power(&self, config: &DeviceConfig) -> f64 {
        let power = if let Some(range) = self.normal_power_range {
            range.midpoint()
        } else if let Some(max) = self.max_power {
            max * config.max_power_on_fraction
        } else {
            config.fallback_on_power_w
        };
        power.max(config.idle_threshold_w)
    }

    /// Live usage classification. `None` unless the device is Online and
    /// has a normal range.
    pub fn usage_health(&self) -> Option<UsageHealth> {
        if self.status != DeviceStatus::Online {
            return None;
        }
        let range = self.normal_power_range?;
        if self.power > range.max {
            Some(UsageHealth::High)
        } else if self.power < range.min && self.power > 0.0 {
            Some(UsageHealth::Low)
        } else {
            Some(UsageHealth::Normal)
        }
    }
}
