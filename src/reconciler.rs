//! Device collection and its state transitions.
//!
//! [`DeviceStore`] owns the mutable device list. User commands (toggle,
//! power slider, add, delete) and the random background drift all go
//! through it, and every path keeps `power == 0` exactly when the device
//! is Offline.

use crate::catalog::{self, DeviceTemplate};
use crate::config::DeviceConfig;
use crate::device::{Device, DeviceStatus, PowerRange};
use crate::error::{PecoError, Result, ValidationError};
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Result of a toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleOutcome {
    /// The device was Offline and is now Online.
    TurnedOn,
    /// The device is on; turning it off waits for `confirm_turn_off`.
    ConfirmationRequired,
}

/// User input for a new device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDevice {
    /// Display name. Blank falls back to the template name.
    pub name: String,
    /// Initial draw (custom template only).
    pub power: Option<f64>,
    /// Slider limit (custom template only).
    pub max_power: Option<f64>,
    /// Whether the slider is enabled (custom template only).
    pub is_adjustable: Option<bool>,
}

impl NewDevice {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_max_power(mut self, max_power: f64) -> Self {
        self.max_power = Some(max_power);
        self
    }

    pub fn adjustable(mut self, adjustable: bool) -> Self {
        self.is_adjustable = Some(adjustable);
        self
    }
}

/// A change applied by the background drift.
#[derive(Debug, Clone, PartialEq)]
pub struct Drift {
    pub device_id: String,
    pub from: DeviceStatus,
    pub to: DeviceStatus,
    pub power: f64,
}

/// Owner of the device collection.
#[derive(Debug, Clone)]
pub struct DeviceStore {
    devices: Vec<Device>,
    pending_turn_off: HashSet<String>,
    config: DeviceConfig,
}

fn check_power(power: f64) -> Result<f64> {
    if power.is_finite() && power >= 0.0 {
        Ok(power)
    } else {
        Err(ValidationError::InvalidPower(power).into())
    }
}

impl DeviceStore {
    /// Create a store over an initial device list.
    pub fn new(devices: Vec<Device>, config: DeviceConfig) -> Self {
        Self {
            devices,
            pending_turn_off: HashSet::new(),
            config,
        }
    }

    /// Create a store seeded with the default household.
    pub fn seeded(config: DeviceConfig) -> Self {
        Self::new(catalog::seed_devices(), config)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Device> {
        self.devices
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| PecoError::DeviceNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Sum of all device draws, in watts.
    pub fn total_power(&self) -> f64 {
        self.devices.iter().map(|d| d.power).sum()
    }

    /// Whether a turn-off for this device is awaiting confirmation.
    pub fn is_awaiting_confirmation(&self, id: &str) -> bool {
        self.pending_turn_off.contains(id)
    }

    /// Toggle request from the UI switch.
    ///
    /// Turning on is immediate. Turning off only records a pending
    /// confirmation.
    pub fn request_toggle(&mut self, id: &str) -> Result<ToggleOutcome> {
        let status = self
            .get(id)
            .map(|d| d.status)
            .ok_or_else(|| PecoError::DeviceNotFound(id.to_string()))?;

        if status.is_on() {
            self.pending_turn_off.insert(id.to_string());
            Ok(ToggleOutcome::ConfirmationRequired)
        } else {
            self.toggle_confirmed(id)?;
            Ok(ToggleOutcome::TurnedOn)
        }
    }

    /// Apply a pending turn-off. Returns false if nothing was pending.
    pub fn confirm_turn_off(&mut self, id: &str) -> Result<bool> {
        if !self.pending_turn_off.remove(id) {
            return Ok(false);
        }
        let device = self.get_mut(id)?;
        if device.status.is_on() {
            device.status = DeviceStatus::Offline;
            device.power = 0.0;
        }
        Ok(true)
    }

    /// Drop a pending turn-off.
    pub fn cancel_turn_off(&mut self, id: &str) -> bool {
        self.pending_turn_off.remove(id)
    }

    /// Unconditional toggle: Offline turns on, anything else turns off.
    pub fn toggle_confirmed(&mut self, id: &str) -> Result<DeviceStatus> {
        let config = self.config.clone();
        let device = self.get_mut(id)?;
        if device.status == DeviceStatus::Offline {
            device.power = device.turn_on_power(&config);
            device.status = DeviceStatus::Online;
        } else {
            device.status = DeviceStatus::Offline;
            device.power = 0.0;
        }
        let status = device.status;
        self.pending_turn_off.remove(id);
        Ok(status)
    }

    /// Set the draw directly and derive the status from it.
    pub fn set_power(&mut self, id: &str, power: f64) -> Result<DeviceStatus> {
        let power = check_power(power)?;
        let threshold = self.config.idle_threshold_w;
        let device = self.get_mut(id)?;
        device.power = power;
        device.status = DeviceStatus::from_power(power, threshold);
        Ok(device.status)
    }

    /// Build a device from a template. Nothing changes on error.
    pub fn add_device(
        &mut self,
        template_id: &str,
        request: NewDevice,
        now_ms: i64,
    ) -> Result<&Device> {
        let template = catalog::find_template(template_id)
            .ok_or_else(|| ValidationError::UnknownTemplate(template_id.to_string()))?;
        let device = self.build_device(&template, request, now_ms)?;

        info!("Device added: {} ({})", device.name, device.id);
        self.devices.push(device);
        // Just pushed
        Ok(&self.devices[self.devices.len() - 1])
    }

    fn build_device(
        &self,
        template: &DeviceTemplate,
        request: NewDevice,
        now_ms: i64,
    ) -> Result<Device> {
        let blueprint = &template.blueprint;
        let name = match request.name.trim() {
            "" => blueprint.name.trim().to_string(),
            given => given.to_string(),
        };
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let mut device = Device {
            id: self.fresh_id(now_ms),
            name,
            status: blueprint.status,
            power: blueprint.power,
            is_adjustable: blueprint.is_adjustable,
            max_power: blueprint.max_power,
            normal_power_range: blueprint.normal_power_range,
            tips: blueprint.tips.clone(),
        };

        if template.is_custom() {
            let power = check_power(request.power.unwrap_or(0.0))?;
            let max_power = check_power(request.max_power.unwrap_or(power))?.max(power);
            device.power = power;
            device.max_power = Some(max_power);
            device.is_adjustable = request.is_adjustable.unwrap_or(false);
            device.normal_power_range = Some(PowerRange::new(
                (power * 0.6).max(5.0),
                (power * 1.2).max(10.0),
            ));
            device.status = if power > 0.0 {
                DeviceStatus::Online
            } else {
                DeviceStatus::Offline
            };
        }

        Ok(device)
    }

    /// `user-<ms>`, bumped until no device uses it.
    fn fresh_id(&self, now_ms: i64) -> String {
        let mut stamp = now_ms;
        loop {
            let id = format!("user-{}", stamp);
            if self.get(&id).is_none() {
                return id;
            }
            stamp += 1;
        }
    }

    /// Remove a device. Returns the removed device.
    pub fn delete_device(&mut self, id: &str) -> Result<Device> {
        let pos = self
            .devices
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| PecoError::DeviceNotFound(id.to_string()))?;
        self.pending_turn_off.remove(id);
        let removed = self.devices.remove(pos);
        info!("Device removed: {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    /// Move one random device to a random other status.
    ///
    /// Power follows the new status: Offline draws nothing, Idle draws a
    /// whole number of watts below the idle threshold, Online draws the
    /// range minimum plus an offset (or the fallback power).
    pub fn drift<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Option<Drift> {
        if self.devices.is_empty() {
            return None;
        }
        let idx = rng.pick(self.devices.len());
        let config = self.config.clone();
        let device = &mut self.devices[idx];

        let choices: Vec<DeviceStatus> = DeviceStatus::ALL
            .iter()
            .copied()
            .filter(|s| *s != device.status)
            .collect();
        let to = choices[rng.pick(choices.len())];

        let power = match to {
            DeviceStatus::Offline => 0.0,
            DeviceStatus::Idle => {
                let span = (config.idle_threshold_w - config.idle_min_w).max(0.0);
                (config.idle_min_w + rng.next_f64() * span)
                    .floor()
                    .clamp(1.0, (config.idle_threshold_w - 1.0).max(1.0))
            }
            DeviceStatus::Online => match device.normal_power_range {
                Some(range) => range.min + config.drift_online_offset_w,
                None => config.fallback_on_power_w,
            }
            .max(config.idle_threshold_w),
        };

        let from = device.status;
        device.status = to;
        device.power = power;
        if !to.is_on() {
            self.pending_turn_off.remove(&device.id);
        }

        debug!("Drift: {} {} -> {} at {}W", device.id, from, to, power);
        Some(Drift {
            device_id: device.id.clone(),
            from,
            to,
            power,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SequenceSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store() -> DeviceStore {
        DeviceStore::seeded(DeviceConfig::default())
    }

    #[test]
    fn test_toggle_on_is_immediate() {
        let mut store = store();
        assert_eq!(store.request_toggle("pc-1").unwrap(), ToggleOutcome::TurnedOn);
        let pc = store.get("pc-1").unwrap();
        assert_eq!(pc.status, DeviceStatus::Online);
        assert_eq!(pc.power, 325.0);
    }

    #[test]
    fn test_toggle_off_requires_confirmation() {
        let mut store = store();
        assert_eq!(
            store.request_toggle("ac-1").unwrap(),
            ToggleOutcome::ConfirmationRequired
        );
        assert_eq!(store.get("ac-1").unwrap().status, DeviceStatus::Online);
        assert!(store.is_awaiting_confirmation("ac-1"));

        assert!(store.confirm_turn_off("ac-1").unwrap());
        let ac = store.get("ac-1").unwrap();
        assert_eq!(ac.status, DeviceStatus::Offline);
        assert_eq!(ac.power, 0.0);
        assert!(!store.is_awaiting_confirmation("ac-1"));
    }

    #[test]
    fn test_cancel_turn_off_keeps_state() {
        let mut store = store();
        store.request_toggle("tv-1").unwrap();
        assert!(store.cancel_turn_off("tv-1"));
        assert!(!store.confirm_turn_off("tv-1").unwrap());
        assert_eq!(store.get("tv-1").unwrap().status, DeviceStatus::Online);
    }

    #[test]
    fn test_idle_device_turns_off_with_confirmation() {
        let mut store = store();
        assert_eq!(
            store.request_toggle("light-1").unwrap(),
            ToggleOutcome::ConfirmationRequired
        );
        store.confirm_turn_off("light-1").unwrap();
        assert_eq!(store.get("light-1").unwrap().power, 0.0);
    }

    #[test]
    fn test_toggle_cycle_after_power_edits() {
        let mut store = store();
        store.request_toggle("washer-1").unwrap();
        store.set_power("washer-1", 1234.0).unwrap();
        store.set_power("washer-1", 15.0).unwrap();
        store.request_toggle("washer-1").unwrap();
        store.confirm_turn_off("washer-1").unwrap();

        let washer = store.get("washer-1").unwrap();
        assert_eq!(washer.status, DeviceStatus::Offline);
        assert_eq!(washer.power, 0.0);
    }

    #[test]
    fn test_turn_on_without_range() {
        let devices = vec![
            Device::new("lamp", "Lamp").adjustable(200.0),
            Device::new("plug", "Plug"),
        ];
        let mut store = DeviceStore::new(devices, DeviceConfig::default());
        store.toggle_confirmed("lamp").unwrap();
        store.toggle_confirmed("plug").unwrap();
        assert!((store.get("lamp").unwrap().power - 120.0).abs() < 1e-9);
        assert_eq!(store.get("plug").unwrap().power, 100.0);
    }

    #[test]
    fn test_low_range_device_turns_on_online() {
        let mut store = store();
        store.request_toggle("router-1").unwrap();
        store.confirm_turn_off("router-1").unwrap();
        assert_eq!(store.request_toggle("router-1").unwrap(), ToggleOutcome::TurnedOn);

        let router = store.get("router-1").unwrap();
        assert_eq!(router.status, DeviceStatus::Online);
        assert_eq!(router.power, 20.0);
    }

    #[test]
    fn test_custom_zero_power_device_turns_on_online() {
        let mut store = store();
        let id = store.add_device("custom", NewDevice::named("Spare"), 1).unwrap().id.clone();
        assert_eq!(store.request_toggle(&id).unwrap(), ToggleOutcome::TurnedOn);

        let spare = store.get(&id).unwrap();
        assert_eq!(spare.status, DeviceStatus::Online);
        assert_eq!(spare.power, 20.0);
    }

    #[test]
    fn test_set_power_thresholds() {
        let mut store = store();
        assert_eq!(store.set_power("ac-1", 0.0).unwrap(), DeviceStatus::Offline);
        assert_eq!(store.set_power("ac-1", 19.0).unwrap(), DeviceStatus::Idle);
        assert_eq!(store.set_power("ac-1", 20.0).unwrap(), DeviceStatus::Online);
    }

    #[test]
    fn test_set_power_rejects_negative() {
        let mut store = store();
        let err = store.set_power("ac-1", -5.0).unwrap_err();
        assert!(matches!(
            err,
            PecoError::Validation(ValidationError::InvalidPower(_))
        ));
        assert_eq!(store.get("ac-1").unwrap().power, 1800.0);
    }

    #[test]
    fn test_unknown_device() {
        let mut store = store();
        assert!(matches!(
            store.request_toggle("nope"),
            Err(PecoError::DeviceNotFound(_))
        ));
        assert!(store.set_power("nope", 1.0).is_err());
        assert!(store.delete_device("nope").is_err());
    }

    #[test]
    fn test_add_from_template_uses_default_name() {
        let mut store = store();
        let device = store
            .add_device("refrigerator", NewDevice::named("   "), 1_700_000_000_000)
            .unwrap();
        assert_eq!(device.name, "Refrigerator");
        assert_eq!(device.id, "user-1700000000000");
        assert_eq!(device.status, DeviceStatus::Online);
        assert_eq!(store.len(), 11);
    }

    #[test]
    fn test_add_custom_blank_name_rejected() {
        let mut store = store();
        let err = store
            .add_device("custom", NewDevice::named("").with_power(100.0), 1)
            .unwrap_err();
        assert!(matches!(err, PecoError::Validation(ValidationError::EmptyName)));
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_add_custom_clamps_max_power() {
        let mut store = store();
        let device = store
            .add_device(
                "custom",
                NewDevice::named("Kiln")
                    .with_power(500.0)
                    .with_max_power(300.0)
                    .adjustable(true),
                1,
            )
            .unwrap();
        assert_eq!(device.max_power, Some(500.0));
        assert!(device.is_adjustable);
        assert_eq!(device.status, DeviceStatus::Online);
        let range = device.normal_power_range.unwrap();
        assert_eq!(range.min, 300.0);
        assert_eq!(range.max, 600.0);
    }

    #[test]
    fn test_add_custom_zero_power_is_offline() {
        let mut store = store();
        let device = store.add_device("custom", NewDevice::named("Spare"), 1).unwrap();
        assert_eq!(device.status, DeviceStatus::Offline);
        let range = device.normal_power_range.unwrap();
        assert_eq!((range.min, range.max), (5.0, 10.0));
    }

    #[test]
    fn test_add_unknown_template() {
        let mut store = store();
        let err = store.add_device("sauna", NewDevice::named("Sauna"), 1).unwrap_err();
        assert!(matches!(
            err,
            PecoError::Validation(ValidationError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_fresh_ids_unique() {
        let mut store = store();
        let a = store.add_device("television", NewDevice::named("TV 2"), 5).unwrap().id.clone();
        let b = store.add_device("television", NewDevice::named("TV 3"), 5).unwrap().id.clone();
        assert_eq!(a, "user-5");
        assert_eq!(b, "user-6");
    }

    #[test]
    fn test_delete() {
        let mut store = store();
        let removed = store.delete_device("fan-1").unwrap();
        assert_eq!(removed.name, "Bedroom Ceiling Fan");
        assert!(store.get("fan-1").is_none());
        assert_eq!(store.len(), 9);
    }

    #[test]
    fn test_drift_offline_to_online() {
        let devices = vec![Device::new("pc", "PC").with_range(200.0, 450.0)];
        let mut store = DeviceStore::new(devices, DeviceConfig::default());
        // device 0, choices [Online, Idle] -> Online
        let mut rng = SequenceSource::new([0.0, 0.0]);
        let drift = store.drift(&mut rng).unwrap();
        assert_eq!(drift.from, DeviceStatus::Offline);
        assert_eq!(drift.to, DeviceStatus::Online);
        assert_eq!(store.get("pc").unwrap().power, 250.0);
    }

    #[test]
    fn test_drift_to_idle_stays_below_threshold() {
        let devices = vec![Device::new("pc", "PC").with_state(DeviceStatus::Online, 300.0)];
        let mut store = DeviceStore::new(devices, DeviceConfig::default());
        // choices [Offline, Idle] -> Idle, power draw near the top
        let mut rng = SequenceSource::new([0.0, 0.9, 0.999]);
        let drift = store.drift(&mut rng).unwrap();
        assert_eq!(drift.to, DeviceStatus::Idle);
        assert_eq!(drift.power, 19.0);
    }

    #[test]
    fn test_drift_keeps_power_status_invariant() {
        let mut store = store();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let drift = store.drift(&mut rng).unwrap();
            assert_ne!(drift.from, drift.to);
            for device in store.devices() {
                assert_eq!(device.power == 0.0, device.status == DeviceStatus::Offline);
                assert_eq!(
                    DeviceStatus::from_power(device.power, 20.0),
                    device.status,
                    "{:?}",
                    device
                );
            }
        }
    }

    #[test]
    fn test_drift_on_empty_store() {
        let mut store = DeviceStore::new(Vec::new(), DeviceConfig::default());
        assert!(store.drift(&mut SequenceSource::constant(0.3)).is_none());
    }
}
