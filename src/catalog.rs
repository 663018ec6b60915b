//! Static device catalogs.
//!
//! - [`seed_devices`]: the household present at startup
//! - [`templates`]: blueprints offered when the user adds a device
//! - [`recommendations`]: static savings suggestions

use crate::device::{Device, DeviceStatus, PowerRange};
use serde::{Deserialize, Serialize};

/// Id of the free-form template.
pub const CUSTOM_TEMPLATE_ID: &str = "custom";

/// Default profile of a new device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceBlueprint {
    /// Name used when the user leaves the name blank. May be empty.
    pub name: String,
    pub status: DeviceStatus,
    pub power: f64,
    pub is_adjustable: bool,
    pub max_power: Option<f64>,
    pub normal_power_range: Option<PowerRange>,
    pub tips: Vec<String>,
}

/// Catalog entry for adding a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceTemplate {
    pub id: String,
    pub label: String,
    pub description: String,
    pub blueprint: DeviceBlueprint,
}

impl DeviceTemplate {
    pub fn is_custom(&self) -> bool {
        self.id == CUSTOM_TEMPLATE_ID
    }
}

#[allow(clippy::too_many_arguments)]
fn template(
    id: &str,
    label: &str,
    description: &str,
    status: DeviceStatus,
    power: f64,
    max_power: Option<f64>,
    range: Option<(f64, f64)>,
    tips: &[&str],
) -> DeviceTemplate {
    DeviceTemplate {
        id: id.to_string(),
        label: label.to_string(),
        description: description.to_string(),
        blueprint: DeviceBlueprint {
            name: label.to_string(),
            status,
            power,
            is_adjustable: max_power.is_some(),
            max_power,
            normal_power_range: range.map(|(min, max)| PowerRange::new(min, max)),
            tips: tips.iter().map(|t| t.to_string()).collect(),
        },
    }
}

/// Templates available to `add_device`, custom last.
pub fn templates() -> Vec<DeviceTemplate> {
    vec![
        template(
            "air-conditioner",
            "Air Conditioner",
            "Split or window unit with adjustable cooling power.",
            DeviceStatus::Online,
            1800.0,
            Some(3500.0),
            Some((1500.0, 2200.0)),
            &[
                "Hold the setpoint at 24°C or above.",
                "Clean the filters every month.",
            ],
        ),
        template(
            "refrigerator",
            "Refrigerator",
            "Always-on cold storage with compressor cycles.",
            DeviceStatus::Online,
            250.0,
            None,
            Some((150.0, 300.0)),
            &[
                "Check the door gasket for leaks.",
                "Let food cool before storing it.",
            ],
        ),
        template(
            "led-lighting",
            "LED Lighting",
            "Dimmable lighting circuit.",
            DeviceStatus::Online,
            100.0,
            Some(150.0),
            Some((80.0, 120.0)),
            &["Prefer task lighting to whole-room lighting."],
        ),
        template(
            "television",
            "Television",
            "Display with noticeable standby draw.",
            DeviceStatus::Offline,
            0.0,
            None,
            Some((120.0, 220.0)),
            &["Switch off the set-top box together with the TV."],
        ),
        template(
            "washing-machine",
            "Washing Machine",
            "High draw during heating and spin cycles.",
            DeviceStatus::Offline,
            0.0,
            None,
            Some((500.0, 1500.0)),
            &["Run full loads in eco mode during off-peak hours."],
        ),
        DeviceTemplate {
            id: CUSTOM_TEMPLATE_ID.to_string(),
            label: "Custom Device".to_string(),
            description: "Any appliance; power and limits are entered by hand.".to_string(),
            blueprint: DeviceBlueprint {
                name: String::new(),
                status: DeviceStatus::Offline,
                power: 0.0,
                is_adjustable: false,
                max_power: None,
                normal_power_range: None,
                tips: Vec::new(),
            },
        },
    ]
}

/// Find a template by id.
pub fn find_template(id: &str) -> Option<DeviceTemplate> {
    templates().into_iter().find(|t| t.id == id)
}

/// Devices present when the dashboard starts.
pub fn seed_devices() -> Vec<Device> {
    vec![
        Device::new("ac-1", "Living Room AC")
            .with_state(DeviceStatus::Online, 1800.0)
            .adjustable(3500.0)
            .with_range(1500.0, 2200.0)
            .with_tips([
                "Raise the thermostat to 24°C.",
                "Clean the filters monthly.",
                "Run a fan to spread the cool air.",
            ]),
        Device::new("fridge-1", "Kitchen Refrigerator")
            .with_state(DeviceStatus::Online, 250.0)
            .with_range(150.0, 300.0)
            .with_tips([
                "Keep the door seals clean and tight.",
                "Do not put hot food inside.",
            ]),
        Device::new("light-1", "Office Lights")
            .with_state(DeviceStatus::Idle, 10.0)
            .adjustable(150.0)
            .with_range(80.0, 120.0)
            .with_tips(["Use LED bulbs.", "Turn lights off when leaving the room."]),
        Device::new("pc-1", "Main Computer")
            .with_range(200.0, 450.0)
            .with_tips(["Use sleep mode when away.", "Pick a power saver plan."]),
        Device::new("fan-1", "Bedroom Ceiling Fan")
            .with_state(DeviceStatus::Online, 25.0)
            .adjustable(90.0)
            .with_range(25.0, 75.0)
            .with_tips(["Medium speed overnight keeps the draw low."]),
        Device::new("washer-1", "Laundry Washer")
            .with_range(500.0, 1500.0)
            .with_tips(["Schedule cycles in off-peak windows."]),
        Device::new("heater-1", "Water Heater")
            .with_state(DeviceStatus::Online, 1300.0)
            .with_range(900.0, 2400.0)
            .with_tips(["Lower the setpoint in summer.", "Flush the tank quarterly."]),
        Device::new("tv-1", "Living Room TV")
            .with_state(DeviceStatus::Online, 180.0)
            .with_range(120.0, 220.0)
            .with_tips(["Enable auto-brightness."]),
        Device::new("router-1", "Wi-Fi Router")
            .with_state(DeviceStatus::Online, 20.0)
            .with_range(10.0, 25.0)
            .with_tips(["Keep the router in an open, ventilated spot."]),
        Device::new("microwave-1", "Kitchen Microwave")
            .with_range(800.0, 1500.0)
            .with_tips(["Unplug it to avoid phantom draw."]),
    ]
}

/// A savings suggestion shown next to the device list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Display text, currency included.
    pub estimated_savings: String,
}

/// Suggestions present at startup.
pub fn recommendations() -> Vec<Recommendation> {
    [
        (
            "1",
            "Shift AC Usage",
            "Run your AC during off-peak hours (after 10 PM) to save on tariff costs.",
            "PKR 4,200/month",
        ),
        (
            "2",
            "Upgrade Refrigerator",
            "Your refrigerator model is consuming 25% more than average. Consider an upgrade.",
            "PKR 2,200/month",
        ),
        (
            "3",
            "Unplug Idle Devices",
            "The entertainment center shows a constant standby power draw of 50W.",
            "PKR 1,400/month",
        ),
    ]
    .into_iter()
    .map(|(id, title, description, savings)| Recommendation {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        estimated_savings: savings.to_string(),
    })
    .collect()
}
