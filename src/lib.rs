//! # PECO - Home Energy Simulation Core
//!
//! The engine behind a home energy dashboard: synthetic power curves,
//! device state with status notifications, and derived reports.
//!
//! ## Key Features
//!
//! - **Live Synthesis**: Dual-peak household load curve on a sliding 24 h window
//! - **Historical Backfill**: 30 days of per-device history with injected anomalies
//! - **Device Reconciler**: Toggle, power, add, delete and random drift with a consistent status rule
//! - **Notifications**: Snapshot diffing with auto-dismiss deadlines
//! - **Reports**: Accuracy, peak split, hourly/daily aggregation and CSV export
//!
//! ## Quick Start
//!
//! ```rust
//! use peco::{DeviceStatus, DeviceStore, LoadSynthesizer, PecoConfig, ToggleOutcome};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let config = PecoConfig::default();
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! // Fill the live window
//! let synth = LoadSynthesizer::new(&config);
//! let window = synth.initial_window(chrono::Utc::now(), &mut rng);
//! assert_eq!(window.len(), 96);
//!
//! // Switch a device on
//! let mut store = DeviceStore::seeded(config.devices.clone());
//! assert_eq!(store.request_toggle("pc-1").unwrap(), ToggleOutcome::TurnedOn);
//! assert_eq!(store.get("pc-1").unwrap().status, DeviceStatus::Online);
//! ```
//!
//! ## Modules
//!
//! - [`synth`]: Live window, aligned forecast and forward projection
//! - [`history`]: Historical backfill and anomaly records
//! - [`reconciler`]: Device store and its transitions
//! - [`notify`]: Status watcher and notification center
//! - [`report`]: Derived statistics and aggregation
//! - [`export`]: CSV report files
//! - [`engine`]: Async runtime driving the timers

// Modules
pub mod catalog;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod export;
pub mod history;
pub mod notify;
pub mod random;
pub mod reconciler;
pub mod report;
pub mod series;
pub mod synth;

// Re-exports for convenient access
pub use catalog::{
    find_template, recommendations, seed_devices, templates, DeviceBlueprint, DeviceTemplate,
    Recommendation,
};
pub use config::{
    DeviceConfig, HistoryConfig, LiveConfig, LoadComponent, LoadProfileConfig, NotificationConfig,
    PecoConfig, TariffConfig,
};
pub use device::{Device, DeviceStatus, PowerRange, UsageHealth};
pub use engine::{Command, Dashboard, DashboardHandle, DashboardSnapshot, DashboardState};
pub use error::{PecoError, Result, ValidationError};
pub use history::{classify_sample, Anomaly, AnomalyKind, HistoricalBackfill};
pub use notify::{Notification, NotificationCenter, NotificationId, StatusChange, StatusWatcher, Tone};
pub use random::{RandomSource, SequenceSource};
pub use reconciler::{DeviceStore, Drift, NewDevice, ToggleOutcome};
pub use report::{
    aggregate, forecast_accuracy, live_statistics, peak_split, ConsumptionBucket, LiveStatistics,
    PeakSplit, ReportSummary, SummaryCards, TimeRange,
};
pub use series::{DataPoint, LiveWindow};
pub use synth::LoadSynthesizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
