//! Dashboard runtime.
//!
//! [`DashboardState`] is the whole simulation as a plain value: no timers,
//! no channels. [`Dashboard::spawn`] moves it into a single tokio task that
//! drives the three timer kinds and applies user commands one at a time:
//!
//! - live tick (`live.tick_interval_ms`)
//! - device drift (`devices.drift_interval_ms`)
//! - notification expiry (earliest pending deadline)
//!
//! The task is the only owner of the state. Every processed event publishes
//! a fresh [`DashboardSnapshot`] on a `watch` channel.

use crate::catalog;
use crate::config::PecoConfig;
use crate::device::{Device, DeviceStatus};
use crate::error::{PecoError, Result};
use crate::history::HistoricalBackfill;
use crate::notify::{Notification, NotificationCenter, NotificationId, StatusWatcher, Tone};
use crate::random::RandomSource;
use crate::reconciler::{DeviceStore, NewDevice, ToggleOutcome};
use crate::report::{forecast_accuracy, SummaryCards};
use crate::series::{DataPoint, LiveWindow};
use crate::synth::LoadSynthesizer;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Pending commands buffered between the handle and the task.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Boxed random source owned by the running dashboard.
pub type BoxedRandom = Box<dyn RandomSource + Send>;

/// A user command with its reply channel.
#[derive(Debug)]
pub enum Command {
    RequestToggle {
        device_id: String,
        reply: oneshot::Sender<Result<ToggleOutcome>>,
    },
    ConfirmTurnOff {
        device_id: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    CancelTurnOff {
        device_id: String,
        reply: oneshot::Sender<bool>,
    },
    SetPower {
        device_id: String,
        power: f64,
        reply: oneshot::Sender<Result<DeviceStatus>>,
    },
    AddDevice {
        template_id: String,
        request: NewDevice,
        reply: oneshot::Sender<Result<Device>>,
    },
    DeleteDevice {
        device_id: String,
        reply: oneshot::Sender<Result<Device>>,
    },
    Dismiss {
        id: NotificationId,
        reply: oneshot::Sender<bool>,
    },
}

/// Everything a view needs to render one frame.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    /// Bumped on every published snapshot.
    pub version: u64,
    pub live: Vec<DataPoint>,
    pub forecast: Vec<DataPoint>,
    pub future: Vec<DataPoint>,
    pub devices: Vec<Device>,
    /// Devices whose turn-off awaits confirmation.
    pub awaiting_confirmation: Vec<String>,
    pub notifications: Vec<Notification>,
    pub summary: SummaryCards,
    pub accuracy: f64,
    pub history: Arc<HistoricalBackfill>,
}

/// The simulation without any runtime attached.
pub struct DashboardState {
    config: PecoConfig,
    synth: LoadSynthesizer,
    live: LiveWindow,
    forecast: Vec<DataPoint>,
    future: Vec<DataPoint>,
    store: DeviceStore,
    watcher: StatusWatcher,
    notifications: NotificationCenter,
    history: Arc<HistoricalBackfill>,
    rng: BoxedRandom,
    version: u64,
}

impl DashboardState {
    /// Seed the devices, fill the live window and generate the history.
    pub fn new(config: PecoConfig, mut rng: BoxedRandom, now: DateTime<Utc>) -> Result<Self> {
        config.validate()?;

        let synth = LoadSynthesizer::new(&config);
        let store = DeviceStore::seeded(config.devices.clone());
        let live = synth.initial_window(now, rng.as_mut());
        let history = HistoricalBackfill::generate(store.devices(), now, &config, rng.as_mut());
        let notifications =
            NotificationCenter::new(Duration::from_millis(config.notifications.ttl_ms));

        let mut watcher = StatusWatcher::new();
        watcher.observe(store.devices());

        let mut state = Self {
            config,
            synth,
            live,
            forecast: Vec::new(),
            future: Vec::new(),
            store,
            watcher,
            notifications,
            history: Arc::new(history),
            rng,
            version: 0,
        };
        state.refresh_projections();
        Ok(state)
    }

    fn refresh_projections(&mut self) {
        self.forecast = self.synth.forecast_for(self.live.iter(), self.rng.as_mut());
        self.future = match self.live.latest() {
            Some(last) => self.synth.future_forecast(last.timestamp, self.rng.as_mut()),
            None => Vec::new(),
        };
    }

    /// Diff the devices against the previous pass and notify changes.
    fn reconcile(&mut self, now: Instant) {
        let changes = self.watcher.observe(self.store.devices());
        self.notifications.push_changes(&changes, now);
    }

    pub fn config(&self) -> &PecoConfig {
        &self.config
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    pub fn live(&self) -> &LiveWindow {
        &self.live
    }

    pub fn history(&self) -> &HistoricalBackfill {
        &self.history
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Append a live sample for `now` and recompute both forecasts.
    pub fn on_live_tick(&mut self, now: DateTime<Utc>) {
        self.synth.tick(&mut self.live, now, self.rng.as_mut());
        self.refresh_projections();
        debug!(
            "Live tick: {:?} kW",
            self.live.latest().map(|p| p.power).unwrap_or(0.0)
        );
    }

    /// Apply one random device drift.
    pub fn on_drift(&mut self, now: Instant) {
        self.store.drift(self.rng.as_mut());
        self.reconcile(now);
    }

    /// Drop notifications whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<Notification> {
        self.notifications.expire(now)
    }

    /// Earliest notification deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.notifications.next_deadline()
    }

    pub fn request_toggle(&mut self, device_id: &str, now: Instant) -> Result<ToggleOutcome> {
        let outcome = self.store.request_toggle(device_id)?;
        self.reconcile(now);
        Ok(outcome)
    }

    pub fn confirm_turn_off(&mut self, device_id: &str, now: Instant) -> Result<bool> {
        let applied = self.store.confirm_turn_off(device_id)?;
        self.reconcile(now);
        Ok(applied)
    }

    pub fn cancel_turn_off(&mut self, device_id: &str) -> bool {
        self.store.cancel_turn_off(device_id)
    }

    pub fn set_power(&mut self, device_id: &str, power: f64, now: Instant) -> Result<DeviceStatus> {
        let status = self.store.set_power(device_id, power)?;
        self.reconcile(now);
        Ok(status)
    }

    pub fn add_device(
        &mut self,
        template_id: &str,
        request: NewDevice,
        now: Instant,
        now_ms: i64,
    ) -> Result<Device> {
        let device = self.store.add_device(template_id, request, now_ms)?.clone();
        self.notifications
            .push(format!("{} has been added.", device.name), Tone::Success, now);
        self.reconcile(now);
        Ok(device)
    }

    pub fn delete_device(&mut self, device_id: &str, now: Instant) -> Result<Device> {
        let removed = self.store.delete_device(device_id)?;
        self.notifications
            .push(format!("{} has been removed.", removed.name), Tone::Info, now);
        self.reconcile(now);
        Ok(removed)
    }

    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        self.notifications.dismiss(id)
    }

    /// Run a command and send its reply. A dropped reply channel is ignored.
    pub fn apply(&mut self, command: Command, now: Instant) {
        match command {
            Command::RequestToggle { device_id, reply } => {
                let result = self.request_toggle(&device_id, now);
                let _ = reply.send(log_rejection("toggle", &device_id, result));
            }
            Command::ConfirmTurnOff { device_id, reply } => {
                let result = self.confirm_turn_off(&device_id, now);
                let _ = reply.send(log_rejection("confirm turn-off", &device_id, result));
            }
            Command::CancelTurnOff { device_id, reply } => {
                let _ = reply.send(self.cancel_turn_off(&device_id));
            }
            Command::SetPower {
                device_id,
                power,
                reply,
            } => {
                let result = self.set_power(&device_id, power, now);
                let _ = reply.send(log_rejection("set power", &device_id, result));
            }
            Command::AddDevice {
                template_id,
                request,
                reply,
            } => {
                let now_ms = Utc::now().timestamp_millis();
                let result = self.add_device(&template_id, request, now, now_ms);
                let _ = reply.send(log_rejection("add device", &template_id, result));
            }
            Command::DeleteDevice { device_id, reply } => {
                let result = self.delete_device(&device_id, now);
                let _ = reply.send(log_rejection("delete device", &device_id, result));
            }
            Command::Dismiss { id, reply } => {
                let _ = reply.send(self.dismiss(id));
            }
        }
    }

    /// Current view of the dashboard. Bumps the version.
    pub fn snapshot(&mut self) -> DashboardSnapshot {
        self.version += 1;
        let live = self.live.to_vec();
        let devices = self.store.devices().to_vec();
        let awaiting_confirmation = devices
            .iter()
            .filter(|d| self.store.is_awaiting_confirmation(&d.id))
            .map(|d| d.id.clone())
            .collect();

        DashboardSnapshot {
            version: self.version,
            accuracy: forecast_accuracy(&live, &self.forecast),
            summary: SummaryCards::from_window(&self.live, &self.config.tariff),
            live,
            forecast: self.forecast.clone(),
            future: self.future.clone(),
            devices,
            awaiting_confirmation,
            notifications: self.notifications.active().to_vec(),
            history: Arc::clone(&self.history),
        }
    }

    /// Cancel every pending notification timer.
    pub fn teardown(&mut self) {
        self.notifications.clear();
    }
}

fn log_rejection<T>(action: &str, target: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!("Rejected {} for {}: {}", action, target, e);
    }
    result
}

/// Entry point for running the dashboard on the current tokio runtime.
pub struct Dashboard;

impl Dashboard {
    /// Build the state and spawn its task. Must be called inside a runtime.
    pub fn spawn(config: PecoConfig, rng: BoxedRandom) -> Result<DashboardHandle> {
        let state = DashboardState::new(config, rng, Utc::now())?;
        Ok(Self::spawn_with_state(state))
    }

    /// Spawn a task around an existing state.
    pub fn spawn_with_state(mut state: DashboardState) -> DashboardHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());
        let shutdown = Arc::new(Notify::new());

        let task = tokio::spawn(run(state, command_rx, snapshot_tx, Arc::clone(&shutdown)));

        DashboardHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            shutdown,
            task: Some(task),
        }
    }
}

async fn run(
    mut state: DashboardState,
    mut commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<DashboardSnapshot>,
    shutdown: Arc<Notify>,
) {
    let tick_period = Duration::from_millis(state.config.live.tick_interval_ms);
    let drift_period = Duration::from_millis(state.config.devices.drift_interval_ms);
    let start = Instant::now();

    let mut live = interval_at(start + tick_period, tick_period);
    live.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut drift = interval_at(start + drift_period, drift_period);
    drift.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Dashboard started: tick={:?}, drift={:?}, devices={}",
        tick_period,
        drift_period,
        state.store.len()
    );

    loop {
        let deadline = state.next_deadline();

        tokio::select! {
            biased;

            _ = shutdown.notified() => break,

            command = commands.recv() => match command {
                Some(command) => state.apply(command, Instant::now()),
                None => break,
            },

            _ = sleep_until(deadline.unwrap_or(start)), if deadline.is_some() => {
                let expired = state.expire(Instant::now());
                debug!("Expired {} notifications", expired.len());
            }

            _ = live.tick() => state.on_live_tick(Utc::now()),

            _ = drift.tick() => state.on_drift(Instant::now()),
        }

        snapshots.send_replace(state.snapshot());
    }

    state.teardown();
    snapshots.send_replace(state.snapshot());
    info!("Dashboard stopped");
}

/// Client side of a running dashboard.
#[derive(Debug)]
pub struct DashboardHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<DashboardSnapshot>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl DashboardHandle {
    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| PecoError::EngineClosed)?;
        reply_rx.await.map_err(|_| PecoError::EngineClosed)
    }

    pub async fn request_toggle(&self, device_id: &str) -> Result<ToggleOutcome> {
        let device_id = device_id.to_string();
        self.call(|reply| Command::RequestToggle { device_id, reply })
            .await?
    }

    pub async fn confirm_turn_off(&self, device_id: &str) -> Result<bool> {
        let device_id = device_id.to_string();
        self.call(|reply| Command::ConfirmTurnOff { device_id, reply })
            .await?
    }

    pub async fn cancel_turn_off(&self, device_id: &str) -> Result<bool> {
        let device_id = device_id.to_string();
        self.call(|reply| Command::CancelTurnOff { device_id, reply })
            .await
    }

    pub async fn set_power(&self, device_id: &str, power: f64) -> Result<DeviceStatus> {
        let device_id = device_id.to_string();
        self.call(|reply| Command::SetPower {
            device_id,
            power,
            reply,
        })
        .await?
    }

    pub async fn add_device(&self, template_id: &str, request: NewDevice) -> Result<Device> {
        let template_id = template_id.to_string();
        self.call(|reply| Command::AddDevice {
            template_id,
            request,
            reply,
        })
        .await?
    }

    pub async fn delete_device(&self, device_id: &str) -> Result<Device> {
        let device_id = device_id.to_string();
        self.call(|reply| Command::DeleteDevice { device_id, reply })
            .await?
    }

    pub async fn dismiss(&self, id: NotificationId) -> Result<bool> {
        self.call(|reply| Command::Dismiss { id, reply }).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.clone()
    }

    /// Templates offered by `add_device`.
    pub fn templates(&self) -> Vec<catalog::DeviceTemplate> {
        catalog::templates()
    }

    /// Static savings suggestions.
    pub fn recommendations(&self) -> Vec<catalog::Recommendation> {
        catalog::recommendations()
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop every timer and wait for the task to exit. Later commands fail
    /// with [`PecoError::EngineClosed`].
    pub async fn shutdown(&mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Dashboard task failed: {}", e);
            }
        }
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.shutdown.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SequenceSource;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state() -> DashboardState {
        let now = Utc.with_ymd_and_hms(2025, 10, 18, 12, 0, 0).unwrap();
        DashboardState::new(
            PecoConfig::default(),
            Box::new(StdRng::seed_from_u64(7)),
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let mut state = state();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.live.len(), 96);
        assert_eq!(snapshot.forecast.len(), 96);
        assert_eq!(snapshot.future.len(), 96);
        assert_eq!(snapshot.devices.len(), 10);
        assert!(snapshot.notifications.is_empty());
        assert_eq!(snapshot.history.total().len(), 720);
    }

    #[test]
    fn test_live_tick_keeps_window_length() {
        let mut state = state();
        let first = state.live().oldest().unwrap().timestamp;
        let now = Utc.with_ymd_and_hms(2025, 10, 18, 12, 0, 5).unwrap();
        state.on_live_tick(now);
        assert_eq!(state.live().len(), 96);
        assert_eq!(state.live().latest().unwrap().timestamp, now);
        assert_ne!(state.live().oldest().unwrap().timestamp, first);
    }

    #[test]
    fn test_drift_emits_one_notification() {
        let mut state = state();
        let now = Instant::now();
        state.on_drift(now);
        assert_eq!(state.notifications().active().len(), 1);
        assert!(state.expire(now + Duration::from_millis(5000)).len() == 1);
    }

    #[test]
    fn test_toggle_notifies_through_watcher() {
        let mut state = state();
        let now = Instant::now();
        state.request_toggle("pc-1", now).unwrap();
        let active = state.notifications().active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "Main Computer is now online.");
        assert_eq!(active[0].tone, Tone::Success);

        // pending confirmation alone changes nothing
        state.request_toggle("pc-1", now).unwrap();
        assert_eq!(state.notifications().active().len(), 1);
        state.confirm_turn_off("pc-1", now).unwrap();
        assert_eq!(
            state.notifications().active()[1].message,
            "Main Computer went offline."
        );
    }

    #[test]
    fn test_add_and_delete_notify() {
        let mut state = state();
        let now = Instant::now();
        let device = state
            .add_device("custom", NewDevice::named("Kettle").with_power(2000.0), now, 42)
            .unwrap();
        assert_eq!(device.id, "user-42");
        state.delete_device("user-42", now).unwrap();

        let messages: Vec<_> = state
            .notifications()
            .active()
            .iter()
            .map(|n| (n.message.as_str(), n.tone))
            .collect();
        assert_eq!(
            messages,
            vec![
                ("Kettle has been added.", Tone::Success),
                ("Kettle has been removed.", Tone::Info),
            ]
        );
    }

    #[test]
    fn test_rejected_command_changes_nothing() {
        let mut state = state();
        let (tx, mut rx) = oneshot::channel();
        state.apply(
            Command::AddDevice {
                template_id: "custom".into(),
                request: NewDevice::named(" "),
                reply: tx,
            },
            Instant::now(),
        );
        assert!(matches!(rx.try_recv().unwrap(), Err(PecoError::Validation(_))));
        assert_eq!(state.store().len(), 10);
        assert!(state.notifications().is_empty());
    }

    #[test]
    fn test_teardown_clears_timers() {
        let mut state = DashboardState::new(
            PecoConfig::default(),
            Box::new(SequenceSource::new([0.1, 0.7, 0.3])),
            Utc::now(),
        )
        .unwrap();
        state.on_drift(Instant::now());
        assert!(state.next_deadline().is_some());
        state.teardown();
        assert!(state.next_deadline().is_none());
    }
}
