//! End-to-end checks across the synthesizer, the device store and the
//! reports.

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use peco::export::{parse_csv, to_csv_string, write_report};
use peco::report::{anomalies_in_range, anomalous_device_series, report_series, ReportSummary};
use peco::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ============================================================================
// Helper Functions
// ============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 18, 12, 0, 0).unwrap()
}

fn backfill(seed: u64) -> HistoricalBackfill {
    let config = PecoConfig::default();
    HistoricalBackfill::generate(
        &seed_devices(),
        now(),
        &config,
        &mut StdRng::seed_from_u64(seed),
    )
}

// ============================================================================
// Section 1: Live Window
// ============================================================================

#[test]
fn test_window_constant_length_over_a_day_of_ticks() {
    let config = PecoConfig::default();
    let synth = LoadSynthesizer::new(&config);
    let mut rng = StdRng::seed_from_u64(1);
    let mut window = synth.initial_window(now(), &mut rng);

    for i in 1..=17_280 {
        synth.tick(&mut window, now() + Duration::seconds(5 * i), &mut rng);
        assert_eq!(window.len(), 96);
    }
    assert!(window.iter().all(|p| p.power >= 0.5));
}

#[test]
fn test_forecast_accuracy_of_synthesized_forecast() {
    let config = PecoConfig::default();
    let synth = LoadSynthesizer::new(&config);
    let mut rng = StdRng::seed_from_u64(2);
    let window = synth.initial_window(now(), &mut rng);
    let forecast = synth.forecast_for(window.iter(), &mut rng);

    // Jitter is at most 10% per sample
    let accuracy = forecast_accuracy(&window.to_vec(), &forecast);
    assert!(accuracy >= 90.0 - 0.5 && accuracy <= 100.0, "{}", accuracy);
}

#[test]
fn test_live_statistics_match_summary() {
    let config = PecoConfig::default();
    let synth = LoadSynthesizer::new(&config);
    let window = synth.initial_window(now(), &mut StdRng::seed_from_u64(3));

    let stats = live_statistics(&window).unwrap();
    assert_eq!(stats.samples, 24);
    assert!(stats.lowest_kw <= stats.average_kw && stats.average_kw <= stats.peak_kw);

    let cards = SummaryCards::from_window(&window, &config.tariff);
    assert_eq!(cards.current_power_kw, window.latest().unwrap().power);
    assert_relative_eq!(
        cards.estimated_cost,
        cards.today_usage_kwh * 30.0,
        epsilon = 0.2
    );
}

// ============================================================================
// Section 2: History and Reports
// ============================================================================

#[test]
fn test_backfill_covers_ranged_devices() {
    let history = backfill(4);
    // every seeded device declares a range
    assert_eq!(history.per_device().len(), 10);
    assert!(history.per_device().values().all(|s| s.len() == 720));
    assert_eq!(history.total().len(), 720);

    let anomalies = history.anomalies();
    assert!(!anomalies.is_empty());
    assert!(anomalies.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[test]
fn test_report_ranges_shrink() {
    let history = backfill(5);
    let offset = PecoConfig::default().offset();

    let day = report_series(&history, TimeRange::Day, false, now(), &offset);
    let week = report_series(&history, TimeRange::Week, false, now(), &offset);
    let month = report_series(&history, TimeRange::Month, false, now(), &offset);

    assert_eq!(day.len(), 24);
    assert_eq!(week.len(), 168);
    assert_eq!(month.len(), 720);

    assert_eq!(aggregate(&day, TimeRange::Day, &offset).len(), 24);
    // 168 hours ending at noon touch 8 calendar days
    assert_eq!(aggregate(&week, TimeRange::Week, &offset).len(), 8);
}

#[test]
fn test_anomalous_only_series_sums_flagged_devices() {
    let history = backfill(6);
    let offset = PecoConfig::default().offset();
    let range = TimeRange::Week;

    let flagged = anomalies_in_range(history.anomalies(), range, now());
    let series = anomalous_device_series(&history, range, now(), &offset);
    let full = report_series(&history, range, false, now(), &offset);

    if flagged.is_empty() {
        assert!(series.is_empty());
    } else {
        assert_eq!(series.len(), full.len());
        for (subset, total) in series.iter().zip(&full) {
            assert_eq!(subset.timestamp, total.timestamp);
            assert!(subset.power <= total.power + 1e-6);
        }
    }
}

#[test]
fn test_peak_split_matches_summary_total() {
    let history = backfill(7);
    let config = PecoConfig::default();
    let offset = config.offset();
    let points = report_series(&history, TimeRange::Month, false, now(), &offset);

    let split = peak_split(&points, &offset, &config.tariff);
    let summary = ReportSummary::from_points(&points, &offset, &config.tariff);
    assert_relative_eq!(split.total(), summary.total_kwh, epsilon = 0.2);
    // 14 of 24 hours are peak hours
    assert!(split.peak > split.off_peak);
}

#[test]
fn test_export_roundtrip_of_aggregated_report() {
    let history = backfill(8);
    let offset = PecoConfig::default().offset();
    let points = report_series(&history, TimeRange::Month, false, now(), &offset);
    let buckets = aggregate(&points, TimeRange::Month, &offset);

    let parsed = parse_csv(&to_csv_string(&buckets).unwrap()).unwrap();
    assert_eq!(parsed, buckets);

    let dir = tempfile::tempdir().unwrap();
    let path = write_report(dir.path(), TimeRange::Month, &buckets).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.starts_with("Date/Time,Consumption (kWh)\n"));
    assert_eq!(text.lines().count(), buckets.len() + 1);
}

// ============================================================================
// Section 3: Devices and Notifications
// ============================================================================

#[test]
fn test_toggle_cycle_returns_to_offline() {
    let mut store = DeviceStore::seeded(DeviceConfig::default());
    assert_eq!(store.request_toggle("microwave-1").unwrap(), ToggleOutcome::TurnedOn);
    store.set_power("microwave-1", 5.0).unwrap();
    store.set_power("microwave-1", 1400.0).unwrap();
    assert_eq!(
        store.request_toggle("microwave-1").unwrap(),
        ToggleOutcome::ConfirmationRequired
    );
    store.confirm_turn_off("microwave-1").unwrap();

    let microwave = store.get("microwave-1").unwrap();
    assert_eq!(microwave.status, DeviceStatus::Offline);
    assert_eq!(microwave.power, 0.0);
}

#[test]
fn test_watcher_follows_store() {
    let mut store = DeviceStore::seeded(DeviceConfig::default());
    let mut watcher = StatusWatcher::new();
    assert!(watcher.observe(store.devices()).is_empty());

    store.set_power("fan-1", 12.0).unwrap();
    store.set_power("tv-1", 150.0).unwrap();
    let changes = watcher.observe(store.devices());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].message(), "Bedroom Ceiling Fan is now idle.");
}

#[test]
fn test_drift_notifications_expire() {
    let mut store = DeviceStore::seeded(DeviceConfig::default());
    let mut watcher = StatusWatcher::new();
    let mut center = NotificationCenter::new(std::time::Duration::from_millis(5000));
    let mut rng = StdRng::seed_from_u64(9);
    let start = tokio::time::Instant::now();

    watcher.observe(store.devices());
    for i in 0..5u64 {
        store.drift(&mut rng);
        let at = start + std::time::Duration::from_secs(10 * i);
        center.push_changes(&watcher.observe(store.devices()), at);
    }
    assert_eq!(center.active().len(), 5);

    let expired = center.expire(start + std::time::Duration::from_secs(25));
    assert_eq!(expired.len(), 3);
    assert_eq!(center.active().len(), 2);
}
