//! Derived reporting views.
//!
//! Everything here is a pure function of the live window, the historical
//! backfill and the tariff. Nothing is cached between calls.
//!
//! Historical samples are hourly watts, so one sample contributes
//! `W / 1000` kWh. Live samples are kW at 15-minute spacing, so one sample
//! contributes `kW / 4` kWh.

use crate::config::TariffConfig;
use crate::history::{sum_by_timestamp, Anomaly, HistoricalBackfill};
use crate::series::{round_to, DataPoint, LiveWindow};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// Live samples per hour.
const SAMPLES_PER_HOUR: f64 = 4.0;

/// Samples considered by [`live_statistics`].
pub const ANALYSIS_SAMPLES: usize = 24;

/// Actual power below this is skipped by [`forecast_accuracy`].
const ACCURACY_MIN_ACTUAL_KW: f64 = 0.1;

/// Headline figures of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryCards {
    /// Most recent live sample.
    pub current_power_kw: f64,
    /// Energy over the live window.
    pub today_usage_kwh: f64,
    /// `today_usage_kwh * rate`.
    pub estimated_cost: f64,
}

impl SummaryCards {
    pub fn from_window(window: &LiveWindow, tariff: &TariffConfig) -> Self {
        let current_power_kw = window.latest().map(|p| p.power).unwrap_or(0.0);
        let today_usage_kwh = window.iter().map(|p| p.power).sum::<f64>() / SAMPLES_PER_HOUR;
        Self {
            current_power_kw,
            today_usage_kwh: round_to(today_usage_kwh, 2),
            estimated_cost: round_to(today_usage_kwh * tariff.rate_per_kwh, 2),
        }
    }
}

/// Forecast accuracy in percent.
///
/// `100 * (1 - MAPE)` over the samples whose actual power exceeds 0.1 kW,
/// floored at 0. Empty or mismatched inputs give 0. No qualifying sample
/// gives 100.
pub fn forecast_accuracy(live: &[DataPoint], forecast: &[DataPoint]) -> f64 {
    if live.is_empty() || forecast.is_empty() || live.len() != forecast.len() {
        return 0.0;
    }

    let errors: Vec<f64> = live
        .iter()
        .zip(forecast)
        .filter(|(actual, _)| actual.power > ACCURACY_MIN_ACTUAL_KW)
        .map(|(actual, predicted)| {
            let predicted = predicted.forecast.unwrap_or(0.0);
            ((actual.power - predicted) / actual.power).abs()
        })
        .collect();

    if errors.is_empty() {
        return 100.0;
    }
    let mape = errors.iter().sum::<f64>() / errors.len() as f64;
    (100.0 * (1.0 - mape)).max(0.0)
}

/// Reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    Day,
    Week,
    Month,
}

impl TimeRange {
    pub const ALL: [TimeRange; 3] = [TimeRange::Day, TimeRange::Week, TimeRange::Month];

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            TimeRange::Day => 1,
            TimeRange::Week => 7,
            TimeRange::Month => 30,
        }
    }

    /// Oldest excluded instant: `now - days`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }

    /// `energy_report_<label>.csv`.
    pub fn file_name(&self) -> String {
        format!("energy_report_{}.csv", self.label())
    }

    /// Whether the range is reported hour by hour.
    pub fn is_hourly(&self) -> bool {
        matches!(self, TimeRange::Day)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|r| r.label() == s)
            .ok_or_else(|| format!("unknown time range: {}", s))
    }
}

/// Points strictly newer than the range cutoff.
pub fn filter_by_range(points: &[DataPoint], range: TimeRange, now: DateTime<Utc>) -> Vec<DataPoint> {
    let cutoff = range.cutoff(now);
    points
        .iter()
        .filter(|p| p.timestamp > cutoff)
        .cloned()
        .collect()
}

/// Anomalies strictly newer than the range cutoff, order preserved.
pub fn anomalies_in_range(anomalies: &[Anomaly], range: TimeRange, now: DateTime<Utc>) -> Vec<Anomaly> {
    let cutoff = range.cutoff(now);
    anomalies
        .iter()
        .filter(|a| a.timestamp > cutoff)
        .cloned()
        .collect()
}

/// In-range history summed over the devices that have at least one
/// anomaly in range.
pub fn anomalous_device_series(
    backfill: &HistoricalBackfill,
    range: TimeRange,
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> Vec<DataPoint> {
    let flagged: HashSet<String> = anomalies_in_range(backfill.anomalies(), range, now)
        .into_iter()
        .map(|a| a.device_id)
        .collect();

    let series: Vec<Vec<DataPoint>> = backfill
        .per_device()
        .iter()
        .filter(|(id, _)| flagged.contains(*id))
        .map(|(_, points)| filter_by_range(points, range, now))
        .collect();

    sum_by_timestamp(&series, offset)
}

/// The series a report is built from.
pub fn report_series(
    backfill: &HistoricalBackfill,
    range: TimeRange,
    anomalous_only: bool,
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> Vec<DataPoint> {
    if anomalous_only {
        anomalous_device_series(backfill, range, now, offset)
    } else {
        filter_by_range(backfill.total(), range, now)
    }
}

/// One bar of the consumption chart and one row of the CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionBucket {
    pub label: String,
    /// kWh, rounded to 0.1.
    pub consumption: f64,
}

impl ConsumptionBucket {
    pub fn new(label: impl Into<String>, consumption: f64) -> Self {
        Self {
            label: label.into(),
            consumption,
        }
    }
}

fn watts_to_kwh(watts: f64) -> f64 {
    watts / 1000.0
}

/// Bucket hourly watt samples into hourly (24h) or daily (7d, 30d) kWh,
/// in chronological order.
///
/// Hourly labels look like "Mon 3 PM", daily labels like "Oct 18".
pub fn aggregate(points: &[DataPoint], range: TimeRange, offset: &FixedOffset) -> Vec<ConsumptionBucket> {
    let format = if range.is_hourly() { "%a %-I %p" } else { "%b %-d" };

    // Keyed by the local bucket start so labels come out in time order.
    let mut buckets: BTreeMap<DateTime<FixedOffset>, f64> = BTreeMap::new();
    for point in points {
        let local = point.timestamp.with_timezone(offset);
        let start = if range.is_hourly() {
            local.with_minute(0).and_then(|t| t.with_second(0))
        } else {
            local
                .with_hour(0)
                .and_then(|t| t.with_minute(0))
                .and_then(|t| t.with_second(0))
        }
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(local);
        *buckets.entry(start).or_insert(0.0) += point.power;
    }

    buckets
        .into_iter()
        .map(|(start, watts)| {
            ConsumptionBucket::new(start.format(format).to_string(), round_to(watts_to_kwh(watts), 1))
        })
        .collect()
}

/// Energy inside and outside the peak tariff window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakSplit {
    /// kWh in `[peak_start_hour, peak_end_hour)`.
    pub peak: f64,
    /// kWh in every other hour.
    pub off_peak: f64,
}

impl PeakSplit {
    pub fn total(&self) -> f64 {
        self.peak + self.off_peak
    }

    /// Share of the peak bucket in percent. 0 for an empty split.
    pub fn peak_share(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            100.0 * self.peak / total
        } else {
            0.0
        }
    }
}

/// Split hourly watt samples by local hour of day.
pub fn peak_split(points: &[DataPoint], offset: &FixedOffset, tariff: &TariffConfig) -> PeakSplit {
    let (mut peak, mut off_peak) = (0.0, 0.0);
    for point in points {
        let hour = point.hour(offset);
        if hour >= tariff.peak_start_hour && hour < tariff.peak_end_hour {
            peak += point.power;
        } else {
            off_peak += point.power;
        }
    }
    PeakSplit {
        peak: round_to(watts_to_kwh(peak), 1),
        off_peak: round_to(watts_to_kwh(off_peak), 1),
    }
}

/// Headline figures of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_kwh: f64,
    /// Total divided by the number of distinct local days covered.
    pub avg_daily_kwh: f64,
    pub cost: f64,
    /// Highest single hourly draw, in kW.
    pub peak_kw: f64,
}

impl ReportSummary {
    /// Summarize hourly watt samples. An empty series gives all zeros.
    pub fn from_points(points: &[DataPoint], offset: &FixedOffset, tariff: &TariffConfig) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let total_kwh = watts_to_kwh(points.iter().map(|p| p.power).sum());
        let days: BTreeSet<NaiveDate> = points
            .iter()
            .map(|p| p.timestamp.with_timezone(offset).date_naive())
            .collect();
        let peak_w = points.iter().map(|p| p.power).fold(f64::MIN, f64::max);

        Self {
            total_kwh: round_to(total_kwh, 2),
            avg_daily_kwh: round_to(total_kwh / days.len() as f64, 2),
            cost: round_to(total_kwh * tariff.rate_per_kwh, 2),
            peak_kw: round_to(watts_to_kwh(peak_w), 3),
        }
    }
}

/// Statistics over the most recent live samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatistics {
    pub samples: usize,
    pub average_kw: f64,
    pub peak_kw: f64,
    pub peak_time: String,
    pub lowest_kw: f64,
    pub lowest_time: String,
    /// Energy covered by the samples.
    pub energy_kwh: f64,
}

/// Statistics over the last [`ANALYSIS_SAMPLES`] samples of the window.
/// `None` for an empty window.
pub fn live_statistics(window: &LiveWindow) -> Option<LiveStatistics> {
    let recent = window.tail(ANALYSIS_SAMPLES);
    let first = recent.first()?;

    let mut peak = first;
    let mut lowest = first;
    for point in &recent {
        if point.power > peak.power {
            peak = point;
        }
        if point.power < lowest.power {
            lowest = point;
        }
    }
    let sum: f64 = recent.iter().map(|p| p.power).sum();

    Some(LiveStatistics {
        samples: recent.len(),
        average_kw: round_to(sum / recent.len() as f64, 2),
        peak_kw: peak.power,
        peak_time: peak.display_time.clone(),
        lowest_kw: lowest.power,
        lowest_time: lowest.display_time.clone(),
        energy_kwh: round_to(sum / SAMPLES_PER_HOUR, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, day, hour, 0, 0).unwrap()
    }

    fn live(power: f64) -> DataPoint {
        DataPoint::actual(at(18, 12), &utc(), power)
    }

    fn predicted(forecast: f64) -> DataPoint {
        DataPoint::projected(at(18, 12), &utc(), forecast)
    }

    #[test]
    fn test_accuracy_perfect() {
        assert_relative_eq!(forecast_accuracy(&[live(1.0)], &[predicted(1.0)]), 100.0);
    }

    #[test]
    fn test_accuracy_full_error() {
        assert_relative_eq!(forecast_accuracy(&[live(1.0)], &[predicted(2.0)]), 0.0);
    }

    #[test]
    fn test_accuracy_floored_at_zero() {
        assert_relative_eq!(forecast_accuracy(&[live(1.0)], &[predicted(5.0)]), 0.0);
    }

    #[test]
    fn test_accuracy_empty_or_mismatched() {
        assert_eq!(forecast_accuracy(&[], &[]), 0.0);
        assert_eq!(forecast_accuracy(&[live(1.0)], &[]), 0.0);
        assert_eq!(
            forecast_accuracy(&[live(1.0), live(2.0)], &[predicted(1.0)]),
            0.0
        );
    }

    #[test]
    fn test_accuracy_no_qualifying_samples() {
        assert_eq!(forecast_accuracy(&[live(0.05)], &[predicted(3.0)]), 100.0);
    }

    #[test]
    fn test_accuracy_mixed() {
        let actual = [live(1.0), live(2.0), live(0.0)];
        let forecast = [predicted(1.1), predicted(1.8), predicted(9.0)];
        // errors 0.1 and 0.1, third sample skipped
        assert_relative_eq!(forecast_accuracy(&actual, &forecast), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_summary_cards() {
        let points = (0..4).map(|i| DataPoint::actual(at(18, i), &utc(), 2.0));
        let window = LiveWindow::from_points(96, points);
        let cards = SummaryCards::from_window(&window, &TariffConfig::default());
        assert_eq!(cards.current_power_kw, 2.0);
        assert_relative_eq!(cards.today_usage_kwh, 2.0);
        assert_relative_eq!(cards.estimated_cost, 60.0);
    }

    #[test]
    fn test_summary_cards_empty_window() {
        let cards = SummaryCards::from_window(&LiveWindow::with_capacity(96), &TariffConfig::default());
        assert_eq!(cards.current_power_kw, 0.0);
        assert_eq!(cards.estimated_cost, 0.0);
    }

    #[test]
    fn test_time_range_labels() {
        assert_eq!(TimeRange::Day.file_name(), "energy_report_24h.csv");
        assert_eq!("7d".parse::<TimeRange>().unwrap(), TimeRange::Week);
        assert!("1y".parse::<TimeRange>().is_err());
        assert_eq!(TimeRange::Month.to_string(), "30d");
    }

    #[test]
    fn test_filter_is_strictly_after_cutoff() {
        let now = at(18, 12);
        let points = vec![
            DataPoint::actual(at(17, 12), &utc(), 1.0),
            DataPoint::actual(at(17, 13), &utc(), 2.0),
        ];
        let kept = filter_by_range(&points, TimeRange::Day, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].power, 2.0);
    }

    #[test]
    fn test_aggregate_hourly_labels() {
        // 2025-10-20 is a Monday
        let points = vec![
            DataPoint::actual(at(20, 15), &utc(), 1500.0),
            DataPoint::actual(at(20, 16), &utc(), 250.0),
        ];
        let buckets = aggregate(&points, TimeRange::Day, &utc());
        assert_eq!(
            buckets,
            vec![
                ConsumptionBucket::new("Mon 3 PM", 1.5),
                ConsumptionBucket::new("Mon 4 PM", 0.3),
            ]
        );
    }

    #[test]
    fn test_aggregate_daily_in_order() {
        let points: Vec<DataPoint> = (0..48)
            .map(|h| {
                let ts = at(17, 0) + Duration::hours(h);
                DataPoint::actual(ts, &utc(), 1000.0)
            })
            .collect();
        let buckets = aggregate(&points, TimeRange::Week, &utc());
        assert_eq!(
            buckets,
            vec![
                ConsumptionBucket::new("Oct 17", 24.0),
                ConsumptionBucket::new("Oct 18", 24.0),
            ]
        );
    }

    #[test]
    fn test_aggregate_respects_offset() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let points = vec![DataPoint::actual(at(17, 23), &plus_two, 1000.0)];
        let buckets = aggregate(&points, TimeRange::Month, &plus_two);
        assert_eq!(buckets[0].label, "Oct 18");
    }

    #[test]
    fn test_peak_split_boundaries() {
        let points: Vec<DataPoint> = [6, 7, 20, 21]
            .iter()
            .map(|h| DataPoint::actual(at(18, *h), &utc(), 1000.0))
            .collect();
        let split = peak_split(&points, &utc(), &TariffConfig::default());
        assert_relative_eq!(split.peak, 2.0);
        assert_relative_eq!(split.off_peak, 2.0);
        assert_relative_eq!(split.peak_share(), 50.0);
    }

    #[test]
    fn test_report_summary() {
        let points: Vec<DataPoint> = (0..48)
            .map(|h| {
                let watts = if h == 30 { 3000.0 } else { 500.0 };
                DataPoint::actual(at(17, 0) + Duration::hours(h), &utc(), watts)
            })
            .collect();
        let summary = ReportSummary::from_points(&points, &utc(), &TariffConfig::default());
        assert_relative_eq!(summary.total_kwh, 26.5);
        assert_relative_eq!(summary.avg_daily_kwh, 13.25);
        assert_relative_eq!(summary.cost, 795.0);
        assert_relative_eq!(summary.peak_kw, 3.0);
        assert_eq!(
            ReportSummary::from_points(&[], &utc(), &TariffConfig::default()),
            ReportSummary::default()
        );
    }

    #[test]
    fn test_live_statistics_uses_last_samples() {
        let points = (0..30).map(|i| {
            let ts = at(18, 0) + Duration::minutes(15 * i);
            DataPoint::actual(ts, &utc(), if i == 3 { 9.0 } else { 1.0 + i as f64 / 100.0 })
        });
        let window = LiveWindow::from_points(96, points);
        let stats = live_statistics(&window).unwrap();

        assert_eq!(stats.samples, 24);
        // sample 3 has dropped out of the tail
        assert_relative_eq!(stats.peak_kw, 1.29);
        assert_eq!(stats.peak_time, "07:15");
        assert_relative_eq!(stats.lowest_kw, 1.06);
        assert_eq!(stats.lowest_time, "01:30");
        assert!(live_statistics(&LiveWindow::with_capacity(96)).is_none());
    }
}
