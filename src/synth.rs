//! Synthetic household load generation.
//!
//! Produces the live window, its aligned forecast and the forward
//! projection from a dual-peak daily load curve plus uniform noise.

use crate::config::{LiveConfig, LoadComponent, LoadProfileConfig, PecoConfig};
use crate::random::RandomSource;
use crate::series::{round_to, DataPoint, LiveWindow};
use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use std::f64::consts::PI;

impl LoadComponent {
    /// Contribution of this bump at a given hour of day.
    pub fn evaluate(&self, hour: f64) -> f64 {
        self.amplitude * ((hour - self.center_hour) * (PI / self.half_period_hours)).sin()
    }
}

/// Generator for live, forecast and projected power curves.
#[derive(Debug, Clone)]
pub struct LoadSynthesizer {
    profile: LoadProfileConfig,
    live: LiveConfig,
    offset: FixedOffset,
}

impl LoadSynthesizer {
    /// Create a synthesizer from the master configuration.
    pub fn new(config: &PecoConfig) -> Self {
        Self {
            profile: config.load_profile.clone(),
            live: config.live.clone(),
            offset: config.offset(),
        }
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    fn sample_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.live.sample_interval_minutes))
    }

    /// Noise-free load (kW) for an hour of day.
    pub fn curve_at(&self, hour: u32) -> f64 {
        let h = f64::from(hour);
        self.profile.baseline_kw + self.profile.morning.evaluate(h) + self.profile.evening.evaluate(h)
    }

    /// One noisy sample for an hour of day, floored and rounded to 0.01 kW.
    fn sample_at<R: RandomSource + ?Sized>(&self, hour: u32, noise_width: f64, rng: &mut R) -> f64 {
        let noise = (rng.next_f64() - 0.5) * noise_width;
        let value = (self.curve_at(hour) + noise).max(self.profile.floor_kw);
        round_to(value, 2)
    }

    fn hour_of(&self, timestamp: DateTime<Utc>) -> u32 {
        timestamp.with_timezone(&self.offset).hour()
    }

    /// Fill a full window ending one interval before `now`.
    pub fn initial_window<R: RandomSource + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> LiveWindow {
        let step = self.sample_interval();
        let len = self.live.window_len;
        let start = now - step * len as i32;

        let mut window = LiveWindow::with_capacity(len);
        for i in 0..len {
            let timestamp = start + step * i as i32;
            let power = self.sample_at(self.hour_of(timestamp), self.profile.live_noise_kw, rng);
            window.push(DataPoint::actual(timestamp, &self.offset, power));
        }
        window
    }

    /// Append a sample for `now` and evict the oldest. Returns the evicted sample.
    pub fn tick<R: RandomSource + ?Sized>(
        &self,
        window: &mut LiveWindow,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<DataPoint> {
        let power = self.sample_at(self.hour_of(now), self.profile.live_noise_kw, rng);
        window.push(DataPoint::actual(now, &self.offset, power))
    }

    /// Forecast aligned by index with the live samples.
    ///
    /// Each actual value is perturbed by a relative jitter of
    /// `±forecast_jitter / 2`.
    pub fn forecast_for<'a, I, R>(&self, live: I, rng: &mut R) -> Vec<DataPoint>
    where
        I: IntoIterator<Item = &'a DataPoint>,
        R: RandomSource + ?Sized,
    {
        live.into_iter()
            .map(|point| {
                let variation = (rng.next_f64() - 0.5) * self.profile.forecast_jitter;
                let predicted = round_to(point.power * (1.0 + variation), 2);
                DataPoint {
                    timestamp: point.timestamp,
                    display_time: point.display_time.clone(),
                    power: 0.0,
                    forecast: Some(predicted),
                }
            })
            .collect()
    }

    /// Project the curve forward from `last_timestamp`, one interval apart.
    ///
    /// Pure simulation: no actual value is involved.
    pub fn future_forecast<R: RandomSource + ?Sized>(
        &self,
        last_timestamp: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<DataPoint> {
        let step = self.sample_interval();
        (1..=self.live.future_horizon)
            .map(|k| {
                let timestamp = last_timestamp + step * k as i32;
                let value =
                    self.sample_at(self.hour_of(timestamp), self.profile.future_noise_kw, rng);
                DataPoint::projected(timestamp, &self.offset, value)
            })
            .collect()
    }
}
