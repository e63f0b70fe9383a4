use super::ExponentialMovingAverage;
use crate::config::{ClockConfig, OrderingPolicy, SyncConfig};

const MIN_TIME_SCALE: f64 = 0.5;
const MAX_TIME_SCALE: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClockError {
    #[error("remote time {received} is not newer than latest remote time {latest}")]
    OutOfOrder { latest: f64, received: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Applied,
    HardReset,
    Dropped,
}

/// Local clock that follows a remote clock by speeding up or slowing down, so
/// interpolation never runs out of snapshots and never visibly jumps.
#[derive(Debug, Clone)]
pub struct ClockSynchronizer {
    initialized: bool,
    local_time: f64,
    time_scale: f64,
    latest_remote_time: f64,
    diff_average: ExponentialMovingAverage,
    positive_threshold: f64,
    negative_threshold: f64,
    scale_modifier: f64,
    skip_ahead_threshold: f64,
    interpolation_delay: f64,
    ordering: OrderingPolicy,
}

impl ClockSynchronizer {
    pub fn new(tick_interval: f64, interpolation_delay_ticks: f64, config: &ClockConfig) -> Self {
        let positive_threshold = tick_interval * config.diff_threshold;
        Self {
            initialized: false,
            local_time: 0.0,
            time_scale: 1.0,
            latest_remote_time: 0.0,
            diff_average: ExponentialMovingAverage::new(config.moving_average_count),
            positive_threshold,
            negative_threshold: -positive_threshold,
            scale_modifier: config.time_scale_modifier,
            skip_ahead_threshold: tick_interval * config.skip_ahead_ticks,
            interpolation_delay: tick_interval * interpolation_delay_ticks,
            ordering: config.ordering,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.sync_interval_secs, config.interpolation_delay_ticks, &config.clock)
    }

    pub fn advance(&mut self, dt: f64) {
        self.local_time += dt * self.time_scale;
    }

    /// True for samples `on_remote_sample` would not apply, duplicates included.
    pub fn is_out_of_order(&self, remote_time: f64) -> bool {
        self.initialized && remote_time <= self.latest_remote_time
    }

    pub fn on_remote_sample(&mut self, remote_time: f64) -> Result<SampleOutcome, ClockError> {
        if !self.initialized {
            self.hard_reset(remote_time);
            return Ok(SampleOutcome::HardReset);
        }

        let diff = remote_time - self.local_time;
        if diff > self.skip_ahead_threshold {
            log::warn!(
                "Fell behind remote clock, skipping ahead. remote: {remote_time:.3}, diff: {diff:.3}"
            );
            self.hard_reset(remote_time);
            return Ok(SampleOutcome::HardReset);
        }

        if remote_time <= self.latest_remote_time {
            return match self.ordering {
                OrderingPolicy::Strict => Err(ClockError::OutOfOrder {
                    latest: self.latest_remote_time,
                    received: remote_time,
                }),
                OrderingPolicy::Drop => {
                    log::debug!(
                        "Dropping stale clock sample {remote_time:.4} (latest {:.4})",
                        self.latest_remote_time
                    );
                    Ok(SampleOutcome::Dropped)
                }
            };
        }

        self.diff_average.add(diff);
        self.time_scale =
            self.scale_for(self.diff_average.value()).clamp(MIN_TIME_SCALE, MAX_TIME_SCALE);
        self.latest_remote_time = remote_time;

        log::trace!(
            "remote: {remote_time:.3}, local: {:.3}, diff: {:.1}ms, avg: {:.1}ms, scale: {}",
            self.local_time,
            diff * 1000.0,
            self.diff_average.value() * 1000.0,
            self.time_scale
        );

        Ok(SampleOutcome::Applied)
    }

    fn scale_for(&self, average_diff: f64) -> f64 {
        let m = self.scale_modifier;
        if average_diff > self.positive_threshold * 10.0 {
            1.0 + m * 8.0
        } else if average_diff > self.positive_threshold {
            1.0 + m
        } else if average_diff < self.negative_threshold * 10.0 {
            1.0 - m * 20.0
        } else if average_diff < self.negative_threshold {
            1.0 - m * 4.0
        } else {
            1.0
        }
    }

    fn hard_reset(&mut self, remote_time: f64) {
        self.local_time = remote_time;
        self.latest_remote_time = remote_time;
        self.time_scale = 1.0;
        self.diff_average.reset();
        self.initialized = true;
    }

    pub fn reset(&mut self) {
        self.initialized = false;
        self.latest_remote_time = 0.0;
    }

    /// Time to query snapshot buffers at.
    pub fn time(&self) -> f64 {
        self.local_time - self.interpolation_delay
    }

    pub fn local_time(&self) -> f64 {
        self.local_time
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn latest_remote_time(&self) -> f64 {
        self.latest_remote_time
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn average_diff(&self) -> f64 {
        self.diff_average.value()
    }

    pub fn interpolation_delay(&self) -> f64 {
        self.interpolation_delay
    }

    pub fn set_interpolation_delay(&mut self, delay: f64) {
        self.interpolation_delay = delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: f64 = 0.05;

    fn clock() -> ClockSynchronizer {
        ClockSynchronizer::new(INTERVAL, 2.0, &ClockConfig::default())
    }

    #[test]
    fn first_sample_initializes() {
        let mut clock = clock();
        assert_eq!(clock.on_remote_sample(10.0), Ok(SampleOutcome::HardReset));
        assert_eq!(clock.local_time(), 10.0);
        assert!((clock.time() - 9.9).abs() < 1e-9);
        assert_eq!(clock.time_scale(), 1.0);
    }

    #[test]
    fn falling_far_behind_resyncs() {
        let mut clock = clock();
        clock.on_remote_sample(1.0).unwrap();
        clock.advance(0.05);
        assert_eq!(clock.on_remote_sample(1.05), Ok(SampleOutcome::Applied));

        let outcome = clock.on_remote_sample(1.05 + 20.0 * INTERVAL + 0.5).unwrap();
        assert_eq!(outcome, SampleOutcome::HardReset);
        assert!((clock.local_time() - 2.55).abs() < 1e-9);
        assert_eq!(clock.time_scale(), 1.0);
    }

    #[test]
    fn speeds_up_when_behind_and_slows_when_ahead() {
        let mut clock = clock();
        clock.on_remote_sample(0.0).unwrap();
        // remote 0.1 ahead: more than 10 * 0.025 is not reached, so mild speed-up
        clock.on_remote_sample(0.1).unwrap();
        assert!((clock.time_scale() - 1.01).abs() < 1e-6);

        let mut clock = self::clock();
        clock.on_remote_sample(0.0).unwrap();
        clock.advance(1.0);
        clock.on_remote_sample(0.5).unwrap();
        assert!((clock.time_scale() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn ordering_policies() {
        let mut dropping = clock();
        dropping.on_remote_sample(5.0).unwrap();
        dropping.on_remote_sample(5.05).unwrap();
        assert!(dropping.is_out_of_order(5.0));
        assert!(dropping.is_out_of_order(5.05));
        assert!(!dropping.is_out_of_order(5.1));
        assert_eq!(dropping.on_remote_sample(5.0), Ok(SampleOutcome::Dropped));
        assert_eq!(dropping.latest_remote_time(), 5.05);

        let config = ClockConfig {
            ordering: OrderingPolicy::Strict,
            ..ClockConfig::default()
        };
        let mut strict = ClockSynchronizer::new(INTERVAL, 2.0, &config);
        strict.on_remote_sample(5.0).unwrap();
        assert!(matches!(
            strict.on_remote_sample(5.0),
            Err(ClockError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn reset_forces_hard_reset() {
        let mut clock = clock();
        clock.on_remote_sample(100.0).unwrap();
        clock.reset();
        assert!(!clock.is_out_of_order(1.0));
        assert_eq!(clock.on_remote_sample(1.0), Ok(SampleOutcome::HardReset));
        assert_eq!(clock.local_time(), 1.0);
    }

    #[test]
    fn scale_stays_clamped_with_extreme_modifier() {
        let config = ClockConfig {
            time_scale_modifier: 0.5,
            ..ClockConfig::default()
        };
        let mut clock = ClockSynchronizer::new(INTERVAL, 2.0, &config);
        clock.on_remote_sample(0.0).unwrap();
        clock.advance(10.0);
        clock.on_remote_sample(0.01).unwrap();
        assert_eq!(clock.time_scale(), MIN_TIME_SCALE);
    }
}
