use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalTiming {
    /// Keeps the long-run send rate; overshoot carries into the next interval.
    Fixed,
    /// Measures each interval from the last send.
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchingPolicy {
    Broadcast,
    PerObserver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrunePolicy {
    /// Removes every snapshot older than the cutoff.
    DropAll,
    /// Keeps the newest snapshot older than the cutoff so queries still have a start point.
    KeepBracketing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderingPolicy {
    Drop,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Fraction of a sync interval the averaged clock difference may drift before the
    /// time scale is adjusted.
    pub diff_threshold: f64,
    pub time_scale_modifier: f64,
    /// Remote time may lead local time by this many intervals before a hard resync.
    pub skip_ahead_ticks: f64,
    pub moving_average_count: u32,
    pub ordering: OrderingPolicy,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            diff_threshold: 0.5,
            time_scale_modifier: 0.01,
            skip_ahead_ticks: 20.0,
            moving_average_count: 30,
            ordering: OrderingPolicy::Drop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub sync_interval_secs: f64,
    pub interval_timing: IntervalTiming,
    pub interpolation_delay_ticks: f64,
    pub time_precision: f64,
    pub position_precision: Vec3,
    pub rotation_bit_count: u32,
    pub varint_block_size: u32,
    pub position_sensitivity: f32,
    /// Degrees.
    pub rotation_sensitivity: f32,
    pub sync_rotation: bool,
    pub include_write_size: bool,
    pub include_component_index: bool,
    pub batching: BatchingPolicy,
    pub max_packet_size: usize,
    pub prune: PrunePolicy,
    pub clock: ClockConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 0.05,
            interval_timing: IntervalTiming::Fixed,
            interpolation_delay_ticks: 2.0,
            time_precision: 1.0 / 10_000.0,
            position_precision: Vec3::splat(1.0 / 300.0),
            rotation_bit_count: 10,
            varint_block_size: 5,
            position_sensitivity: 0.01,
            rotation_sensitivity: 0.01,
            sync_rotation: true,
            include_write_size: false,
            include_component_index: false,
            batching: BatchingPolicy::Broadcast,
            max_packet_size: 1200,
            prune: PrunePolicy::KeepBracketing,
            clock: ClockConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("varint_block_size must be in 2..=32, got {0}")]
    BlockSize(u32),
    #[error("rotation_bit_count must be in 4..=16, got {0}")]
    RotationBits(u32),
    #[error("clock.moving_average_count must be at least 1")]
    MovingAverageCount,
    #[error("max_packet_size {max_packet_size} cannot hold one record, need {required} bytes")]
    PacketTooSmall {
        max_packet_size: usize,
        required: usize,
    },
}

impl SyncConfig {
    pub fn interpolation_delay(&self) -> f64 {
        self.interpolation_delay_ticks * self.sync_interval_secs
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("sync_interval_secs", self.sync_interval_secs)?;
        positive("time_precision", self.time_precision)?;
        positive("position_precision.x", self.position_precision.x as f64)?;
        positive("position_precision.y", self.position_precision.y as f64)?;
        positive("position_precision.z", self.position_precision.z as f64)?;
        non_negative("interpolation_delay_ticks", self.interpolation_delay_ticks)?;
        non_negative("position_sensitivity", self.position_sensitivity as f64)?;
        non_negative("rotation_sensitivity", self.rotation_sensitivity as f64)?;

        if !(2..=32).contains(&self.varint_block_size) {
            return Err(ConfigError::BlockSize(self.varint_block_size));
        }
        if !(4..=16).contains(&self.rotation_bit_count) {
            return Err(ConfigError::RotationBits(self.rotation_bit_count));
        }
        if self.max_packet_size == 0 {
            return Err(ConfigError::PacketTooSmall {
                max_packet_size: 0,
                required: 1,
            });
        }

        positive("clock.diff_threshold", self.clock.diff_threshold)?;
        positive("clock.time_scale_modifier", self.clock.time_scale_modifier)?;
        positive("clock.skip_ahead_ticks", self.clock.skip_ahead_ticks)?;
        if self.clock.moving_average_count == 0 {
            return Err(ConfigError::MovingAverageCount);
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}
