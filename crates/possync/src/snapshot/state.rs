use std::fmt::Debug;

use bitflags::bitflags;
use glam::{Quat, Vec2, Vec3};

use crate::codec::{BitReader, BitWriter, CodecError, StateCodec};

bitflags! {
    /// Which parts of a state are written to the wire for one entity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SyncFlags: u8 {
        const POSITION = 0b01;
        const ROTATION = 0b10;
    }
}

pub trait Interpolate: Sized {
    fn interpolate(&self, to: &Self, alpha: f32) -> Self;
}

pub trait SyncState: Interpolate + Clone + Default + Debug {
    fn write(&self, codec: &StateCodec, flags: SyncFlags, writer: &mut BitWriter);

    /// Fields missing from `flags` are left at their default.
    fn read(
        codec: &StateCodec,
        flags: SyncFlags,
        reader: &mut BitReader<'_>,
    ) -> Result<Self, CodecError>;

    fn position_delta(&self, other: &Self) -> f32;

    /// Degrees.
    fn rotation_delta(&self, other: &Self) -> f32;

    fn min_payload_bits(codec: &StateCodec) -> usize;

    fn max_payload_bits(codec: &StateCodec) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose3 {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose3 {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }
}

impl Default for Pose3 {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }
}

impl Interpolate for Pose3 {
    fn interpolate(&self, to: &Self, alpha: f32) -> Self {
        Self {
            position: self.position.lerp(to.position, alpha),
            rotation: self.rotation.slerp(to.rotation, alpha),
        }
    }
}

impl SyncState for Pose3 {
    fn write(&self, codec: &StateCodec, flags: SyncFlags, writer: &mut BitWriter) {
        if flags.contains(SyncFlags::POSITION) {
            codec.position().pack(writer, self.position);
        }
        if flags.contains(SyncFlags::ROTATION) {
            codec.rotation().pack(writer, self.rotation);
        }
    }

    fn read(
        codec: &StateCodec,
        flags: SyncFlags,
        reader: &mut BitReader<'_>,
    ) -> Result<Self, CodecError> {
        let mut pose = Self::default();
        if flags.contains(SyncFlags::POSITION) {
            pose.position = codec.position().unpack(reader)?;
        }
        if flags.contains(SyncFlags::ROTATION) {
            pose.rotation = codec.rotation().unpack(reader)?;
        }
        Ok(pose)
    }

    fn position_delta(&self, other: &Self) -> f32 {
        self.position.distance(other.position)
    }

    fn rotation_delta(&self, other: &Self) -> f32 {
        // atan2 form stays exact near zero, where acos of the dot product does not
        let diff = self.rotation.conjugate() * other.rotation;
        (2.0 * diff.xyz().length().atan2(diff.w.abs())).to_degrees()
    }

    fn min_payload_bits(codec: &StateCodec) -> usize {
        codec.position().min_bits().min(codec.rotation().bit_count())
    }

    fn max_payload_bits(codec: &StateCodec) -> usize {
        codec.position().max_bits() + codec.rotation().bit_count()
    }
}

/// Planar pose; `rotation` is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2 {
    pub position: Vec2,
    pub rotation: f32,
}

impl Pose2 {
    pub fn new(position: Vec2, rotation: f32) -> Self {
        Self { position, rotation }
    }
}

/// Signed shortest difference `to - from` in degrees, in `[-180, 180)`.
pub fn delta_angle(from: f32, to: f32) -> f32 {
    (to - from + 180.0).rem_euclid(360.0) - 180.0
}

impl Interpolate for Pose2 {
    fn interpolate(&self, to: &Self, alpha: f32) -> Self {
        Self {
            position: self.position.lerp(to.position, alpha),
            rotation: self.rotation + delta_angle(self.rotation, to.rotation) * alpha,
        }
    }
}

impl SyncState for Pose2 {
    fn write(&self, codec: &StateCodec, flags: SyncFlags, writer: &mut BitWriter) {
        if flags.contains(SyncFlags::POSITION) {
            codec.position_2d().pack(writer, self.position);
        }
        if flags.contains(SyncFlags::ROTATION) {
            codec.angle().pack(writer, self.rotation);
        }
    }

    fn read(
        codec: &StateCodec,
        flags: SyncFlags,
        reader: &mut BitReader<'_>,
    ) -> Result<Self, CodecError> {
        let mut pose = Self::default();
        if flags.contains(SyncFlags::POSITION) {
            pose.position = codec.position_2d().unpack(reader)?;
        }
        if flags.contains(SyncFlags::ROTATION) {
            pose.rotation = codec.angle().unpack(reader)?;
        }
        Ok(pose)
    }

    fn position_delta(&self, other: &Self) -> f32 {
        self.position.distance(other.position)
    }

    fn rotation_delta(&self, other: &Self) -> f32 {
        delta_angle(self.rotation, other.rotation).abs()
    }

    fn min_payload_bits(codec: &StateCodec) -> usize {
        codec.position_2d().min_bits().min(codec.angle().bit_count())
    }

    fn max_payload_bits(codec: &StateCodec) -> usize {
        codec.position_2d().max_bits() + codec.angle().bit_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose3_interpolates_both_parts() {
        let from = Pose3::new(Vec3::ZERO, Quat::IDENTITY);
        let to = Pose3::new(Vec3::new(10.0, 0.0, 0.0), Quat::from_rotation_y(1.0));

        let mid = from.interpolate(&to, 0.5);
        assert!((mid.position - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-6);
        assert!((mid.rotation.angle_between(Quat::from_rotation_y(0.5))).abs() < 1e-4);
    }

    #[test]
    fn pose2_turns_the_short_way() {
        let from = Pose2::new(Vec2::ZERO, 350.0);
        let to = Pose2::new(Vec2::ZERO, 10.0);

        let mid = from.interpolate(&to, 0.5);
        assert!(mid.rotation.rem_euclid(360.0) < 1e-3);
        assert!((from.rotation_delta(&to) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn delta_angle_range() {
        assert_eq!(delta_angle(0.0, 90.0), 90.0);
        assert_eq!(delta_angle(90.0, 0.0), -90.0);
        assert_eq!(delta_angle(10.0, 350.0), -20.0);
        assert_eq!(delta_angle(0.0, 180.0), -180.0);
    }
}
