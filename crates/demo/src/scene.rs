use glam::{Quat, Vec3};
use possync::Pose3;

/// Server-driven entities circle the origin on rings of growing radius.
pub fn orbit(index: u32, time: f64) -> Pose3 {
    let radius = 2.0 + index as f32;
    let speed = 1.5 / radius as f64;
    let angle = speed * time + index as f64;
    let position = Vec3::new(
        radius * angle.cos() as f32,
        0.5 * (time + index as f64).sin() as f32,
        radius * angle.sin() as f32,
    );
    Pose3::new(position, Quat::from_rotation_y(-angle as f32))
}

/// Client-driven entity walking back and forth along x.
pub fn patrol(time: f64) -> Pose3 {
    let x = 4.0 * (time * 0.4).sin() as f32;
    Pose3::new(Vec3::new(x, 0.0, -6.0), Quat::from_rotation_y(x * 0.2))
}

#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    count: u64,
    sum: f64,
    max: f32,
}

impl ErrorStats {
    pub fn add(&mut self, error: f32) {
        self.count += 1;
        self.sum += error as f64;
        self.max = self.max.max(error);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn max(&self) -> f32 {
        self.max
    }
}
