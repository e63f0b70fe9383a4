mod buffer;
mod state;
mod transform;

pub use buffer::{BufferError, Snapshot, SnapshotBuffer};
pub use state::{Interpolate, Pose2, Pose3, SyncFlags, SyncState, delta_angle};
pub use transform::{Coordinates, Node3, Transform2Adapter, Transform3Adapter, TransformAdapter};
