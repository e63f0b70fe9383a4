//! Position and rotation synchronization for networked entities.
//!
//! A sender captures transforms on a fixed interval, sends only those that moved past their
//! sensitivity, and packs them with precision-bounded quantization. A receiver follows the
//! sender's clock with [`ClockSynchronizer`] and interpolates each entity's
//! [`SnapshotBuffer`] slightly in the past, so motion stays smooth under jitter and loss.

pub mod codec;
pub mod config;
pub mod net;
pub mod snapshot;
pub mod sync;
pub mod time;

pub use codec::{BitReader, BitWriter, CodecError, RecordHeader, StateCodec};
pub use config::{
    BatchingPolicy, ClockConfig, ConfigError, IntervalTiming, OrderingPolicy, PrunePolicy,
    SyncConfig,
};
pub use net::{LinkConditions, LinkStats, SimulatedLink};
pub use snapshot::{
    BufferError, Coordinates, Interpolate, Node3, Pose2, Pose3, Snapshot, SnapshotBuffer,
    SyncFlags, SyncState, Transform2Adapter, Transform3Adapter, TransformAdapter,
};
pub use sync::{
    Authority, ObserverList, ObserverSet, PeerId, Role, SyncError, SyncId, SyncScheduler,
    SyncStats, TrackedEntity, Transport,
};
pub use time::{
    ClockError, ClockSynchronizer, ExponentialMovingAverage, IntervalTimer, SampleOutcome,
};
