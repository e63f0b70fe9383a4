mod batch;
mod error;
mod observers;
mod registry;
mod scheduler;
mod stats;

pub use batch::OutgoingBatch;
pub use error::SyncError;
pub use observers::{ObserverList, ObserverSet, Transport};
pub use registry::{Authority, EntityRegistry, PeerId, SyncId, TrackedEntity};
pub use scheduler::{Role, SyncScheduler};
pub use stats::SyncStats;
