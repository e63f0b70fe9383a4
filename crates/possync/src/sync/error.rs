use super::{Authority, PeerId, Role, SyncId};
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::snapshot::BufferError;
use crate::time::ClockError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("snapshot buffer error: {0}")]
    Buffer(#[from] BufferError),
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("entity {0} is already registered")]
    AlreadyRegistered(SyncId),
    #[error("entity {0} has a component index but component indices are disabled")]
    ComponentIndexDisabled(SyncId),
    #[error("entity {0} syncs neither position nor rotation")]
    NothingToSync(SyncId),
    #[error("entity {0} is not registered")]
    NotRegistered(SyncId),
    #[error("authority {authority:?} is not valid on a {role:?}")]
    InvalidAuthority { authority: Authority, role: Role },
    #[error("{role:?} cannot receive sync messages from {from}")]
    UnexpectedSender { role: Role, from: PeerId },
}
