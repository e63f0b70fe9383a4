use std::collections::BTreeMap;
use std::fmt;

use crate::snapshot::{SnapshotBuffer, SyncFlags, TransformAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncId {
    pub entity: u32,
    pub component: u16,
}

impl SyncId {
    pub fn new(entity: u32) -> Self {
        Self::with_component(entity, 0)
    }

    pub fn with_component(entity: u32, component: u16) -> Self {
        Self { entity, component }
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.component)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u32);

impl PeerId {
    pub const SERVER: PeerId = PeerId(0);
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::SERVER {
            write!(f, "server")
        } else {
            write!(f, "peer {}", self.0)
        }
    }
}

/// Who moves an entity. Changed only through `SyncScheduler::set_authority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    ServerControlled,
    /// This client owns the entity and sends its state to the server.
    ClientOwnerControlled,
    /// A client owns the entity; the server relays its updates to everyone else.
    ClientRelayOnOtherPeers { owner: PeerId },
}

pub struct TrackedEntity<A: TransformAdapter> {
    pub(crate) id: SyncId,
    pub(crate) authority: Authority,
    pub(crate) flags: SyncFlags,
    pub target: A::Target,
    pub(crate) last_synced: Option<A::State>,
    pub(crate) next_sync_time: f64,
    pub position_sensitivity: f32,
    pub rotation_sensitivity: f32,
    pub(crate) force_send: bool,
    pub(crate) pending_relay: Option<A::State>,
    pub(crate) buffer: SnapshotBuffer<A::State>,
}

impl<A: TransformAdapter> TrackedEntity<A> {
    pub(crate) fn new(
        id: SyncId,
        authority: Authority,
        flags: SyncFlags,
        target: A::Target,
        position_sensitivity: f32,
        rotation_sensitivity: f32,
    ) -> Self {
        Self {
            id,
            authority,
            flags,
            target,
            last_synced: None,
            next_sync_time: 0.0,
            position_sensitivity,
            rotation_sensitivity,
            force_send: true,
            pending_relay: None,
            buffer: SnapshotBuffer::new(),
        }
    }

    pub fn id(&self) -> SyncId {
        self.id
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    pub fn flags(&self) -> SyncFlags {
        self.flags
    }

    pub fn buffer(&self) -> &SnapshotBuffer<A::State> {
        &self.buffer
    }

    pub fn last_synced(&self) -> Option<&A::State> {
        self.last_synced.as_ref()
    }

    /// Dirty when forced, never sent, or moved or turned at least its sensitivity.
    pub(crate) fn is_dirty(&self, current: &A::State) -> bool {
        use crate::snapshot::SyncState;

        if self.force_send {
            return true;
        }
        let Some(last) = &self.last_synced else {
            return true;
        };

        let moved = self.flags.contains(SyncFlags::POSITION)
            && last.position_delta(current) >= self.position_sensitivity;
        let rotated = self.flags.contains(SyncFlags::ROTATION)
            && last.rotation_delta(current) >= self.rotation_sensitivity;
        moved || rotated
    }

    pub(crate) fn mark_synced(&mut self, state: A::State) {
        self.last_synced = Some(state);
        self.force_send = false;
    }
}

impl<A: TransformAdapter> fmt::Debug for TrackedEntity<A>
where
    A::Target: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedEntity")
            .field("id", &self.id)
            .field("authority", &self.authority)
            .field("flags", &self.flags)
            .field("target", &self.target)
            .field("buffer", &self.buffer.len())
            .finish()
    }
}

pub struct EntityRegistry<A: TransformAdapter> {
    entities: BTreeMap<SyncId, TrackedEntity<A>>,
}

impl<A: TransformAdapter> Default for EntityRegistry<A> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }
}

impl<A: TransformAdapter> EntityRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: TrackedEntity<A>) -> Result<(), TrackedEntity<A>> {
        if self.entities.contains_key(&entity.id) {
            return Err(entity);
        }
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    pub fn remove(&mut self, id: SyncId) -> Option<TrackedEntity<A>> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: SyncId) -> Option<&TrackedEntity<A>> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: SyncId) -> Option<&mut TrackedEntity<A>> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: SyncId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity<A>> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedEntity<A>> {
        self.entities.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::snapshot::{Node3, Pose3, Transform3Adapter};

    fn tracked(flags: SyncFlags) -> TrackedEntity<Transform3Adapter> {
        TrackedEntity::new(
            SyncId::new(1),
            Authority::ServerControlled,
            flags,
            Node3::default(),
            0.1,
            1.0,
        )
    }

    #[test]
    fn dirty_check_uses_inclusive_thresholds() {
        let mut entity = tracked(SyncFlags::all());
        assert!(entity.is_dirty(&Pose3::default()));

        entity.mark_synced(Pose3::default());
        assert!(!entity.is_dirty(&Pose3::default()));
        assert!(!entity.is_dirty(&Pose3::from_position(Vec3::new(0.05, 0.0, 0.0))));
        assert!(entity.is_dirty(&Pose3::from_position(Vec3::new(0.25, 0.0, 0.0))));
        assert!(entity.is_dirty(&Pose3::new(Vec3::ZERO, Quat::from_rotation_y(2f32.to_radians()))));
    }

    #[test]
    fn slow_drift_accumulates_against_last_sent() {
        let mut entity = tracked(SyncFlags::all());
        entity.mark_synced(Pose3::default());

        // each step is below the threshold, but the total is not
        let mut sent = 0;
        for step in 1..=10 {
            let current = Pose3::from_position(Vec3::new(step as f32 * 0.03, 0.0, 0.0));
            if entity.is_dirty(&current) {
                entity.mark_synced(current);
                sent += 1;
            }
        }
        assert_eq!(sent, 2);
    }

    #[test]
    fn unsynced_rotation_is_ignored() {
        let mut entity = tracked(SyncFlags::POSITION);
        entity.mark_synced(Pose3::default());
        assert!(!entity.is_dirty(&Pose3::new(Vec3::ZERO, Quat::from_rotation_x(1.0))));
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = EntityRegistry::new();
        assert!(registry.insert(tracked(SyncFlags::all())).is_ok());
        assert!(registry.insert(tracked(SyncFlags::all())).is_err());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(SyncId::new(1)).is_some());
        assert!(registry.is_empty());
    }
}
