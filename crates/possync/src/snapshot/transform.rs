use super::{Pose2, Pose3, SyncFlags, SyncState};

/// Reads and writes the synced state of whatever the embedding application moves.
pub trait TransformAdapter {
    type State: SyncState;
    type Target;

    fn capture(&self, target: &Self::Target) -> Self::State;

    /// Only the parts named in `flags` are written to `target`.
    fn apply(&self, target: &mut Self::Target, state: &Self::State, flags: SyncFlags);
}

impl Pose3 {
    pub fn in_space_of(&self, parent: &Pose3) -> Pose3 {
        Pose3::new(
            parent.position + parent.rotation * self.position,
            (parent.rotation * self.rotation).normalize(),
        )
    }

    pub fn relative_to(&self, parent: &Pose3) -> Pose3 {
        let inverse = parent.rotation.inverse();
        Pose3::new(
            inverse * (self.position - parent.position),
            (inverse * self.rotation).normalize(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Node3 {
    pub local: Pose3,
    pub parent: Pose3,
}

impl Node3 {
    pub fn new(local: Pose3) -> Self {
        Self {
            local,
            parent: Pose3::default(),
        }
    }

    pub fn world(&self) -> Pose3 {
        self.local.in_space_of(&self.parent)
    }

    pub fn set_world(&mut self, world: Pose3) {
        self.local = world.relative_to(&self.parent);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinates {
    World,
    Local,
    /// Expressed relative to a fixed anchor pose in world space.
    Relative(Pose3),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3Adapter {
    pub coordinates: Coordinates,
}

impl Transform3Adapter {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

impl Default for Transform3Adapter {
    fn default() -> Self {
        Self::new(Coordinates::World)
    }
}

impl TransformAdapter for Transform3Adapter {
    type State = Pose3;
    type Target = Node3;

    fn capture(&self, target: &Node3) -> Pose3 {
        match self.coordinates {
            Coordinates::World => target.world(),
            Coordinates::Local => target.local,
            Coordinates::Relative(anchor) => target.world().relative_to(&anchor),
        }
    }

    fn apply(&self, target: &mut Node3, state: &Pose3, flags: SyncFlags) {
        let mut current = self.capture(target);
        if flags.contains(SyncFlags::POSITION) {
            current.position = state.position;
        }
        if flags.contains(SyncFlags::ROTATION) {
            current.rotation = state.rotation;
        }

        match self.coordinates {
            Coordinates::World => target.set_world(current),
            Coordinates::Local => target.local = current,
            Coordinates::Relative(anchor) => target.set_world(current.in_space_of(&anchor)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform2Adapter;

impl TransformAdapter for Transform2Adapter {
    type State = Pose2;
    type Target = Pose2;

    fn capture(&self, target: &Pose2) -> Pose2 {
        *target
    }

    fn apply(&self, target: &mut Pose2, state: &Pose2, flags: SyncFlags) {
        if flags.contains(SyncFlags::POSITION) {
            target.position = state.position;
        }
        if flags.contains(SyncFlags::ROTATION) {
            target.rotation = state.rotation;
        }
    }
}
