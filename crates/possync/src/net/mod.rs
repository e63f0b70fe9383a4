mod link;

pub use link::{LinkConditions, LinkStats, SimulatedLink};
