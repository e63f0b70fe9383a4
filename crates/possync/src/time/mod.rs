mod average;
mod clock;
mod interval;

pub use average::ExponentialMovingAverage;
pub use clock::{ClockError, ClockSynchronizer, SampleOutcome};
pub use interval::IntervalTimer;
