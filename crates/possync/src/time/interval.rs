use crate::config::IntervalTiming;

// At most one send per tick, so a longer backlog would only turn into a burst.
const MAX_BACKLOG_INTERVALS: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: f64,
    timing: IntervalTiming,
    accumulator: f64,
}

impl IntervalTimer {
    pub fn new(interval: f64, timing: IntervalTiming) -> Self {
        Self {
            interval,
            timing,
            accumulator: 0.0,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn accumulate(&mut self, delta: f64) {
        self.accumulator = (self.accumulator + delta).min(self.interval * MAX_BACKLOG_INTERVALS);
    }

    /// Consumes one elapsed interval, if any. Call once per tick.
    pub fn consume_interval(&mut self) -> bool {
        if self.accumulator < self.interval {
            return false;
        }
        match self.timing {
            IntervalTiming::Fixed => self.accumulator -= self.interval,
            IntervalTiming::Variable => self.accumulator = 0.0,
        }
        true
    }

    pub fn alpha(&self) -> f64 {
        self.accumulator / self.interval
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_interval_keeps_remainder() {
        let mut timer = IntervalTimer::new(0.1, IntervalTiming::Fixed);

        timer.accumulate(0.125);
        assert!(timer.consume_interval());
        assert!((timer.alpha() - 0.25).abs() < 1e-9);

        let mut timer = IntervalTimer::new(0.1, IntervalTiming::Fixed);
        let mut sends = 0;
        for _ in 0..101 {
            timer.accumulate(0.016);
            if timer.consume_interval() {
                sends += 1;
            }
        }
        assert_eq!(sends, 16);
    }

    #[test]
    fn long_delta_leaves_at_most_half_an_interval() {
        let mut timer = IntervalTimer::new(0.05, IntervalTiming::Fixed);
        timer.accumulate(5.0);
        assert!(timer.consume_interval());
        assert!(!timer.consume_interval());
        assert!((timer.alpha() - 0.5).abs() < 1e-9);

        let mut sends = 0;
        for _ in 0..30 {
            timer.accumulate(1.0 / 60.0);
            if timer.consume_interval() {
                sends += 1;
            }
        }
        assert_eq!(sends, 10);
    }

    #[test]
    fn variable_interval_discards_remainder() {
        let mut timer = IntervalTimer::new(0.1, IntervalTiming::Variable);
        let mut sends = 0;
        for _ in 0..100 {
            timer.accumulate(0.016);
            if timer.consume_interval() {
                sends += 1;
            }
        }
        // every 7th tick: 0.112 >= 0.1
        assert_eq!(sends, 14);
    }
}
