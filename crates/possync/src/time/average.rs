/// Exponential moving average over roughly `n` samples, with running variance.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    alpha: f64,
    initialized: bool,
    value: f64,
    variance: f64,
}

impl ExponentialMovingAverage {
    pub fn new(n: u32) -> Self {
        Self {
            alpha: 2.0 / (n as f64 + 1.0),
            initialized: false,
            value: 0.0,
            variance: 0.0,
        }
    }

    pub fn add(&mut self, sample: f64) {
        if self.initialized {
            let delta = sample - self.value;
            self.value += self.alpha * delta;
            self.variance = (1.0 - self.alpha) * (self.variance + self.alpha * delta * delta);
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn standard_deviation(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn reset(&mut self) {
        self.initialized = false;
        self.value = 0.0;
        self.variance = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_sets_value() {
        let mut average = ExponentialMovingAverage::new(30);
        average.add(4.0);
        assert_eq!(average.value(), 4.0);
        assert_eq!(average.variance(), 0.0);
    }

    #[test]
    fn converges_towards_constant_input() {
        let mut average = ExponentialMovingAverage::new(9);
        average.add(0.0);
        average.add(10.0);
        assert!((average.value() - 2.0).abs() < 1e-12);
        assert!(average.variance() > 0.0);

        for _ in 0..200 {
            average.add(10.0);
        }
        assert!((average.value() - 10.0).abs() < 1e-6);

        average.reset();
        average.add(-1.0);
        assert_eq!(average.value(), -1.0);
    }
}
