//! Early stopping on a validation metric

/// Tracks the best metric seen and counts consecutive non-improving
/// observations. Once the counter exceeds `patience` the monitor latches
/// `stopped` for the rest of its life.
pub struct EarlyStopping {
    patience: usize,
    min_delta: f32,
    best: f32,
    counter: usize,
    stopped: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f32) -> Self {
        Self {
            patience,
            min_delta,
            best: f32::NEG_INFINITY,
            counter: 0,
            stopped: false,
        }
    }

    /// Feed one per-epoch metric (higher is better).
    pub fn observe(&mut self, metric: f32) {
        if metric > self.best + self.min_delta {
            self.best = metric;
            self.counter = 0;
        } else {
            self.counter += 1;
            if self.counter > self.patience {
                self.stopped = true;
            }
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn best(&self) -> f32 {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improving_sequence_never_stops() {
        let mut monitor = EarlyStopping::new(3, 0.0);
        for i in 0..50 {
            monitor.observe(i as f32);
        }
        assert!(!monitor.stopped());
        assert_eq!(monitor.best(), 49.0);
    }

    #[test]
    fn test_stops_at_patience_plus_one() {
        let mut monitor = EarlyStopping::new(3, 0.0);
        monitor.observe(1.0);

        // patience non-improving observations: still running
        for _ in 0..3 {
            monitor.observe(0.5);
            assert!(!monitor.stopped());
        }
        // the (patience + 1)-th trips it
        monitor.observe(0.5);
        assert!(monitor.stopped());
    }

    #[test]
    fn test_strictly_decreasing_sequence() {
        let mut monitor = EarlyStopping::new(2, 0.0);
        let metrics = [0.9, 0.8, 0.7, 0.6, 0.5];
        let mut stopped_at = None;
        for (i, &m) in metrics.iter().enumerate() {
            monitor.observe(m);
            if monitor.stopped() {
                stopped_at = Some(i);
                break;
            }
        }
        // first observation sets best; the next three are non-improving
        assert_eq!(stopped_at, Some(3));
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut monitor = EarlyStopping::new(2, 0.0);
        monitor.observe(1.0);
        monitor.observe(0.9);
        monitor.observe(0.9);
        monitor.observe(1.1); // reset
        monitor.observe(0.9);
        monitor.observe(0.9);
        assert!(!monitor.stopped());
        monitor.observe(0.9);
        assert!(monitor.stopped());
    }

    #[test]
    fn test_stopped_is_latched() {
        let mut monitor = EarlyStopping::new(1, 0.0);
        monitor.observe(1.0);
        monitor.observe(0.5);
        monitor.observe(0.5);
        assert!(monitor.stopped());
        monitor.observe(100.0);
        assert!(monitor.stopped());
    }

    #[test]
    fn test_min_delta_requires_real_improvement() {
        let mut monitor = EarlyStopping::new(1, 0.1);
        monitor.observe(1.0);
        monitor.observe(1.05); // within delta, counts as non-improving
        monitor.observe(1.05);
        assert!(monitor.stopped());
    }
}
