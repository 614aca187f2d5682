//! Exponentially weighted moving average primitive (spec §4.1).
//!
//! Single-value EMA with warm-up: the first `update` is taken verbatim,
//! every subsequent update blends in the new value by `alpha`. Not
//! thread-safe on its own — callers (the cache, the load balancer, the
//! metrics aggregator) provide their own lock around it, the same split
//! of responsibility the teacher crate uses for its `util_ema` smoothing
//! in `nyx-mix::adaptive::AdaptiveCoverGenerator`.

/// Smoothing factor in `(0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
    count: u64,
}

impl Ema {
    /// `alpha` is clamped into `(0, 1]`; a value of exactly `0` would never
    /// incorporate new observations, which is never the intent here.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            value: None,
            count: 0,
        }
    }

    /// Incorporate a new observation.
    pub fn update(&mut self, value: f64) {
        self.value = Some(match self.value {
            None => value,
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
        });
        self.count += 1;
    }

    /// Current smoothed value, or `None` before the first `update`.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Current smoothed value, or `default` before the first `update`.
    pub fn value_or(&self, default: f64) -> f64 {
        self.value.unwrap_or(default)
    }

    /// Number of observations folded in so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Discard all observations, returning to the pre-warm-up state.
    pub fn reset(&mut self) {
        self.value = None;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_takes_first_value_verbatim() {
        let mut ema = Ema::new(0.5);
        ema.update(10.0);
        assert_eq!(ema.value(), Some(10.0));
        assert_eq!(ema.count(), 1);
    }

    #[test]
    fn subsequent_updates_blend() {
        let mut ema = Ema::new(0.25);
        ema.update(10.0);
        ema.update(20.0);
        let expected = 0.25 * 20.0 + 0.75 * 10.0;
        assert!((ema.value().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_state() {
        let mut ema = Ema::new(0.5);
        ema.update(1.0);
        ema.reset();
        assert_eq!(ema.value(), None);
        assert_eq!(ema.count(), 0);
    }
}
