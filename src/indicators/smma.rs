use super::moving_average::calculate_sma;
use super::round_to;
use std::collections::VecDeque;

/// Decimals kept after every smoothing step
pub const SMMA_DECIMALS: i32 = 10;

/// Smoothed moving average of the long-interval profile
///
/// Seeded with the plain mean of the first `window` closes, then
/// `smma_i = (smma_{i-1} * window + close_i) / (window + 1)`.
/// The `window + 1` denominator is intentional and must not be changed to
/// the textbook `window`.
#[derive(Debug, Clone)]
pub struct SmoothedAverage {
    window: usize,
    seed: VecDeque<f64>,
    last: Option<f64>,
}

impl SmoothedAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            seed: VecDeque::with_capacity(window),
            last: None,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Value after observing `close`, without committing it
    pub fn peek(&self, close: f64) -> Option<f64> {
        match self.last {
            Some(prev) => Some(self.smooth(prev, close)),
            None => self.seed_with(close),
        }
    }

    /// Observe `close` and return the updated value
    pub fn push(&mut self, close: f64) -> Option<f64> {
        let value = self.peek(close);
        if self.last.is_none() {
            self.seed.push_back(close);
            while self.seed.len() >= self.window {
                self.seed.pop_front();
            }
        }
        if value.is_some() {
            self.last = value;
            self.seed.clear();
        }
        value
    }

    pub fn reset(&mut self) {
        self.seed.clear();
        self.last = None;
    }

    fn smooth(&self, prev: f64, close: f64) -> f64 {
        let window = self.window as f64;
        round_to((prev * window + close) / (window + 1.0), SMMA_DECIMALS)
    }

    fn seed_with(&self, close: f64) -> Option<f64> {
        if self.seed.len() + 1 < self.window {
            return None;
        }
        let closes: Vec<f64> = self
            .seed
            .iter()
            .copied()
            .chain(std::iter::once(close))
            .collect();
        calculate_sma(&closes, self.window).map(|mean| round_to(mean, SMMA_DECIMALS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_until_seeded() {
        let mut smma = SmoothedAverage::new(5);
        for close in [1.0, 2.0, 3.0, 4.0] {
            assert!(smma.push(close).is_none());
        }
        assert_eq!(smma.push(5.0), Some(3.0));
    }

    #[test]
    fn test_non_canonical_denominator() {
        let mut smma = SmoothedAverage::new(5);
        for close in [1.0, 2.0, 3.0, 4.0, 5.0] {
            smma.push(close);
        }
        // (3 * 5 + 9) / 6 = 4, not (3 * 4 + 9) / 5
        assert_eq!(smma.push(9.0), Some(4.0));
        // (4 * 5 + 10) / 6 = 5
        assert_eq!(smma.push(10.0), Some(5.0));
    }

    #[test]
    fn test_rounds_to_ten_decimals() {
        let mut smma = SmoothedAverage::new(2);
        smma.push(1.0);
        smma.push(2.0); // seed 1.5
        let value = smma.push(1.0).unwrap(); // (3 + 1) / 3 = 1.333...
        assert_eq!(value, 1.3333333333);
    }

    #[test]
    fn test_peek_does_not_commit() {
        let mut smma = SmoothedAverage::new(2);
        smma.push(4.0);
        assert_eq!(smma.peek(6.0), Some(5.0));
        assert_eq!(smma.peek(8.0), Some(6.0));
        assert_eq!(smma.push(8.0), Some(6.0));
    }

    #[test]
    fn test_window_of_one_seeds_immediately() {
        let mut smma = SmoothedAverage::new(1);
        assert_eq!(smma.push(7.0), Some(7.0));
        // (7 * 1 + 9) / 2 = 8
        assert_eq!(smma.push(9.0), Some(8.0));
    }
}
