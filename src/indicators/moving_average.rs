use std::collections::VecDeque;

/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Mean and sample standard deviation of one full window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    pub std_dev: f64,
}

/// Fixed-size circular buffer of the most recent closes
///
/// Statistics are re-summed over the window on each query, so the cost per
/// bar depends on the window size only, never on the history length.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Statistics of the window as it would be after pushing `next`,
    /// without mutating it
    pub fn peek(&self, next: f64) -> Option<WindowStats> {
        let skip = usize::from(self.values.len() == self.capacity);
        let count = self.values.len() - skip + 1;
        if count < self.capacity {
            return None;
        }

        Some(Self::stats(self.window_with(skip, next), count))
    }

    /// Push a close and return the statistics of the resulting window
    pub fn push(&mut self, value: f64) -> Option<WindowStats> {
        let stats = self.peek(value);
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
        stats
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    fn window_with(&self, skip: usize, next: f64) -> impl Iterator<Item = f64> + Clone + '_ {
        self.values
            .iter()
            .skip(skip)
            .copied()
            .chain(std::iter::once(next))
    }

    /// Statistics over offsets from the oldest value, so an all-equal
    /// window yields exactly its value and a zero deviation
    fn stats(values: impl Iterator<Item = f64> + Clone, count: usize) -> WindowStats {
        let origin = values.clone().next().unwrap_or_default();
        let offset_mean = values.clone().map(|v| v - origin).sum::<f64>() / count as f64;
        let squares: f64 = values
            .map(|v| {
                let d = v - origin - offset_mean;
                d * d
            })
            .sum();
        let std_dev = if count > 1 {
            (squares / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };
        let mean = origin + offset_mean;

        WindowStats { mean, std_dev }
    }
}
