/// Exponential moving average normalized over the history actually seen
///
/// Observation `j <= i` carries weight `(1 - alpha)^(i - j)` with
/// `alpha = 2 / (span + 1)`, and the average divides by the sum of those
/// weights. The numerator `N` and weight sum `W` follow
/// `N_i = close_i + (1 - alpha) * N_{i-1}` and `W_i = 1 + (1 - alpha) * W_{i-1}`,
/// so each bar costs O(1).
#[derive(Debug, Clone)]
pub struct WeightedEma {
    span: u32,
    decay: f64,
    numerator: f64,
    weight_sum: f64,
}

impl WeightedEma {
    pub fn new(span: u32) -> Self {
        let alpha = 2.0 / (f64::from(span) + 1.0);
        Self {
            span,
            decay: 1.0 - alpha,
            numerator: 0.0,
            weight_sum: 0.0,
        }
    }

    pub fn span(&self) -> u32 {
        self.span
    }

    /// Value after observing `close`, without committing it
    pub fn peek(&self, close: f64) -> f64 {
        let numerator = close + self.decay * self.numerator;
        let weight_sum = 1.0 + self.decay * self.weight_sum;
        numerator / weight_sum
    }

    /// Observe `close` and return the updated value
    pub fn push(&mut self, close: f64) -> f64 {
        self.numerator = close + self.decay * self.numerator;
        self.weight_sum = 1.0 + self.decay * self.weight_sum;
        self.numerator / self.weight_sum
    }

    pub fn reset(&mut self) {
        self.numerator = 0.0;
        self.weight_sum = 0.0;
    }
}

/// Weighted EMA of a whole close series, one value per close
pub fn weighted_ema_series(closes: &[f64], span: u32) -> Vec<f64> {
    let mut ema = WeightedEma::new(span);
    closes.iter().map(|&close| ema.push(close)).collect()
}
