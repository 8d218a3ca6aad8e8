use crate::api::{Balances, Exchange};
use crate::models::{FillRecord, Stance, TradeSide};
use crate::Result;

/// Fiat needed to lean towards buying when no price is known
pub const DEFAULT_MIN_FIAT_FOR_BUY: f64 = 10.0;

/// How much of the reported fiat balance the bot may trade with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FiatAllowance {
    /// The whole balance
    Full,
    /// `min(fiat / 2, cap)`
    Capped(f64),
}

impl FiatAllowance {
    pub fn apply(&self, fiat: f64) -> f64 {
        match self {
            FiatAllowance::Full => fiat,
            FiatAllowance::Capped(cap) => (fiat / 2.0).min(*cap),
        }
    }
}

/// Balances of one session and the stance derived from them
#[derive(Debug, Clone)]
pub struct PositionTracker {
    crypto: f64,
    fiat: f64,
    stance: Stance,
    last_order: Option<FillRecord>,
    min_fiat_for_buy: f64,
}

impl PositionTracker {
    /// Empty tracker; the stance stays undetermined until balances arrive
    pub fn new(min_fiat_for_buy: f64) -> Self {
        Self {
            crypto: 0.0,
            fiat: 0.0,
            stance: Stance::Undetermined,
            last_order: None,
            min_fiat_for_buy,
        }
    }

    pub fn with_balances(crypto: f64, fiat: f64, price: Option<f64>) -> Self {
        let mut tracker = Self::new(DEFAULT_MIN_FIAT_FOR_BUY);
        tracker.set_balances(crypto, fiat, price);
        tracker
    }

    pub fn crypto(&self) -> f64 {
        self.crypto
    }

    pub fn fiat(&self) -> f64 {
        self.fiat
    }

    pub fn stance(&self) -> Stance {
        self.stance
    }

    pub fn last_order(&self) -> Option<&FillRecord> {
        self.last_order.as_ref()
    }

    /// Fiat value of both balances at `price`
    pub fn portfolio_value(&self, price: f64) -> f64 {
        self.fiat + self.crypto * price
    }

    /// Stance implied by balances
    ///
    /// With a price, lean towards buying while fiat outweighs the held
    /// asset. Without one, buy as soon as enough fiat is available.
    pub fn stance_for(fiat: f64, crypto: f64, price: Option<f64>, min_fiat_for_buy: f64) -> Stance {
        let buy = match price {
            Some(price) => fiat > crypto * price,
            None => fiat >= min_fiat_for_buy,
        };
        if buy {
            Stance::Buy
        } else {
            Stance::Sell
        }
    }

    pub fn derive_stance(&mut self, price: Option<f64>) -> Stance {
        self.stance = Self::stance_for(self.fiat, self.crypto, price, self.min_fiat_for_buy);
        self.stance
    }

    /// Settle a simulated fill against the balances
    pub fn apply_fill(&mut self, side: TradeSide, amount: f64, price: f64, fee_rate: f64) {
        match side {
            TradeSide::Buy => {
                self.crypto += amount * (1.0 - fee_rate);
                self.fiat -= amount * price;
            }
            TradeSide::Sell => {
                self.crypto -= amount;
                self.fiat += amount * price * (1.0 - fee_rate);
            }
        }

        let stance = self.derive_stance(Some(price));
        tracing::debug!(
            crypto = self.crypto,
            fiat = self.fiat,
            ?stance,
            "Applied {} fill",
            side
        );
    }

    /// Override balances, as done when seeding a backtest
    pub fn set_balances(&mut self, crypto: f64, fiat: f64, price: Option<f64>) {
        self.crypto = crypto;
        self.fiat = fiat;
        let stance = self.derive_stance(price);
        tracing::info!("Balances set: {} crypto, {} fiat ({:?})", crypto, fiat, stance);
    }

    /// Re-read balances from the exchange
    ///
    /// When they cannot be read the stance drops back to undetermined so no
    /// decision runs on stale balances, and the error is returned.
    pub fn refresh(
        &mut self,
        exchange: &mut dyn Exchange,
        asset: &str,
        fiat: &str,
        allowance: FiatAllowance,
        price: Option<f64>,
    ) -> Result<Balances> {
        match exchange.balances(asset, fiat) {
            Ok(balances) => {
                self.crypto = balances.crypto;
                self.fiat = allowance.apply(balances.fiat);
                let stance = self.derive_stance(price);
                tracing::info!(
                    "{} balance: {}, {} balance: {} ({:?})",
                    asset,
                    self.crypto,
                    fiat,
                    self.fiat,
                    stance
                );
                Ok(Balances {
                    crypto: self.crypto,
                    fiat: self.fiat,
                })
            }
            Err(e) => {
                self.stance = Stance::Undetermined;
                tracing::warn!("Could not refresh balances: {}", e);
                Err(e)
            }
        }
    }

    pub fn record_fill(&mut self, fill: FillRecord) {
        self.last_order = Some(fill);
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_FIAT_FOR_BUY)
    }
}
