use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single (timestamp, price) observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    /// Epoch seconds
    pub timestamp: f64,
    pub price: f64,
}

impl Tick {
    pub fn new(timestamp: f64, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Pre-aggregated OHLC row, as returned by an exchange or a five-column file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OhlcRow {
    pub timestamp: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One normalized bulk-ingest record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Record {
    Tick(Tick),
    Bar(OhlcRow),
}

impl Record {
    pub fn timestamp(&self) -> f64 {
        match self {
            Record::Tick(tick) => tick.timestamp,
            Record::Bar(row) => row.timestamp,
        }
    }

    /// Prices to replay for this record; a bar becomes its open, high, low
    /// and close ticks, all at its timestamp
    pub fn as_ticks(&self) -> Vec<Tick> {
        match self {
            Record::Tick(tick) => vec![*tick],
            Record::Bar(row) => [row.open, row.high, row.low, row.close]
                .into_iter()
                .map(|price| Tick::new(row.timestamp, price))
                .collect(),
        }
    }
}

/// OHLC bar for one bucket, with the indicator values computed on it
///
/// The in-progress bar has the same shape and is mutated in place until
/// its bucket closes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    /// Bucket start in epoch seconds
    pub bucket_start: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub moving_average: Option<f64>,
    pub std_dev: Option<f64>,
    pub lower_band: Option<f64>,
    pub upper_band: Option<f64>,
    /// EMA span -> value, present once the span has one observation
    pub ema: BTreeMap<u32, f64>,
    /// SMMA window -> value, present once the window is seeded
    pub smma: BTreeMap<usize, f64>,
}

impl Bar {
    /// Open a bar from the first tick of its bucket
    pub fn open_at(bucket_start: i64, price: f64) -> Self {
        Self {
            bucket_start,
            open: price,
            high: price,
            low: price,
            close: price,
            moving_average: None,
            std_dev: None,
            lower_band: None,
            upper_band: None,
            ema: BTreeMap::new(),
            smma: BTreeMap::new(),
        }
    }

    /// Build a bar from a pre-aggregated row
    pub fn from_row(bucket_start: i64, row: &OhlcRow) -> Self {
        Self {
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            ..Self::open_at(bucket_start, row.close)
        }
    }

    /// Fold a later tick of the same bucket into the bar
    pub fn absorb_tick(&mut self, price: f64) {
        self.close = price;
        self.low = self.low.min(price);
        self.high = self.high.max(price);
    }

    /// Fold a finer-grained bar of the same bucket into this one
    pub fn absorb_row(&mut self, row: &OhlcRow) {
        self.close = row.close;
        self.low = self.low.min(row.low);
        self.high = self.high.max(row.high);
    }

    pub fn ema(&self, span: u32) -> Option<f64> {
        self.ema.get(&span).copied()
    }

    pub fn smma(&self, window: usize) -> Option<f64> {
        self.smma.get(&window).copied()
    }

    /// `low <= open, close <= high`
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

/// Position of a bar's close inside its Bollinger envelope
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BollingerGapPoint {
    pub bucket_start: i64,
    /// Percent position rounded to 2 decimals, `None` while bands are undefined
    pub value: Option<f64>,
    /// Unrounded percent position
    pub percent_b: Option<f64>,
}

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading bias derived from balances
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Stance {
    /// Holding fiat, waiting to buy
    Buy,
    /// Holding the asset, waiting to sell
    Sell,
    /// No balance information yet
    Undetermined,
}

impl Stance {
    pub fn side(&self) -> Option<TradeSide> {
        match self {
            Stance::Buy => Some(TradeSide::Buy),
            Stance::Sell => Some(TradeSide::Sell),
            Stance::Undetermined => None,
        }
    }
}

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// One executed order, in the column layout of the fill report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FillRecord {
    #[serde(rename = "Date")]
    pub timestamp: f64,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "Order")]
    pub side: TradeSide,
}
