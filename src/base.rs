use std::{collections::{HashMap, VecDeque}, error::Error, fmt, path::Path};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::market::Market;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn parse_date_time(raw: &str) -> std::result::Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT)
}

fn deserialize_date_time<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<NaiveDateTime, D::Error> {
    let raw: String = Deserialize::deserialize(d)?;
    parse_date_time(&raw).map_err(serde::de::Error::custom)
}

fn serialize_date_time<S: Serializer>(date: &NaiveDateTime, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&date.format(DATE_FORMAT).to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LedgerError {
    UnrecognizedMarket(String),
    MalformedNumber { field: &'static str, value: String },
    MalformedTimestamp(String),
    OutOfOrderTrade { pair: String, timestamp: NaiveDateTime },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerError::UnrecognizedMarket(pair) => {
                write!(f, "unrecognized market for pair '{}'", pair)
            }
            LedgerError::MalformedNumber { field, value } => {
                write!(f, "malformed number in field '{}': '{}'", field, value)
            }
            LedgerError::MalformedTimestamp(value) => {
                write!(f, "malformed timestamp: '{}'", value)
            }
            LedgerError::OutOfOrderTrade { pair, timestamp } => {
                write!(f, "trade for {} at {} breaks newest-first order", pair, timestamp)
            }
        }
    }
}

impl Error for LedgerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

/// A single fill from the trade-history export. Once recorded into a
/// ledger, `amount` is signed: negative for sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Trade {
    pub pair: String,
    #[serde(serialize_with = "serialize_date_time", deserialize_with = "deserialize_date_time")]
    pub timestamp: NaiveDateTime,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub total: Decimal,
    pub fee: Decimal,
}

/// Running aggregate for one traded pair. `history` is kept newest-first;
/// index 0 is the most recent fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PairLedger {
    pub pair: String,
    pub coin: String,
    pub net_amount: Decimal,
    pub fees: Decimal,
    pub bought: Decimal,
    pub sold: Decimal,
    pub difference: Decimal,
    pub difference_excluding_bags: Decimal,
    #[serde(default = "reconciled_default")]
    pub reconciled: bool,
    pub history: VecDeque<Trade>,
}

fn reconciled_default() -> bool {
    true
}

/// An unsold leftover holding for one pair, with the cost basis of the
/// rows consumed to cover it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Bag {
    pub pair: String,
    pub amount: Decimal,
    pub bought_value: Decimal,
    pub history: Vec<Trade>,
}

impl Bag {
    pub(crate) fn open(pair: String) -> Self {
        Self {
            pair,
            amount: Decimal::ZERO,
            bought_value: Decimal::ZERO,
            history: Vec::new(),
        }
    }

    pub(crate) fn absorb(&mut self, trade: Trade) {
        self.amount += trade.amount;
        self.bought_value += trade.total;
        self.history.push(trade);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MarketTotals {
    pub bought: Decimal,
    pub sold: Decimal,
    pub fees: Decimal,
}

/// All pairs traded against one quote currency, in first-seen order,
/// with side indexes for direct lookup by pair symbol.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MarketLedger {
    pub pairs: Vec<PairLedger>,
    #[serde(skip)]
    pub pair_index: HashMap<String, usize>,
    pub bags: Vec<Bag>,
    #[serde(skip)]
    pub bag_index: HashMap<String, usize>,
    pub total: MarketTotals,
    pub profit_excluding_bags: Decimal,
    pub profit_including_bags: Decimal,
}

impl MarketLedger {
    pub(crate) fn pair_position(&self, pair: &str) -> Option<usize> {
        self.pair_index.get(pair).copied()
    }

    /// Inserts a freshly opened pair ledger, front or back, keeping the
    /// index in sync. Front insertion shifts every other position.
    pub(crate) fn insert_pair(&mut self, entry: PairLedger, stack_first: bool) {
        if stack_first {
            self.pairs.insert(0, entry);
            self.pair_index.clear();
            for (position, pair) in self.pairs.iter().enumerate() {
                self.pair_index.insert(pair.pair.clone(), position);
            }
        } else {
            self.pair_index.insert(entry.pair.clone(), self.pairs.len());
            self.pairs.push(entry);
        }
    }

    fn rebuild_indexes(&mut self) {
        self.pair_index.clear();
        for (position, pair) in self.pairs.iter().enumerate() {
            self.pair_index.insert(pair.pair.clone(), position);
        }
        self.bags.clear();
        self.bag_index.clear();
    }
}

/// The top-level ledger state, keyed by market. Built by repeated
/// `record` calls, then finished by the bag and profit passes; the
/// resulting book is the report.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LedgerBook {
    pub markets: HashMap<Market, MarketLedger>,
}

impl LedgerBook {
    /// Restores a book from serialized state. Numeric fields are
    /// rehydrated to exact decimals by serde whether they were stored as
    /// strings or plain JSON numbers; bags are always recomputed by the
    /// reconciliation pass, so persisted ones are discarded.
    pub(crate) fn restore(json: &str) -> Result<Self> {
        let mut book: LedgerBook = serde_json::from_str(json).context("invalid ledger state")?;
        book.normalize();
        Ok(book)
    }

    /// Clears bags and rebuilds the transient lookup indexes from the
    /// stored pair order. Idempotent.
    pub(crate) fn normalize(&mut self) {
        for ledger in self.markets.values_mut() {
            ledger.rebuild_indexes();
        }
    }

    pub(crate) fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize ledger state")
    }
}

pub(crate) fn save_state(book: &LedgerBook, path: &Path) -> Result<()> {
    println!("Saving {}", path.display());
    std::fs::write(path, book.to_json()?)
        .with_context(|| format!("failed to write {}", path.display()))
}

pub(crate) fn load_state(path: &Path) -> Result<LedgerBook> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    LedgerBook::restore(&json)
}
