use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::base::{parse_date_time, LedgerError, Side, Trade};

// struct for storing the following CSV columns:
// Date(UTC),Market,Type,Price,Amount,Total,Fee
//
// Numeric columns are read as strings and parsed explicitly, so a
// malformed value is reported with its field name instead of a generic
// deserialization error.
#[derive(Debug, Deserialize)]
struct TradeHistoryRecord {
    #[serde(rename = "Date(UTC)", alias = "Date")]
    date: String,
    #[serde(rename = "Market", alias = "Pair")]
    market: String,
    #[serde(rename = "Type", alias = "Side")]
    side: Side,
    #[serde(rename = "Price")]
    price: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Total")]
    total: String,
    #[serde(rename = "Fee")]
    fee: String,
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, LedgerError> {
    let mut cleaned = raw.trim();

    // Strip thousands separators, since Decimal::try_from doesn't like those
    let cleaned_owned: String;
    if cleaned.contains(',') {
        cleaned_owned = cleaned.replace(',', "");
        cleaned = cleaned_owned.as_str();
    }

    Decimal::try_from(cleaned).map_err(|_| LedgerError::MalformedNumber {
        field,
        value: raw.to_owned(),
    })
}

impl TryFrom<TradeHistoryRecord> for Trade {
    type Error = LedgerError;

    fn try_from(item: TradeHistoryRecord) -> Result<Self, Self::Error> {
        let timestamp = parse_date_time(&item.date)
            .map_err(|_| LedgerError::MalformedTimestamp(item.date.clone()))?;

        Ok(Trade {
            pair: item.market,
            timestamp,
            side: item.side,
            price: parse_decimal("Price", &item.price)?,
            amount: parse_decimal("Amount", &item.amount)?,
            total: parse_decimal("Total", &item.total)?,
            fee: parse_decimal("Fee", &item.fee)?,
        })
    }
}

/// Puts an export into the newest-first order the ledger expects. Files
/// downloaded straight from the exchange already are; files that were
/// re-sorted oldest-first get reversed. Anything else is left alone and
/// caught by the per-row order check during recording.
fn ensure_newest_first(mut trades: Vec<Trade>) -> Vec<Trade> {
    let descending = trades.windows(2).all(|w| w[0].timestamp >= w[1].timestamp);
    let ascending = trades.windows(2).all(|w| w[0].timestamp <= w[1].timestamp);
    if ascending && !descending {
        println!("note: trade export is oldest-first, reversing");
        trades.reverse();
    }
    trades
}

pub(crate) fn load_trade_history_csv(input_path: &Path, reorder: bool) -> Result<Vec<Trade>> {
    let mut trades = Vec::new();

    let mut rdr = csv::ReaderBuilder::new()
        .from_path(input_path)?;

    for (index, result) in rdr.deserialize().enumerate() {
        let record: TradeHistoryRecord =
            result.with_context(|| format!("row {}", index + 1))?;
        let trade =
            Trade::try_from(record).with_context(|| format!("row {}", index + 1))?;
        trades.push(trade);
    }

    Ok(if reorder { ensure_newest_first(trades) } else { trades })
}
