use std::path::Path;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::base::{LedgerBook, MarketLedger};
use crate::market::Market;

/// Sums the per-pair differences into the two market-level profit
/// figures, with and without the cost basis of still-held bags.
pub(crate) fn summarize_profit(book: &mut LedgerBook) {
    for ledger in book.markets.values_mut() {
        let mut excluding = Decimal::ZERO;
        let mut including = Decimal::ZERO;
        for entry in &ledger.pairs {
            excluding += entry.difference_excluding_bags;
            including += entry.difference;
        }
        ledger.profit_excluding_bags = excluding;
        ledger.profit_including_bags = including;
    }
}

fn print_market(market: Market, ledger: &MarketLedger) {
    println!("{} market", market);
    println!(
        "  bought {} / sold {} / fees {}",
        ledger.total.bought.normalize(),
        ledger.total.sold.normalize(),
        ledger.total.fees.normalize()
    );
    for entry in &ledger.pairs {
        let flag = if entry.reconciled { "" } else { "  (partially reconciled)" };
        println!(
            "  {}: difference {} / excluding bags {}{}",
            entry.pair,
            entry.difference.normalize(),
            entry.difference_excluding_bags.normalize(),
            flag
        );
    }
    for bag in &ledger.bags {
        println!(
            "  bag {}: {} left, {} {} spent",
            bag.pair,
            bag.amount.normalize(),
            bag.bought_value.normalize(),
            market
        );
    }
    println!(
        "  profit {} including bags, {} excluding bags",
        ledger.profit_including_bags.normalize(),
        ledger.profit_excluding_bags.normalize()
    );
}

/// Prints one summary block per market, in the fixed market order.
pub(crate) fn print_summary(book: &LedgerBook) {
    for market in Market::iter() {
        if let Some(ledger) = book.markets.get(&market) {
            print_market(market, ledger);
        }
    }
}

pub(crate) fn save_report_to_csv(book: &LedgerBook, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    #[derive(Serialize)]
    struct CsvPair<'a> {
        #[serde(rename = "Market")]
        market: &'a str,
        #[serde(rename = "Pair")]
        pair: &'a str,
        #[serde(rename = "Coin")]
        coin: &'a str,
        #[serde(rename = "Net Amount")]
        net_amount: Decimal,
        #[serde(rename = "Bought")]
        bought: Decimal,
        #[serde(rename = "Sold")]
        sold: Decimal,
        #[serde(rename = "Fees")]
        fees: Decimal,
        #[serde(rename = "Difference")]
        difference: Decimal,
        #[serde(rename = "Difference w/o Bags")]
        difference_excluding_bags: Decimal,
        #[serde(rename = "Reconciled")]
        reconciled: bool,
    }

    for market in Market::iter() {
        let Some(ledger) = book.markets.get(&market) else {
            continue;
        };
        for entry in &ledger.pairs {
            wtr.serialize(CsvPair {
                market: market.symbol(),
                pair: &entry.pair,
                coin: &entry.coin,
                net_amount: entry.net_amount.normalize(),
                bought: entry.bought.normalize(),
                sold: entry.sold.normalize(),
                fees: entry.fees.normalize(),
                difference: entry.difference.normalize(),
                difference_excluding_bags: entry.difference_excluding_bags.normalize(),
                reconciled: entry.reconciled,
            })?;
        }
    }

    Ok(())
}
