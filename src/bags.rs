use rust_decimal::Decimal;

use crate::base::{Bag, LedgerBook, MarketLedger, Side};
use crate::market::Market;

/// A pair whose leftover amount could not be fully matched against its
/// buy history. Not fatal; the pair's report stays at its last computed
/// difference and is flagged as partially reconciled.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UnreconciledBag {
    pub market: Market,
    pub pair: String,
    pub leftover: Decimal,
}

/// Walks every pair with a positive net amount back through its history
/// (newest fill first) to find the buys covering the unsold remainder.
/// Each visited row is folded into the pair's bag with its full total,
/// even when only part of its amount is needed to close the remainder.
/// When the remainder lands on exactly zero, the bag's cost basis is
/// added back onto the realized difference to give the profit the pair
/// would show had the leftover coins never been acquired.
///
/// Bags are recomputed from scratch on every call, so re-running the
/// pass over the same book gives the same result.
pub(crate) fn reconcile_bags(book: &mut LedgerBook) -> Vec<UnreconciledBag> {
    let mut unreconciled = Vec::new();

    for (market, ledger) in &mut book.markets {
        let MarketLedger { pairs, bags, bag_index, .. } = ledger;
        bags.clear();
        bag_index.clear();

        for entry in pairs.iter_mut() {
            if entry.net_amount <= Decimal::ZERO {
                entry.reconciled = true;
                continue;
            }

            let mut remaining = entry.net_amount;
            let mut matched = false;
            let mut cursor = 0;

            while remaining > Decimal::ZERO && cursor < entry.history.len() && !matched {
                let row = entry.history[cursor].clone();
                if row.side == Side::Buy {
                    remaining -= row.amount;
                }

                let slot = match bag_index.get(&entry.pair) {
                    Some(&slot) => slot,
                    None => {
                        bag_index.insert(entry.pair.clone(), bags.len());
                        bags.push(Bag::open(entry.pair.clone()));
                        bags.len() - 1
                    }
                };
                bags[slot].absorb(row);

                if remaining == Decimal::ZERO {
                    matched = true;
                    entry.difference_excluding_bags = bags[slot].bought_value + entry.difference;
                }
                cursor += 1;
            }

            entry.reconciled = matched;
            if !matched {
                println!(
                    "warning: leftover {} {} could not be matched against the buy history of {} on the {} market",
                    remaining, entry.coin, entry.pair, market
                );
                unreconciled.push(UnreconciledBag {
                    market: *market,
                    pair: entry.pair.clone(),
                    leftover: remaining,
                });
            }
        }
    }

    unreconciled
}
