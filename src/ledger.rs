use rust_decimal::Decimal;

use crate::base::{LedgerBook, LedgerError, PairLedger, Side, Trade};
use crate::market::split_pair;

impl PairLedger {
    /// Opens the aggregate for a pair from its first recorded fill. The
    /// trade's amount must already be signed.
    fn open(coin: String, trade: Trade) -> Self {
        Self {
            pair: trade.pair.clone(),
            coin,
            net_amount: trade.amount,
            fees: trade.fee,
            bought: if trade.side == Side::Buy { trade.total } else { Decimal::ZERO },
            sold: if trade.side == Side::Sell { trade.total } else { Decimal::ZERO },
            difference: if trade.side == Side::Sell { trade.total } else { -trade.total },
            difference_excluding_bags: Decimal::ZERO,
            reconciled: true,
            history: [trade].into(),
        }
    }

    /// The bag walk relies on history being newest-first, so the row
    /// joining at either end must not be newer than the front or older
    /// than the back.
    fn check_order(&self, trade: &Trade, stack_first: bool) -> Result<(), LedgerError> {
        let boundary = if stack_first { self.history.front() } else { self.history.back() };
        let ordered = match (boundary, stack_first) {
            (Some(front), true) => trade.timestamp >= front.timestamp,
            (Some(back), false) => trade.timestamp <= back.timestamp,
            (None, _) => true,
        };
        if ordered {
            Ok(())
        } else {
            Err(LedgerError::OutOfOrderTrade {
                pair: trade.pair.clone(),
                timestamp: trade.timestamp,
            })
        }
    }
}

impl LedgerBook {
    /// Folds one fill into the book. With `stack_first` the row goes to
    /// the front of the pair's history (for oldest-first feeds); the
    /// default appends. A failed row leaves the book untouched, so the
    /// caller may skip it and continue.
    pub(crate) fn record(&mut self, mut trade: Trade, stack_first: bool) -> Result<(), LedgerError> {
        let (coin, market) = split_pair(&trade.pair)?;
        let ledger = self.markets.entry(market).or_default();

        let position = ledger.pair_position(&trade.pair);
        if let Some(position) = position {
            ledger.pairs[position].check_order(&trade, stack_first)?;
        }

        match trade.side {
            Side::Buy => ledger.total.bought += trade.total,
            Side::Sell => ledger.total.sold += trade.total,
        }
        ledger.total.fees += trade.fee;

        // Selling reduces the held amount
        if trade.side == Side::Sell {
            trade.amount = -trade.amount;
        }

        match position {
            None => {
                let entry = PairLedger::open(coin, trade);
                ledger.insert_pair(entry, stack_first);
            }
            Some(position) => {
                let entry = &mut ledger.pairs[position];
                match trade.side {
                    Side::Buy => entry.bought += trade.total,
                    Side::Sell => entry.sold += trade.total,
                }
                entry.fees += trade.fee;
                entry.net_amount += trade.amount;
                entry.difference = entry.sold - entry.bought;
                entry.difference_excluding_bags = entry.difference;
                if stack_first {
                    entry.history.push_front(trade);
                } else {
                    entry.history.push_back(trade);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::parse_date_time;
    use crate::market::Market;
    use rust_decimal_macros::dec;

    fn trade_at(pair: &str, side: Side, total: Decimal, amount: Decimal, time: &str) -> Trade {
        Trade {
            pair: pair.to_owned(),
            timestamp: parse_date_time(time).unwrap(),
            side,
            price: total / amount,
            amount,
            total,
            fee: dec!(0.01),
        }
    }

    fn trade(pair: &str, side: Side, total: Decimal, amount: Decimal) -> Trade {
        trade_at(pair, side, total, amount, "2021-03-14 12:00:00")
    }

    #[test]
    fn test_first_buy_opens_pair() {
        let mut book = LedgerBook::default();
        book.record(trade("ETHBTC", Side::Buy, dec!(10), dec!(2)), false).unwrap();

        let ledger = &book.markets[&Market::BTC];
        let entry = &ledger.pairs[0];
        assert_eq!(entry.pair, "ETHBTC");
        assert_eq!(entry.coin, "ETH");
        assert_eq!(entry.net_amount, dec!(2));
        assert_eq!(entry.bought, dec!(10));
        assert_eq!(entry.sold, dec!(0));
        assert_eq!(entry.difference, dec!(-10));
        assert_eq!(entry.difference_excluding_bags, dec!(0));
        assert_eq!(entry.history.len(), 1);
        assert_eq!(ledger.total.bought, dec!(10));
        assert_eq!(ledger.total.fees, dec!(0.01));
    }

    #[test]
    fn test_first_sell_negates_amount() {
        let mut book = LedgerBook::default();
        book.record(trade("ETHBTC", Side::Sell, dec!(10), dec!(2)), false).unwrap();

        let entry = &book.markets[&Market::BTC].pairs[0];
        assert_eq!(entry.net_amount, dec!(-2));
        assert_eq!(entry.sold, dec!(10));
        assert_eq!(entry.difference, dec!(10));
        assert_eq!(entry.history[0].amount, dec!(-2));
    }

    #[test]
    fn test_difference_is_recomputed_each_row() {
        let mut book = LedgerBook::default();
        book.record(trade_at("ETHBTC", Side::Sell, dec!(12), dec!(2), "2021-03-14 12:00:00"), false).unwrap();
        book.record(trade_at("ETHBTC", Side::Buy, dec!(10), dec!(2), "2021-03-14 11:00:00"), false).unwrap();
        book.record(trade_at("ETHBTC", Side::Buy, dec!(5), dec!(1), "2021-03-14 10:00:00"), false).unwrap();

        let entry = &book.markets[&Market::BTC].pairs[0];
        assert_eq!(entry.difference, entry.sold - entry.bought);
        assert_eq!(entry.difference, dec!(-3));
        assert_eq!(entry.difference_excluding_bags, dec!(-3));
        assert_eq!(entry.net_amount, dec!(1));
        assert_eq!(entry.fees, dec!(0.03));
    }

    #[test]
    fn test_market_totals_match_pair_sums() {
        let mut book = LedgerBook::default();
        book.record(trade("ETHBTC", Side::Buy, dec!(10), dec!(2)), false).unwrap();
        book.record(trade("LTCBTC", Side::Sell, dec!(4), dec!(8)), false).unwrap();
        book.record(trade("XRPUSDT", Side::Buy, dec!(100), dec!(250)), false).unwrap();

        for ledger in book.markets.values() {
            let bought: Decimal = ledger.pairs.iter().map(|p| p.bought).sum();
            let sold: Decimal = ledger.pairs.iter().map(|p| p.sold).sum();
            let fees: Decimal = ledger.pairs.iter().map(|p| p.fees).sum();
            assert_eq!(ledger.total.bought, bought);
            assert_eq!(ledger.total.sold, sold);
            assert_eq!(ledger.total.fees, fees);
        }
    }

    #[test]
    fn test_stack_first_prepends_history() {
        let mut book = LedgerBook::default();
        book.record(trade_at("ETHBTC", Side::Buy, dec!(10), dec!(2), "2021-03-14 10:00:00"), true).unwrap();
        book.record(trade_at("ETHBTC", Side::Sell, dec!(12), dec!(2), "2021-03-14 11:00:00"), true).unwrap();
        book.record(trade_at("LTCBTC", Side::Buy, dec!(1), dec!(2), "2021-03-14 12:00:00"), true).unwrap();

        let ledger = &book.markets[&Market::BTC];
        // Newest pair stacked on top, newest fill at the front
        assert_eq!(ledger.pairs[0].pair, "LTCBTC");
        assert_eq!(ledger.pairs[1].pair, "ETHBTC");
        assert_eq!(ledger.pair_position("ETHBTC"), Some(1));
        assert_eq!(ledger.pairs[1].history[0].side, Side::Sell);
    }

    #[test]
    fn test_out_of_order_append_is_rejected() {
        let mut book = LedgerBook::default();
        book.record(trade_at("ETHBTC", Side::Sell, dec!(12), dec!(2), "2021-03-14 11:00:00"), false).unwrap();
        let newer = trade_at("ETHBTC", Side::Buy, dec!(10), dec!(2), "2021-03-14 12:00:00");

        match book.record(newer, false) {
            Err(LedgerError::OutOfOrderTrade { pair, .. }) => assert_eq!(pair, "ETHBTC"),
            other => panic!("expected OutOfOrderTrade, got {:?}", other),
        }
        // The failed row must not have touched the book
        let ledger = &book.markets[&Market::BTC];
        assert_eq!(ledger.total.bought, dec!(0));
        assert_eq!(ledger.pairs[0].history.len(), 1);
    }

    #[test]
    fn test_unrecognized_market_leaves_book_untouched() {
        let mut book = LedgerBook::default();
        assert_eq!(
            book.record(trade("FOOBAR", Side::Buy, dec!(1), dec!(1)), false),
            Err(LedgerError::UnrecognizedMarket("FOOBAR".to_owned()))
        );
        assert!(book.markets.is_empty());
    }
}
