use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::base::LedgerError;

/// Quote currencies a pair can settle in. Declaration order is the
/// detection order, so a symbol ending in more than one quote currency
/// always resolves the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub(crate) enum Market {
    BTC,
    ETH,
    XMR,
    USDT,
    BNB,
}

impl Market {
    pub(crate) fn symbol(&self) -> &'static str {
        match self {
            Market::BTC => "BTC",
            Market::ETH => "ETH",
            Market::XMR => "XMR",
            Market::USDT => "USDT",
            Market::BNB => "BNB",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Matches the pair symbol's suffix against the known quote currencies,
/// case-insensitively.
pub(crate) fn detect_market(pair: &str) -> Result<Market, LedgerError> {
    let upper = pair.to_ascii_uppercase();
    Market::iter()
        .find(|market| upper.ends_with(market.symbol()))
        .ok_or_else(|| LedgerError::UnrecognizedMarket(pair.to_owned()))
}

/// Splits a pair symbol like `ETHBTC` into its base coin and market.
pub(crate) fn split_pair(pair: &str) -> Result<(String, Market), LedgerError> {
    let market = detect_market(pair)?;
    let coin = pair[..pair.len() - market.symbol().len()].to_owned();
    Ok((coin, market))
}
