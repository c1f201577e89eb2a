use thiserror::Error;

use crate::item::Item;
use crate::types::{Price, Quantity};

/// Everything the market engine can refuse to do.
///
/// Non-positive quantities and amounts are not errors: those calls are
/// silent no-ops throughout the crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("not enough money to buy: needs ${needed:.2}, has ${available:.2}")]
    InsufficientFunds { needed: Price, available: Price },

    #[error("not enough stock of {item} to sell: needs {needed}, has {available}")]
    InsufficientStock {
        item: Item,
        needed: Quantity,
        available: Quantity,
    },

    #[error("buyer and seller must both belong to the trading market")]
    CrossMarketTrade,

    #[error("price must be a finite, non-negative amount, got {0}")]
    InvalidPrice(f64),

    #[error("market has no price for {0}")]
    UnknownItemPrice(Item),

    #[error("give-or-take must be a percentage in [0, 1], got {0}")]
    InvalidPercentage(f64),

    #[error("random range upper bound must be non-negative, got {0}")]
    NegativeBound(f64),

    #[error("no such agent")]
    UnknownAgent,

    #[error("no such market")]
    UnknownMarket,

    #[error("snapshot serialization failed: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, MarketError>;
