use serde::{Deserialize, Serialize};

use crate::types::{Price, Quantity};

/// Price-dynamics parameters, fixed for the lifetime of a market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Fractional price response per unit of supply change. Non-negative.
    pub elasticity: f64,
    /// Upper bound (exclusive) of the random price an item gets when it
    /// first enters the market.
    pub discovery_price_ceiling: Price,
    /// Upper bound (exclusive) of a seller's random markup over market
    /// price, as a fraction of that price.
    pub asking_markup: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            elasticity: 0.05,
            discovery_price_ceiling: 10_000.0,
            asking_markup: 0.10,
        }
    }
}

impl MarketConfig {
    pub fn with_elasticity(elasticity: f64) -> Self {
        Self {
            elasticity,
            ..Default::default()
        }
    }

    /// Every field floored at zero; NaN becomes zero as well.
    pub fn clamped(self) -> Self {
        Self {
            elasticity: self.elasticity.max(0.0),
            discovery_price_ceiling: self.discovery_price_ceiling.max(0.0),
            asking_markup: self.asking_markup.max(0.0),
        }
    }
}

/// Sizes for seeding a market with generated agents, goods and money.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub agents: i64,
    /// Number of generated item grants (names may repeat).
    pub items: i64,
    /// Upper bound (exclusive) of each grant's quantity; grants are at least 1.
    pub max_quantity: Quantity,
    /// Money split evenly across all members.
    pub money: Price,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            agents: 100,
            items: 50,
            max_quantity: 100,
            money: 100_000.0,
        }
    }
}
