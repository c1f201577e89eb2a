use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::agent::SupplyChannel;
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::item::Item;
use crate::random::{RandomSource, pick_index, uniform_real};
use crate::types::{AgentId, Price, Quantity};

// ============================================================================
// Market - Price table and membership registry
// ============================================================================

/// A market's own state: who trades here and what each item costs.
///
/// Supply is never stored. It is the sum of member inventories and lives on
/// [`crate::Economy`], which owns the agents. Prices move incrementally on
/// every supply change reported through [`Market::add_item`] and
/// [`Market::remove_item`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub name: String,
    config: MarketConfig,
    /// Filled only by the owning `Economy`; never serialized, and emptied
    /// when a market is handed to [`crate::Economy::add_market`].
    #[serde(skip)]
    members: Vec<AgentId>,
    prices: HashMap<Item, Price>,
}

impl Market {
    pub fn new(elasticity: f64) -> Self {
        Self::named("Market", elasticity)
    }

    pub fn named(name: impl Into<String>, elasticity: f64) -> Self {
        Self::with_config(name, MarketConfig::with_elasticity(elasticity))
    }

    /// Negative (or NaN) config values are clamped to zero.
    pub fn with_config(name: impl Into<String>, config: MarketConfig) -> Self {
        Self {
            name: name.into(),
            config: config.clamped(),
            members: Vec::new(),
            prices: HashMap::new(),
        }
    }

    pub fn elasticity(&self) -> f64 {
        self.config.elasticity
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    // === Membership ===

    /// Members in joining order
    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    pub fn is_member(&self, agent: AgentId) -> bool {
        self.members.contains(&agent)
    }

    pub fn random_member(&self, rng: &mut dyn RandomSource) -> Option<AgentId> {
        pick_index(rng, self.members.len()).map(|i| self.members[i])
    }

    /// Forget every member and re-clamp the config. Used when a market
    /// enters an economy, so a cloned or deserialized market starts empty.
    pub(crate) fn reset_for_economy(&mut self) {
        self.members.clear();
        self.config = self.config.clamped();
    }

    pub(crate) fn attach(&mut self, agent: AgentId) {
        self.members.push(agent);
    }

    /// Drops the first registry entry for `agent`; false if there was none.
    pub(crate) fn detach(&mut self, agent: AgentId) -> bool {
        match self.members.iter().position(|&m| m == agent) {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }

    // === Prices ===

    pub fn price(&self, item: &Item) -> Result<Price> {
        self.prices
            .get(item)
            .copied()
            .ok_or_else(|| MarketError::UnknownItemPrice(item.clone()))
    }

    pub fn has_price(&self, item: &Item) -> bool {
        self.prices.contains_key(item)
    }

    /// Every priced item, sorted by name
    pub fn priced_items(&self) -> Vec<(&Item, Price)> {
        let mut priced: Vec<_> = self.prices.iter().map(|(item, &p)| (item, p)).collect();
        priced.sort_by(|a, b| a.0.cmp(b.0));
        priced
    }

    /// Overwrite (or create) the price for `item`.
    pub fn set_price(&mut self, item: &Item, price: Price) {
        let old_price = self.prices.insert(item.clone(), price);

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "price",
            market = self.name.as_str(),
            item = item.name(),
            old_price = old_price.unwrap_or(price),
            new_price = price,
            cause = "set",
        );
        let _ = old_price;
    }

    /// Shift the price for `item` by `delta`, never below zero.
    pub fn change_price(&mut self, item: &Item, delta: Price) -> Result<()> {
        if !delta.is_finite() {
            return Err(MarketError::InvalidPrice(delta));
        }
        self.shift_price(item, delta, "change")
    }

    /// Post-trade adjustment. Unlike `change_price` it accepts any delta:
    /// by then the trade has already moved goods and money.
    pub(crate) fn nudge_price(&mut self, item: &Item, delta: Price) -> Result<()> {
        self.shift_price(item, delta, "change")
    }

    #[cfg(test)]
    pub(crate) fn forget_price(&mut self, item: &Item) {
        self.prices.remove(item);
    }

    /// New supply of `item` entered the market.
    ///
    /// An item never seen before gets a random discovery price; otherwise the
    /// price falls by `price * elasticity * quantity`, floored at zero.
    pub fn add_item(
        &mut self,
        item: &Item,
        quantity: Quantity,
        rng: &mut dyn RandomSource,
    ) -> Result<()> {
        match self.prices.get(item).copied() {
            Some(price) => {
                let delta = -price * self.config.elasticity * quantity as f64;
                self.shift_price(item, delta, "supply_added")
            }
            None => {
                let price = uniform_real(rng, self.config.discovery_price_ceiling)?;
                self.prices.insert(item.clone(), price);

                #[cfg(feature = "instrument")]
                tracing::info!(
                    target: "price",
                    market = self.name.as_str(),
                    item = item.name(),
                    old_price = price,
                    new_price = price,
                    cause = "discovered",
                );
                Ok(())
            }
        }
    }

    /// Supply of `item` left the market; the price rises by
    /// `price * elasticity * quantity`.
    pub fn remove_item(&mut self, item: &Item, quantity: Quantity) -> Result<()> {
        let price = self.price(item)?;
        let delta = price * self.config.elasticity * quantity as f64;
        self.shift_price(item, delta, "supply_removed")
    }

    fn shift_price(&mut self, item: &Item, delta: Price, cause: &'static str) -> Result<()> {
        let entry = self
            .prices
            .get_mut(item)
            .ok_or_else(|| MarketError::UnknownItemPrice(item.clone()))?;
        let old_price = *entry;
        *entry = (old_price + delta).max(0.0);

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "price",
            market = self.name.as_str(),
            item = item.name(),
            old_price = old_price,
            new_price = *entry,
            cause = cause,
        );
        let _ = (old_price, cause);
        Ok(())
    }
}

/// Routes a member agent's supply changes into its market's price model.
pub struct MarketFeed<'a> {
    pub market: &'a mut Market,
    pub rng: &'a mut dyn RandomSource,
}

impl SupplyChannel for MarketFeed<'_> {
    fn supply_added(&mut self, item: &Item, quantity: Quantity) -> Result<()> {
        self.market.add_item(item, quantity, self.rng)
    }

    fn supply_removed(&mut self, item: &Item, quantity: Quantity) -> Result<()> {
        self.market.remove_item(item, quantity)
    }
}
