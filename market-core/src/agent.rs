use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::inventory::Inventory;
use crate::item::Item;
use crate::naming;
use crate::random::RandomSource;
use crate::types::{MarketId, Price, Quantity};

/// Receiver of an agent's supply changes while the agent is a market member.
///
/// [`crate::Market`] reacts to these by moving its price for the item.
pub trait SupplyChannel {
    fn supply_added(&mut self, item: &Item, quantity: Quantity) -> Result<()>;
    fn supply_removed(&mut self, item: &Item, quantity: Quantity) -> Result<()>;
}

// ============================================================================
// Agent - A person or vendor trading goods for money
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    inventory: Inventory,
    money: Price,
    /// Market this agent currently belongs to. Set and cleared only by
    /// [`crate::Economy::join`] and [`crate::Economy::leave`]; never
    /// serialized.
    #[serde(skip)]
    pub(crate) market: Option<MarketId>,
}

impl Agent {
    /// A fresh agent: no money, no items, no market.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inventory: Inventory::new(),
            money: 0.0,
            market: None,
        }
    }

    pub fn with_random_name(rng: &mut dyn RandomSource) -> Self {
        Self::new(naming::random_agent_name(rng))
    }

    pub fn with_money(mut self, money: Price) -> Self {
        self.receive_money(money);
        self
    }

    pub fn with_item(mut self, item: impl Into<Item>, quantity: Quantity) -> Self {
        self.inventory.add(&item.into(), quantity);
        self
    }

    pub fn money(&self) -> Price {
        self.money
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn market(&self) -> Option<MarketId> {
        self.market
    }

    /// Take in `quantity` units. The market hears about the new supply
    /// before the local inventory changes.
    pub fn receive_item(
        &mut self,
        item: &Item,
        quantity: Quantity,
        channel: Option<&mut dyn SupplyChannel>,
    ) -> Result<()> {
        if quantity <= 0 {
            return Ok(());
        }
        if let Some(channel) = channel {
            channel.supply_added(item, quantity)?;
        }
        self.inventory.add(item, quantity);
        Ok(())
    }

    /// Give up `quantity` units. The local inventory changes first, then the
    /// market hears about the withdrawn supply.
    pub fn lose_item(
        &mut self,
        item: &Item,
        quantity: Quantity,
        channel: Option<&mut dyn SupplyChannel>,
    ) -> Result<()> {
        if quantity <= 0 {
            return Ok(());
        }
        self.inventory.remove(item, quantity);
        if let Some(channel) = channel {
            channel.supply_removed(item, quantity)?;
        }
        Ok(())
    }

    pub fn receive_money(&mut self, amount: Price) {
        if amount > 0.0 {
            self.money += amount;
        }
    }

    /// Unconditional: the balance may go negative. Trades check funds
    /// before calling this.
    pub fn lose_money(&mut self, amount: Price) {
        if amount > 0.0 {
            self.money -= amount;
        }
    }

    /// Agents rank by money alone.
    pub fn cmp_money(&self, other: &Agent) -> Ordering {
        self.money.total_cmp(&other.money)
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" with ${:.2} and {}", self.name, self.money, self.inventory)
    }
}
