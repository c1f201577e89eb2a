// Economy: the arena that owns every agent and market
//
// Agents point at their market through a `MarketId` handle and markets list
// their members as `AgentId`s. Anything that touches an agent and a market at
// once (supply notifications, joining, leaving, trading) goes through here.

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

#[cfg(feature = "instrument")]
use crate::types::KeyToU64;

use crate::agent::Agent;
use crate::config::PopulationConfig;
use crate::error::{MarketError, Result};
use crate::inventory::Inventory;
use crate::item::Item;
use crate::market::{Market, MarketFeed};
use crate::random::{
    RandomSource, StdRandom, pick_index, random_bracket, uniform_int, uniform_real,
};
use crate::types::{AgentId, MarketId, Price, Quantity};

/// Give-or-take around the market price used by [`Economy::random_trade`].
const RANDOM_TRADE_SPREAD: f64 = 0.10;

/// Terms and price effect of a completed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub buyer: AgentId,
    pub seller: AgentId,
    pub item: Item,
    pub quantity: Quantity,
    pub price_each: Price,
    /// `price_each * quantity`, moved from buyer to seller
    pub total: Price,
    /// Market price before any leg of the trade ran
    pub market_price: Price,
    pub asking_each: Price,
    /// Positive when the seller got the better deal
    pub difference: Price,
    pub price_after: Price,
}

pub struct Economy {
    agents: SlotMap<AgentId, Agent>,
    markets: SlotMap<MarketId, Market>,
    rng: Box<dyn RandomSource>,
}

impl Default for Economy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Economy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Economy")
            .field("agents", &self.agents)
            .field("markets", &self.markets)
            .finish_non_exhaustive()
    }
}

impl Economy {
    pub fn new() -> Self {
        Self::with_random(StdRandom::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_random(StdRandom::seeded(seed))
    }

    pub fn with_random(source: impl RandomSource + 'static) -> Self {
        Self {
            agents: SlotMap::with_key(),
            markets: SlotMap::with_key(),
            rng: Box::new(source),
        }
    }

    pub fn rng(&mut self) -> &mut dyn RandomSource {
        self.rng.as_mut()
    }

    // === Market Management ===

    /// Take ownership of `market`. Any member list it carries (from a clone
    /// or a deserialized copy) is dropped, since membership only exists
    /// through [`Economy::join`].
    pub fn add_market(&mut self, mut market: Market) -> MarketId {
        market.reset_for_economy();
        self.markets.insert(market)
    }

    pub fn market(&self, id: MarketId) -> Result<&Market> {
        self.markets.get(id).ok_or(MarketError::UnknownMarket)
    }

    fn market_mut(&mut self, id: MarketId) -> Result<&mut Market> {
        self.markets.get_mut(id).ok_or(MarketError::UnknownMarket)
    }

    pub fn markets(&self) -> impl Iterator<Item = (MarketId, &Market)> {
        self.markets.iter()
    }

    /// Seed or overwrite a price. Must be finite and non-negative.
    pub fn set_price(&mut self, market: MarketId, item: &Item, price: Price) -> Result<()> {
        if !price.is_finite() || price < 0.0 {
            return Err(MarketError::InvalidPrice(price));
        }
        self.market_mut(market)?.set_price(item, price);
        Ok(())
    }

    pub fn change_price(&mut self, market: MarketId, item: &Item, delta: Price) -> Result<()> {
        self.market_mut(market)?.change_price(item, delta)
    }

    // === Agent Management ===

    /// Register an agent outside of any market.
    pub fn add_agent(&mut self, mut agent: Agent) -> AgentId {
        agent.market = None;
        self.agents.insert(agent)
    }

    /// Register an agent and join it to `market`, folding its stock into
    /// the market's supply.
    pub fn add_agent_to(&mut self, agent: Agent, market: MarketId) -> Result<AgentId> {
        self.market(market)?;
        let id = self.add_agent(agent);
        self.join(market, id)?;
        Ok(id)
    }

    pub fn agent(&self, id: AgentId) -> Result<&Agent> {
        self.agents.get(id).ok_or(MarketError::UnknownAgent)
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter()
    }

    /// Members of `market` in joining order
    pub fn members(&self, market: MarketId) -> Result<Vec<(AgentId, &Agent)>> {
        Ok(self
            .market(market)?
            .members()
            .iter()
            .filter_map(|&id| self.agents.get(id).map(|a| (id, a)))
            .collect())
    }

    // === Agent Holdings ===

    /// Give `quantity` of `item` to an agent; a market member's market
    /// reprices the item before the agent's inventory grows.
    pub fn receive_item(&mut self, agent: AgentId, item: &Item, quantity: Quantity) -> Result<()> {
        let holder = self.agents.get_mut(agent).ok_or(MarketError::UnknownAgent)?;
        match holder.market {
            Some(market_id) => {
                let market = self
                    .markets
                    .get_mut(market_id)
                    .ok_or(MarketError::UnknownMarket)?;
                let mut feed = MarketFeed {
                    market,
                    rng: self.rng.as_mut(),
                };
                holder.receive_item(item, quantity, Some(&mut feed))
            }
            None => holder.receive_item(item, quantity, None),
        }
    }

    /// Take `quantity` of `item` from an agent; a market member's market
    /// reprices the item afterwards.
    ///
    /// Fails without touching anything if the agent's market has no price
    /// for the item.
    pub fn lose_item(&mut self, agent: AgentId, item: &Item, quantity: Quantity) -> Result<()> {
        let holder = self.agents.get_mut(agent).ok_or(MarketError::UnknownAgent)?;
        match holder.market {
            Some(market_id) => {
                let market = self
                    .markets
                    .get_mut(market_id)
                    .ok_or(MarketError::UnknownMarket)?;
                if quantity > 0 && !market.has_price(item) {
                    return Err(MarketError::UnknownItemPrice(item.clone()));
                }
                let mut feed = MarketFeed {
                    market,
                    rng: self.rng.as_mut(),
                };
                holder.lose_item(item, quantity, Some(&mut feed))
            }
            None => holder.lose_item(item, quantity, None),
        }
    }

    pub fn receive_money(&mut self, agent: AgentId, amount: Price) -> Result<()> {
        let holder = self.agents.get_mut(agent).ok_or(MarketError::UnknownAgent)?;
        holder.receive_money(amount);
        Ok(())
    }

    pub fn lose_money(&mut self, agent: AgentId, amount: Price) -> Result<()> {
        let holder = self.agents.get_mut(agent).ok_or(MarketError::UnknownAgent)?;
        holder.lose_money(amount);
        Ok(())
    }

    // === Membership ===

    /// Attach `agent` to `market`, then introduce each of its holdings as new
    /// supply. An agent already in another market leaves that one first;
    /// joining the same market twice does nothing.
    pub fn join(&mut self, market_id: MarketId, agent_id: AgentId) -> Result<()> {
        self.market(market_id)?;
        match self.agent(agent_id)?.market {
            Some(previous) if previous == market_id => return Ok(()),
            Some(previous) => self.leave(previous, agent_id)?,
            None => {}
        }

        let market = self
            .markets
            .get_mut(market_id)
            .ok_or(MarketError::UnknownMarket)?;
        let holder = self
            .agents
            .get_mut(agent_id)
            .ok_or(MarketError::UnknownAgent)?;
        holder.market = Some(market_id);
        market.attach(agent_id);

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "membership",
            market = market.name.as_str(),
            agent = agent_id.to_u64(),
            action = "join",
            units = holder.inventory().total(),
        );

        for (item, quantity) in holder.inventory() {
            market.add_item(item, quantity, self.rng.as_mut())?;
        }
        Ok(())
    }

    /// Join each agent in order. Agents joined before a failure stay joined.
    pub fn join_all(
        &mut self,
        market: MarketId,
        agents: impl IntoIterator<Item = AgentId>,
    ) -> Result<()> {
        for agent in agents {
            self.join(market, agent)?;
        }
        Ok(())
    }

    /// Detach `agent` from `market` and withdraw each of its holdings from
    /// the market's supply. A no-op for agents the market doesn't know.
    ///
    /// Every held item must be priced by the market; otherwise nothing
    /// changes and `UnknownItemPrice` is returned.
    pub fn leave(&mut self, market_id: MarketId, agent_id: AgentId) -> Result<()> {
        let market = self
            .markets
            .get_mut(market_id)
            .ok_or(MarketError::UnknownMarket)?;
        let holder = self
            .agents
            .get_mut(agent_id)
            .ok_or(MarketError::UnknownAgent)?;

        let handle_here = holder.market == Some(market_id);
        if !handle_here && !market.is_member(agent_id) {
            return Ok(());
        }
        if let Some((item, _)) = holder.inventory().iter().find(|(item, _)| !market.has_price(item)) {
            return Err(MarketError::UnknownItemPrice(item.clone()));
        }

        if handle_here {
            holder.market = None;
        }
        market.detach(agent_id);

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "membership",
            market = market.name.as_str(),
            agent = agent_id.to_u64(),
            action = "leave",
            units = holder.inventory().total(),
        );

        for (item, quantity) in holder.inventory() {
            market.remove_item(item, quantity)?;
        }
        Ok(())
    }

    /// Leave for each agent in order. Agents removed before a failure stay
    /// removed.
    pub fn leave_all(
        &mut self,
        market: MarketId,
        agents: impl IntoIterator<Item = AgentId>,
    ) -> Result<()> {
        for agent in agents {
            self.leave(market, agent)?;
        }
        Ok(())
    }

    // === Aggregates ===

    /// Units of `item` held across all current members
    pub fn supply(&self, market: MarketId, item: &Item) -> Result<Quantity> {
        Ok(self
            .members(market)?
            .iter()
            .map(|(_, agent)| agent.inventory().quantity(item))
            .sum())
    }

    /// Everything held by the market's members, merged into one inventory
    pub fn market_items(&self, market: MarketId) -> Result<Inventory> {
        let mut items = Inventory::new();
        for (_, agent) in self.members(market)? {
            items.merge(agent.inventory());
        }
        Ok(items)
    }

    /// Distinct items held by the market's members, sorted by name
    pub fn market_items_list(&self, market: MarketId) -> Result<Vec<Item>> {
        Ok(self.market_items(market)?.items())
    }

    /// Money plus holdings valued at `market`'s prices.
    pub fn agent_wealth(&self, market: MarketId, agent: AgentId) -> Result<Price> {
        let market = self.market(market)?;
        let agent = self.agent(agent)?;
        let mut wealth = agent.money();
        for (item, quantity) in agent.inventory() {
            wealth += market.price(item)? * quantity as f64;
        }
        Ok(wealth)
    }

    pub fn random_agent(&mut self, market: MarketId) -> Result<Option<AgentId>> {
        let market = self.markets.get(market).ok_or(MarketError::UnknownMarket)?;
        Ok(market.random_member(self.rng.as_mut()))
    }

    // === Trading ===

    /// `buyer` purchases `quantity` of `item` from `seller` at `price_each`.
    ///
    /// All checks run before anything moves, so a failed trade leaves both
    /// agents and the price table untouched. On success the item's price is
    /// nudged by `difference * elasticity * market_price`, where
    /// `market_price` is the price before the trade and `difference`
    /// compares the agreed price with the seller's random asking price.
    ///
    /// Returns `Ok(None)` for a non-positive quantity.
    pub fn buy(
        &mut self,
        market_id: MarketId,
        buyer: AgentId,
        seller: AgentId,
        item: &Item,
        quantity: Quantity,
        price_each: Price,
    ) -> Result<Option<Trade>> {
        if quantity <= 0 {
            return Ok(None);
        }
        let total = price_each * quantity as f64;

        let (market_price, elasticity, asking_markup) =
            match self.check_trade(market_id, buyer, seller, item, quantity, price_each) {
                Ok(terms) => terms,
                Err(e) => {
                    #[cfg(feature = "instrument")]
                    tracing::info!(
                        target: "trade_rejected",
                        buyer = buyer.to_u64(),
                        seller = seller.to_u64(),
                        item = item.name(),
                        quantity = quantity,
                        price_each = price_each,
                        reason = %e,
                    );
                    return Err(e);
                }
            };

        let markup = uniform_real(self.rng.as_mut(), market_price * asking_markup)?;
        let asking_each = market_price + markup;

        // Goods
        self.lose_item(seller, item, quantity)?;
        self.receive_item(buyer, item, quantity)?;

        // Money
        self.lose_money(buyer, total)?;
        self.receive_money(seller, total)?;

        let difference = price_each * quantity as f64 - asking_each * quantity as f64;
        let market = self.market_mut(market_id)?;
        market.nudge_price(item, difference * elasticity * market_price)?;
        let price_after = market.price(item)?;

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "trade",
            market = market.name.as_str(),
            buyer = buyer.to_u64(),
            seller = seller.to_u64(),
            item = item.name(),
            quantity = quantity,
            price_each = price_each,
            asking_each = asking_each,
            difference = difference,
            market_price = market_price,
            price_after = price_after,
        );

        Ok(Some(Trade {
            buyer,
            seller,
            item: item.clone(),
            quantity,
            price_each,
            total,
            market_price,
            asking_each,
            difference,
            price_after,
        }))
    }

    /// Validates a trade and returns `(market_price, elasticity, asking_markup)`.
    fn check_trade(
        &self,
        market_id: MarketId,
        buyer: AgentId,
        seller: AgentId,
        item: &Item,
        quantity: Quantity,
        price_each: Price,
    ) -> Result<(Price, f64, f64)> {
        let total = price_each * quantity as f64;
        if !total.is_finite() || price_each < 0.0 {
            return Err(MarketError::InvalidPrice(price_each));
        }
        let market = self.market(market_id)?;
        if !market.is_member(buyer) || !market.is_member(seller) {
            return Err(MarketError::CrossMarketTrade);
        }

        let available = self.agent(buyer)?.money();
        if available < total {
            return Err(MarketError::InsufficientFunds {
                needed: total,
                available,
            });
        }

        let held = self.agent(seller)?.inventory().quantity(item);
        if held < quantity {
            return Err(MarketError::InsufficientStock {
                item: item.clone(),
                needed: quantity,
                available: held,
            });
        }

        let market_price = market.price(item)?;
        Ok((market_price, market.elasticity(), market.config().asking_markup))
    }

    /// One randomly drawn trade between two distinct members: a random
    /// seller with stock, a random buyer, a random held item and quantity,
    /// at a price within 10% of the market price. Quantity is cut down to
    /// what the buyer can afford.
    ///
    /// Returns `Ok(None)` when no such trade is possible.
    pub fn random_trade(&mut self, market_id: MarketId) -> Result<Option<Trade>> {
        let members: Vec<(AgentId, bool)> = self
            .members(market_id)?
            .iter()
            .map(|(id, agent)| (*id, !agent.inventory().is_empty()))
            .collect();

        let sellers: Vec<AgentId> = members
            .iter()
            .filter(|(_, has_stock)| *has_stock)
            .map(|(id, _)| *id)
            .collect();
        let Some(i) = pick_index(self.rng.as_mut(), sellers.len()) else {
            return Ok(None);
        };
        let seller = sellers[i];

        let buyers: Vec<AgentId> = members
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| *id != seller)
            .collect();
        let Some(j) = pick_index(self.rng.as_mut(), buyers.len()) else {
            return Ok(None);
        };
        let buyer = buyers[j];

        let seller_agent = self.agents.get(seller).ok_or(MarketError::UnknownAgent)?;
        let Some(item) = seller_agent.inventory().random_item(self.rng.as_mut()).cloned() else {
            return Ok(None);
        };
        let held = seller_agent.inventory().quantity(&item);
        let mut quantity = 1 + uniform_int(self.rng.as_mut(), held)?;

        let market_price = self.market(market_id)?.price(&item)?;
        let price_each = random_bracket(self.rng.as_mut(), market_price, RANDOM_TRADE_SPREAD)?;
        if price_each > 0.0 {
            let affordable = (self.agent(buyer)?.money() / price_each).floor() as Quantity;
            quantity = quantity.min(affordable);
        }
        if quantity <= 0 {
            return Ok(None);
        }

        self.buy(market_id, buyer, seller, &item, quantity, price_each)
    }

    // === Population Generation ===

    /// Create `num` agents with random names and join them to `market`.
    pub fn generate_agents(&mut self, market: MarketId, num: i64) -> Result<Vec<AgentId>> {
        self.market(market)?;
        let mut created = Vec::new();
        for _ in 0..num.max(0) {
            let agent = Agent::with_random_name(self.rng.as_mut());
            created.push(self.add_agent_to(agent, market)?);
        }
        Ok(created)
    }

    /// Hand out `num` grants of randomly named items, each of
    /// `max(1, uniform_int(max_quantity))` units, to random members.
    /// Nothing happens in a market without members.
    pub fn generate_items(
        &mut self,
        market: MarketId,
        num: i64,
        max_quantity: Quantity,
    ) -> Result<()> {
        self.market(market)?;
        if num <= 0 {
            return Ok(());
        }
        if max_quantity < 0 {
            return Err(MarketError::NegativeBound(max_quantity as f64));
        }
        for _ in 0..num {
            let item = Item::random(self.rng.as_mut());
            let quantity = uniform_int(self.rng.as_mut(), max_quantity)?.max(1);
            let Some(recipient) = self.random_agent(market)? else {
                return Ok(());
            };
            self.receive_item(recipient, &item, quantity)?;
        }
        Ok(())
    }

    /// Split `amount` evenly across the market's members.
    pub fn generate_money(&mut self, market: MarketId, amount: Price) -> Result<()> {
        let members = self.market(market)?.members().to_vec();
        if amount <= 0.0 || members.is_empty() {
            return Ok(());
        }
        let share = amount / members.len() as f64;
        for member in members {
            self.receive_money(member, share)?;
        }
        Ok(())
    }

    pub fn populate(&mut self, market: MarketId, config: &PopulationConfig) -> Result<()> {
        self.generate_agents(market, config.agents)?;
        self.generate_items(market, config.items, config.max_quantity)?;
        self.generate_money(market, config.money)
    }

    // === Presentation ===

    /// Human-readable listing of a market's goods and members.
    pub fn report(&self, market_id: MarketId) -> Result<String> {
        let market = self.market(market_id)?;
        let mut out = String::from("ITEMS: {\n");
        for (item, quantity) in &self.market_items(market_id)? {
            let price = market.price(item)?;
            let _ = writeln!(out, "\t{}x{}@${:.2}ea,", quantity, item, price);
        }
        out.push_str("}\nAGENTS: {\n");
        for (id, agent) in self.members(market_id)? {
            let wealth = self.agent_wealth(market_id, id)?;
            let _ = writeln!(
                out,
                "\t{} worth ${:.2} with ${:.2} and {},",
                agent.name,
                wealth,
                agent.money(),
                agent.inventory()
            );
        }
        out.push('}');
        Ok(out)
    }
}
