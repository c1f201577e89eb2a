use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::economy::Economy;
use crate::error::{MarketError, Result};
use crate::types::{KeyToU64, MarketId, Price, Quantity};

// ============================================================================
// Serializable Market Snapshot for JS and JSON export
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct MarketSnapshot {
    pub name: String,
    pub elasticity: f64,
    pub items: Vec<ItemSnapshot>,
    pub agents: Vec<AgentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ItemSnapshot {
    pub item: String,
    pub supply: Quantity,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct AgentSnapshot {
    pub id: u64,
    pub name: String,
    pub money: Price,
    /// `None` when the agent holds something the market never priced
    pub wealth: Option<Price>,
    pub holdings: Vec<(String, Quantity)>,
}

impl Economy {
    /// Every priced item (with its current supply) and every member.
    pub fn snapshot(&self, market_id: MarketId) -> Result<MarketSnapshot> {
        let market = self.market(market_id)?;
        let held = self.market_items(market_id)?;

        let items = market
            .priced_items()
            .into_iter()
            .map(|(item, price)| ItemSnapshot {
                item: item.name().to_string(),
                supply: held.quantity(item),
                price,
            })
            .collect();

        let agents = self
            .members(market_id)?
            .into_iter()
            .map(|(id, agent)| AgentSnapshot {
                id: id.to_u64(),
                name: agent.name.clone(),
                money: agent.money(),
                wealth: self.agent_wealth(market_id, id).ok(),
                holdings: agent
                    .inventory()
                    .iter()
                    .map(|(item, quantity)| (item.name().to_string(), quantity))
                    .collect(),
            })
            .collect();

        Ok(MarketSnapshot {
            name: market.name.clone(),
            elasticity: market.elasticity(),
            items,
            agents,
        })
    }

    pub fn snapshot_json(&self, market_id: MarketId) -> Result<String> {
        let snapshot = self.snapshot(market_id)?;
        serde_json::to_string_pretty(&snapshot).map_err(|e| MarketError::Snapshot(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::agent::Agent;
    use crate::economy::Economy;
    use crate::item::Item;
    use crate::market::Market;
    use crate::random::ScriptedRandom;

    use super::MarketSnapshot;

    #[test]
    fn test_snapshot_covers_items_and_members() {
        let mut economy = Economy::with_random(ScriptedRandom::constant(0.1));
        let market = economy.add_market(Market::named("Harbor", 0.05));
        economy.set_price(market, &Item::new("salt"), 4.0).unwrap();
        economy
            .add_agent_to(Agent::new("Ada").with_money(50.0).with_item("wine", 3), market)
            .unwrap();

        let snapshot = economy.snapshot(market).unwrap();
        assert_eq!(snapshot.name, "Harbor");
        let names: Vec<_> = snapshot.items.iter().map(|i| i.item.as_str()).collect();
        assert_eq!(names, vec!["salt", "wine"]);
        assert_eq!(snapshot.items[0].supply, 0);
        assert_eq!(snapshot.items[1].supply, 3);
        assert_eq!(snapshot.items[1].price, 1000.0);

        let ada = &snapshot.agents[0];
        assert_eq!(ada.name, "Ada");
        assert_eq!(ada.holdings, vec![("wine".to_string(), 3)]);
        assert_eq!(ada.wealth, Some(50.0 + 3.0 * 1000.0));

        let json = economy.snapshot_json(market).unwrap();
        let back: MarketSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
