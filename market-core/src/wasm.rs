use wasm_bindgen::prelude::*;

use crate::config::{MarketConfig, PopulationConfig};
use crate::economy::Economy;
use crate::market::Market;
use crate::snapshot::MarketSnapshot;
use crate::types::MarketId;

// ============================================================================
// WASM API - A single market driven from JS
// ============================================================================

#[wasm_bindgen]
pub struct MarketSimulation {
    economy: Economy,
    market: MarketId,
    trades: u64,
}

#[wasm_bindgen]
impl MarketSimulation {
    #[wasm_bindgen(constructor)]
    pub fn new(elasticity: f64, seed: u32) -> Self {
        // Better panic messages in browser console
        console_error_panic_hook::set_once();

        Self::from_config(MarketConfig::with_elasticity(elasticity), seed)
    }

    /// Build from a JS object shaped like `MarketConfig`; missing fields
    /// take their defaults.
    #[wasm_bindgen]
    pub fn with_config(config: JsValue, seed: u32) -> Result<MarketSimulation, JsError> {
        console_error_panic_hook::set_once();
        let config: MarketConfig = serde_wasm_bindgen::from_value(config)?;
        Ok(Self::from_config(config, seed))
    }

    /// Generate agents, goods and money from a JS object shaped like
    /// `PopulationConfig`.
    #[wasm_bindgen]
    pub fn populate(&mut self, population: JsValue) -> Result<(), JsError> {
        let population: PopulationConfig = serde_wasm_bindgen::from_value(population)?;
        self.economy.populate(self.market, &population)?;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn generate_agents(&mut self, num: i32) -> Result<(), JsError> {
        self.economy.generate_agents(self.market, i64::from(num))?;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn generate_items(&mut self, num: i32, max_quantity: i32) -> Result<(), JsError> {
        self.economy
            .generate_items(self.market, i64::from(num), i64::from(max_quantity))?;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn generate_money(&mut self, amount: f64) -> Result<(), JsError> {
        self.economy.generate_money(self.market, amount)?;
        Ok(())
    }

    /// Attempt `count` random trades; returns how many went through.
    /// Rejected trades (funds, stock) are skipped.
    #[wasm_bindgen]
    pub fn run_trades(&mut self, count: u32) -> u32 {
        let mut completed = 0;
        for _ in 0..count {
            if let Ok(Some(_)) = self.economy.random_trade(self.market) {
                completed += 1;
            }
        }
        self.trades += u64::from(completed);
        completed
    }

    #[wasm_bindgen]
    pub fn get_trade_count(&self) -> u64 {
        self.trades
    }

    #[wasm_bindgen]
    pub fn get_snapshot(&self) -> Result<MarketSnapshot, JsError> {
        Ok(self.economy.snapshot(self.market)?)
    }

    #[wasm_bindgen]
    pub fn to_json(&self) -> Result<String, JsError> {
        Ok(self.economy.snapshot_json(self.market)?)
    }

    #[wasm_bindgen]
    pub fn report(&self) -> Result<String, JsError> {
        Ok(self.economy.report(self.market)?)
    }
}

impl MarketSimulation {
    fn from_config(config: MarketConfig, seed: u32) -> Self {
        let mut economy = Economy::seeded(u64::from(seed));
        let market = economy.add_market(Market::with_config("Market", config));
        Self {
            economy,
            market,
            trades: 0,
        }
    }

    pub fn economy(&self) -> &Economy {
        &self.economy
    }

    pub fn market_id(&self) -> MarketId {
        self.market
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trades_conserve_money() {
        let mut sim = MarketSimulation::from_config(MarketConfig::default(), 42);
        sim.generate_agents(20).unwrap_or_else(|_| panic!("generate agents"));
        sim.generate_items(30, 50).unwrap_or_else(|_| panic!("generate items"));
        sim.generate_money(20_000_000.0)
            .unwrap_or_else(|_| panic!("generate money"));

        let total_money = |sim: &MarketSimulation| -> f64 {
            sim.economy()
                .members(sim.market_id())
                .unwrap()
                .iter()
                .map(|(_, a)| a.money())
                .sum()
        };
        let before = total_money(&sim);
        let completed = sim.run_trades(200);
        let after = total_money(&sim);

        assert_eq!(sim.get_trade_count(), u64::from(completed));
        assert!(
            (before - after).abs() < 1e-3,
            "money should be conserved: before={before:.2}, after={after:.2}"
        );
        for (_, price) in sim.economy().market(sim.market_id()).unwrap().priced_items() {
            assert!(price >= 0.0);
        }
    }
}
