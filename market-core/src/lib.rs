//! A free market of agents trading discrete goods for money.
//!
//! Each [`Market`] keeps a price per [`Item`]. Prices fall as member agents
//! bring in supply and rise as supply leaves, scaled by the market's
//! elasticity. [`Economy::buy`] moves goods and money between two members in
//! one validated step and then nudges the item's price toward the terms the
//! two agents actually agreed on.
//!
//! ```
//! use market_core::{Agent, Economy, Item, Market};
//!
//! let mut economy = Economy::seeded(7);
//! let market = economy.add_market(Market::new(0.05));
//! let grain = Item::new("grain");
//!
//! let seller = economy
//!     .add_agent_to(Agent::new("Seller").with_item("grain", 10), market)
//!     .unwrap();
//! let buyer = economy
//!     .add_agent_to(Agent::new("Buyer").with_money(40_000.0), market)
//!     .unwrap();
//!
//! economy.buy(market, buyer, seller, &grain, 4, 1.00).unwrap();
//! assert_eq!(economy.agent(seller).unwrap().money(), 4.0);
//! assert_eq!(economy.supply(market, &grain).unwrap(), 10);
//! ```

mod agent;
mod config;
mod economy;
mod error;
mod inventory;
mod item;
mod market;
mod naming;
mod random;
mod snapshot;
mod types;
mod wasm;

pub use agent::*;
pub use config::*;
pub use economy::*;
pub use error::*;
pub use inventory::*;
pub use item::*;
pub use market::*;
pub use naming::{random_agent_name, random_item_name};
pub use random::{
    RandomSource, ScriptedRandom, StdRandom, random_bracket, uniform_int, uniform_real,
};
pub use snapshot::*;
pub use types::*;
pub use wasm::*;

#[cfg(feature = "instrument")]
pub use instrument;
