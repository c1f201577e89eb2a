//! Invariants that must hold after any sequence of market operations.
//!
//! Each test drives an economy with a seeded RNG through a long random
//! sequence of joins, leaves, grants, losses and trades, and checks the
//! invariant after every step.

use market_core::{Agent, AgentId, Economy, Item, Market, MarketError, MarketId, Price};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const STEPS: usize = 2_000;

struct Fixture {
    economy: Economy,
    markets: Vec<MarketId>,
    agents: Vec<AgentId>,
    items: Vec<Item>,
}

fn create_fixture(seed: u64) -> Fixture {
    let mut economy = Economy::seeded(seed);
    let markets = vec![
        economy.add_market(Market::named("North", 0.05)),
        economy.add_market(Market::named("South", 0.001)),
    ];
    let items: Vec<Item> = ["grain", "salt", "wool"].into_iter().map(Item::new).collect();

    let mut agents = Vec::new();
    for i in 0..8 {
        let agent = Agent::new(format!("Agent {i}"))
            .with_money(1_000.0 * (i + 1) as f64)
            .with_item("grain", 5 + i);
        let market = markets[i as usize % markets.len()];
        agents.push(economy.add_agent_to(agent, market).unwrap());
    }
    // A couple of outsiders that never start in a market
    agents.push(economy.add_agent(Agent::new("Outsider A").with_item("salt", 3)));
    agents.push(economy.add_agent(Agent::new("Outsider B").with_money(50.0)));

    Fixture {
        economy,
        markets,
        agents,
        items,
    }
}

/// Everything a failed operation must leave untouched
fn observable_state(economy: &Economy) -> (Vec<Agent>, Vec<Vec<(Item, Price)>>) {
    let agents = economy.agents().map(|(_, a)| a.clone()).collect();
    let prices = economy
        .markets()
        .map(|(_, m)| {
            m.priced_items()
                .into_iter()
                .map(|(item, price)| (item.clone(), price))
                .collect()
        })
        .collect();
    (agents, prices)
}

/// Apply one random operation; errors are allowed, their effects are checked
/// separately.
fn random_step(fx: &mut Fixture, rng: &mut StdRng) -> Result<(), MarketError> {
    let market = fx.markets[rng.random_range(0..fx.markets.len())];
    let agent = fx.agents[rng.random_range(0..fx.agents.len())];
    let other = fx.agents[rng.random_range(0..fx.agents.len())];
    let item = fx.items[rng.random_range(0..fx.items.len())].clone();
    let quantity = rng.random_range(-2..12);

    match rng.random_range(0..7) {
        0 => fx.economy.join(market, agent),
        1 => fx.economy.leave(market, agent),
        2 => fx.economy.receive_item(agent, &item, quantity),
        3 => fx.economy.lose_item(agent, &item, quantity),
        4 => fx.economy.receive_money(agent, rng.random_range(-10.0..100.0)),
        _ => {
            let price_each = rng.random_range(0.0..50.0);
            fx.economy
                .buy(market, agent, other, &item, quantity, price_each)
                .map(|_| ())
        }
    }
}

#[test]
fn invariant_supply_matches_member_inventories() {
    let mut fx = create_fixture(1);
    let mut rng = StdRng::seed_from_u64(11);

    for step in 0..STEPS {
        let _ = random_step(&mut fx, &mut rng);

        for &market in &fx.markets {
            // Members are exactly the agents whose handle points here
            let handled: Vec<AgentId> = fx
                .economy
                .agents()
                .filter(|(_, a)| a.market() == Some(market))
                .map(|(id, _)| id)
                .collect();
            let mut members: Vec<AgentId> = fx
                .economy
                .members(market)
                .unwrap()
                .iter()
                .map(|(id, _)| *id)
                .collect();
            let mut expected_members = handled.clone();
            members.sort();
            expected_members.sort();
            assert_eq!(members, expected_members, "step {step}: registry out of sync");

            for item in &fx.items {
                let expected: i64 = handled
                    .iter()
                    .map(|&id| fx.economy.agent(id).unwrap().inventory().quantity(item))
                    .sum();
                let supply = fx.economy.supply(market, item).unwrap();
                assert_eq!(supply, expected, "step {step}: supply of {item}");
            }
        }
    }
}

#[test]
fn invariant_prices_never_negative() {
    let mut fx = create_fixture(2);
    let mut rng = StdRng::seed_from_u64(22);

    for step in 0..STEPS {
        let _ = random_step(&mut fx, &mut rng);

        // Explicit price pushes in both directions
        let market = fx.markets[rng.random_range(0..fx.markets.len())];
        let item = &fx.items[rng.random_range(0..fx.items.len())];
        let delta = rng.random_range(-500.0..500.0);
        let _ = fx.economy.change_price(market, item, delta);

        for (_, m) in fx.economy.markets() {
            for (item, price) in m.priced_items() {
                assert!(price >= 0.0, "step {step}: {item} priced at {price}");
            }
        }
    }
}

#[test]
fn invariant_inventories_hold_only_positive_quantities() {
    let mut fx = create_fixture(3);
    let mut rng = StdRng::seed_from_u64(33);

    for step in 0..STEPS {
        let _ = random_step(&mut fx, &mut rng);
        for (_, agent) in fx.economy.agents() {
            for (item, quantity) in agent.inventory() {
                assert!(quantity > 0, "step {step}: {} holds {quantity}x{item}", agent.name);
            }
        }
    }
}

#[test]
fn invariant_failed_trade_changes_nothing() {
    let mut fx = create_fixture(4);
    let mut rng = StdRng::seed_from_u64(44);
    let mut failures = 0;

    for _ in 0..STEPS {
        let market = fx.markets[rng.random_range(0..fx.markets.len())];
        let buyer = fx.agents[rng.random_range(0..fx.agents.len())];
        let seller = fx.agents[rng.random_range(0..fx.agents.len())];
        let item = fx.items[rng.random_range(0..fx.items.len())].clone();
        let quantity = rng.random_range(1..20);
        let price_each = rng.random_range(0.0..2_000.0);

        let before = observable_state(&fx.economy);
        let result = fx
            .economy
            .buy(market, buyer, seller, &item, quantity, price_each);
        if let Err(e) = result {
            failures += 1;
            assert!(
                matches!(
                    e,
                    MarketError::CrossMarketTrade
                        | MarketError::InsufficientFunds { .. }
                        | MarketError::InsufficientStock { .. }
                        | MarketError::UnknownItemPrice(_)
                ),
                "unexpected error {e:?}"
            );
            assert!(before == observable_state(&fx.economy), "failed trade mutated state: {e}");
        }

        // Keep the population moving so trades fail for different reasons
        let _ = random_step(&mut fx, &mut rng);
    }
    assert!(failures > 0, "expected some trades to be rejected");
}

#[test]
fn invariant_trade_conserves_goods_and_money() {
    let mut fx = create_fixture(5);
    let mut rng = StdRng::seed_from_u64(55);
    let mut completed = 0;

    for _ in 0..STEPS {
        let market = fx.markets[rng.random_range(0..fx.markets.len())];
        let members: Vec<AgentId> = fx
            .economy
            .members(market)
            .unwrap()
            .iter()
            .map(|(id, _)| *id)
            .collect();
        if members.len() < 2 {
            let _ = random_step(&mut fx, &mut rng);
            continue;
        }
        let buyer = members[rng.random_range(0..members.len())];
        let seller = members[rng.random_range(0..members.len())];
        if buyer == seller {
            continue;
        }
        let item = fx.items[rng.random_range(0..fx.items.len())].clone();
        let quantity = rng.random_range(1..6);
        let price_each = rng.random_range(0.0..20.0);

        let money_of = |e: &Economy, id| e.agent(id).unwrap().money();
        let stock_of = |e: &Economy, id, item: &Item| e.agent(id).unwrap().inventory().quantity(item);
        let (buyer_money, seller_money) = (money_of(&fx.economy, buyer), money_of(&fx.economy, seller));
        let (buyer_stock, seller_stock) = (
            stock_of(&fx.economy, buyer, &item),
            stock_of(&fx.economy, seller, &item),
        );

        if let Ok(Some(trade)) = fx
            .economy
            .buy(market, buyer, seller, &item, quantity, price_each)
        {
            completed += 1;
            let total = price_each * quantity as f64;
            assert_eq!(trade.total, total);
            assert!((money_of(&fx.economy, buyer) - (buyer_money - total)).abs() < 1e-6);
            assert!((money_of(&fx.economy, seller) - (seller_money + total)).abs() < 1e-6);
            assert_eq!(stock_of(&fx.economy, buyer, &item), buyer_stock + quantity);
            assert_eq!(stock_of(&fx.economy, seller, &item), seller_stock - quantity);
            assert!(trade.asking_each >= trade.market_price);
            assert!(trade.asking_each <= trade.market_price * 1.1);
        }

        let _ = random_step(&mut fx, &mut rng);
    }
    assert!(completed > 0, "expected some trades to complete");
}

#[test]
fn invariant_non_positive_changes_are_no_ops() {
    let mut fx = create_fixture(6);
    let before = observable_state(&fx.economy);

    for &agent in &fx.agents {
        for item in &fx.items {
            for quantity in [0, -1, -100] {
                fx.economy.receive_item(agent, item, quantity).unwrap();
                fx.economy.lose_item(agent, item, quantity).unwrap();
                let trade = fx
                    .economy
                    .buy(fx.markets[0], agent, agent, item, quantity, 1.0)
                    .unwrap();
                assert!(trade.is_none());
            }
        }
        fx.economy.receive_money(agent, 0.0).unwrap();
        fx.economy.receive_money(agent, -5.0).unwrap();
        fx.economy.lose_money(agent, -5.0).unwrap();
    }

    assert!(before == observable_state(&fx.economy));
}
