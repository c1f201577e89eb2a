// Cosmetic word lists for generated agents and items

use crate::random::{RandomSource, pick_index};

const AGENT_NAMES: &[&str] = &[
    "Ada", "Bertram", "Cecily", "Dmitri", "Elena", "Farouk", "Greta", "Hamish", "Ingrid",
    "Jonas", "Kaveh", "Lucia", "Marek", "Nadia", "Otto", "Priya", "Quentin", "Rosa", "Soren",
    "Tomasz", "Ulla", "Viktor", "Wren", "Xiomara", "Yusuf", "Zelda",
];

const ITEM_NAMES: &[&str] = &[
    "apple", "barley", "candle", "copper", "flour", "hemp", "iron", "lumber", "linen", "nails",
    "oats", "olive oil", "pepper", "pottery", "rope", "salt", "silk", "soap", "tin", "wine",
    "wool", "wax",
];

fn pick(rng: &mut dyn RandomSource, words: &[&str]) -> String {
    pick_index(rng, words.len())
        .map(|i| words[i].to_string())
        .unwrap_or_default()
}

pub fn random_agent_name(rng: &mut dyn RandomSource) -> String {
    pick(rng, AGENT_NAMES)
}

pub fn random_item_name(rng: &mut dyn RandomSource) -> String {
    pick(rng, ITEM_NAMES)
}
