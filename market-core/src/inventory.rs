use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::item::Item;
use crate::random::{RandomSource, pick_index};
use crate::types::Quantity;

// ============================================================================
// Inventory - Goods held by an agent
// ============================================================================

/// Multiset of items. Every stored quantity is strictly positive: an entry
/// that would drop to zero or below is removed instead.
///
/// Serialized as a plain `{item: quantity}` map; loading one goes through
/// [`Inventory::add`], so non-positive entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Item, Quantity>", into = "BTreeMap<Item, Quantity>")]
pub struct Inventory {
    items: BTreeMap<Item, Quantity>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: &Item, quantity: Quantity) {
        if quantity <= 0 {
            return;
        }
        let held = self.items.entry(item.clone()).or_insert(0);
        *held = held.saturating_add(quantity);
    }

    pub fn remove(&mut self, item: &Item, quantity: Quantity) {
        if quantity <= 0 {
            return;
        }
        let remaining = self.quantity(item) - quantity;
        if remaining <= 0 {
            self.items.remove(item);
        } else if let Some(current) = self.items.get_mut(item) {
            *current = remaining;
        }
    }

    /// Add every entry of `other` into this inventory, leaving `other` as is.
    pub fn merge(&mut self, other: &Inventory) {
        for (item, quantity) in other {
            self.add(item, quantity);
        }
    }

    pub fn quantity(&self, item: &Item) -> Quantity {
        self.items.get(item).copied().unwrap_or(0)
    }

    pub fn contains(&self, item: &Item) -> bool {
        self.items.contains_key(item)
    }

    /// Number of distinct items held
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all items
    pub fn total(&self) -> Quantity {
        self.items.values().sum()
    }

    pub fn items(&self) -> Vec<Item> {
        self.items.keys().cloned().collect()
    }

    /// A uniformly chosen held item, or `None` when empty.
    pub fn random_item(&self, rng: &mut dyn RandomSource) -> Option<&Item> {
        let index = pick_index(rng, self.items.len())?;
        self.items.keys().nth(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Item, Quantity)> {
        self.items.iter().map(|(item, &quantity)| (item, quantity))
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = (&'a Item, Quantity);
    type IntoIter = std::iter::Map<
        std::collections::btree_map::Iter<'a, Item, Quantity>,
        fn((&'a Item, &'a Quantity)) -> (&'a Item, Quantity),
    >;

    fn into_iter(self) -> Self::IntoIter {
        let copy_quantity: fn((&'a Item, &'a Quantity)) -> (&'a Item, Quantity) =
            |(item, quantity)| (item, *quantity);
        self.items.iter().map(copy_quantity)
    }
}

impl FromIterator<(Item, Quantity)> for Inventory {
    fn from_iter<T: IntoIterator<Item = (Item, Quantity)>>(iter: T) -> Self {
        let mut inventory = Inventory::new();
        for (item, quantity) in iter {
            inventory.add(&item, quantity);
        }
        inventory
    }
}

impl From<BTreeMap<Item, Quantity>> for Inventory {
    fn from(items: BTreeMap<Item, Quantity>) -> Self {
        items.into_iter().collect()
    }
}

impl From<Inventory> for BTreeMap<Item, Quantity> {
    fn from(inventory: Inventory) -> Self {
        inventory.items
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no items");
        }
        for (i, (item, quantity)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}x{}", quantity, item)?;
        }
        Ok(())
    }
}
