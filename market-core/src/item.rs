use std::fmt;

use serde::{Deserialize, Serialize};

use crate::naming;
use crate::random::RandomSource;

// ============================================================================
// Item - A kind of good, identified purely by name
// ============================================================================

/// Two items with the same name are the same item everywhere: in
/// inventories, price tables and supply sums.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item {
    name: String,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// An item with a name drawn from the built-in word list
    pub fn random(rng: &mut dyn RandomSource) -> Self {
        Self::new(naming::random_item_name(rng))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&str> for Item {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;

    #[test]
    fn test_identity_is_name() {
        assert_eq!(Item::new("apple"), Item::from("apple"));
        assert_ne!(Item::new("apple"), Item::new("Apple"));
        assert!(Item::new("apple") < Item::new("banana"));
        assert_eq!(Item::new("apple").name(), "apple");
    }

    #[test]
    fn test_display_quotes_name() {
        assert_eq!(Item::new("olive oil").to_string(), "\"olive oil\"");
    }

    #[test]
    fn test_random_item_has_name() {
        let mut rng = ScriptedRandom::constant(0.0);
        assert_eq!(Item::random(&mut rng).name(), "apple");
    }
}
