use slotmap::new_key_type;

// ============================================================================
// IDs - Using slotmap for generational indices
// ============================================================================

new_key_type! {
    pub struct AgentId;
    pub struct MarketId;
}

/// Trait for converting SlotMap keys to u64 for the WASM boundary
pub trait KeyToU64 {
    fn to_u64(self) -> u64;
}

impl KeyToU64 for AgentId {
    fn to_u64(self) -> u64 {
        self.0.as_ffi()
    }
}

impl KeyToU64 for MarketId {
    fn to_u64(self) -> u64 {
        self.0.as_ffi()
    }
}

// ============================================================================
// Units
// ============================================================================

/// Money, per-unit prices and balances.
pub type Price = f64;

/// Whole units of an item. Signed so callers may pass non-positive values,
/// which every mutation treats as a no-op.
pub type Quantity = i64;
