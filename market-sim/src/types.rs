use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use tsify_next::Tsify;

// ============================================================================
// IDs - Using slotmap for generational indices
// ============================================================================

new_key_type! {
    pub struct RestaurantId;
}

/// Trait for converting SlotMap keys to u64 for WASM boundary
pub trait KeyToU64 {
    fn to_u64(self) -> u64;
}

impl KeyToU64 for RestaurantId {
    fn to_u64(self) -> u64 {
        self.0.as_ffi()
    }
}

// ============================================================================
// Restaurant Types - The positioning of a competitor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum RestaurantType {
    Fast,
    Classic,
    Brasserie,
    Gastro,
}

impl RestaurantType {
    /// Returns an iterator over all restaurant types
    pub fn all() -> impl Iterator<Item = RestaurantType> {
        [
            RestaurantType::Fast,
            RestaurantType::Classic,
            RestaurantType::Brasserie,
            RestaurantType::Gastro,
        ]
        .into_iter()
    }
}

// ============================================================================
// Staffing - Level 0 (closed) through 3 (reinforced)
// ============================================================================

/// Capacity factor per staffing level: a closed restaurant seats nobody,
/// a reinforced team turns tables faster.
pub fn staffing_capacity_factor(level: u8) -> f32 {
    match level {
        0 => 0.0,
        1 => 0.7,
        2 => 1.0,
        _ => 1.3,
    }
}

/// Attraction multiplier per staffing level, applied to the final score.
pub fn staffing_attraction_multiplier(level: u8) -> f32 {
    match level {
        0 => 0.0,
        1 => 0.8,
        2 => 1.0,
        _ => 1.2,
    }
}
