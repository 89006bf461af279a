use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tsify_next::Tsify;

use crate::types::RestaurantId;

// ============================================================================
// Allocation Result - One restaurant's outcome for one turn
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Demand routed here before capacity constraints
    pub allocated_demand: u32,
    /// Customers actually served after capacity / inventory limits
    pub served_customers: u32,
    pub capacity: u32,
    pub utilization_rate: f32,
    pub lost_customers: u32,
    pub revenue: f32,
    pub average_ticket: f32,
    /// recipe id -> units sold; filled by the discrete allocator, or by the
    /// revenue fallback's even split
    pub recipe_sales: HashMap<String, u32>,
}

impl AllocationResult {
    /// Recompute the derived fields from the final served/revenue values.
    /// Call after every stage that changes them; the stored result always
    /// reflects post-redistribution, post-revenue numbers.
    pub fn refresh_derived(&mut self) {
        self.utilization_rate = if self.capacity > 0 {
            self.served_customers as f32 / self.capacity as f32
        } else {
            0.0
        };
        self.lost_customers = self.allocated_demand.saturating_sub(self.served_customers);
        self.average_ticket = if self.served_customers > 0 {
            self.revenue / self.served_customers as f32
        } else {
            0.0
        };
    }
}

// ============================================================================
// Turn Outcome - Results plus explicit state transitions
// ============================================================================

/// What the engine asks the caller to apply to a restaurant after a turn.
/// Keeping mutation out of the engine means snapshots can be shared freely
/// with analysis code and tests.
#[derive(Debug, Clone)]
pub struct RestaurantUpdate {
    pub restaurant: RestaurantId,
    /// 1-5 satisfaction to blend into reputation; None when nobody was served
    pub satisfaction: Option<f32>,
    /// Production-ready units consumed this turn, per recipe
    pub units_served: HashMap<String, u32>,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub results: HashMap<RestaurantId, AllocationResult>,
    pub updates: Vec<RestaurantUpdate>,
}

// ============================================================================
// Market Analysis - Aggregates over a stored turn
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct MarketAnalysis {
    pub total_demand: u32,
    pub total_served: u32,
    pub total_capacity: u32,
    pub total_revenue: f32,
    /// served / capacity
    pub market_utilization: f32,
    /// served / demand
    pub demand_satisfaction: f32,
    pub average_ticket: f32,
}

// ============================================================================
// Snapshots for the WASM boundary
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct TurnSnapshot {
    pub turn: u32,
    pub month: u32,
    pub restaurants: Vec<RestaurantResultSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct RestaurantResultSnapshot {
    pub id: u64,
    pub name: String,
    pub reputation: f32,
    pub allocated_demand: u32,
    pub served_customers: u32,
    pub capacity: u32,
    pub utilization_rate: f32,
    pub lost_customers: u32,
    pub revenue: f32,
    pub average_ticket: f32,
    pub recipe_sales: Vec<(String, u32)>,
}
