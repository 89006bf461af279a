use slotmap::SlotMap;
use std::collections::HashMap;

use crate::entities::Restaurant;
use crate::state::AllocationResult;
use crate::types::RestaurantId;

// ============================================================================
// Constants for competitor behavior
// ============================================================================

/// Utilization above this asks for more staff next turn
pub const EXPAND_UTILIZATION: f32 = 0.8;

/// Utilization below this sheds staff next turn
pub const SHRINK_UTILIZATION: f32 = 0.5;

// ============================================================================
// AI Decisions - Output of competitor reasoning
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AiDecisions {
    /// (restaurant, new staffing level)
    pub staffing_changes: Vec<(RestaurantId, u8)>,
}

/// Staffing adjustments for AI-run restaurants, from last turn's results.
/// Returns decisions without mutating state; the game loop applies them
/// before the next allocation.
///
/// Busy competitors reinforce, idle ones cut back, nobody closes outright
/// or exceeds the reinforced level.
pub fn run_competitor_ai(
    restaurants: &SlotMap<RestaurantId, Restaurant>,
    competitor_ids: &[RestaurantId],
    last_results: Option<&HashMap<RestaurantId, AllocationResult>>,
) -> AiDecisions {
    let mut decisions = AiDecisions::default();
    let Some(last_results) = last_results else {
        return decisions;
    };

    for id in competitor_ids {
        let Some(restaurant) = restaurants.get(*id) else {
            continue;
        };
        let Some(result) = last_results.get(id) else {
            continue;
        };

        let level = restaurant.staffing_level;
        if result.utilization_rate > EXPAND_UTILIZATION && level < 3 {
            decisions.staffing_changes.push((*id, level + 1));
        } else if result.utilization_rate < SHRINK_UTILIZATION && level > 1 {
            decisions.staffing_changes.push((*id, level - 1));
        }
    }

    decisions
}
