use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tsify_next::Tsify;

use crate::types::{staffing_capacity_factor, RestaurantType};

// ============================================================================
// Production Batch - Units prepared this turn, ready to serve
// ============================================================================

/// One recipe's prepared output for the current turn. `quality` is centered
/// on 1.0 (a neutral batch); the external production planner sets it from
/// ingredient grades and execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct ProductionBatch {
    pub units_ready: u32,
    pub quality: f32,
}

// ============================================================================
// Restaurant - A competitor on the market
// ============================================================================

/// Turn-scoped snapshot of a competing restaurant.
///
/// The engine never mutates these: reputation and production decrements come
/// back as explicit `RestaurantUpdate`s that the owning game state applies
/// between turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub name: String,
    pub kind: RestaurantType,
    pub capacity_base: u32,
    pub service_speed: f32,
    /// recipe id -> gross price
    pub menu: HashMap<String, f32>,
    /// Recipes currently offered, in menu-card order. Order matters: the
    /// fallback revenue split walks this list and hands the remainder to the
    /// recipes listed first.
    pub active_recipes: Vec<String>,
    /// 0 = closed, 1 = light, 2 = normal, 3 = reinforced
    pub staffing_level: u8,
    /// 0-10 scale, persists across turns
    pub reputation: f32,
    /// 1-5 scale, derived from ingredient choices by the external
    /// procurement/decision layer
    pub quality_score: f32,
    /// recipe id -> batch prepared this turn (empty when production is not
    /// tracked; presence of any ready units anywhere switches the market to
    /// discrete serving)
    pub production: HashMap<String, ProductionBatch>,
}

impl Restaurant {
    pub fn new(name: impl Into<String>, kind: RestaurantType, capacity_base: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            capacity_base,
            service_speed: 1.0,
            menu: HashMap::new(),
            active_recipes: Vec::new(),
            staffing_level: 2,
            reputation: 5.0,
            quality_score: 2.5,
            production: HashMap::new(),
        }
    }

    /// Covers this restaurant can serve this turn, from base capacity,
    /// service speed and staffing.
    pub fn capacity(&self) -> u32 {
        let factor = staffing_capacity_factor(self.staffing_level);
        (self.capacity_base as f32 * self.service_speed * factor) as u32
    }

    /// Mean price of the active menu; 0 when nothing is on the card.
    pub fn average_ticket(&self) -> f32 {
        let menu = self.active_menu();
        if menu.is_empty() {
            return 0.0;
        }
        let total: f32 = menu.iter().map(|(_, price)| price).sum();
        total / menu.len() as f32
    }

    /// Active recipes with their prices, in card order. An active id with no
    /// menu price is skipped rather than failing the turn.
    pub fn active_menu(&self) -> Vec<(String, f32)> {
        self.active_recipes
            .iter()
            .filter_map(|id| self.menu.get(id).map(|price| (id.clone(), *price)))
            .collect()
    }

    /// Total prepared units across all recipes.
    pub fn total_units_ready(&self) -> u32 {
        self.production.values().map(|b| b.units_ready).sum()
    }

    /// Ready units for one recipe.
    pub fn units_ready(&self, recipe_id: &str) -> u32 {
        self.production.get(recipe_id).map_or(0, |b| b.units_ready)
    }

    /// Blend a 1-5 satisfaction score into reputation: 80% previous value,
    /// 20% the new rating mapped onto the 0-10 scale.
    pub fn blend_reputation(&mut self, satisfaction: f32) {
        let mapped = satisfaction * 2.0;
        self.reputation = (self.reputation * 0.8 + mapped * 0.2).clamp(0.0, 10.0);
    }

    /// Apply a turn's outcome: reputation feedback and served-unit
    /// decrements. Called by the game state after allocation.
    pub fn apply_turn(&mut self, update: &crate::state::RestaurantUpdate) {
        if let Some(satisfaction) = update.satisfaction {
            self.blend_reputation(satisfaction);
        }
        for (recipe_id, served) in &update.units_served {
            if let Some(batch) = self.production.get_mut(recipe_id) {
                batch.units_ready = batch.units_ready.saturating_sub(*served);
            }
        }
    }
}
