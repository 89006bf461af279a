use std::collections::HashMap;
use wasm_bindgen::prelude::*;

mod ai;
mod allocation;
mod demand;
mod engine;
mod entities;
mod revenue;
mod scenario;
mod scoring;
mod state;
mod types;

pub use ai::*;
pub use allocation::*;
pub use demand::*;
pub use engine::*;
pub use entities::*;
pub use revenue::*;
pub use scenario::*;
pub use scoring::*;
pub use state::*;
pub use types::*;

#[cfg(feature = "instrument")]
pub use instrument;

use slotmap::SlotMap;

// ============================================================================
// WASM API - Game
// ============================================================================

#[wasm_bindgen]
pub struct Game {
    restaurants: SlotMap<RestaurantId, Restaurant>,
    competitor_ids: Vec<RestaurantId>, // AI-run restaurants
    engine: MarketEngine,
    modifiers: MarketModifiers,
    turn: u32,
}

#[wasm_bindgen]
impl Game {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        // Better panic messages in browser console
        console_error_panic_hook::set_once();

        Self {
            restaurants: SlotMap::with_key(),
            competitor_ids: Vec::new(),
            engine: MarketEngine::new(default_scenario()),
            modifiers: MarketModifiers::default(),
            turn: 0,
        }
    }

    /// Create a game with a test scenario
    #[wasm_bindgen]
    pub fn with_test_scenario() -> Self {
        let mut game = Self::new();
        game.setup_test_scenario();
        game
    }

    /// Advance the game by one turn
    #[wasm_bindgen]
    pub fn advance_turn(&mut self) {
        // AI competitors react to last turn's results before the market runs
        let decisions = ai::run_competitor_ai(
            &self.restaurants,
            &self.competitor_ids,
            self.engine.history().last(),
        );
        for (id, level) in decisions.staffing_changes {
            if let Some(restaurant) = self.restaurants.get_mut(id) {
                restaurant.staffing_level = level;
            }
        }

        self.turn += 1;
        let month = (self.turn - 1) % 12 + 1;

        let outcome =
            self.engine
                .allocate_demand(&self.restaurants, self.turn, month, &self.modifiers);

        // Apply the explicit state transitions the engine handed back
        for update in &outcome.updates {
            if let Some(restaurant) = self.restaurants.get_mut(update.restaurant) {
                restaurant.apply_turn(update);
            }
        }
    }

    /// Get the current turn
    #[wasm_bindgen]
    pub fn get_turn(&self) -> u32 {
        self.turn
    }

    /// Results of the latest turn for rendering
    #[wasm_bindgen]
    pub fn get_turn_snapshot(&self) -> TurnSnapshot {
        let month = if self.turn == 0 {
            1
        } else {
            (self.turn - 1) % 12 + 1
        };
        let empty = HashMap::new();
        let latest = self.engine.history().last().unwrap_or(&empty);

        let restaurants = self
            .restaurants
            .iter()
            .map(|(id, restaurant)| {
                let result = latest.get(&id).cloned().unwrap_or_default();
                let mut recipe_sales: Vec<(String, u32)> =
                    result.recipe_sales.into_iter().collect();
                recipe_sales.sort();

                RestaurantResultSnapshot {
                    id: id.to_u64(),
                    name: restaurant.name.clone(),
                    reputation: restaurant.reputation,
                    allocated_demand: result.allocated_demand,
                    served_customers: result.served_customers,
                    capacity: result.capacity,
                    utilization_rate: result.utilization_rate,
                    lost_customers: result.lost_customers,
                    revenue: result.revenue,
                    average_ticket: result.average_ticket,
                    recipe_sales,
                }
            })
            .collect();

        TurnSnapshot {
            turn: self.turn,
            month,
            restaurants,
        }
    }

    /// Aggregate market view of the latest turn
    #[wasm_bindgen]
    pub fn get_market_analysis(&self) -> MarketAnalysis {
        self.engine.market_analysis(None).unwrap_or_default()
    }

    /// Served share of the latest turn for one restaurant
    #[wasm_bindgen]
    pub fn get_market_share(&self, restaurant_id: u64) -> f32 {
        self.engine
            .market_share(restaurant_key(restaurant_id), None)
    }

    /// Add a player-controlled restaurant, returning its id
    #[wasm_bindgen]
    pub fn add_restaurant(
        &mut self,
        name: &str,
        kind: RestaurantType,
        capacity_base: u32,
        service_speed: f32,
    ) -> u64 {
        let mut restaurant = Restaurant::new(name, kind, capacity_base);
        restaurant.service_speed = service_speed;
        self.restaurants.insert(restaurant).to_u64()
    }

    /// Add an AI-run competitor, returning its id
    #[wasm_bindgen]
    pub fn add_competitor(
        &mut self,
        name: &str,
        kind: RestaurantType,
        capacity_base: u32,
        service_speed: f32,
    ) -> u64 {
        let id = self.add_restaurant(name, kind, capacity_base, service_speed);
        self.competitor_ids.push(restaurant_key(id));
        id
    }

    /// Set one recipe's gross price
    #[wasm_bindgen]
    pub fn set_recipe_price(&mut self, restaurant_id: u64, recipe_id: &str, price: f32) {
        if let Some(restaurant) = self.restaurants.get_mut(restaurant_key(restaurant_id)) {
            restaurant.menu.insert(recipe_id.to_string(), price);
        }
    }

    /// Replace the active card (JSON array of recipe ids, in card order)
    #[wasm_bindgen]
    pub fn set_active_recipes(&mut self, restaurant_id: u64, recipes_json: &str) {
        let recipes: Vec<String> = serde_json::from_str(recipes_json).unwrap_or_default();
        if let Some(restaurant) = self.restaurants.get_mut(restaurant_key(restaurant_id)) {
            restaurant.active_recipes = recipes;
        }
    }

    #[wasm_bindgen]
    pub fn set_staffing_level(&mut self, restaurant_id: u64, level: u8) {
        if let Some(restaurant) = self.restaurants.get_mut(restaurant_key(restaurant_id)) {
            restaurant.staffing_level = level.min(3);
        }
    }

    /// Overall ingredient/positioning quality on the 1-5 scale
    #[wasm_bindgen]
    pub fn set_quality_score(&mut self, restaurant_id: u64, score: f32) {
        if let Some(restaurant) = self.restaurants.get_mut(restaurant_key(restaurant_id)) {
            restaurant.quality_score = score.clamp(1.0, 5.0);
        }
    }

    /// Replace this turn's prepared batches (JSON map recipe id ->
    /// {units_ready, quality})
    #[wasm_bindgen]
    pub fn set_production(&mut self, restaurant_id: u64, production_json: &str) {
        let production: HashMap<String, ProductionBatch> =
            serde_json::from_str(production_json).unwrap_or_default();
        if let Some(restaurant) = self.restaurants.get_mut(restaurant_key(restaurant_id)) {
            restaurant.production = production;
        }
    }

    /// Purge prepared batches (shelf life is one turn)
    #[wasm_bindgen]
    pub fn clear_production(&mut self, restaurant_id: u64) {
        if let Some(restaurant) = self.restaurants.get_mut(restaurant_key(restaurant_id)) {
            restaurant.production.clear();
        }
    }

    /// Replace the turn's market modifiers (JSON; unknown fields rejected by
    /// shape, malformed input falls back to neutral)
    #[wasm_bindgen]
    pub fn set_market_modifiers(&mut self, modifiers_json: &str) {
        self.modifiers = serde_json::from_str(modifiers_json).unwrap_or_default();
    }
}

// ============================================================================
// Test Scenario Setup
// ============================================================================

impl Game {
    /// Seed a three-way market: a fast-food joint, a neighborhood classic
    /// and a gastro room, all priced to their own crowd.
    pub fn setup_test_scenario(&mut self) {
        // === Quick & Tasty: volume play for the student crowd ===
        let quick = self.add_restaurant("Quick & Tasty", RestaurantType::Fast, 140, 1.3);
        self.set_recipe_price(quick, "burger_classic", 9.50);
        self.set_recipe_price(quick, "menu_etudiant", 8.00);
        self.set_recipe_price(quick, "wrap_poulet", 8.50);
        self.set_active_recipes(
            quick,
            r#"["burger_classic", "menu_etudiant", "wrap_poulet"]"#,
        );
        self.set_quality_score(quick, 2.0);

        // === Le Comptoir: the mid-market neighborhood table ===
        let comptoir = self.add_competitor("Le Comptoir", RestaurantType::Classic, 80, 1.0);
        self.set_recipe_price(comptoir, "plat_du_jour", 14.50);
        self.set_recipe_price(comptoir, "steak_frites", 16.00);
        self.set_recipe_price(comptoir, "salade_chevre", 12.50);
        self.set_active_recipes(
            comptoir,
            r#"["plat_du_jour", "steak_frites", "salade_chevre"]"#,
        );
        self.set_quality_score(comptoir, 3.0);

        // === La Table d'Or: low volume, high ticket ===
        let table = self.add_competitor("La Table d'Or", RestaurantType::Gastro, 45, 0.8);
        self.set_recipe_price(table, "menu_degustation", 38.00);
        self.set_recipe_price(table, "poisson_du_marche", 29.00);
        self.set_active_recipes(table, r#"["menu_degustation", "poisson_du_marche"]"#);
        self.set_quality_score(table, 4.5);
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Rebuild a slotmap key from its WASM-boundary u64 form
fn restaurant_key(id: u64) -> RestaurantId {
    RestaurantId::from(slotmap::KeyData::from_ffi(id))
}

/// Demand-model configuration used when the caller does not load a scenario.
/// Built literally: compiled-in values need no runtime validation.
fn default_scenario() -> Scenario {
    let segments = vec![
        MarketSegment {
            name: "students".to_string(),
            share: 0.35,
            budget: 11.0,
            price_sensitivity: 1.4,
            quality_sensitivity: 0.6,
            type_affinity: HashMap::from([
                (RestaurantType::Fast, 1.5),
                (RestaurantType::Classic, 0.8),
                (RestaurantType::Brasserie, 0.9),
                (RestaurantType::Gastro, 0.3),
            ]),
            seasonality: HashMap::new(),
        },
        MarketSegment {
            name: "families".to_string(),
            share: 0.40,
            budget: 17.0,
            price_sensitivity: 1.0,
            quality_sensitivity: 1.0,
            type_affinity: HashMap::from([
                (RestaurantType::Fast, 1.1),
                (RestaurantType::Classic, 1.3),
                (RestaurantType::Brasserie, 1.1),
                (RestaurantType::Gastro, 0.5),
            ]),
            seasonality: HashMap::new(),
        },
        MarketSegment {
            name: "foodies".to_string(),
            share: 0.25,
            budget: 28.0,
            price_sensitivity: 0.6,
            quality_sensitivity: 1.4,
            type_affinity: HashMap::from([
                (RestaurantType::Fast, 0.3),
                (RestaurantType::Classic, 1.0),
                (RestaurantType::Brasserie, 1.2),
                (RestaurantType::Gastro, 1.6),
            ]),
            seasonality: HashMap::new(),
        },
    ];

    Scenario {
        name: "standard".to_string(),
        base_demand: 600,
        demand_noise: 0.10,
        segments,
        calendar: SeasonalCalendar::standard(),
        total_turns: 12,
        random_seed: Some(42),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_serves_customers_and_earns_revenue() {
        let mut game = Game::with_test_scenario();
        game.advance_turn();

        let snapshot = game.get_turn_snapshot();
        assert_eq!(snapshot.turn, 1);
        assert_eq!(snapshot.restaurants.len(), 3);

        let total_served: u32 = snapshot
            .restaurants
            .iter()
            .map(|r| r.served_customers)
            .sum();
        let total_revenue: f32 = snapshot.restaurants.iter().map(|r| r.revenue).sum();
        assert!(total_served > 0, "nobody served: {snapshot:?}");
        assert!(total_revenue > 0.0, "no revenue: {snapshot:?}");
    }

    #[test]
    fn test_same_seed_same_game() {
        let mut a = Game::with_test_scenario();
        let mut b = Game::with_test_scenario();
        for _ in 0..5 {
            a.advance_turn();
            b.advance_turn();
        }

        let sa = a.get_turn_snapshot();
        let sb = b.get_turn_snapshot();
        for (ra, rb) in sa.restaurants.iter().zip(sb.restaurants.iter()) {
            assert_eq!(ra.served_customers, rb.served_customers);
            assert_eq!(ra.allocated_demand, rb.allocated_demand);
            assert!((ra.revenue - rb.revenue).abs() < 1e-3);
        }
    }

    #[test]
    fn test_reputation_moves_after_a_turn() {
        let mut game = Game::with_test_scenario();
        let before: Vec<f32> = game.restaurants.values().map(|r| r.reputation).collect();
        game.advance_turn();
        let after: Vec<f32> = game.restaurants.values().map(|r| r.reputation).collect();

        // At least one competitor served customers and picked up a
        // satisfaction signal
        assert_ne!(before, after);
    }

    #[test]
    fn test_closed_restaurant_gets_nothing() {
        let mut game = Game::with_test_scenario();
        let closed = game.add_restaurant("Rideau Baissé", RestaurantType::Classic, 100, 1.0);
        game.set_recipe_price(closed, "plat", 12.0);
        game.set_active_recipes(closed, r#"["plat"]"#);
        game.set_staffing_level(closed, 0);

        game.advance_turn();

        let snapshot = game.get_turn_snapshot();
        let result = snapshot
            .restaurants
            .iter()
            .find(|r| r.id == closed)
            .unwrap();
        assert_eq!(result.allocated_demand, 0);
        assert_eq!(result.served_customers, 0);
    }

    #[test]
    fn test_production_units_are_consumed() {
        let mut game = Game::with_test_scenario();
        let quick = game
            .restaurants
            .iter()
            .find(|(_, r)| r.name == "Quick & Tasty")
            .map(|(id, _)| id)
            .unwrap();

        game.set_production(
            quick.to_u64(),
            r#"{"burger_classic": {"units_ready": 30, "quality": 1.1}}"#,
        );
        game.advance_turn();

        let remaining = game.restaurants[quick].units_ready("burger_classic");
        let snapshot = game.get_turn_snapshot();
        let result = snapshot
            .restaurants
            .iter()
            .find(|r| r.id == quick.to_u64())
            .unwrap();

        assert_eq!(result.served_customers, 30 - remaining);
        assert!(result.served_customers > 0, "no units moved: {result:?}");
    }

    #[test]
    fn test_discrete_mode_only_serves_prepared_restaurants() {
        let mut game = Game::with_test_scenario();
        let quick = game
            .restaurants
            .iter()
            .find(|(_, r)| r.name == "Quick & Tasty")
            .map(|(id, _)| id.to_u64())
            .unwrap();

        // Only one restaurant prepared anything: the whole market switches
        // to discrete service and the others sell nothing.
        game.set_production(
            quick,
            r#"{"menu_etudiant": {"units_ready": 10, "quality": 1.0}}"#,
        );
        game.advance_turn();

        let snapshot = game.get_turn_snapshot();
        for result in &snapshot.restaurants {
            if result.id == quick {
                assert_eq!(result.served_customers, 10);
            } else {
                assert_eq!(result.served_customers, 0);
            }
        }
    }

    #[test]
    fn test_market_analysis_aggregates_latest_turn() {
        let mut game = Game::with_test_scenario();
        game.advance_turn();

        let snapshot = game.get_turn_snapshot();
        let analysis = game.get_market_analysis();

        let served: u32 = snapshot
            .restaurants
            .iter()
            .map(|r| r.served_customers)
            .sum();
        let capacity: u32 = snapshot.restaurants.iter().map(|r| r.capacity).sum();
        assert_eq!(analysis.total_served, served);
        assert_eq!(analysis.total_capacity, capacity);
        assert!(analysis.market_utilization > 0.0);
        assert!(analysis.market_utilization <= 1.0);
    }

    #[test]
    fn test_market_shares_sum_to_one() {
        let mut game = Game::with_test_scenario();
        game.advance_turn();

        let total: f32 = game
            .restaurants
            .keys()
            .map(|id| game.get_market_share(id.to_u64()))
            .sum();
        assert!((total - 1.0).abs() < 1e-4, "shares sum to {total}");
    }

    #[test]
    fn test_modifiers_json_partial_payload() {
        let mut game = Game::with_test_scenario();

        // Unmentioned knobs stay neutral
        game.set_market_modifiers(r#"{"demand": 1.3}"#);
        assert!((game.modifiers.demand - 1.3).abs() < 1e-6);
        assert!((game.modifiers.price_sensitivity - 1.0).abs() < 1e-6);

        // Malformed input falls back to neutral instead of poisoning the turn
        game.set_market_modifiers("not json");
        assert!((game.modifiers.demand - 1.0).abs() < 1e-6);
    }
}
