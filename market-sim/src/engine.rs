use rand::rngs::StdRng;
use rand::SeedableRng;
use slotmap::SlotMap;
use std::collections::HashMap;

use crate::allocation::{
    allocate_segment_continuous, allocate_segment_discrete, allocation_mode,
    apply_capacity_constraints, segment_scores, AllocationMode, ServiceState,
};
use crate::demand::compute_turn_demand;
use crate::entities::Restaurant;
use crate::revenue::{compute_revenue, satisfaction_score};
use crate::scenario::{MarketModifiers, Scenario};
use crate::state::{AllocationResult, MarketAnalysis, RestaurantUpdate, TurnOutcome};
use crate::types::RestaurantId;

#[cfg(feature = "instrument")]
use crate::types::KeyToU64;

// ============================================================================
// Market Engine - One allocation pass per turn
// ============================================================================

/// Fallback seed when the scenario does not pin one; keeps unsalted games
/// reproducible too.
const DEFAULT_SEED: u64 = 0x5EED;

/// Distributes a turn's customer demand across competing restaurants.
///
/// The engine owns the scenario, its random source, and the turn history.
/// Restaurants come in as immutable snapshots; everything the turn changed
/// about them (reputation feedback, consumed production) is returned as
/// explicit updates for the caller to apply.
pub struct MarketEngine {
    scenario: Scenario,
    rng: StdRng,
    history: Vec<HashMap<RestaurantId, AllocationResult>>,
}

impl MarketEngine {
    pub fn new(scenario: Scenario) -> Self {
        let seed = scenario.random_seed.unwrap_or(DEFAULT_SEED);
        Self::with_seed(scenario, seed)
    }

    pub fn with_seed(scenario: Scenario, seed: u64) -> Self {
        Self {
            scenario,
            rng: StdRng::seed_from_u64(seed),
            history: Vec::new(),
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Past turns' results, oldest first. Grows without bound; callers that
    /// need bounded memory truncate it themselves.
    pub fn history(&self) -> &[HashMap<RestaurantId, AllocationResult>] {
        &self.history
    }

    /// Run the full allocation pass for one turn.
    ///
    /// Phases: demand -> per-segment allocation (continuous or discrete) ->
    /// capacity settlement (continuous only) -> revenue -> satisfaction.
    /// Exactly one RNG draw per call, so a fixed seed and call sequence
    /// reproduce a game.
    pub fn allocate_demand(
        &mut self,
        restaurants: &SlotMap<RestaurantId, Restaurant>,
        turn: u32,
        month: u32,
        modifiers: &MarketModifiers,
    ) -> TurnOutcome {
        let demand = compute_turn_demand(&mut self.rng, &self.scenario, month, modifiers);
        let _ = turn; // Only read by instrumentation

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "demand",
            turn = turn,
            month = month,
            total = demand.total,
        );

        let mut results: HashMap<RestaurantId, AllocationResult> = restaurants
            .iter()
            .map(|(id, restaurant)| {
                let result = AllocationResult {
                    capacity: restaurant.capacity(),
                    ..Default::default()
                };
                (id, result)
            })
            .collect();

        let mode = allocation_mode(restaurants);
        let mut service_state = match mode {
            AllocationMode::Discrete => Some(ServiceState::new(restaurants)),
            AllocationMode::Continuous => None,
        };

        for (segment, segment_demand) in self
            .scenario
            .segments
            .iter()
            .zip(demand.per_segment.iter().map(|(_, d)| *d))
        {
            let scores = segment_scores(restaurants, segment, modifiers);

            #[cfg(feature = "instrument")]
            for (id, score) in &scores {
                tracing::info!(
                    target: "allocation",
                    turn = turn,
                    segment = segment.name.as_str(),
                    restaurant = id.to_u64(),
                    score = *score as f64,
                    segment_demand = segment_demand,
                );
            }

            match &mut service_state {
                None => {
                    for (id, allocated) in allocate_segment_continuous(&scores, segment_demand) {
                        if let Some(result) = results.get_mut(&id) {
                            result.allocated_demand += allocated;
                        }
                    }
                }
                Some(state) => {
                    allocate_segment_discrete(state, &scores, segment_demand, &mut results);
                }
            }
        }

        if mode == AllocationMode::Continuous {
            apply_capacity_constraints(restaurants, &mut results);
        }

        let mut updates = Vec::with_capacity(results.len());
        for (id, restaurant) in restaurants.iter() {
            let Some(result) = results.get_mut(&id) else {
                continue;
            };
            compute_revenue(restaurant, result);
            let satisfaction = satisfaction_score(restaurant, result);

            // In discrete mode the recipe sales were drawn from prepared
            // batches; hand the decrements back to the caller. Continuous
            // mode implies nobody tracked production this turn.
            let units_served = match mode {
                AllocationMode::Discrete => result.recipe_sales.clone(),
                AllocationMode::Continuous => HashMap::new(),
            };

            #[cfg(feature = "instrument")]
            tracing::info!(
                target: "results",
                turn = turn,
                restaurant = id.to_u64(),
                allocated = result.allocated_demand,
                served = result.served_customers,
                capacity = result.capacity,
                revenue = result.revenue as f64,
                satisfaction = satisfaction.unwrap_or(0.0) as f64,
            );

            updates.push(RestaurantUpdate {
                restaurant: id,
                satisfaction,
                units_served,
            });
        }

        self.history.push(results.clone());
        TurnOutcome { results, updates }
    }

    /// Aggregate view of a stored turn; `None` selects the latest.
    pub fn market_analysis(&self, turn: Option<usize>) -> Option<MarketAnalysis> {
        let turn_data = match turn {
            Some(index) => self.history.get(index)?,
            None => self.history.last()?,
        };

        let total_demand: u32 = turn_data.values().map(|r| r.allocated_demand).sum();
        let total_served: u32 = turn_data.values().map(|r| r.served_customers).sum();
        let total_capacity: u32 = turn_data.values().map(|r| r.capacity).sum();
        let total_revenue: f32 = turn_data.values().map(|r| r.revenue).sum();

        Some(MarketAnalysis {
            total_demand,
            total_served,
            total_capacity,
            total_revenue,
            market_utilization: if total_capacity > 0 {
                total_served as f32 / total_capacity as f32
            } else {
                0.0
            },
            demand_satisfaction: if total_demand > 0 {
                total_served as f32 / total_demand as f32
            } else {
                0.0
            },
            average_ticket: if total_served > 0 {
                total_revenue / total_served as f32
            } else {
                0.0
            },
        })
    }

    /// Served share of the market for one restaurant in a stored turn;
    /// `None` selects the latest. 0 when the turn is missing or dead.
    pub fn market_share(&self, restaurant: RestaurantId, turn: Option<usize>) -> f32 {
        let turn_data = match turn {
            Some(index) => self.history.get(index),
            None => self.history.last(),
        };
        let Some(turn_data) = turn_data else {
            return 0.0;
        };

        let total_served: u32 = turn_data.values().map(|r| r.served_customers).sum();
        if total_served == 0 {
            return 0.0;
        }

        let served = turn_data
            .get(&restaurant)
            .map_or(0, |r| r.served_customers);
        served as f32 / total_served as f32
    }
}
