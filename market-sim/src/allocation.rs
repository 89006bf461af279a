use slotmap::SlotMap;
use std::collections::HashMap;

use crate::entities::Restaurant;
use crate::scenario::{MarketModifiers, MarketSegment};
use crate::scoring::attraction_score;
use crate::state::AllocationResult;
use crate::types::{KeyToU64, RestaurantId};

// ============================================================================
// Allocation Mode
// ============================================================================

/// Continuous mode splits demand proportionally to attraction scores and
/// settles capacity afterwards. Discrete mode routes customers one by one
/// against prepared inventory; it switches on as soon as anyone on the
/// market tracks production-ready units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    Continuous,
    Discrete,
}

pub fn allocation_mode(restaurants: &SlotMap<RestaurantId, Restaurant>) -> AllocationMode {
    if restaurants.values().any(|r| r.total_units_ready() > 0) {
        AllocationMode::Discrete
    } else {
        AllocationMode::Continuous
    }
}

/// Attraction scores for one segment, in restaurant insertion order. The
/// per-competitor modifier folds in here so the scorer itself stays ignorant
/// of identities.
pub fn segment_scores(
    restaurants: &SlotMap<RestaurantId, Restaurant>,
    segment: &MarketSegment,
    modifiers: &MarketModifiers,
) -> Vec<(RestaurantId, f32)> {
    restaurants
        .iter()
        .map(|(id, restaurant)| {
            let score = attraction_score(restaurant, segment, modifiers)
                * modifiers.competitor_multiplier(id.to_u64());
            (id, score.max(0.0))
        })
        .collect()
}

// ============================================================================
// Continuous Mode - Proportional split
// ============================================================================

/// `allocated_i = D * s_i / sum(s)`, truncated per restaurant. Truncation can
/// drop up to one customer per restaurant; nobody claims the crumbs. A
/// zero-score market allocates nothing.
pub fn allocate_segment_continuous(
    scores: &[(RestaurantId, f32)],
    segment_demand: u32,
) -> Vec<(RestaurantId, u32)> {
    let total_score: f32 = scores.iter().map(|(_, s)| s).sum();
    if total_score <= 0.0 {
        return scores.iter().map(|(id, _)| (*id, 0)).collect();
    }

    scores
        .iter()
        .map(|(id, score)| {
            let allocated = (segment_demand as f32 * score / total_score) as u32;
            (*id, allocated)
        })
        .collect()
}

// ============================================================================
// Capacity Constraint & Redistribution (continuous mode only)
// ============================================================================

/// Cap each restaurant at capacity, pool the overflow, and hand it back to
/// restaurants with spare seats, proportional to that spare. One pass only:
/// truncation in the proportional share can strand a few overflow customers,
/// which is accepted rather than iterated away.
pub fn apply_capacity_constraints(
    restaurants: &SlotMap<RestaurantId, Restaurant>,
    results: &mut HashMap<RestaurantId, AllocationResult>,
) {
    let mut total_overflow: u32 = 0;
    let mut total_spare: u32 = 0;

    for (id, restaurant) in restaurants.iter() {
        let Some(result) = results.get_mut(&id) else {
            continue;
        };
        let capacity = restaurant.capacity();
        result.capacity = capacity;

        if result.allocated_demand > capacity {
            total_overflow += result.allocated_demand - capacity;
            result.served_customers = capacity;
        } else {
            result.served_customers = result.allocated_demand;
            total_spare += capacity - result.allocated_demand;
        }
    }

    if total_overflow == 0 || total_spare == 0 {
        return;
    }

    let redistributed = total_overflow.min(total_spare);
    for (id, _) in restaurants.iter() {
        let Some(result) = results.get_mut(&id) else {
            continue;
        };
        let spare = result.capacity.saturating_sub(result.served_customers);
        if spare == 0 {
            continue;
        }
        let additional =
            (redistributed as u64 * spare as u64 / total_spare as u64) as u32;
        result.served_customers += additional.min(spare);
    }
}

// ============================================================================
// Discrete Mode - Customer-by-customer service against inventory
// ============================================================================

/// Working stock for one turn of discrete service. Capacity and ready units
/// are copied out of the snapshots once and drawn down across every segment;
/// the source restaurants stay untouched.
pub struct ServiceState {
    remaining_capacity: HashMap<RestaurantId, u32>,
    ready_units: HashMap<RestaurantId, HashMap<String, u32>>,
    /// Active recipes priced ascending (ties by id), the serving preference
    price_order: HashMap<RestaurantId, Vec<(String, f32)>>,
}

impl ServiceState {
    pub fn new(restaurants: &SlotMap<RestaurantId, Restaurant>) -> Self {
        let mut remaining_capacity = HashMap::new();
        let mut ready_units = HashMap::new();
        let mut price_order = HashMap::new();

        for (id, restaurant) in restaurants.iter() {
            remaining_capacity.insert(id, restaurant.capacity());

            let units: HashMap<String, u32> = restaurant
                .production
                .iter()
                .map(|(recipe, batch)| (recipe.clone(), batch.units_ready))
                .collect();
            ready_units.insert(id, units);

            let mut menu = restaurant.active_menu();
            menu.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            price_order.insert(id, menu);
        }

        Self {
            remaining_capacity,
            ready_units,
            price_order,
        }
    }

    /// Cheapest active recipe this restaurant can still serve, if any.
    fn servable_recipe(&self, id: RestaurantId) -> Option<&str> {
        let units = self.ready_units.get(&id)?;
        self.price_order
            .get(&id)?
            .iter()
            .map(|(recipe, _)| recipe.as_str())
            .find(|recipe| units.get(*recipe).copied().unwrap_or(0) > 0)
    }

    fn serve(&mut self, id: RestaurantId, recipe: &str) {
        if let Some(capacity) = self.remaining_capacity.get_mut(&id) {
            *capacity = capacity.saturating_sub(1);
        }
        if let Some(units) = self.ready_units.get_mut(&id) {
            if let Some(count) = units.get_mut(recipe) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

/// Route one segment's customers individually: each goes to the best-scoring
/// restaurant that still has a seat and a servable recipe, taking its
/// cheapest available dish. Customers nobody can serve walk away; they are
/// dropped here, not booked as lost overflow.
pub fn allocate_segment_discrete(
    state: &mut ServiceState,
    scores: &[(RestaurantId, f32)],
    segment_demand: u32,
    results: &mut HashMap<RestaurantId, AllocationResult>,
) {
    // Rank once per segment; stable sort keeps insertion order on ties.
    let mut ranked: Vec<(RestaurantId, f32)> = scores
        .iter()
        .filter(|(_, score)| *score > 0.0)
        .copied()
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    if ranked.is_empty() {
        return;
    }

    for _ in 0..segment_demand {
        let mut choice: Option<(RestaurantId, String)> = None;
        for (id, _) in &ranked {
            if state.remaining_capacity.get(id).copied().unwrap_or(0) == 0 {
                continue;
            }
            if let Some(recipe) = state.servable_recipe(*id) {
                choice = Some((*id, recipe.to_string()));
                break;
            }
        }

        let Some((id, recipe)) = choice else {
            // Nobody left on the market can serve; the rest of the segment
            // walks away too.
            break;
        };

        state.serve(id, &recipe);
        let result = results.entry(id).or_default();
        result.allocated_demand += 1;
        result.served_customers += 1;
        *result.recipe_sales.entry(recipe).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ProductionBatch;
    use crate::types::RestaurantType;

    fn priced(name: &str, capacity: u32, prices: &[(&str, f32)]) -> Restaurant {
        let mut r = Restaurant::new(name, RestaurantType::Classic, capacity);
        for (recipe, price) in prices {
            r.menu.insert(recipe.to_string(), *price);
            r.active_recipes.push(recipe.to_string());
        }
        r
    }

    #[test]
    fn continuous_split_is_proportional() {
        let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
        let a = restaurants.insert(priced("A", 60, &[("p", 10.0)]));
        let b = restaurants.insert(priced("B", 60, &[("p", 10.0)]));

        let scores = vec![(a, 1.0), (b, 1.0)];
        let allocation = allocate_segment_continuous(&scores, 100);
        assert_eq!(allocation, vec![(a, 50), (b, 50)]);
    }

    #[test]
    fn zero_total_score_allocates_nothing() {
        let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
        let a = restaurants.insert(priced("A", 60, &[]));
        let scores = vec![(a, 0.0)];
        assert_eq!(allocate_segment_continuous(&scores, 100), vec![(a, 0)]);
    }

    #[test]
    fn truncation_may_lose_customers() {
        let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
        let a = restaurants.insert(priced("A", 60, &[("p", 10.0)]));
        let b = restaurants.insert(priced("B", 60, &[("p", 10.0)]));
        let c = restaurants.insert(priced("C", 60, &[("p", 10.0)]));

        let scores = vec![(a, 1.0), (b, 1.0), (c, 1.0)];
        let allocation = allocate_segment_continuous(&scores, 100);
        let total: u32 = allocation.iter().map(|(_, d)| d).sum();
        assert_eq!(total, 99); // 33 each, one customer evaporates
    }

    #[test]
    fn overflow_redistributes_to_spare_capacity() {
        let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
        let small = restaurants.insert(priced("small", 30, &[("p", 10.0)]));
        let big = restaurants.insert(priced("big", 80, &[("p", 10.0)]));

        let mut results = HashMap::new();
        results.insert(
            small,
            AllocationResult {
                allocated_demand: 50,
                ..Default::default()
            },
        );
        results.insert(
            big,
            AllocationResult {
                allocated_demand: 20,
                ..Default::default()
            },
        );

        apply_capacity_constraints(&restaurants, &mut results);

        assert_eq!(results[&small].served_customers, 30);
        assert_eq!(results[&big].served_customers, 40);
    }

    #[test]
    fn redistribution_never_exceeds_spare() {
        let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
        let jammed = restaurants.insert(priced("jammed", 10, &[("p", 10.0)]));
        let roomy = restaurants.insert(priced("roomy", 200, &[("p", 10.0)]));

        let mut results = HashMap::new();
        results.insert(
            jammed,
            AllocationResult {
                allocated_demand: 300,
                ..Default::default()
            },
        );
        results.insert(
            roomy,
            AllocationResult {
                allocated_demand: 150,
                ..Default::default()
            },
        );

        apply_capacity_constraints(&restaurants, &mut results);

        assert_eq!(results[&jammed].served_customers, 10);
        // spare was 50; overflow 290 caps at the spare
        assert_eq!(results[&roomy].served_customers, 200);
    }

    #[test]
    fn discrete_serves_cheapest_ready_recipe_first() {
        let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
        let mut r = priced("A", 100, &[("cher", 20.0), ("bon_marche", 8.0)]);
        r.production.insert(
            "cher".to_string(),
            ProductionBatch {
                units_ready: 5,
                quality: 1.0,
            },
        );
        r.production.insert(
            "bon_marche".to_string(),
            ProductionBatch {
                units_ready: 2,
                quality: 1.0,
            },
        );
        let id = restaurants.insert(r);

        let mut state = ServiceState::new(&restaurants);
        let mut results = HashMap::new();
        allocate_segment_discrete(&mut state, &[(id, 1.0)], 4, &mut results);

        let sales = &results[&id].recipe_sales;
        assert_eq!(sales.get("bon_marche"), Some(&2));
        assert_eq!(sales.get("cher"), Some(&2));
    }

    #[test]
    fn discrete_never_sells_unprepared_recipes() {
        let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
        let mut r = priced("A", 100, &[("burger", 10.0)]);
        r.production.insert(
            "burger".to_string(),
            ProductionBatch {
                units_ready: 5,
                quality: 1.0,
            },
        );
        let id = restaurants.insert(r);

        let mut state = ServiceState::new(&restaurants);
        let mut results = HashMap::new();
        allocate_segment_discrete(&mut state, &[(id, 1.0)], 20, &mut results);

        assert_eq!(results[&id].served_customers, 5);
        assert_eq!(results[&id].recipe_sales["burger"], 5);
    }

    #[test]
    fn discrete_prefers_higher_score_until_exhausted() {
        let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
        let mut first = priced("first", 3, &[("p", 10.0)]);
        first.production.insert(
            "p".to_string(),
            ProductionBatch {
                units_ready: 10,
                quality: 1.0,
            },
        );
        let mut second = priced("second", 10, &[("p", 10.0)]);
        second.production.insert(
            "p".to_string(),
            ProductionBatch {
                units_ready: 10,
                quality: 1.0,
            },
        );
        let a = restaurants.insert(first);
        let b = restaurants.insert(second);

        let mut state = ServiceState::new(&restaurants);
        let mut results = HashMap::new();
        allocate_segment_discrete(&mut state, &[(a, 2.0), (b, 1.0)], 8, &mut results);

        // capacity caps the favorite at 3, the rest spills to second choice
        assert_eq!(results[&a].served_customers, 3);
        assert_eq!(results[&b].served_customers, 5);
    }

    #[test]
    fn discrete_capacity_persists_across_segments() {
        let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
        let mut r = priced("A", 6, &[("p", 10.0)]);
        r.production.insert(
            "p".to_string(),
            ProductionBatch {
                units_ready: 100,
                quality: 1.0,
            },
        );
        let id = restaurants.insert(r);

        let mut state = ServiceState::new(&restaurants);
        let mut results = HashMap::new();
        allocate_segment_discrete(&mut state, &[(id, 1.0)], 4, &mut results);
        allocate_segment_discrete(&mut state, &[(id, 1.0)], 4, &mut results);

        assert_eq!(results[&id].served_customers, 6);
    }
}
