use rand::Rng;

use crate::scenario::{seasonal_bonus, MarketModifiers, Scenario};

// ============================================================================
// Demand Model - How many customers enter the market this turn
// ============================================================================

#[derive(Debug, Clone)]
pub struct TurnDemand {
    pub total: u32,
    /// (segment name, customers), in scenario segment order
    pub per_segment: Vec<(String, u32)>,
}

/// Total and per-segment demand for one turn.
///
/// Total demand takes one uniform draw in the scenario's noise band, then the
/// event demand multiplier. Each segment then gets its share scaled by the
/// month's seasonal bonus and any per-segment modifier. Integer truncation at
/// both steps is accepted: shares are not renormalized, so a few customers
/// per turn can evaporate or appear within the scenario's 5% share tolerance.
pub fn compute_turn_demand(
    rng: &mut impl Rng,
    scenario: &Scenario,
    month: u32,
    modifiers: &MarketModifiers,
) -> TurnDemand {
    // Always advance the generator, even for a dead market, so the draw
    // sequence stays aligned across turns regardless of base demand.
    let noise = scenario.demand_noise;
    let noise_factor = 1.0 + rng.random_range(-noise..=noise);

    let total = if scenario.base_demand == 0 {
        0
    } else {
        (scenario.base_demand as f32 * noise_factor * modifiers.demand).max(0.0) as u32
    };

    let per_segment = scenario
        .segments
        .iter()
        .map(|segment| {
            let bonus = seasonal_bonus(segment, &scenario.calendar, month);
            let demand = (total as f32
                * segment.share
                * bonus
                * modifiers.segment_multiplier(&segment.name))
                as u32;
            (segment.name.clone(), demand)
        })
        .collect();

    TurnDemand { total, per_segment }
}
