use crate::entities::Restaurant;
use crate::scenario::{MarketModifiers, MarketSegment};
use crate::types::staffing_attraction_multiplier;

// ============================================================================
// Attraction Scorer - How appealing is a restaurant to a segment?
// ============================================================================

/// Quality factor bounds; reputation can push the factor around inside them.
const QUALITY_FACTOR_MIN: f32 = 0.5;
const QUALITY_FACTOR_MAX: f32 = 2.0;

/// Production quality moves the score at most 10% either way.
const PRODUCTION_FACTOR_MIN: f32 = 0.90;
const PRODUCTION_FACTOR_MAX: f32 = 1.10;
const PRODUCTION_FACTOR_SPAN: f32 = 0.2;

/// Non-negative attraction score for a (restaurant, segment) pair.
///
/// A product of independent factors: type affinity, price-to-budget fit,
/// perceived quality (ingredients + reputation), this turn's production
/// quality, and the staffing multiplier. Any zero factor (a closed
/// restaurant, a zero affinity) zeroes the whole score.
pub fn attraction_score(
    restaurant: &Restaurant,
    segment: &MarketSegment,
    modifiers: &MarketModifiers,
) -> f32 {
    let type_affinity = segment.affinity_for(restaurant.kind);
    let price = price_factor(restaurant.average_ticket(), segment, modifiers);
    let quality = quality_factor(restaurant, segment, modifiers);
    let production = production_quality_factor(restaurant);
    let staffing = staffing_attraction_multiplier(restaurant.staffing_level);

    let score = type_affinity * price * quality * production * staffing;
    score.max(0.0)
}

/// Price attractiveness from the ticket-to-budget ratio.
///
/// Tier boundaries are ratio-inclusive: a ticket at exactly the budget still
/// counts as "within budget". A restaurant with no active menu gets the flat
/// 0.5 placeholder rather than a free ride or a death sentence.
pub fn price_factor(
    average_ticket: f32,
    segment: &MarketSegment,
    modifiers: &MarketModifiers,
) -> f32 {
    if average_ticket <= 0.0 {
        return 0.5;
    }

    let sensitivity = segment.price_sensitivity * modifiers.price_sensitivity;
    let weight = (2.0 - sensitivity).max(0.0);
    let ratio = average_ticket / segment.budget;

    let base = if ratio <= 0.8 {
        1.5
    } else if ratio <= 1.0 {
        1.2
    } else if ratio <= 1.2 {
        0.8
    } else if ratio <= 1.5 {
        0.4
    } else {
        0.1
    };

    base * weight
}

/// Perceived quality: the 1-5 overall quality score mapped onto a factor,
/// its deviation from neutral scaled by how much this segment cares, plus a
/// small reputation adjustment. Clamped to [0.5, 2.0].
pub fn quality_factor(
    restaurant: &Restaurant,
    segment: &MarketSegment,
    modifiers: &MarketModifiers,
) -> f32 {
    let base = quality_tier(restaurant.quality_score);
    let sensitivity = segment.quality_sensitivity * modifiers.quality_importance;
    let adjusted = 1.0 + (base - 1.0) * sensitivity;

    let reputation_adjust = (restaurant.reputation / 10.0 - 0.5) * 0.2;

    (adjusted + reputation_adjust).clamp(QUALITY_FACTOR_MIN, QUALITY_FACTOR_MAX)
}

fn quality_tier(quality_score: f32) -> f32 {
    if quality_score <= 1.5 {
        0.70
    } else if quality_score <= 2.5 {
        1.00
    } else if quality_score <= 3.5 {
        1.20
    } else if quality_score <= 4.5 {
        1.40
    } else {
        1.60
    }
}

/// Average batch quality weighted by prepared quantity, mapped through a 0.2
/// span around neutral. No production data means no opinion (1.0).
pub fn production_quality_factor(restaurant: &Restaurant) -> f32 {
    let total_units: u32 = restaurant.production.values().map(|b| b.units_ready).sum();
    if total_units == 0 {
        return 1.0;
    }

    let weighted: f32 = restaurant
        .production
        .values()
        .map(|b| b.quality * b.units_ready as f32)
        .sum();
    let average = weighted / total_units as f32;

    (1.0 + (average - 1.0) * PRODUCTION_FACTOR_SPAN)
        .clamp(PRODUCTION_FACTOR_MIN, PRODUCTION_FACTOR_MAX)
}
