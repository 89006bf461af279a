use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tsify_next::Tsify;

use crate::types::RestaurantType;

// ============================================================================
// Configuration Errors - Rejected at construction, never mid-turn
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("segment '{name}': share {share} outside [0, 1]")]
    ShareOutOfRange { name: String, share: f32 },

    #[error("segment '{name}': budget {budget} must be positive")]
    NonPositiveBudget { name: String, budget: f32 },

    #[error("segment '{name}': {kind} sensitivity {value} outside [0, 2]")]
    SensitivityOutOfRange {
        name: String,
        kind: &'static str,
        value: f32,
    },

    #[error("segment '{name}': negative affinity {affinity} for {kind:?}")]
    NegativeAffinity {
        name: String,
        kind: RestaurantType,
        affinity: f32,
    },

    #[error("segment '{name}': seasonality month {month} outside 1-12")]
    SeasonalityMonthOutOfRange { name: String, month: u32 },

    #[error("segment '{name}': negative seasonality factor {factor}")]
    NegativeSeasonality { name: String, factor: f32 },

    #[error("scenario '{name}': needs at least one segment")]
    NoSegments { name: String },

    #[error("scenario '{name}': demand noise {noise} outside [0, 1]")]
    NoiseOutOfRange { name: String, noise: f32 },

    #[error("scenario '{name}': segment shares sum to {total}, expected ~1.0")]
    ShareSumDrift { name: String, total: f32 },
}

// ============================================================================
// Market Segment - A named slice of the customer population
// ============================================================================

/// Immutable once constructed; `new` rejects out-of-range coefficients so
/// the engine can assume validated inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSegment {
    pub name: String,
    /// Share of total demand, 0-1. Shares across a scenario's segments sum
    /// to ~1.0 (checked with 5% tolerance at scenario construction).
    pub share: f32,
    /// Reference spend per customer
    pub budget: f32,
    /// 0-2; higher means prices above budget hurt more
    pub price_sensitivity: f32,
    /// 0-2; higher means quality deviations matter more
    pub quality_sensitivity: f32,
    pub type_affinity: HashMap<RestaurantType, f32>,
    /// Explicit per-month factors; months without an entry fall back to the
    /// scenario's seasonal calendar
    pub seasonality: HashMap<u32, f32>,
}

impl MarketSegment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        share: f32,
        budget: f32,
        price_sensitivity: f32,
        quality_sensitivity: f32,
        type_affinity: HashMap<RestaurantType, f32>,
        seasonality: HashMap<u32, f32>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if !(0.0..=1.0).contains(&share) {
            return Err(ConfigError::ShareOutOfRange { name, share });
        }
        if budget <= 0.0 {
            return Err(ConfigError::NonPositiveBudget { name, budget });
        }
        if !(0.0..=2.0).contains(&price_sensitivity) {
            return Err(ConfigError::SensitivityOutOfRange {
                name,
                kind: "price",
                value: price_sensitivity,
            });
        }
        if !(0.0..=2.0).contains(&quality_sensitivity) {
            return Err(ConfigError::SensitivityOutOfRange {
                name,
                kind: "quality",
                value: quality_sensitivity,
            });
        }
        for (kind, affinity) in &type_affinity {
            if *affinity < 0.0 {
                return Err(ConfigError::NegativeAffinity {
                    name,
                    kind: *kind,
                    affinity: *affinity,
                });
            }
        }
        for (month, factor) in &seasonality {
            if !(1..=12).contains(month) {
                return Err(ConfigError::SeasonalityMonthOutOfRange {
                    name,
                    month: *month,
                });
            }
            if *factor < 0.0 {
                return Err(ConfigError::NegativeSeasonality {
                    name,
                    factor: *factor,
                });
            }
        }
        Ok(Self {
            name,
            share,
            budget,
            price_sensitivity,
            quality_sensitivity,
            type_affinity,
            seasonality,
        })
    }

    /// Affinity for a restaurant type, 1.0 when unspecified.
    pub fn affinity_for(&self, kind: RestaurantType) -> f32 {
        self.type_affinity.get(&kind).copied().unwrap_or(1.0)
    }
}

// ============================================================================
// Seasonal Calendar - Name-matched monthly demand bonuses
// ============================================================================

/// Fallback seasonality for segments that carry no explicit per-month
/// factors. Rules match on a lowercase substring of the segment name, so one
/// entry covers "Students" and "Étudiants" alike. Unmatched names get 1.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonalCalendar {
    rules: Vec<CalendarRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CalendarRule {
    name_contains: String,
    by_month: HashMap<u32, f32>,
}

impl SeasonalCalendar {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, name_contains: &str, by_month: HashMap<u32, f32>) -> Self {
        self.rules.push(CalendarRule {
            name_contains: name_contains.to_lowercase(),
            by_month,
        });
        self
    }

    /// Bonuses stay in the 0.9-1.3 band: student trade collapses over the
    /// summer break, families and tourists peak with school holidays.
    pub fn standard() -> Self {
        Self::empty()
            .with_rule(
                "student",
                HashMap::from([(7, 0.9), (8, 0.9), (9, 1.2), (10, 1.1)]),
            )
            .with_rule(
                "étudiant",
                HashMap::from([(7, 0.9), (8, 0.9), (9, 1.2), (10, 1.1)]),
            )
            .with_rule(
                "famil",
                HashMap::from([(7, 1.2), (8, 1.3), (12, 1.2)]),
            )
            .with_rule(
                "touri",
                HashMap::from([(6, 1.2), (7, 1.3), (8, 1.3), (12, 1.1)]),
            )
    }

    pub fn bonus(&self, segment_name: &str, month: u32) -> f32 {
        let lowered = segment_name.to_lowercase();
        for rule in &self.rules {
            if lowered.contains(&rule.name_contains) {
                return rule.by_month.get(&month).copied().unwrap_or(1.0);
            }
        }
        1.0
    }
}

/// Seasonal bonus for a segment in a month: the segment's own table wins,
/// then the calendar, then neutral.
pub fn seasonal_bonus(segment: &MarketSegment, calendar: &SeasonalCalendar, month: u32) -> f32 {
    if let Some(factor) = segment.seasonality.get(&month) {
        return *factor;
    }
    calendar.bonus(&segment.name, month)
}

// ============================================================================
// Scenario - Demand-model configuration for a whole game
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub base_demand: u32,
    /// 0-1, half-width of the uniform noise band on total demand
    pub demand_noise: f32,
    pub segments: Vec<MarketSegment>,
    pub calendar: SeasonalCalendar,
    pub total_turns: u32,
    pub random_seed: Option<u64>,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        base_demand: u32,
        demand_noise: f32,
        segments: Vec<MarketSegment>,
        calendar: SeasonalCalendar,
        total_turns: u32,
        random_seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if segments.is_empty() {
            return Err(ConfigError::NoSegments { name });
        }
        if !(0.0..=1.0).contains(&demand_noise) {
            return Err(ConfigError::NoiseOutOfRange {
                name,
                noise: demand_noise,
            });
        }
        // Shares need not sum to exactly 1.0; the engine never normalizes,
        // so drift beyond 5% would silently shrink or inflate the market.
        let total: f32 = segments.iter().map(|s| s.share).sum();
        if !(0.95..=1.05).contains(&total) {
            return Err(ConfigError::ShareSumDrift { name, total });
        }
        Ok(Self {
            name,
            base_demand,
            demand_noise,
            segments,
            calendar,
            total_turns,
            random_seed,
        })
    }
}

// ============================================================================
// Market Modifiers - Typed knobs from the event/competition subsystem
// ============================================================================

/// All multiplicative, all neutral by default. Produced externally each turn
/// (events, campaigns, competitor actions) and consumed read-only here.
/// Fields omitted from a JSON payload stay neutral.
#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct MarketModifiers {
    #[serde(default = "neutral")]
    pub demand: f32,
    #[serde(default = "neutral")]
    pub price_sensitivity: f32,
    #[serde(default = "neutral")]
    pub quality_importance: f32,
    /// segment name -> demand multiplier
    #[serde(default)]
    pub per_segment: HashMap<String, f32>,
    /// restaurant key (as u64) -> attraction multiplier
    #[serde(default)]
    pub per_competitor: HashMap<u64, f32>,
}

fn neutral() -> f32 {
    1.0
}

impl Default for MarketModifiers {
    fn default() -> Self {
        Self {
            demand: 1.0,
            price_sensitivity: 1.0,
            quality_importance: 1.0,
            per_segment: HashMap::new(),
            per_competitor: HashMap::new(),
        }
    }
}

impl MarketModifiers {
    pub fn segment_multiplier(&self, segment_name: &str) -> f32 {
        self.per_segment.get(segment_name).copied().unwrap_or(1.0)
    }

    pub fn competitor_multiplier(&self, key: u64) -> f32 {
        self.per_competitor.get(&key).copied().unwrap_or(1.0)
    }
}
