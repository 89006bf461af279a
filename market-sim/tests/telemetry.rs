//! Instrumented runs: engine telemetry drained into DataFrames must agree
//! with the engine's own stored history.

use std::collections::HashMap;

use market_sim::instrument::ScopedRecorder;
use market_sim::{
    MarketEngine, MarketModifiers, MarketSegment, Restaurant, RestaurantId, RestaurantType,
    Scenario, SeasonalCalendar,
};
use polars::prelude::*;
use slotmap::SlotMap;

fn scenario() -> Scenario {
    let segment = MarketSegment::new(
        "regulars",
        1.0,
        14.0,
        1.0,
        1.0,
        HashMap::new(),
        HashMap::new(),
    )
    .unwrap();
    Scenario::new(
        "telemetry",
        250,
        0.2,
        vec![segment],
        SeasonalCalendar::empty(),
        12,
        Some(31),
    )
    .unwrap()
}

fn market() -> SlotMap<RestaurantId, Restaurant> {
    let mut restaurants: SlotMap<RestaurantId, Restaurant> = SlotMap::with_key();
    for (name, capacity, price) in [("A", 120u32, 12.0f32), ("B", 90, 15.0), ("C", 60, 10.0)] {
        let mut r = Restaurant::new(name, RestaurantType::Classic, capacity);
        r.menu.insert("plat".to_string(), price);
        r.active_recipes = vec!["plat".to_string()];
        restaurants.insert(r);
    }
    restaurants
}

fn col_i64(df: &DataFrame, name: &str) -> Vec<i64> {
    df.column(name)
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

#[test]
fn telemetry_tables_mirror_turn_history() {
    let mut rec = ScopedRecorder::new("data", "turn_telemetry");

    let mut engine = MarketEngine::new(scenario());
    let restaurants = market();
    let modifiers = MarketModifiers::default();

    let turns = 12;
    for turn in 1..=turns {
        let month = (turn - 1) % 12 + 1;
        engine.allocate_demand(&restaurants, turn, month, &modifiers);
    }

    let dfs = rec.get();

    // One demand row per turn
    let demand = dfs.get("demand").expect("demand table recorded");
    assert_eq!(demand.height(), turns as usize);

    // One result row per restaurant per turn
    let results = dfs.get("results").expect("results table recorded");
    assert_eq!(results.height(), (turns as usize) * restaurants.len());

    // Served counts in the telemetry equal the served counts the engine kept
    let telemetry_served: i64 = col_i64(results, "served").iter().sum();
    let history_served: u32 = engine
        .history()
        .iter()
        .flat_map(|turn| turn.values())
        .map(|r| r.served_customers)
        .sum();
    assert_eq!(telemetry_served as u32, history_served);

    // Every turn's market respects total capacity in the telemetry too
    let df = results
        .clone()
        .lazy()
        .group_by([col("turn")])
        .agg([
            col("served").sum().alias("served_total"),
            col("capacity").sum().alias("capacity_total"),
        ])
        .collect()
        .unwrap();
    let served_totals = col_i64(&df, "served_total");
    let capacity_totals = col_i64(&df, "capacity_total");
    for (served, capacity) in served_totals.iter().zip(capacity_totals.iter()) {
        assert!(served <= capacity, "served {served} over capacity {capacity}");
    }
}
