use crate::entities::Restaurant;
use crate::state::AllocationResult;

// ============================================================================
// Revenue & Satisfaction - Turning covers into money and reputation
// ============================================================================

/// Compute revenue for a finished allocation and refresh the derived fields.
///
/// When the allocator tracked per-recipe sales (discrete mode) the revenue is
/// the exact sum over those sales; a sold recipe whose price has vanished
/// from the menu contributes zero instead of failing the turn. Otherwise
/// served customers are split as evenly as possible across the active card,
/// remainder to the recipes listed first.
pub fn compute_revenue(restaurant: &Restaurant, result: &mut AllocationResult) {
    if result.served_customers == 0 {
        result.refresh_derived();
        return;
    }

    if !result.recipe_sales.is_empty() {
        result.revenue = result
            .recipe_sales
            .iter()
            .filter_map(|(recipe, sold)| {
                restaurant.menu.get(recipe).map(|price| price * *sold as f32)
            })
            .sum();
        result.refresh_derived();
        return;
    }

    let menu = restaurant.active_menu();
    if menu.is_empty() {
        result.revenue = 0.0;
        result.refresh_derived();
        return;
    }

    let per_recipe = result.served_customers / menu.len() as u32;
    let remainder = result.served_customers as usize % menu.len();

    let mut revenue = 0.0;
    for (i, (recipe, price)) in menu.iter().enumerate() {
        let mut covers = per_recipe;
        if i < remainder {
            covers += 1;
        }
        revenue += price * covers as f32;
        if covers > 0 {
            result.recipe_sales.insert(recipe.clone(), covers);
        }
    }
    result.revenue = revenue;
    result.refresh_derived();
}

/// Price-to-quality satisfaction on a 1-5 scale, None when nobody was
/// served. Customers paying bistro prices for cafeteria quality rate low.
pub fn satisfaction_score(restaurant: &Restaurant, result: &AllocationResult) -> Option<f32> {
    if result.served_customers == 0 {
        return None;
    }

    let ratio = if restaurant.quality_score <= 0.0 {
        result.average_ticket
    } else {
        result.average_ticket / restaurant.quality_score
    };

    let score = if ratio <= 2.5 {
        5.0
    } else if ratio <= 3.5 {
        4.0
    } else if ratio <= 4.5 {
        3.0
    } else if ratio <= 6.0 {
        2.0
    } else {
        1.0
    };
    Some(score)
}
