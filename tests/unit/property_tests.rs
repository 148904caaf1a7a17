use liquidity_mirror::mirror::reconcile::{
    aggregate, diff, patch, prune_to_budget, sort_by_distance_from_mean,
};
use liquidity_mirror::{Budget, Order, Side, SideBudget, ToleranceMode};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Bid), Just(Side::Ask)]
}

/// Orders with two-decimal quantities and rates, ids unique by position
fn orders() -> impl Strategy<Value = Vec<Order>> {
    prop::collection::vec((side(), 1i64..100_000, 1i64..1_000_000), 0..40).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(index, (side, quantity, rate))| {
                Order::new(
                    Some(format!("o-{index}")),
                    side,
                    Decimal::new(quantity, 2),
                    Decimal::new(rate, 2),
                )
                .unwrap()
            })
            .collect()
    })
}

fn side_totals(orders: &[Order], side: Side) -> (Decimal, Decimal) {
    orders
        .iter()
        .filter(|order| order.side() == side)
        .fold((Decimal::ZERO, Decimal::ZERO), |(q, v), order| {
            (q + order.quantity(), v + order.value())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_diff_of_unchanged_is_empty(orders in orders()) {
            prop_assert!(diff(&orders, &orders).is_empty());
        }

        #[test]
        fn test_diff_against_empty_reports_every_order(orders in orders()) {
            prop_assert_eq!(diff(&orders, &[]), orders.clone());
            prop_assert!(diff(&[], &orders).is_empty());
        }

        #[test]
        fn test_aggregate_without_threshold_is_passthrough(orders in orders()) {
            prop_assert_eq!(aggregate(&orders, None, None), orders);
        }

        #[test]
        fn test_aggregate_never_creates_quantity(orders in orders(), min in 0i64..1_000_000) {
            let min_value = Decimal::new(min, 2);
            let chunks = aggregate(&orders, Some(min_value), None);
            for side in [Side::Bid, Side::Ask] {
                prop_assert!(side_totals(&chunks, side).0 <= side_totals(&orders, side).0);
            }
        }

        #[test]
        fn test_prune_respects_budget(
            orders in orders(),
            quantity in 0i64..500_000,
            value in 0i64..50_000_000,
            max in 0usize..20,
        ) {
            let limit = SideBudget {
                quantity: Decimal::new(quantity, 2),
                value: Decimal::new(value, 2),
            };
            let budget = Budget { ask: limit, bid: limit };
            let kept = prune_to_budget(&orders, &budget, None, Some(max));

            prop_assert!(kept.len() <= max);
            for side in [Side::Bid, Side::Ask] {
                let (q, v) = side_totals(&kept, side);
                prop_assert!(q <= limit.quantity);
                prop_assert!(v <= limit.value);
            }
        }

        #[test]
        fn test_patch_of_identical_sets_is_empty(orders in orders()) {
            prop_assert!(patch(&orders, &orders, Decimal::ZERO, ToleranceMode::Relative).is_empty());
        }

        #[test]
        fn test_patch_accounts_for_every_order(current in orders(), desired in orders()) {
            let result = patch(&current, &desired, Decimal::new(1, 2), ToleranceMode::Relative);
            let kept = current.len() - result.cancel.len();
            prop_assert_eq!(kept + result.place.len(), desired.len());
        }

        #[test]
        fn test_sort_is_a_permutation(orders in orders(), mean in 1i64..1_000_000) {
            let mean = Decimal::new(mean, 2);
            let sorted = sort_by_distance_from_mean(&orders, mean);
            prop_assert_eq!(sorted.len(), orders.len());
            for pair in sorted.windows(2) {
                prop_assert!((pair[0].rate() - mean).abs() <= (pair[1].rate() - mean).abs());
            }
        }
    }
}
