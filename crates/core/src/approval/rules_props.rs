//! Property-based tests for ApprovalRulesEngine.
//!
//! - Determinism: identical inputs yield identical paths
//! - Sales first: level 1 is always sales, stages never repeat
//! - Deadlines: one per level, each `now + sla_hours`

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::approval::rules::ApprovalRulesEngine;
use crate::approval::types::{ApprovalStage, PricingItem, PricingSnapshot};

/// Strategy for totals between 0.01 and 1,000,000.00.
fn arb_total() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_project_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("standard".to_string()),
        Just("turnkey".to_string()),
        Just("framework".to_string()),
        Just("strategic".to_string()),
        Just("maintenance".to_string()),
    ]
}

fn arb_item() -> impl Strategy<Value = PricingItem> {
    (
        1i64..1_000i64,
        1i64..100_000i64,
        prop::option::of(1i64..100_000i64),
    )
        .prop_map(|(qty, price, cost)| PricingItem {
            sku: "SKU-PROP".to_string(),
            quantity: Decimal::from(qty),
            unit_price: Decimal::new(price, 2),
            base_cost: cost.map(|c| Decimal::new(c, 2)),
        })
}

fn arb_snapshot() -> impl Strategy<Value = PricingSnapshot> {
    (
        arb_total(),
        arb_project_type(),
        prop::collection::vec(arb_item(), 0..6),
    )
        .prop_map(|(total_price, project_type, items)| PricingSnapshot {
            total_price,
            currency: "EUR".to_string(),
            project_type,
            items,
        })
}

fn arb_now() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..365 * 24).prop_map(|h| {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The same snapshot and clock always produce the same path.
    #[test]
    fn prop_path_is_deterministic(snapshot in arb_snapshot(), now in arb_now()) {
        let engine = ApprovalRulesEngine::default();
        let first = engine.determine_approval_path(&snapshot, now).unwrap();
        let second = engine.determine_approval_path(&snapshot.clone(), now).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Level 1 is sales; stages appear at most once and in canonical order.
    #[test]
    fn prop_sales_first_and_ordered(snapshot in arb_snapshot(), now in arb_now()) {
        let path = ApprovalRulesEngine::default().determine_approval_path(&snapshot, now).unwrap();

        prop_assert!(path.requires_sales);
        prop_assert_eq!(path.levels[0].stage, ApprovalStage::Sales);

        let stages = path.stages();
        let mut sorted = stages.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(stages, sorted);

        for (index, level) in path.levels.iter().enumerate() {
            prop_assert_eq!(usize::try_from(level.level).unwrap(), index + 1);
        }
    }

    /// Each level has exactly one deadline, `now + sla_hours`.
    #[test]
    fn prop_one_deadline_per_level(snapshot in arb_snapshot(), now in arb_now()) {
        let path = ApprovalRulesEngine::default().determine_approval_path(&snapshot, now).unwrap();

        prop_assert_eq!(path.sla_deadlines.len(), path.levels.len());
        for (level, deadline) in path.levels.iter().zip(&path.sla_deadlines) {
            prop_assert_eq!(*deadline, now + Duration::hours(level.sla_hours));
            prop_assert!(*deadline > now);
        }
    }

    /// Any total at or above the management threshold gets all three levels.
    #[test]
    fn prop_management_threshold_implies_full_path(
        extra in 0i64..10_000_000i64,
        project_type in arb_project_type(),
        now in arb_now(),
    ) {
        let snapshot = PricingSnapshot {
            total_price: Decimal::new(250_000, 0) + Decimal::new(extra, 2),
            currency: "USD".to_string(),
            project_type,
            items: vec![],
        };
        let path = ApprovalRulesEngine::default().determine_approval_path(&snapshot, now).unwrap();
        prop_assert_eq!(path.stages(), ApprovalStage::ALL.to_vec());
    }
}
