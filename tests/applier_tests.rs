//! Model applier tests
//!
//! Idempotent dimension creation, Big-M time windows, grouping
//! linearizations, vehicle restrictions, and the fixed application order,
//! inspected through the in-memory `ModelBuilder`.

mod fixtures;

use fixtures::{accepted, sample_context};
use vrp_rules::apply::{DimensionUse, ModelApplier, CAPACITY_DIMENSION, TIME_DIMENSION};
use vrp_rules::model::{CmpOp, ModelBuilder};
use vrp_rules::types::{CapacityUnit, ConstraintKind, ConstraintSet, PriorityLevel};

// ============================================================================
// Shared dimensions
// ============================================================================

#[test]
fn test_capacity_dimension_created_once() {
    let ctx = sample_context(3);
    let mut model = ModelBuilder::new(ctx.node_count(), 3);
    let mut applier = ModelApplier::new(&ctx);

    let kind = ConstraintKind::Capacity { value: 500.0, unit: CapacityUnit::Kilograms };
    let set: ConstraintSet = vec![accepted(kind.clone(), &ctx), accepted(kind, &ctx)]
        .into_iter()
        .collect();

    let report = applier.apply_all(&set, &mut model);
    assert_eq!(report.applied_successfully(), 2);
    assert!(report.failed.is_empty());

    let capacity_dims = model
        .dimension_names()
        .iter()
        .filter(|n| **n == CAPACITY_DIMENSION)
        .count();
    assert_eq!(capacity_dims, 1, "applying capacity twice must not duplicate the dimension");
    assert_eq!(
        report.applied[0].dimension,
        Some((CAPACITY_DIMENSION.to_string(), DimensionUse::Created))
    );
    assert_eq!(
        report.applied[1].dimension,
        Some((CAPACITY_DIMENSION.to_string(), DimensionUse::Reused))
    );
}

#[test]
fn test_time_dimension_shared_between_window_and_working_hours() {
    let ctx = sample_context(2);
    let mut model = ModelBuilder::new(ctx.node_count(), 2);
    let mut applier = ModelApplier::new(&ctx);

    let set: ConstraintSet = vec![
        accepted(ConstraintKind::TimeWindow { customer: 2, start: 540, end: 1020 }, &ctx),
        accepted(ConstraintKind::WorkingHours { max_minutes: 480 }, &ctx),
    ]
    .into_iter()
    .collect();

    let report = applier.apply_all(&set, &mut model);
    assert_eq!(report.applied_successfully(), 2);

    let time_dims = model
        .dimension_names()
        .iter()
        .filter(|n| **n == TIME_DIMENSION)
        .count();
    assert_eq!(time_dims, 1, "working hours reuses the window's time dimension");
    assert_eq!(
        report.applied[1].dimension,
        Some((TIME_DIMENSION.to_string(), DimensionUse::Reused))
    );
}

// ============================================================================
// Big-M time windows
// ============================================================================

#[test]
fn test_big_m_derived_from_time_horizon() {
    let ctx = sample_context(2);
    let applier = ModelApplier::new(&ctx);
    // Latest window end is 20:00 = 1200 minutes; the worst leg is 38.
    assert_eq!(applier.big_m(), 1238.0);
}

#[test]
fn test_time_window_big_m_linearization() {
    let ctx = sample_context(2);
    let mut model = ModelBuilder::new(ctx.node_count(), 2);
    let mut applier = ModelApplier::new(&ctx);
    let m = applier.big_m();

    let set: ConstraintSet =
        vec![accepted(ConstraintKind::TimeWindow { customer: 2, start: 540, end: 1020 }, &ctx)]
            .into_iter()
            .collect();
    let report = applier.apply_all(&set, &mut model);
    assert_eq!(report.applied_successfully(), 1);

    // One lower and one upper bound per vehicle.
    let lower = model.constraints_named("time_window_2_v");
    assert_eq!(lower.len(), 4);

    let lb = model
        .constraints_named("time_window_2_v0_lb")
        .into_iter()
        .next()
        .expect("lower bound exists");
    assert_eq!(lb.op, CmpOp::Ge);
    assert_eq!(lb.rhs, 540.0 - m, "lower bound relaxes by M when unvisited");
    assert!(lb.terms.iter().any(|(_, coef)| *coef == -m));

    let ub = model
        .constraints_named("time_window_2_v1_ub")
        .into_iter()
        .next()
        .expect("upper bound exists");
    assert_eq!(ub.op, CmpOp::Le);
    assert_eq!(ub.rhs, 1020.0 + m, "upper bound relaxes by M when unvisited");
}

// ============================================================================
// Grouping linearizations
// ============================================================================

#[test]
fn test_separate_vehicles_one_constraint_per_vehicle() {
    let ctx = sample_context(3);
    let mut model = ModelBuilder::new(ctx.node_count(), 3);
    let mut applier = ModelApplier::new(&ctx);

    let set: ConstraintSet =
        vec![accepted(ConstraintKind::SeparateVehicles { first: 1, second: 4 }, &ctx)]
            .into_iter()
            .collect();
    let report = applier.apply_all(&set, &mut model);
    assert_eq!(report.applied_successfully(), 1);

    let constraints = model.constraints_named("separate_1_4");
    assert_eq!(constraints.len(), 3, "one constraint per vehicle");
    for constraint in constraints {
        assert_eq!(constraint.op, CmpOp::Le);
        assert_eq!(constraint.rhs, 1.0);
        assert_eq!(constraint.terms.len(), 2, "the two visit indicators");
        assert!(constraint.terms.iter().all(|(_, coef)| *coef == 1.0));
    }
}

#[test]
fn test_same_vehicle_auxiliary_linearization() {
    let ctx = sample_context(2);
    let mut model = ModelBuilder::new(ctx.node_count(), 2);
    let mut applier = ModelApplier::new(&ctx);

    let set: ConstraintSet =
        vec![accepted(ConstraintKind::SameVehicle { first: 1, second: 2 }, &ctx)]
            .into_iter()
            .collect();
    let report = applier.apply_all(&set, &mut model);
    assert_eq!(report.applied_successfully(), 1);

    assert_eq!(model.auxiliary_count(), 2, "one pair variable per vehicle");
    let constraints = model.constraints_named("same_vehicle_1_2");
    assert_eq!(
        constraints.len(),
        9,
        "2 forcing + 2 trigger per vehicle, plus the at-most-one coupling"
    );

    let at_most_one = model
        .constraints_named("same_vehicle_1_2_at_most_one")
        .into_iter()
        .next()
        .expect("coupling constraint exists");
    assert_eq!(at_most_one.op, CmpOp::Le);
    assert_eq!(at_most_one.rhs, 1.0);
    assert_eq!(at_most_one.terms.len(), 2, "one auxiliary per vehicle");
}

// ============================================================================
// Vehicle restrictions
// ============================================================================

#[test]
fn test_forbidden_zeroes_every_touching_edge() {
    let ctx = sample_context(3);
    let mut model = ModelBuilder::new(ctx.node_count(), 3);
    let mut applier = ModelApplier::new(&ctx);

    let set: ConstraintSet =
        vec![accepted(ConstraintKind::VehicleForbidden { vehicle: 0, location: 2 }, &ctx)]
            .into_iter()
            .collect();
    applier.apply_all(&set, &mut model);

    let constraint = model
        .constraints_named("forbid_v0_at_2")
        .into_iter()
        .next()
        .expect("forbid constraint exists");
    assert_eq!(constraint.op, CmpOp::Eq);
    assert_eq!(constraint.rhs, 0.0);
    // Both directions for every other node: 2 * (5 - 1).
    assert_eq!(constraint.terms.len(), 8);
}

#[test]
fn test_exclusive_blocks_every_other_vehicle() {
    let ctx = sample_context(3);
    let mut model = ModelBuilder::new(ctx.node_count(), 3);
    let mut applier = ModelApplier::new(&ctx);

    let set: ConstraintSet =
        vec![accepted(ConstraintKind::VehicleExclusive { vehicle: 1, location: 2 }, &ctx)]
            .into_iter()
            .collect();
    let report = applier.apply_all(&set, &mut model);

    assert_eq!(report.applied[0].mathematical_constraints_added.len(), 2);
    assert_eq!(model.constraints_named("exclusive_2_blocks_v0").len(), 1);
    assert_eq!(model.constraints_named("exclusive_2_blocks_v2").len(), 1);
    assert!(
        model.constraints_named("exclusive_2_blocks_v1").is_empty(),
        "the exclusive vehicle itself is not blocked"
    );
}

// ============================================================================
// Bounds, priorities, ordering
// ============================================================================

#[test]
fn test_vehicle_bounds_sum_vehicle_indicators() {
    let ctx = sample_context(3);
    let mut model = ModelBuilder::new(ctx.node_count(), 3);
    let mut applier = ModelApplier::new(&ctx);

    let set: ConstraintSet = vec![
        accepted(ConstraintKind::MinVehicles { count: 2 }, &ctx),
        accepted(ConstraintKind::MaxVehicles { count: 3 }, &ctx),
    ]
    .into_iter()
    .collect();
    applier.apply_all(&set, &mut model);

    let min = model.constraints_named("min_vehicles").into_iter().next().expect("min exists");
    assert_eq!(min.op, CmpOp::Ge);
    assert_eq!(min.rhs, 2.0);
    assert_eq!(min.terms.len(), 3, "one indicator per fleet vehicle");

    let max = model.constraints_named("max_vehicles").into_iter().next().expect("max exists");
    assert_eq!(max.op, CmpOp::Le);
    assert_eq!(max.rhs, 3.0);
}

#[test]
fn test_priority_becomes_penalized_disjunction() {
    let ctx = sample_context(2);
    let mut model = ModelBuilder::new(ctx.node_count(), 2);
    let mut applier = ModelApplier::new(&ctx);

    let set: ConstraintSet = vec![accepted(
        ConstraintKind::Priority { customer: 3, level: PriorityLevel::High },
        &ctx,
    )]
    .into_iter()
    .collect();
    applier.apply_all(&set, &mut model);

    assert_eq!(model.disjunctions.len(), 1);
    let (node, penalty) = model.disjunctions[0];
    assert_eq!(node, 3);
    assert!(penalty > 0.0, "skipping a priority node costs a positive penalty");
}

#[test]
fn test_application_follows_priority_order() {
    let ctx = sample_context(2);
    let mut model = ModelBuilder::new(ctx.node_count(), 2);
    let mut applier = ModelApplier::new(&ctx);

    // Inserted back to front; applied capacity-first regardless.
    let set: ConstraintSet = vec![
        accepted(ConstraintKind::Priority { customer: 1, level: PriorityLevel::Low }, &ctx),
        accepted(ConstraintKind::WorkingHours { max_minutes: 480 }, &ctx),
        accepted(ConstraintKind::Capacity { value: 400.0, unit: CapacityUnit::Kilograms }, &ctx),
    ]
    .into_iter()
    .collect();

    let report = applier.apply_all(&set, &mut model);
    let applied_kinds: Vec<&str> = report.applied.iter().map(|a| a.kind).collect();
    assert_eq!(applied_kinds, vec!["capacity", "working_hours", "priority"]);
}

#[test]
fn test_review_flagged_constraint_is_never_applied() {
    let ctx = sample_context(2);
    let mut model = ModelBuilder::new(ctx.node_count(), 2);
    let mut applier = ModelApplier::new(&ctx);

    let mut constraint = accepted(
        ConstraintKind::Capacity { value: 500.0, unit: CapacityUnit::Kilograms },
        &ctx,
    );
    constraint.requires_manual_review = true;
    let set: ConstraintSet = vec![constraint].into_iter().collect();

    let report = applier.apply_all(&set, &mut model);
    assert!(report.applied.is_empty(), "flagged constraints are skipped");
    assert!(model.constraints.is_empty(), "nothing reached the model");
    assert!(report.warnings.iter().any(|w| w.contains("review")));
}

#[test]
fn test_capacity_constraints_bound_each_vehicle() {
    let ctx = sample_context(2);
    let mut model = ModelBuilder::new(ctx.node_count(), 2);
    let mut applier = ModelApplier::new(&ctx);

    let set: ConstraintSet = vec![accepted(
        ConstraintKind::Capacity { value: 500.0, unit: CapacityUnit::Kilograms },
        &ctx,
    )]
    .into_iter()
    .collect();
    applier.apply_all(&set, &mut model);

    let constraints = model.constraints_named("capacity_v");
    assert_eq!(constraints.len(), 2, "one load bound per vehicle");
    for constraint in constraints {
        assert_eq!(constraint.op, CmpOp::Le);
        assert_eq!(constraint.rhs, 500.0);
        // One term per customer, weighted by demand.
        assert_eq!(constraint.terms.len(), 4);
        assert!(constraint.terms.iter().any(|(_, coef)| *coef == 200.0));
    }
}
