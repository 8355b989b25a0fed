//! Conflict detector tests
//!
//! Cross-constraint contradictions over whole batches: conflicting
//! capacities, duplicate time windows, impossible vehicle restrictions, and
//! inverted vehicle bounds.

mod fixtures;

use fixtures::sample_context;
use vrp_rules::pipeline::{ConstraintPipeline, PipelineConfig};
use vrp_rules::validate::{ConflictKind, Severity};

fn pipeline() -> ConstraintPipeline {
    ConstraintPipeline::new(PipelineConfig::default())
}

#[test]
fn test_conflicting_capacities_reported_once() {
    let ctx = sample_context(3);
    let batch = pipeline().parse_batch(
        &[
            "each vehicle can carry at most 500 kg",
            "vehicle capacity must not exceed 300 kg",
        ],
        &ctx,
    );

    assert_eq!(batch.successful.len(), 2, "both constraints parse individually");
    let capacity_conflicts: Vec<_> = batch
        .conflicts
        .iter()
        .filter(|c| c.kind == ConflictKind::ConflictingCapacities)
        .collect();
    assert_eq!(capacity_conflicts.len(), 1, "exactly one capacity conflict record");
    let conflict = capacity_conflicts[0];
    assert_eq!(conflict.severity, Severity::High);
    assert_eq!(conflict.affected.len(), 2, "both constraints are implicated");
}

#[test]
fn test_equal_capacities_do_not_conflict() {
    let ctx = sample_context(3);
    let batch = pipeline().parse_batch(
        &[
            "each vehicle can carry at most 500 kg",
            "vehicle capacity must not exceed 500 kg",
        ],
        &ctx,
    );
    assert!(
        batch.conflicts.is_empty(),
        "same numeric value twice is redundant, not contradictory"
    );
}

#[test]
fn test_duplicate_time_windows_flagged_medium() {
    let ctx = sample_context(3);
    let batch = pipeline().parse_batch(
        &[
            "customer 2 must be served between 9am and 11am",
            "deliver to customer 2 between 14:00 and 16:00",
        ],
        &ctx,
    );

    assert_eq!(batch.successful.len(), 2);
    let window_conflicts: Vec<_> = batch
        .conflicts
        .iter()
        .filter(|c| c.kind == ConflictKind::OverlappingTimeWindows)
        .collect();
    assert_eq!(window_conflicts.len(), 1);
    assert_eq!(window_conflicts[0].severity, Severity::Medium);
    assert!(window_conflicts[0].message.contains("customer 2"));
}

#[test]
fn test_forbidden_plus_exclusive_is_impossible() {
    let ctx = sample_context(3);
    let batch = pipeline().parse_batch(
        &[
            "vehicle 0 cannot visit node 3",
            "only vehicle 1 can serve node 3",
        ],
        &ctx,
    );

    assert_eq!(batch.successful.len(), 2);
    let impossible: Vec<_> = batch
        .conflicts
        .iter()
        .filter(|c| c.kind == ConflictKind::ImpossibleVehicleRestriction)
        .collect();
    assert_eq!(impossible.len(), 1);
    assert_eq!(impossible[0].severity, Severity::High);
    assert_eq!(impossible[0].affected.len(), 2);
}

#[test]
fn test_min_above_max_vehicle_bound() {
    let ctx = sample_context(3);
    let batch = pipeline().parse_batch(
        &["use at least 3 vehicles", "use at most 2 vehicles"],
        &ctx,
    );

    assert_eq!(batch.successful.len(), 2, "each bound is valid on its own");
    let invalid: Vec<_> = batch
        .conflicts
        .iter()
        .filter(|c| c.kind == ConflictKind::InvalidVehicleBounds)
        .collect();
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].severity, Severity::High);
}

#[test]
fn test_compatible_set_has_no_conflicts() {
    let ctx = sample_context(3);
    let batch = pipeline().parse_batch(
        &[
            "each vehicle can carry at most 500 kg",
            "customer 2 must be served between 9am and 11am",
            "node 1 and node 4 should not be served together",
            "use at most 3 vehicles",
        ],
        &ctx,
    );

    assert_eq!(batch.successful.len(), 4);
    assert!(batch.conflicts.is_empty(), "conflicts: {:?}", batch.conflicts);
    assert_eq!(batch.summary.conflict_count, 0);
}

#[test]
fn test_conflicts_do_not_drop_constraints() {
    let ctx = sample_context(3);
    let batch = pipeline().parse_batch(
        &[
            "each vehicle can carry at most 500 kg",
            "vehicle capacity must not exceed 300 kg",
        ],
        &ctx,
    );

    // Detection only reports; the set itself stays intact for the caller to
    // resolve.
    assert_eq!(batch.successful.len(), 2);
    assert_eq!(batch.summary.conflict_count, 1);
}
