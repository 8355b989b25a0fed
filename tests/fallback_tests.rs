//! Fallback chain tests
//!
//! The generative path with a stubbed backend, and every way it degrades to
//! the local heuristics: dead service, malformed response, unknown
//! constraint type. Remote failures must never escape the pipeline.

mod fixtures;

use fixtures::{sample_context, FailingBackend, StubBackend};
use vrp_rules::pipeline::ConstraintPipeline;
use vrp_rules::types::{ConstraintKind, ParsingMethod};

fn with_stub(response: &str) -> ConstraintPipeline {
    ConstraintPipeline::with_backend(0.85, Some(Box::new(StubBackend::new(response))))
}

// ============================================================================
// Generative path
// ============================================================================

#[test]
fn test_generative_response_with_code_fence() {
    let ctx = sample_context(3);
    let pipeline = with_stub(
        "```json\n\
         {\n\
           \"constraint_type\": \"vehicle_forbidden\",\n\
           \"parameters\": { \"vehicle\": \"1\", \"location\": \"cafe\" },\n\
           \"mathematical_description\": \"x_3j,1 = 0\",\n\
           \"confidence\": 0.9\n\
         }\n\
         ```",
    );

    let result = pipeline.parse("keep truck 1 away from the cafe", &ctx);
    assert!(result.success, "generative parse should succeed: {:?}", result.errors);
    let constraint = result.constraint.expect("constraint present");
    assert_eq!(constraint.parsing_method, ParsingMethod::Generative);
    assert_eq!(
        constraint.kind,
        ConstraintKind::VehicleForbidden { vehicle: 1, location: 3 },
        "the cafe label resolves to its node"
    );
    assert_eq!(constraint.confidence, 0.9);
    assert!(!constraint.requires_manual_review, "generative output is not review-flagged");
    assert_eq!(
        constraint.mathematical_form, "x_3j,1 = 0",
        "the service's own symbolic form is kept"
    );
}

#[test]
fn test_generative_numeric_parameters_and_default_confidence() {
    let ctx = sample_context(3);
    // Bare JSON, numeric value, no confidence field.
    let pipeline = with_stub(
        "{ \"constraint_type\": \"capacity\", \"parameters\": { \"value\": 450, \"unit\": \"kg\" } }",
    );

    let result = pipeline.parse("try to keep the vans light, 450 or so", &ctx);
    assert!(result.success, "{:?}", result.errors);
    let constraint = result.constraint.expect("constraint present");
    assert!(matches!(
        constraint.kind,
        ConstraintKind::Capacity { value, .. } if value == 450.0
    ));
    assert_eq!(constraint.confidence, 0.7, "missing confidence takes the default");
}

#[test]
fn test_generative_entities_resolve_labels() {
    let ctx = sample_context(3);
    let pipeline = with_stub(
        "{\n\
           \"constraint_type\": \"time_window\",\n\
           \"parameters\": { \"start\": \"9am\", \"end\": \"11am\" },\n\
           \"entities\": { \"customer\": \"grocer\" },\n\
           \"confidence\": 0.8\n\
         }",
    );

    let result = pipeline.parse("the grocer prefers a morning slot, say nine to eleven", &ctx);
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(
        result.constraint.expect("constraint present").kind,
        ConstraintKind::TimeWindow { customer: 2, start: 540, end: 660 }
    );
}

// ============================================================================
// Degradation to heuristics
// ============================================================================

#[test]
fn test_dead_service_degrades_to_heuristics() {
    let ctx = sample_context(3);
    let pipeline = ConstraintPipeline::with_backend(0.85, Some(Box::new(FailingBackend)));

    let result = pipeline.parse("somewhere around 120 km tops for the day", &ctx);
    assert!(result.success, "the 503 must not propagate: {:?}", result.errors);
    let constraint = result.constraint.expect("constraint present");
    assert_eq!(constraint.parsing_method, ParsingMethod::Fallback);
    assert!(constraint.requires_manual_review);
    assert_eq!(constraint.confidence, 0.4);
    assert!(matches!(
        constraint.kind,
        ConstraintKind::Distance { value, .. } if value == 120.0
    ));
    assert!(
        result.warnings.iter().any(|w| w.contains("review")),
        "degraded output warns the caller: {:?}",
        result.warnings
    );
}

#[test]
fn test_malformed_response_degrades_to_heuristics() {
    let ctx = sample_context(3);
    let pipeline = with_stub("this is not json, sorry");

    let result = pipeline.parse("500 kg give or take", &ctx);
    assert!(result.success, "{:?}", result.errors);
    let constraint = result.constraint.expect("constraint present");
    assert_eq!(constraint.parsing_method, ParsingMethod::Fallback);
    assert!(constraint.requires_manual_review);
    assert!(matches!(
        constraint.kind,
        ConstraintKind::Capacity { value, .. } if value == 500.0
    ));
}

#[test]
fn test_unknown_constraint_type_degrades_to_heuristics() {
    let ctx = sample_context(3);
    // Valid JSON, but a type outside the schema's closed list.
    let pipeline = with_stub(
        "{ \"constraint_type\": \"zone_restriction\", \"parameters\": { \"zone\": \"north\" } }",
    );

    let result = pipeline.parse("at the very least 2 vans should go out", &ctx);
    assert!(result.success, "{:?}", result.errors);
    let constraint = result.constraint.expect("constraint present");
    assert_eq!(constraint.parsing_method, ParsingMethod::Fallback);
    assert_eq!(constraint.kind, ConstraintKind::MinVehicles { count: 2 });
}

#[test]
fn test_heuristics_exhausted_fails_cleanly() {
    let ctx = sample_context(3);
    let pipeline = with_stub("still not json");

    let result = pipeline.parse("make it nice", &ctx);
    assert!(!result.success);
    assert!(result.constraint.is_none());
    assert!(!result.errors.is_empty(), "the failure names the unparseable prompt");
}

// ============================================================================
// Batch provenance
// ============================================================================

#[test]
fn test_batch_counts_methods_separately() {
    let ctx = sample_context(3);
    let pipeline = with_stub(
        "{ \"constraint_type\": \"max_vehicles\", \"parameters\": { \"count\": \"2\" } }",
    );

    let batch = pipeline.parse_batch(
        &[
            "each vehicle can carry at most 500 kg",
            "let's not send the whole fleet, two is plenty",
        ],
        &ctx,
    );

    assert_eq!(batch.successful.len(), 2);
    assert_eq!(batch.summary.parsed_by_pattern, 1);
    assert_eq!(batch.summary.parsed_by_generative, 1);
    assert_eq!(batch.summary.parsed_by_fallback, 0);
}
