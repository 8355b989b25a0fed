//! Test fixtures for vrp-rules.
//!
//! Provides a small delivery problem (depot + four customers) with demand,
//! windows, and matrices, plus stub generative backends for exercising the
//! fallback chain without a live service.

#![allow(dead_code)]

use vrp_rules::context::{Customer, ProblemContext, Vehicle};
use vrp_rules::error::BackendError;
use vrp_rules::fallback::GenerativeBackend;
use vrp_rules::types::{ConstraintKind, ParsedConstraint, ParsingMethod};

/// Depot at node 0, customers at nodes 1-4.
pub fn sample_context(vehicle_count: usize) -> ProblemContext {
    let customers = vec![
        Customer {
            node: 1,
            label: "bakery".to_string(),
            demand: 100.0,
            time_window: Some((8 * 60, 17 * 60)),
        },
        Customer {
            node: 2,
            label: "grocer".to_string(),
            demand: 150.0,
            time_window: Some((9 * 60, 18 * 60)),
        },
        Customer {
            node: 3,
            label: "cafe".to_string(),
            demand: 200.0,
            time_window: None,
        },
        Customer {
            node: 4,
            label: "hotel".to_string(),
            demand: 120.0,
            time_window: Some((10 * 60, 20 * 60)),
        },
    ];

    let capacities = [500.0, 400.0, 600.0, 550.0];
    let vehicles = (0..vehicle_count)
        .map(|index| Vehicle {
            index,
            label: format!("truck-{index}"),
            capacity: capacities[index % capacities.len()],
        })
        .collect();

    let distance_matrix = vec![
        vec![0.0, 12.0, 18.0, 25.0, 30.0],
        vec![12.0, 0.0, 9.0, 20.0, 26.0],
        vec![18.0, 9.0, 0.0, 14.0, 22.0],
        vec![25.0, 20.0, 14.0, 0.0, 11.0],
        vec![30.0, 26.0, 22.0, 11.0, 0.0],
    ];
    let time_matrix = vec![
        vec![0.0, 15.0, 22.0, 31.0, 38.0],
        vec![15.0, 0.0, 12.0, 25.0, 33.0],
        vec![22.0, 12.0, 0.0, 18.0, 28.0],
        vec![31.0, 25.0, 18.0, 0.0, 14.0],
        vec![38.0, 33.0, 28.0, 14.0, 0.0],
    ];

    ProblemContext {
        customers,
        vehicles,
        distance_matrix,
        time_matrix,
        depot: 0,
    }
}

/// Backend that always answers with a canned completion.
pub struct StubBackend {
    pub response: String,
}

impl StubBackend {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

impl GenerativeBackend for StubBackend {
    fn complete(&self, _prompt: &str) -> Result<String, BackendError> {
        Ok(self.response.clone())
    }
}

/// Backend that is always down.
pub struct FailingBackend;

impl GenerativeBackend for FailingBackend {
    fn complete(&self, _prompt: &str) -> Result<String, BackendError> {
        Err(BackendError::Status(503))
    }
}

/// A constraint that already passed translation and validation, as the
/// pipeline would hand it to the applier.
pub fn accepted(kind: ConstraintKind, ctx: &ProblemContext) -> ParsedConstraint {
    let (mathematical_form, solver_format) = vrp_rules::translate::translate(&kind);
    let validation = vrp_rules::validate::validate(&kind, ctx);
    ParsedConstraint {
        entities: vrp_rules::translate::entities(&kind),
        complexity: vrp_rules::translate::complexity(&kind),
        mathematical_form,
        solver_format,
        confidence: 0.95,
        parsing_method: ParsingMethod::Pattern,
        requires_manual_review: false,
        validation: Some(validation),
        kind,
    }
}
