//! Per-constraint validation and cross-constraint conflict detection.
//!
//! Validation is table-driven by constraint kind: errors block acceptance,
//! warnings travel with the constraint. Conflict detection runs over the
//! whole accepted set and only reports — it never resolves or drops a
//! constraint on its own.

use std::collections::HashMap;

use serde::Serialize;

use crate::context::ProblemContext;
use crate::types::{ConstraintKind, ParsedConstraint, Validation};

/// Validate a single constraint against the problem context.
pub fn validate(kind: &ConstraintKind, ctx: &ProblemContext) -> Validation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match kind {
        ConstraintKind::Capacity { value, .. } => {
            if *value <= 0.0 {
                errors.push(format!("capacity must be positive, got {value}"));
            } else if let Some(nominal) = ctx.max_vehicle_capacity() {
                if *value > nominal {
                    warnings.push(format!(
                        "requested capacity {value} exceeds the largest nominal vehicle capacity {nominal}"
                    ));
                }
            }
        }
        ConstraintKind::Distance { value, .. } => {
            if *value <= 0.0 {
                errors.push(format!("distance bound must be positive, got {value}"));
            }
        }
        ConstraintKind::TimeWindow { customer, start, end } => {
            if start >= end {
                errors.push(format!(
                    "time window start {start} must be before end {end}"
                ));
            }
            if let Some(existing) = ctx.customer_by_node(*customer).and_then(|c| c.time_window) {
                if *start < existing.0 || *end > existing.1 {
                    warnings.push(format!(
                        "window [{start}, {end}] extends beyond customer's declared window [{}, {}]",
                        existing.0, existing.1
                    ));
                }
            }
        }
        ConstraintKind::WorkingHours { max_minutes } => {
            if *max_minutes <= 0 {
                errors.push(format!(
                    "working-hours bound must be positive, got {max_minutes} minutes"
                ));
            } else if *max_minutes > 24 * 60 {
                warnings.push(format!(
                    "working-hours bound of {max_minutes} minutes exceeds a full day"
                ));
            }
        }
        ConstraintKind::MinVehicles { count } => {
            if *count == 0 {
                errors.push("minimum vehicle count must be at least 1".to_string());
            } else if *count > ctx.vehicle_count() {
                errors.push(format!(
                    "minimum of {count} vehicles exceeds the fleet size {}",
                    ctx.vehicle_count()
                ));
            }
        }
        ConstraintKind::MaxVehicles { count } => {
            if *count == 0 {
                errors.push("maximum vehicle count must be at least 1".to_string());
            } else if *count > ctx.vehicle_count() {
                warnings.push(format!(
                    "maximum of {count} vehicles exceeds the fleet size {} and will never bind",
                    ctx.vehicle_count()
                ));
            }
        }
        ConstraintKind::VehicleForbidden { location, .. }
        | ConstraintKind::VehicleExclusive { location, .. } => {
            if *location == ctx.depot {
                warnings.push("restriction targets the depot node".to_string());
            }
        }
        ConstraintKind::SameVehicle { first, second }
        | ConstraintKind::SeparateVehicles { first, second } => {
            if first == second {
                errors.push(format!("both stops refer to the same node {first}"));
            }
        }
        ConstraintKind::Priority { .. } => {}
    }

    Validation {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictKind {
    ConflictingCapacities,
    OverlappingTimeWindows,
    ImpossibleVehicleRestriction,
    InvalidVehicleBounds,
}

/// A detected contradiction across the constraint set. Reported to the
/// caller; the set itself is left untouched.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub message: String,
    pub severity: Severity,
    /// Indices into the inspected constraint slice.
    pub affected: Vec<usize>,
}

/// Inspect a full constraint set for contradictions, independent of whether
/// the individual constraints validated.
pub fn detect_conflicts(constraints: &[ParsedConstraint]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    conflicting_capacities(constraints, &mut conflicts);
    overlapping_time_windows(constraints, &mut conflicts);
    impossible_vehicle_restrictions(constraints, &mut conflicts);
    invalid_vehicle_bounds(constraints, &mut conflicts);

    for conflict in &conflicts {
        tracing::warn!(
            kind = ?conflict.kind,
            severity = ?conflict.severity,
            message = conflict.message,
            "constraint conflict detected"
        );
    }
    conflicts
}

/// Two or more capacity constraints with different numeric values.
fn conflicting_capacities(constraints: &[ParsedConstraint], out: &mut Vec<Conflict>) {
    let capacities: Vec<(usize, f64)> = constraints
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match c.kind {
            ConstraintKind::Capacity { value, .. } => Some((i, value)),
            _ => None,
        })
        .collect();

    if capacities.len() < 2 {
        return;
    }
    let distinct = capacities
        .iter()
        .any(|(_, v)| (*v - capacities[0].1).abs() > f64::EPSILON);
    if distinct {
        let values: Vec<String> = capacities.iter().map(|(_, v)| v.to_string()).collect();
        out.push(Conflict {
            kind: ConflictKind::ConflictingCapacities,
            message: format!(
                "multiple capacity constraints with different values: {}",
                values.join(", ")
            ),
            severity: Severity::High,
            affected: capacities.into_iter().map(|(i, _)| i).collect(),
        });
    }
}

/// Two or more time windows naming the same customer.
fn overlapping_time_windows(constraints: &[ParsedConstraint], out: &mut Vec<Conflict>) {
    let mut by_customer: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, c) in constraints.iter().enumerate() {
        if let ConstraintKind::TimeWindow { customer, .. } = c.kind {
            by_customer.entry(customer).or_default().push(i);
        }
    }

    let mut customers: Vec<_> = by_customer.into_iter().collect();
    customers.sort_by_key(|(customer, _)| *customer);
    for (customer, indices) in customers {
        if indices.len() > 1 {
            out.push(Conflict {
                kind: ConflictKind::OverlappingTimeWindows,
                message: format!(
                    "{} time-window constraints target customer {customer}",
                    indices.len()
                ),
                severity: Severity::Medium,
                affected: indices,
            });
        }
    }
}

/// A location carrying both a "forbidden here" and an "exclusively here"
/// restriction — no assignment can satisfy the pair.
fn impossible_vehicle_restrictions(constraints: &[ParsedConstraint], out: &mut Vec<Conflict>) {
    for (i, a) in constraints.iter().enumerate() {
        let ConstraintKind::VehicleForbidden { vehicle: forbidden, location } = a.kind else {
            continue;
        };
        for (j, b) in constraints.iter().enumerate() {
            let ConstraintKind::VehicleExclusive { vehicle: exclusive, location: loc_b } = b.kind
            else {
                continue;
            };
            if location != loc_b {
                continue;
            }
            let message = if forbidden == exclusive {
                format!(
                    "vehicle {forbidden} is both forbidden from and exclusive to location {location}"
                )
            } else {
                format!(
                    "location {location} forbids vehicle {forbidden} while vehicle {exclusive} holds exclusivity"
                )
            };
            out.push(Conflict {
                kind: ConflictKind::ImpossibleVehicleRestriction,
                message,
                severity: Severity::High,
                affected: vec![i, j],
            });
        }
    }
}

/// A minimum-vehicle bound exceeding a maximum-vehicle bound.
fn invalid_vehicle_bounds(constraints: &[ParsedConstraint], out: &mut Vec<Conflict>) {
    let min = constraints.iter().enumerate().find_map(|(i, c)| match c.kind {
        ConstraintKind::MinVehicles { count } => Some((i, count)),
        _ => None,
    });
    let max = constraints.iter().enumerate().find_map(|(i, c)| match c.kind {
        ConstraintKind::MaxVehicles { count } => Some((i, count)),
        _ => None,
    });

    if let (Some((i, lo)), Some((j, hi))) = (min, max) {
        if lo > hi {
            out.push(Conflict {
                kind: ConflictKind::InvalidVehicleBounds,
                message: format!("minimum of {lo} vehicles exceeds maximum of {hi}"),
                severity: Severity::High,
                affected: vec![i, j],
            });
        }
    }
}
