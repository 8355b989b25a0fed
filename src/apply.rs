//! Constraint application against a live routing model.
//!
//! Constraints are applied strictly sequentially, in the fixed priority
//! order: capacity, distance, time-related, vehicle restriction, then soft
//! objectives. Later categories may reuse dimensions the earlier ones
//! created; the `DimensionRegistry` is the single check-then-create path for
//! those shared resources. Sequential application is a precondition of
//! `ModelApplier::apply_all` — the registry does no locking.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::ProblemContext;
use crate::error::ApplyError;
use crate::model::{CmpOp, Dimension, DimensionKind, RoutingModel, VarId};
use crate::translate::priority_penalty;
use crate::types::{ConstraintKind, ConstraintSet};

pub const CAPACITY_DIMENSION: &str = "Capacity";
pub const TIME_DIMENSION: &str = "Time";
pub const DISTANCE_DIMENSION: &str = "Distance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DimensionUse {
    Created,
    Reused,
}

/// Registry of dimensions already attached to the model, keyed by name.
///
/// A dimension of a given name is created at most once per model; any code
/// path that would register one twice is a programming error surfaced as
/// `ApplyError::DuplicateDimension`, because duplicate dimensions corrupt the
/// model's constraint and objective bookkeeping.
#[derive(Debug, Default)]
pub struct DimensionRegistry {
    created: BTreeMap<String, DimensionKind>,
}

impl DimensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.created.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.created.keys().map(String::as_str).collect()
    }

    /// Reuse the named dimension if present, otherwise build it from the
    /// per-edge transit function and attach it to the model.
    pub fn get_or_create(
        &mut self,
        model: &mut dyn RoutingModel,
        name: &str,
        kind: DimensionKind,
        transit: &dyn Fn(usize, usize) -> f64,
        capacity: f64,
    ) -> Result<DimensionUse, ApplyError> {
        if self.contains(name) {
            tracing::debug!(dimension = name, "reusing existing dimension");
            return Ok(DimensionUse::Reused);
        }

        let nodes = model.node_count();
        let matrix: Vec<Vec<f64>> = (0..nodes)
            .map(|from| (0..nodes).map(|to| transit(from, to)).collect())
            .collect();
        model.add_dimension(Dimension {
            name: name.to_string(),
            kind,
            transit: matrix,
            capacity,
        });
        self.register(name, kind)?;
        tracing::debug!(dimension = name, "created dimension");
        Ok(DimensionUse::Created)
    }

    fn register(&mut self, name: &str, kind: DimensionKind) -> Result<(), ApplyError> {
        if self.created.insert(name.to_string(), kind).is_some() {
            return Err(ApplyError::DuplicateDimension(name.to_string()));
        }
        Ok(())
    }
}

/// What applying one constraint added to the model.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedConstraint {
    /// Insertion index of the constraint in its set.
    pub index: usize,
    pub kind: &'static str,
    pub mathematical_constraints_added: Vec<String>,
    pub dimension: Option<(String, DimensionUse)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationReport {
    pub total: usize,
    pub applied: Vec<AppliedConstraint>,
    pub failed: Vec<(usize, String)>,
    pub warnings: Vec<String>,
}

impl ApplicationReport {
    pub fn applied_successfully(&self) -> usize {
        self.applied.len()
    }
}

pub struct ModelApplier<'a> {
    ctx: &'a ProblemContext,
    registry: DimensionRegistry,
    /// Big-M constant for conditional constraints, derived from the
    /// problem's own time horizon rather than a fixed literal: large enough
    /// to be non-binding when the visit indicator is 0, small enough to
    /// avoid numerical looseness.
    big_m: f64,
}

impl<'a> ModelApplier<'a> {
    pub fn new(ctx: &'a ProblemContext) -> Self {
        Self {
            ctx,
            registry: DimensionRegistry::new(),
            big_m: ctx.time_horizon(),
        }
    }

    pub fn registry(&self) -> &DimensionRegistry {
        &self.registry
    }

    pub fn big_m(&self) -> f64 {
        self.big_m
    }

    /// Apply an accepted constraint set to the model.
    ///
    /// Precondition: called from a single thread; constraints are applied
    /// one at a time in priority order. A failure to apply one constraint is
    /// recorded and does not abort its siblings. Constraints flagged for
    /// manual review or carrying validation errors are skipped with a
    /// warning, never applied silently.
    pub fn apply_all(
        &mut self,
        set: &ConstraintSet,
        model: &mut dyn RoutingModel,
    ) -> ApplicationReport {
        let mut report = ApplicationReport {
            total: set.len(),
            applied: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
        };

        for (index, constraint) in set.application_order() {
            if constraint.requires_manual_review {
                report.warnings.push(format!(
                    "constraint {index} ({}) requires manual review and was not applied",
                    constraint.kind.name()
                ));
                continue;
            }
            if !constraint.is_valid() {
                report.warnings.push(format!(
                    "constraint {index} ({}) failed validation and was not applied",
                    constraint.kind.name()
                ));
                continue;
            }

            match self.apply_one(index, &constraint.kind, model) {
                Ok(applied) => {
                    tracing::debug!(
                        index,
                        kind = applied.kind,
                        added = applied.mathematical_constraints_added.len(),
                        "constraint applied"
                    );
                    report.applied.push(applied);
                }
                Err(err) => {
                    tracing::warn!(index, error = %err, "constraint application failed");
                    report.failed.push((index, err.to_string()));
                }
            }
        }

        tracing::info!(
            total = report.total,
            applied = report.applied.len(),
            failed = report.failed.len(),
            "constraint set applied"
        );
        report
    }

    fn apply_one(
        &mut self,
        index: usize,
        kind: &ConstraintKind,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        match kind {
            ConstraintKind::Capacity { value, .. } => self.apply_capacity(index, *value, model),
            ConstraintKind::Distance { value, .. } => self.apply_distance(index, *value, model),
            ConstraintKind::TimeWindow { customer, start, end } => {
                self.apply_time_window(index, *customer, *start, *end, model)
            }
            ConstraintKind::WorkingHours { max_minutes } => {
                self.apply_working_hours(index, *max_minutes, model)
            }
            ConstraintKind::MinVehicles { count } => {
                self.apply_vehicle_bound(index, *count, CmpOp::Ge, "min_vehicles", model)
            }
            ConstraintKind::MaxVehicles { count } => {
                self.apply_vehicle_bound(index, *count, CmpOp::Le, "max_vehicles", model)
            }
            ConstraintKind::VehicleForbidden { vehicle, location } => {
                self.apply_forbidden(index, *vehicle, *location, model)
            }
            ConstraintKind::VehicleExclusive { vehicle, location } => {
                self.apply_exclusive(index, *vehicle, *location, model)
            }
            ConstraintKind::SameVehicle { first, second } => {
                self.apply_same_vehicle(index, *first, *second, model)
            }
            ConstraintKind::SeparateVehicles { first, second } => {
                self.apply_separate_vehicles(index, *first, *second, model)
            }
            ConstraintKind::Priority { customer, level } => {
                model.add_disjunction(*customer, priority_penalty(*level));
                Ok(AppliedConstraint {
                    index,
                    kind: "priority",
                    mathematical_constraints_added: vec![format!(
                        "disjunction_node_{customer}"
                    )],
                    dimension: None,
                })
            }
        }
    }

    fn apply_capacity(
        &mut self,
        index: usize,
        value: f64,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        let demands: Vec<f64> = (0..self.ctx.node_count())
            .map(|node| {
                self.ctx
                    .customer_by_node(node)
                    .map(|c| c.demand)
                    .unwrap_or(0.0)
            })
            .collect();
        let usage = self.registry.get_or_create(
            model,
            CAPACITY_DIMENSION,
            DimensionKind::Capacity,
            &|_, to| demands.get(to).copied().unwrap_or(0.0),
            value,
        )?;

        let mut added = Vec::new();
        for vehicle in 0..model.vehicle_count() {
            let mut terms: Vec<(VarId, f64)> = Vec::new();
            for customer in &self.ctx.customers {
                let var = model
                    .visit_var(customer.node, vehicle)
                    .ok_or(ApplyError::MissingVisitVar { node: customer.node, vehicle })?;
                terms.push((var, customer.demand));
            }
            let name = format!("capacity_v{vehicle}");
            model.add_linear(&name, terms, CmpOp::Le, value);
            added.push(name);
        }

        Ok(AppliedConstraint {
            index,
            kind: "capacity",
            mathematical_constraints_added: added,
            dimension: Some((CAPACITY_DIMENSION.to_string(), usage)),
        })
    }

    fn apply_distance(
        &mut self,
        index: usize,
        value: f64,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        let matrix = self.ctx.distance_matrix.clone();
        let usage = self.registry.get_or_create(
            model,
            DISTANCE_DIMENSION,
            DimensionKind::Distance,
            &|from, to| matrix[from][to],
            value,
        )?;

        let mut added = Vec::new();
        for vehicle in 0..model.vehicle_count() {
            let terms = self.edge_terms(model, vehicle, &matrix)?;
            let name = format!("distance_v{vehicle}");
            model.add_linear(&name, terms, CmpOp::Le, value);
            added.push(name);
        }

        Ok(AppliedConstraint {
            index,
            kind: "distance",
            mathematical_constraints_added: added,
            dimension: Some((DISTANCE_DIMENSION.to_string(), usage)),
        })
    }

    /// Conditional (Big-M) time window: binds only when the customer is
    /// actually visited by the vehicle in question.
    ///
    ///   lower - M*(1 - y) <= arrival <= upper + M*(1 - y)
    fn apply_time_window(
        &mut self,
        index: usize,
        customer: usize,
        start: i64,
        end: i64,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        let usage = self.ensure_time_dimension(model)?;
        let arrival = model.cumul_var(TIME_DIMENSION, customer);
        let m = self.big_m;

        let mut added = Vec::new();
        for vehicle in 0..model.vehicle_count() {
            let visited = model
                .visit_var(customer, vehicle)
                .ok_or(ApplyError::MissingVisitVar { node: customer, vehicle })?;

            // arrival - M*y >= start - M
            let name = format!("time_window_{customer}_v{vehicle}_lb");
            model.add_linear(
                &name,
                vec![(arrival, 1.0), (visited, -m)],
                CmpOp::Ge,
                start as f64 - m,
            );
            added.push(name);

            // arrival + M*y <= end + M
            let name = format!("time_window_{customer}_v{vehicle}_ub");
            model.add_linear(
                &name,
                vec![(arrival, 1.0), (visited, m)],
                CmpOp::Le,
                end as f64 + m,
            );
            added.push(name);
        }

        Ok(AppliedConstraint {
            index,
            kind: "time_window",
            mathematical_constraints_added: added,
            dimension: Some((TIME_DIMENSION.to_string(), usage)),
        })
    }

    /// Route-duration bound. Reuses the time dimension if a time-window
    /// constraint already created it, otherwise creates it here.
    fn apply_working_hours(
        &mut self,
        index: usize,
        max_minutes: i64,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        let usage = self.ensure_time_dimension(model)?;
        let matrix = self.ctx.time_matrix.clone();

        let mut added = Vec::new();
        for vehicle in 0..model.vehicle_count() {
            let terms = self.edge_terms(model, vehicle, &matrix)?;
            let name = format!("working_hours_v{vehicle}");
            model.add_linear(&name, terms, CmpOp::Le, max_minutes as f64);
            added.push(name);
        }

        Ok(AppliedConstraint {
            index,
            kind: "working_hours",
            mathematical_constraints_added: added,
            dimension: Some((TIME_DIMENSION.to_string(), usage)),
        })
    }

    fn apply_vehicle_bound(
        &mut self,
        index: usize,
        count: usize,
        op: CmpOp,
        kind: &'static str,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        let mut terms = Vec::new();
        for vehicle in 0..model.vehicle_count() {
            let var = model
                .vehicle_var(vehicle)
                .ok_or(ApplyError::MissingVehicleVar(vehicle))?;
            terms.push((var, 1.0));
        }
        model.add_linear(kind, terms, op, count as f64);

        Ok(AppliedConstraint {
            index,
            kind,
            mathematical_constraints_added: vec![kind.to_string()],
            dimension: None,
        })
    }

    /// Zero every edge-use variable touching the location for the vehicle.
    fn apply_forbidden(
        &mut self,
        index: usize,
        vehicle: usize,
        location: usize,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        let terms = self.location_edge_terms(model, vehicle, location)?;
        let name = format!("forbid_v{vehicle}_at_{location}");
        model.add_linear(&name, terms, CmpOp::Eq, 0.0);

        Ok(AppliedConstraint {
            index,
            kind: "vehicle_forbidden",
            mathematical_constraints_added: vec![name],
            dimension: None,
        })
    }

    /// Zero the location's edges for every vehicle except the exclusive one.
    fn apply_exclusive(
        &mut self,
        index: usize,
        vehicle: usize,
        location: usize,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        let mut added = Vec::new();
        for other in 0..model.vehicle_count() {
            if other == vehicle {
                continue;
            }
            let terms = self.location_edge_terms(model, other, location)?;
            let name = format!("exclusive_{location}_blocks_v{other}");
            model.add_linear(&name, terms, CmpOp::Eq, 0.0);
            added.push(name);
        }

        Ok(AppliedConstraint {
            index,
            kind: "vehicle_exclusive",
            mathematical_constraints_added: added,
            dimension: None,
        })
    }

    /// "Must share a vehicle" is not a single linear inequality. Per
    /// vehicle, an auxiliary binary z_v couples the two visit indicators:
    /// forcing constraints keep z_v at 0 unless both stops are served by v,
    /// trigger constraints push z_v to 1 as soon as either is. Together they
    /// pin y_first,v = y_second,v; the final at-most-one constraint lets only
    /// a single vehicle hold the pair.
    fn apply_same_vehicle(
        &mut self,
        index: usize,
        first: usize,
        second: usize,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        let mut added = Vec::new();
        let mut pair_vars = Vec::new();

        for vehicle in 0..model.vehicle_count() {
            let y_first = model
                .visit_var(first, vehicle)
                .ok_or(ApplyError::MissingVisitVar { node: first, vehicle })?;
            let y_second = model
                .visit_var(second, vehicle)
                .ok_or(ApplyError::MissingVisitVar { node: second, vehicle })?;
            let z = model.add_binary(&format!("pair_{first}_{second}_v{vehicle}"));
            pair_vars.push(z);

            // Forcing: z <= y_first, z <= y_second.
            let name = format!("same_vehicle_{first}_{second}_v{vehicle}_force_first");
            model.add_linear(&name, vec![(z, 1.0), (y_first, -1.0)], CmpOp::Le, 0.0);
            added.push(name);
            let name = format!("same_vehicle_{first}_{second}_v{vehicle}_force_second");
            model.add_linear(&name, vec![(z, 1.0), (y_second, -1.0)], CmpOp::Le, 0.0);
            added.push(name);

            // Trigger: z >= y_first, z >= y_second.
            let name = format!("same_vehicle_{first}_{second}_v{vehicle}_trigger_first");
            model.add_linear(&name, vec![(z, 1.0), (y_first, -1.0)], CmpOp::Ge, 0.0);
            added.push(name);
            let name = format!("same_vehicle_{first}_{second}_v{vehicle}_trigger_second");
            model.add_linear(&name, vec![(z, 1.0), (y_second, -1.0)], CmpOp::Ge, 0.0);
            added.push(name);
        }

        let name = format!("same_vehicle_{first}_{second}_at_most_one");
        let terms = pair_vars.into_iter().map(|z| (z, 1.0)).collect();
        model.add_linear(&name, terms, CmpOp::Le, 1.0);
        added.push(name);

        Ok(AppliedConstraint {
            index,
            kind: "same_vehicle",
            mathematical_constraints_added: added,
            dimension: None,
        })
    }

    /// One constraint per vehicle: the two visit indicators sum to at most 1.
    fn apply_separate_vehicles(
        &mut self,
        index: usize,
        first: usize,
        second: usize,
        model: &mut dyn RoutingModel,
    ) -> Result<AppliedConstraint, ApplyError> {
        let mut added = Vec::new();
        for vehicle in 0..model.vehicle_count() {
            let y_first = model
                .visit_var(first, vehicle)
                .ok_or(ApplyError::MissingVisitVar { node: first, vehicle })?;
            let y_second = model
                .visit_var(second, vehicle)
                .ok_or(ApplyError::MissingVisitVar { node: second, vehicle })?;
            let name = format!("separate_{first}_{second}_v{vehicle}");
            model.add_linear(&name, vec![(y_first, 1.0), (y_second, 1.0)], CmpOp::Le, 1.0);
            added.push(name);
        }

        Ok(AppliedConstraint {
            index,
            kind: "separate_vehicles",
            mathematical_constraints_added: added,
            dimension: None,
        })
    }

    fn ensure_time_dimension(
        &mut self,
        model: &mut dyn RoutingModel,
    ) -> Result<DimensionUse, ApplyError> {
        let matrix = self.ctx.time_matrix.clone();
        let horizon = self.big_m;
        self.registry.get_or_create(
            model,
            TIME_DIMENSION,
            DimensionKind::Time,
            &|from, to| matrix[from][to],
            horizon,
        )
    }

    /// Per-edge coefficient terms over every arc for one vehicle.
    fn edge_terms(
        &self,
        model: &dyn RoutingModel,
        vehicle: usize,
        weights: &[Vec<f64>],
    ) -> Result<Vec<(VarId, f64)>, ApplyError> {
        let mut terms = Vec::new();
        for from in 0..model.node_count() {
            for to in 0..model.node_count() {
                if from == to {
                    continue;
                }
                let var = model
                    .edge_var(from, to, vehicle)
                    .ok_or(ApplyError::MissingEdgeVar { from, to, vehicle })?;
                terms.push((var, weights[from][to]));
            }
        }
        Ok(terms)
    }

    /// All edge variables touching one location for one vehicle, in either
    /// direction, with unit coefficients.
    fn location_edge_terms(
        &self,
        model: &dyn RoutingModel,
        vehicle: usize,
        location: usize,
    ) -> Result<Vec<(VarId, f64)>, ApplyError> {
        let mut terms = Vec::new();
        for other in 0..model.node_count() {
            if other == location {
                continue;
            }
            let outbound = model
                .edge_var(location, other, vehicle)
                .ok_or(ApplyError::MissingEdgeVar { from: location, to: other, vehicle })?;
            let inbound = model
                .edge_var(other, location, vehicle)
                .ok_or(ApplyError::MissingEdgeVar { from: other, to: location, vehicle })?;
            terms.push((outbound, 1.0));
            terms.push((inbound, 1.0));
        }
        Ok(terms)
    }
}
