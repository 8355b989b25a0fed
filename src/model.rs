//! The model-application boundary.
//!
//! `RoutingModel` is what the applier needs from a live optimization model:
//! decision-variable lookup, named linear constraints, cumulative dimensions,
//! and penalized disjunctions. The solver behind it is a black box.
//! `ModelBuilder` is the in-memory implementation: it captures every emitted
//! artifact so callers (and tests) can inspect exactly what a constraint
//! added before handing the model to a solver backend.

use std::collections::HashMap;

pub type VarId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarKind {
    /// Binary: vehicle drives the arc (from, to).
    EdgeUse { from: usize, to: usize, vehicle: usize },
    /// Binary: vehicle serves the node.
    VisitUse { node: usize, vehicle: usize },
    /// Binary: vehicle leaves the depot at all.
    VehicleUse { vehicle: usize },
    /// Continuous cumulative value at a node (arrival time, load, ...).
    Cumulative { dimension: String, node: usize },
    /// Auxiliary binary created during linearization.
    Auxiliary { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Le,
    Ge,
    Eq,
}

/// A registered linear constraint: sum(coef * var) op rhs.
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub op: CmpOp,
    pub rhs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionKind {
    Capacity,
    Time,
    Distance,
}

/// A cumulative dimension: per-edge transit values accumulated along each
/// vehicle's route, bounded per vehicle.
#[derive(Debug, Clone)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
    pub transit: Vec<Vec<f64>>,
    pub capacity: f64,
}

/// Everything the applier may do to a live model.
pub trait RoutingModel {
    fn node_count(&self) -> usize;
    fn vehicle_count(&self) -> usize;

    fn edge_var(&self, from: usize, to: usize, vehicle: usize) -> Option<VarId>;
    fn visit_var(&self, node: usize, vehicle: usize) -> Option<VarId>;
    fn vehicle_var(&self, vehicle: usize) -> Option<VarId>;

    /// Cumulative variable of a dimension at a node, created on first use.
    fn cumul_var(&mut self, dimension: &str, node: usize) -> VarId;

    /// New auxiliary binary variable.
    fn add_binary(&mut self, name: &str) -> VarId;

    /// Register a named linear constraint.
    fn add_linear(&mut self, name: &str, terms: Vec<(VarId, f64)>, op: CmpOp, rhs: f64);

    /// Attach a cumulative dimension. Callers must go through the applier's
    /// registry; the model itself does not deduplicate.
    fn add_dimension(&mut self, dimension: Dimension);

    /// Allow skipping a node at a fixed objective penalty.
    fn add_disjunction(&mut self, node: usize, penalty: f64);
}

/// In-memory model capturing emitted artifacts.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    nodes: usize,
    vehicles: usize,
    pub variables: Vec<VarKind>,
    pub constraints: Vec<LinearConstraint>,
    pub dimensions: Vec<Dimension>,
    pub disjunctions: Vec<(usize, f64)>,
    edge_index: HashMap<(usize, usize, usize), VarId>,
    visit_index: HashMap<(usize, usize), VarId>,
    vehicle_index: HashMap<usize, VarId>,
    cumul_index: HashMap<(String, usize), VarId>,
}

impl ModelBuilder {
    /// Pre-creates edge-use, visit, and vehicle-use variables for every
    /// (node, vehicle) combination, mirroring a routing model's decision
    /// variable grid.
    pub fn new(nodes: usize, vehicles: usize) -> Self {
        let mut model = Self {
            nodes,
            vehicles,
            ..Self::default()
        };
        for vehicle in 0..vehicles {
            for from in 0..nodes {
                for to in 0..nodes {
                    if from == to {
                        continue;
                    }
                    let id = model.push_var(VarKind::EdgeUse { from, to, vehicle });
                    model.edge_index.insert((from, to, vehicle), id);
                }
            }
            for node in 0..nodes {
                let id = model.push_var(VarKind::VisitUse { node, vehicle });
                model.visit_index.insert((node, vehicle), id);
            }
            let id = model.push_var(VarKind::VehicleUse { vehicle });
            model.vehicle_index.insert(vehicle, id);
        }
        model
    }

    fn push_var(&mut self, kind: VarKind) -> VarId {
        let id = self.variables.len();
        self.variables.push(kind);
        id
    }

    pub fn constraints_named(&self, prefix: &str) -> Vec<&LinearConstraint> {
        self.constraints
            .iter()
            .filter(|c| c.name.starts_with(prefix))
            .collect()
    }

    pub fn auxiliary_count(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| matches!(v, VarKind::Auxiliary { .. }))
            .count()
    }

    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }
}

impl RoutingModel for ModelBuilder {
    fn node_count(&self) -> usize {
        self.nodes
    }

    fn vehicle_count(&self) -> usize {
        self.vehicles
    }

    fn edge_var(&self, from: usize, to: usize, vehicle: usize) -> Option<VarId> {
        self.edge_index.get(&(from, to, vehicle)).copied()
    }

    fn visit_var(&self, node: usize, vehicle: usize) -> Option<VarId> {
        self.visit_index.get(&(node, vehicle)).copied()
    }

    fn vehicle_var(&self, vehicle: usize) -> Option<VarId> {
        self.vehicle_index.get(&vehicle).copied()
    }

    fn cumul_var(&mut self, dimension: &str, node: usize) -> VarId {
        let key = (dimension.to_string(), node);
        if let Some(id) = self.cumul_index.get(&key) {
            return *id;
        }
        let id = self.push_var(VarKind::Cumulative {
            dimension: dimension.to_string(),
            node,
        });
        self.cumul_index.insert(key, id);
        id
    }

    fn add_binary(&mut self, name: &str) -> VarId {
        self.push_var(VarKind::Auxiliary {
            name: name.to_string(),
        })
    }

    fn add_linear(&mut self, name: &str, terms: Vec<(VarId, f64)>, op: CmpOp, rhs: f64) {
        self.constraints.push(LinearConstraint {
            name: name.to_string(),
            terms,
            op,
            rhs,
        });
    }

    fn add_dimension(&mut self, dimension: Dimension) {
        self.dimensions.push(dimension);
    }

    fn add_disjunction(&mut self, node: usize, penalty: f64) {
        self.disjunctions.push((node, penalty));
    }
}
