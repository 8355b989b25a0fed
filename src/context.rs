//! Problem context snapshot and entity resolution.
//!
//! The context is owned by the caller; the pipeline only reads it. Nodes are
//! indexed into the distance/time matrices, with the depot at
//! `ProblemContext::depot` and customers occupying the remaining indices.

use serde::Serialize;

use crate::error::EntityError;

/// A customer stop: a node index plus demand and service window.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    /// Node index in the distance/time matrices.
    pub node: usize,
    /// Human-readable label ("customer A", "warehouse 3", ...).
    pub label: String,
    pub demand: f64,
    /// Service window in minutes from midnight.
    pub time_window: Option<(i64, i64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Vehicle {
    pub index: usize,
    pub label: String,
    pub capacity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProblemContext {
    pub customers: Vec<Customer>,
    pub vehicles: Vec<Vehicle>,
    /// Square matrix over nodes, in distance units (km unless stated).
    pub distance_matrix: Vec<Vec<f64>>,
    /// Square matrix over nodes, in minutes.
    pub time_matrix: Vec<Vec<f64>>,
    pub depot: usize,
}

impl ProblemContext {
    pub fn node_count(&self) -> usize {
        self.distance_matrix.len()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Largest per-vehicle nominal capacity, if any vehicles exist.
    pub fn max_vehicle_capacity(&self) -> Option<f64> {
        self.vehicles
            .iter()
            .map(|v| v.capacity)
            .fold(None, |best, c| match best {
                Some(b) if b >= c => Some(b),
                _ => Some(c),
            })
    }

    /// Planning horizon in minutes: the latest window end across customers
    /// plus the worst-case single leg. Used to derive Big-M constants.
    pub fn time_horizon(&self) -> f64 {
        let latest_window = self
            .customers
            .iter()
            .filter_map(|c| c.time_window)
            .map(|(_, end)| end as f64)
            .fold(0.0_f64, f64::max);

        let worst_leg = self
            .time_matrix
            .iter()
            .flatten()
            .copied()
            .fold(0.0_f64, f64::max);

        (latest_window + worst_leg).max(1.0)
    }

    pub fn customer_by_node(&self, node: usize) -> Option<&Customer> {
        self.customers.iter().find(|c| c.node == node)
    }

    /// Resolve a customer/node label to a node index.
    ///
    /// Accepts either a bare number (taken as a node index into the matrices)
    /// or a label matching a customer case-insensitively.
    pub fn resolve_node(&self, label: &str) -> Result<usize, EntityError> {
        let trimmed = label.trim();
        if let Ok(index) = trimmed.parse::<usize>() {
            if index < self.node_count() {
                return Ok(index);
            }
            return Err(EntityError::NodeOutOfRange {
                index,
                node_count: self.node_count(),
            });
        }

        self.customers
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(trimmed))
            .map(|c| c.node)
            .ok_or_else(|| EntityError::CustomerNotFound {
                label: trimmed.to_string(),
            })
    }

    /// Resolve a vehicle label to a fleet index.
    pub fn resolve_vehicle(&self, label: &str) -> Result<usize, EntityError> {
        let trimmed = label.trim();
        if let Ok(index) = trimmed.parse::<usize>() {
            if index < self.vehicle_count() {
                return Ok(index);
            }
            return Err(EntityError::VehicleOutOfRange {
                index,
                vehicle_count: self.vehicle_count(),
            });
        }

        self.vehicles
            .iter()
            .find(|v| v.label.eq_ignore_ascii_case(trimmed))
            .map(|v| v.index)
            .ok_or_else(|| EntityError::VehicleNotFound {
                label: trimmed.to_string(),
            })
    }

    /// Compact JSON used to ground the generative prompt. Matrices are
    /// summarized rather than inlined; the service needs entity names and
    /// sizes, not the full geometry.
    pub fn grounding_json(&self) -> serde_json::Value {
        serde_json::json!({
            "customers": self.customers.iter().map(|c| {
                serde_json::json!({
                    "node": c.node,
                    "label": c.label,
                    "demand": c.demand,
                    "time_window": c.time_window,
                })
            }).collect::<Vec<_>>(),
            "vehicles": self.vehicles.iter().map(|v| {
                serde_json::json!({ "index": v.index, "label": v.label, "capacity": v.capacity })
            }).collect::<Vec<_>>(),
            "depot": self.depot,
            "node_count": self.node_count(),
        })
    }
}
