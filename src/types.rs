//! Core constraint records shared across the pipeline.
//!
//! `ConstraintKind` is a closed sum type: every supported constraint carries
//! its own required fields, so a constraint that parsed cannot later fail on
//! a missing parameter. The applier dispatches on it exhaustively.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapacityUnit {
    Kilograms,
    Tons,
    Units,
}

impl CapacityUnit {
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "t" | "ton" | "tons" | "tonne" | "tonnes" => CapacityUnit::Tons,
            "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => CapacityUnit::Kilograms,
            _ => CapacityUnit::Units,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DistanceUnit {
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "mi" | "mile" | "miles" => DistanceUnit::Miles,
            _ => DistanceUnit::Kilometers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
}

/// Every constraint the pipeline can produce.
///
/// Entity fields are already resolved to node/fleet indices; resolution
/// failures are rejected before a `ConstraintKind` exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConstraintKind {
    /// Per-vehicle load bound.
    Capacity { value: f64, unit: CapacityUnit },
    /// Per-vehicle route length bound.
    Distance { value: f64, unit: DistanceUnit },
    /// Customer must be served within [start, end] (minutes from midnight).
    TimeWindow { customer: usize, start: i64, end: i64 },
    /// Per-vehicle route duration bound, in minutes.
    WorkingHours { max_minutes: i64 },
    MinVehicles { count: usize },
    MaxVehicles { count: usize },
    /// The vehicle may not serve the location.
    VehicleForbidden { vehicle: usize, location: usize },
    /// Only this vehicle may serve the location.
    VehicleExclusive { vehicle: usize, location: usize },
    /// Both stops must be served by one vehicle.
    SameVehicle { first: usize, second: usize },
    /// The stops must never share a vehicle.
    SeparateVehicles { first: usize, second: usize },
    /// Soft preference: serving the customer is strongly preferred but
    /// skippable at a penalty.
    Priority { customer: usize, level: PriorityLevel },
}

impl ConstraintKind {
    /// Fixed application priority: capacity, then distance, then
    /// time-related, then vehicle restrictions, then soft objectives.
    /// Later categories may reuse dimensions the earlier ones create.
    pub fn priority_rank(&self) -> u8 {
        match self {
            ConstraintKind::Capacity { .. } => 0,
            ConstraintKind::Distance { .. } => 1,
            ConstraintKind::TimeWindow { .. } | ConstraintKind::WorkingHours { .. } => 2,
            ConstraintKind::MinVehicles { .. }
            | ConstraintKind::MaxVehicles { .. }
            | ConstraintKind::VehicleForbidden { .. }
            | ConstraintKind::VehicleExclusive { .. }
            | ConstraintKind::SameVehicle { .. }
            | ConstraintKind::SeparateVehicles { .. } => 3,
            ConstraintKind::Priority { .. } => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Capacity { .. } => "capacity",
            ConstraintKind::Distance { .. } => "distance",
            ConstraintKind::TimeWindow { .. } => "time_window",
            ConstraintKind::WorkingHours { .. } => "working_hours",
            ConstraintKind::MinVehicles { .. } => "min_vehicles",
            ConstraintKind::MaxVehicles { .. } => "max_vehicles",
            ConstraintKind::VehicleForbidden { .. } => "vehicle_forbidden",
            ConstraintKind::VehicleExclusive { .. } => "vehicle_exclusive",
            ConstraintKind::SameVehicle { .. } => "same_vehicle",
            ConstraintKind::SeparateVehicles { .. } => "separate_vehicles",
            ConstraintKind::Priority { .. } => "priority",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityType {
    Customer,
    Vehicle,
    Location,
}

/// A resolved reference to a problem entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Le,
    Ge,
    Eq,
    /// Two-sided bound; `lower` holds the second side.
    Range,
}

/// Which family of solver mechanics a canonical constraint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintFamily {
    Capacity,
    Distance,
    TimeWindow,
    RouteDuration,
    VehicleCount,
    VehicleAccess,
    Grouping,
    Objective,
}

/// Symbolic reference to the decision variables a constraint ranges over.
///
/// This is the contract boundary with the applier: no live model handles,
/// only names the applier can look up against any backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VariableRef {
    /// Per-vehicle accumulated demand.
    VehicleLoad,
    /// Per-vehicle accumulated distance.
    VehicleDistance,
    /// Per-vehicle accumulated route time.
    RouteTime,
    /// Arrival-time variable at a customer node.
    Arrival { customer: usize },
    /// Count of vehicles leaving the depot.
    VehiclesUsed,
    /// All edge-use variables touching a location for a vehicle.
    EdgesAt { location: usize, vehicle: usize },
    /// Visit indicators of a node pair, per vehicle.
    VisitPair { first: usize, second: usize },
    /// Visit indicator of a single node.
    Visit { customer: usize },
}

/// Canonical, solver-agnostic form of a constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverFormat {
    pub family: ConstraintFamily,
    pub operator: Operator,
    /// The stated numeric value, unconverted except hours -> minutes.
    pub rhs: f64,
    /// Lower side of a `Range` operator.
    pub lower: Option<f64>,
    pub variables: VariableRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParsingMethod {
    Pattern,
    Generative,
    Fallback,
}

impl ParsingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ParsingMethod::Pattern => "pattern",
            ParsingMethod::Generative => "generative",
            ParsingMethod::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComplexityLevel {
    Simple,
    Medium,
    Complex,
}

/// Outcome of per-constraint validation. Errors block acceptance;
/// warnings travel with the constraint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// A fully interpreted constraint, ready for validation and application.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedConstraint {
    pub kind: ConstraintKind,
    pub entities: Vec<EntityRef>,
    /// Human/debug-readable symbolic form.
    pub mathematical_form: String,
    pub solver_format: SolverFormat,
    pub confidence: f64,
    pub parsing_method: ParsingMethod,
    pub complexity: ComplexityLevel,
    /// Set by the degraded heuristic parser; such a constraint must never be
    /// applied without explicit caller sign-off.
    pub requires_manual_review: bool,
    pub validation: Option<Validation>,
}

impl ParsedConstraint {
    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().is_some_and(|v| v.is_valid)
    }
}

/// An ordered collection of accepted constraints.
///
/// Iteration order is the fixed application priority, not insertion order:
/// later categories may depend on dimensions created by earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<ParsedConstraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: ParsedConstraint) {
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Constraints in insertion order.
    pub fn as_slice(&self) -> &[ParsedConstraint] {
        &self.constraints
    }

    /// Constraints in application order, each paired with its insertion
    /// index. The sort is stable, so same-rank constraints keep their
    /// relative order.
    pub fn application_order(&self) -> Vec<(usize, &ParsedConstraint)> {
        let mut ordered: Vec<(usize, &ParsedConstraint)> =
            self.constraints.iter().enumerate().collect();
        ordered.sort_by_key(|(_, c)| c.kind.priority_rank());
        ordered
    }
}

impl FromIterator<ParsedConstraint> for ConstraintSet {
    fn from_iter<T: IntoIterator<Item = ParsedConstraint>>(iter: T) -> Self {
        Self {
            constraints: iter.into_iter().collect(),
        }
    }
}
