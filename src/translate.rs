//! Canonical mathematical translation.
//!
//! Two steps live here. `build_kind` resolves extracted parameters and entity
//! labels against the problem context and produces a typed `ConstraintKind`.
//! `translate` is then a pure mapping from the kind to its canonical record:
//! a readable symbolic form plus a normalized `SolverFormat`. Neither step
//! knows anything about a live optimization model — that boundary is what
//! lets the applier be swapped for a different solver backend.

use crate::context::ProblemContext;
use crate::error::ParseError;
use crate::patterns::{ConstraintCategory, MatchParams};
use crate::types::{
    CapacityUnit, ComplexityLevel, ConstraintFamily, ConstraintKind, DistanceUnit, EntityRef,
    EntityType, Operator, PriorityLevel, SolverFormat, VariableRef,
};

/// Resolve parameters into a typed constraint kind.
pub fn build_kind(
    category: ConstraintCategory,
    params: &MatchParams,
    ctx: &ProblemContext,
) -> Result<ConstraintKind, ParseError> {
    match category {
        ConstraintCategory::Capacity => Ok(ConstraintKind::Capacity {
            value: number(params, "value")?,
            unit: CapacityUnit::parse(param(params, "unit").unwrap_or("units")),
        }),
        ConstraintCategory::Distance => Ok(ConstraintKind::Distance {
            value: number(params, "value")?,
            unit: DistanceUnit::parse(param(params, "unit").unwrap_or("km")),
        }),
        ConstraintCategory::TimeWindow => {
            let customer = ctx.resolve_node(require(params, "customer")?)?;
            let start = clock_minutes(require(params, "start")?)?;
            let end_raw = require(params, "end")?;
            let mut end = clock_minutes(end_raw)?;
            // "between 9 and 5" means 09:00-17:00: a bare-hour end with no
            // meridiem or minutes that runs backwards is read as afternoon.
            let bare_hour =
                !end_raw.contains(':') && !end_raw.contains("am") && !end_raw.contains("pm");
            if end < start && bare_hour {
                end += 12 * 60;
            }
            Ok(ConstraintKind::TimeWindow { customer, start, end })
        }
        ConstraintCategory::WorkingHours => {
            let value = number(params, "value")?;
            let unit = param(params, "unit").unwrap_or("hours");
            let max_minutes = if unit.starts_with('h') {
                (value * 60.0).round() as i64
            } else {
                value.round() as i64
            };
            Ok(ConstraintKind::WorkingHours { max_minutes })
        }
        ConstraintCategory::MinVehicles => Ok(ConstraintKind::MinVehicles {
            count: count(params)?,
        }),
        ConstraintCategory::MaxVehicles => Ok(ConstraintKind::MaxVehicles {
            count: count(params)?,
        }),
        ConstraintCategory::VehicleForbidden => Ok(ConstraintKind::VehicleForbidden {
            vehicle: ctx.resolve_vehicle(require(params, "vehicle")?)?,
            location: ctx.resolve_node(require(params, "location")?)?,
        }),
        ConstraintCategory::VehicleExclusive => Ok(ConstraintKind::VehicleExclusive {
            vehicle: ctx.resolve_vehicle(require(params, "vehicle")?)?,
            location: ctx.resolve_node(require(params, "location")?)?,
        }),
        ConstraintCategory::SameVehicle => Ok(ConstraintKind::SameVehicle {
            first: ctx.resolve_node(require(params, "first")?)?,
            second: ctx.resolve_node(require(params, "second")?)?,
        }),
        ConstraintCategory::SeparateVehicles => Ok(ConstraintKind::SeparateVehicles {
            first: ctx.resolve_node(require(params, "first")?)?,
            second: ctx.resolve_node(require(params, "second")?)?,
        }),
        ConstraintCategory::Priority => Ok(ConstraintKind::Priority {
            customer: ctx.resolve_node(require(params, "customer")?)?,
            level: match param(params, "level") {
                Some("low") => PriorityLevel::Low,
                Some("medium") | Some("normal") => PriorityLevel::Medium,
                _ => PriorityLevel::High,
            },
        }),
    }
}

/// Canonical record: symbolic form plus normalized solver format.
pub fn translate(kind: &ConstraintKind) -> (String, SolverFormat) {
    match kind {
        ConstraintKind::Capacity { value, unit } => (
            format!("sum(x_ijv * demand_j) <= {value} for each vehicle v  [{unit:?}]"),
            SolverFormat {
                family: ConstraintFamily::Capacity,
                operator: Operator::Le,
                rhs: *value,
                lower: None,
                variables: VariableRef::VehicleLoad,
            },
        ),
        ConstraintKind::Distance { value, unit } => (
            format!("sum(d_ij * x_ijv) <= {value} for each vehicle v  [{unit:?}]"),
            SolverFormat {
                family: ConstraintFamily::Distance,
                operator: Operator::Le,
                rhs: *value,
                lower: None,
                variables: VariableRef::VehicleDistance,
            },
        ),
        ConstraintKind::TimeWindow { customer, start, end } => (
            format!("{start} <= arrival_{customer} <= {end} if customer {customer} is visited (minutes from midnight)"),
            SolverFormat {
                family: ConstraintFamily::TimeWindow,
                operator: Operator::Range,
                rhs: *end as f64,
                lower: Some(*start as f64),
                variables: VariableRef::Arrival { customer: *customer },
            },
        ),
        ConstraintKind::WorkingHours { max_minutes } => (
            format!("sum(t_ij * x_ijv) <= {max_minutes} for each vehicle v (minutes; hours converted)"),
            SolverFormat {
                family: ConstraintFamily::RouteDuration,
                operator: Operator::Le,
                rhs: *max_minutes as f64,
                lower: None,
                variables: VariableRef::RouteTime,
            },
        ),
        ConstraintKind::MinVehicles { count } => (
            format!("sum(used_v) >= {count}"),
            SolverFormat {
                family: ConstraintFamily::VehicleCount,
                operator: Operator::Ge,
                rhs: *count as f64,
                lower: None,
                variables: VariableRef::VehiclesUsed,
            },
        ),
        ConstraintKind::MaxVehicles { count } => (
            format!("sum(used_v) <= {count}"),
            SolverFormat {
                family: ConstraintFamily::VehicleCount,
                operator: Operator::Le,
                rhs: *count as f64,
                lower: None,
                variables: VariableRef::VehiclesUsed,
            },
        ),
        ConstraintKind::VehicleForbidden { vehicle, location } => (
            format!("sum(x_ij,v={vehicle} touching node {location}) = 0"),
            SolverFormat {
                family: ConstraintFamily::VehicleAccess,
                operator: Operator::Eq,
                rhs: 0.0,
                lower: None,
                variables: VariableRef::EdgesAt { location: *location, vehicle: *vehicle },
            },
        ),
        ConstraintKind::VehicleExclusive { vehicle, location } => (
            format!("sum(x_ij,w touching node {location}) = 0 for every vehicle w != {vehicle}"),
            SolverFormat {
                family: ConstraintFamily::VehicleAccess,
                operator: Operator::Eq,
                rhs: 0.0,
                lower: None,
                variables: VariableRef::EdgesAt { location: *location, vehicle: *vehicle },
            },
        ),
        ConstraintKind::SameVehicle { first, second } => (
            format!("y_{first},v = y_{second},v for all v (via auxiliary pair variables)"),
            SolverFormat {
                family: ConstraintFamily::Grouping,
                operator: Operator::Eq,
                rhs: 0.0,
                lower: None,
                variables: VariableRef::VisitPair { first: *first, second: *second },
            },
        ),
        ConstraintKind::SeparateVehicles { first, second } => (
            format!("y_{first},v + y_{second},v <= 1 for all v"),
            SolverFormat {
                family: ConstraintFamily::Grouping,
                operator: Operator::Le,
                rhs: 1.0,
                lower: None,
                variables: VariableRef::VisitPair { first: *first, second: *second },
            },
        ),
        ConstraintKind::Priority { customer, level } => (
            format!("serve node {customer} or pay penalty ({level:?} priority disjunction)"),
            SolverFormat {
                family: ConstraintFamily::Objective,
                operator: Operator::Ge,
                rhs: priority_penalty(*level),
                lower: None,
                variables: VariableRef::Visit { customer: *customer },
            },
        ),
    }
}

/// Fixed skip penalties per priority level, in objective cost units.
pub fn priority_penalty(level: PriorityLevel) -> f64 {
    match level {
        PriorityLevel::Low => 1_000.0,
        PriorityLevel::Medium => 5_000.0,
        PriorityLevel::High => 20_000.0,
    }
}

pub fn complexity(kind: &ConstraintKind) -> ComplexityLevel {
    match kind {
        ConstraintKind::Capacity { .. }
        | ConstraintKind::Distance { .. }
        | ConstraintKind::MinVehicles { .. }
        | ConstraintKind::MaxVehicles { .. } => ComplexityLevel::Simple,
        ConstraintKind::WorkingHours { .. }
        | ConstraintKind::VehicleForbidden { .. }
        | ConstraintKind::VehicleExclusive { .. }
        | ConstraintKind::SeparateVehicles { .. }
        | ConstraintKind::Priority { .. } => ComplexityLevel::Medium,
        ConstraintKind::TimeWindow { .. } | ConstraintKind::SameVehicle { .. } => {
            ComplexityLevel::Complex
        }
    }
}

/// Entity references carried on the parsed constraint, for reporting.
pub fn entities(kind: &ConstraintKind) -> Vec<EntityRef> {
    match kind {
        ConstraintKind::TimeWindow { customer, .. } | ConstraintKind::Priority { customer, .. } => {
            vec![EntityRef { entity_type: EntityType::Customer, index: *customer }]
        }
        ConstraintKind::VehicleForbidden { vehicle, location }
        | ConstraintKind::VehicleExclusive { vehicle, location } => vec![
            EntityRef { entity_type: EntityType::Vehicle, index: *vehicle },
            EntityRef { entity_type: EntityType::Location, index: *location },
        ],
        ConstraintKind::SameVehicle { first, second }
        | ConstraintKind::SeparateVehicles { first, second } => vec![
            EntityRef { entity_type: EntityType::Customer, index: *first },
            EntityRef { entity_type: EntityType::Customer, index: *second },
        ],
        _ => Vec::new(),
    }
}

fn param<'a>(params: &'a MatchParams, name: &str) -> Option<&'a str> {
    params.get(name).map(|s| s.as_str()).filter(|s| !s.is_empty())
}

fn require<'a>(params: &'a MatchParams, name: &'static str) -> Result<&'a str, ParseError> {
    param(params, name).ok_or(ParseError::MissingField { field: name })
}

fn number(params: &MatchParams, name: &'static str) -> Result<f64, ParseError> {
    let raw = require(params, name)?;
    raw.parse::<f64>().map_err(|_| ParseError::BadNumber {
        name,
        value: raw.to_string(),
    })
}

fn count(params: &MatchParams) -> Result<usize, ParseError> {
    let raw = require(params, "count")?;
    raw.parse::<usize>().map_err(|_| ParseError::BadNumber {
        name: "count",
        value: raw.to_string(),
    })
}

/// Parse a clock token ("9", "9am", "9:30", "14:00", "5 pm") to minutes from
/// midnight. Bare numbers are hours on a 24h clock.
pub fn clock_minutes(raw: &str) -> Result<i64, ParseError> {
    let text = raw.trim().to_lowercase();
    let (body, meridiem) = if let Some(stripped) = text.strip_suffix("pm") {
        (stripped.trim().to_string(), Some(12))
    } else if let Some(stripped) = text.strip_suffix("am") {
        (stripped.trim().to_string(), Some(0))
    } else {
        (text.clone(), None)
    };

    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (
            h.parse::<i64>().map_err(|_| bad_time(raw))?,
            m.parse::<i64>().map_err(|_| bad_time(raw))?,
        ),
        None => (body.parse::<i64>().map_err(|_| bad_time(raw))?, 0),
    };

    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(bad_time(raw));
    }

    let hours = match meridiem {
        Some(offset) if hours == 12 => offset, // 12am -> 0, 12pm -> 12
        Some(offset) => hours + offset,
        None => hours,
    };

    Ok(hours * 60 + minutes)
}

fn bad_time(raw: &str) -> ParseError {
    ParseError::BadTime { value: raw.to_string() }
}
