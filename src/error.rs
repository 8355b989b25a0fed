//! Error taxonomy for the constraint pipeline.
//!
//! Errors are data: per-constraint failures are returned to the caller in
//! result structures, never raised as panics, and a failure for one
//! constraint never aborts its batch siblings.

use thiserror::Error;

/// Failure to recognize a prompt as any supported constraint.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no pattern matched and no generative result for: \"{prompt}\"")]
    Unrecognized { prompt: String },
    #[error("generative response missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("unsupported constraint type `{constraint_type}` in generative response")]
    UnsupportedType { constraint_type: String },
    #[error("parameter `{name}` is not a number: \"{value}\"")]
    BadNumber { name: &'static str, value: String },
    #[error("could not interpret time value \"{value}\"")]
    BadTime { value: String },
    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// A named customer/vehicle/node could not be resolved in the problem context.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("customer \"{label}\" not found in problem context")]
    CustomerNotFound { label: String },
    #[error("vehicle \"{label}\" not found in problem context")]
    VehicleNotFound { label: String },
    #[error("node {index} out of range (problem has {node_count} nodes)")]
    NodeOutOfRange { index: usize, node_count: usize },
    #[error("vehicle {index} out of range (fleet has {vehicle_count} vehicles)")]
    VehicleOutOfRange { index: usize, vehicle_count: usize },
}

/// Failure talking to the generative language service.
///
/// Every variant is treated as "service unavailable" by the fallback parser;
/// none of them propagate out of the pipeline.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned status {0}")]
    Status(u16),
    #[error("response was not valid json: {0}")]
    MalformedResponse(String),
    #[error("response carried no completion text")]
    EmptyResponse,
}

/// Model-side failure while applying an accepted constraint.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A dimension of this name was already registered through a path that
    /// bypassed the registry. Duplicate dimensions corrupt the model's
    /// bookkeeping, so this is a programming error, not a recoverable state.
    #[error("dimension \"{0}\" registered twice")]
    DuplicateDimension(String),
    #[error("model has no edge variable ({from} -> {to}, vehicle {vehicle})")]
    MissingEdgeVar { from: usize, to: usize, vehicle: usize },
    #[error("model has no visit variable (node {node}, vehicle {vehicle})")]
    MissingVisitVar { node: usize, vehicle: usize },
    #[error("model has no vehicle-use variable for vehicle {0}")]
    MissingVehicleVar(usize),
    #[error(transparent)]
    Entity(#[from] EntityError),
}
