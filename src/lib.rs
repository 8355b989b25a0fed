//! vrp-rules constraint pipeline
//!
//! Turns free-text routing business rules ("each vehicle can carry at most
//! 500kg", "node 1 and node 4 must not be served together") into validated,
//! mathematically translated constraints and applies them to an
//! integer-programming routing model.

pub mod context;
pub mod types;
pub mod error;
pub mod patterns;
pub mod confidence;
pub mod fallback;
pub mod translate;
pub mod validate;
pub mod model;
pub mod apply;
pub mod pipeline;
