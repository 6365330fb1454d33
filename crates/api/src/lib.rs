#![forbid(unsafe_code)]

//! Budget allocation over candidate funding projects.
//!
//! [`AllocationOptimizer`] turns impact estimates, costs, a budget and a
//! [`ConstraintSpec`] into a mixed binary/continuous program, solves it with
//! a pluggable engine and maps the assignment back to per-project decisions.

pub mod config;
pub mod constraints;
pub mod error;
mod formulation;
pub mod optimizer;
pub mod project;
pub mod result;
mod sweep;

pub use config::OptimizerConfig;
pub use constraints::{Constraint, ConstraintSpec, Measure, NamedConstraint, Selector};
pub use error::AllocationError;
pub use optimizer::{optimize, AllocationOptimizer};
pub use project::{validate_inputs, validate_projects, Project};
pub use result::{AllocationResult, AllocationStatus, ProjectAllocation, SolveSummary};

pub use fundalloc_core::control::CancellationToken;
pub use fundalloc_core::math::Scalar;
pub use fundalloc_core::options::Engine;
