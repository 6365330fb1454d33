#![forbid(unsafe_code)]

pub mod branch_and_bound;
pub mod exhaustive;
pub mod heuristics;
pub mod simplex;

pub use branch_and_bound::BranchAndBound;
pub use exhaustive::{ExhaustiveSearch, MAX_EXHAUSTIVE_VARIABLES};
pub use simplex::{LpSolution, LpStatus, SimplexSolver};
