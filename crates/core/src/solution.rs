use crate::math::RealNumber;
use crate::stats::SolveStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Optimal,
    Infeasible,
    Unbounded,
    TimeLimit,
    NodeLimit,
    IterationLimit,
    Cancelled,
}

impl Status {
    /// True when the search stopped before proving optimality or infeasibility.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Status::TimeLimit | Status::NodeLimit | Status::IterationLimit | Status::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution<T: RealNumber> {
    /// Best assignment found; empty when no incumbent exists.
    pub primal: Vec<T>,
    pub status: Status,
    /// Objective of `primal` as reported by the engine, `+inf` without an incumbent.
    pub objective_value: T,
    /// Best proven lower bound on the optimum.
    pub bound: T,
    pub stats: SolveStats<T>,
}

impl<T> Solution<T>
where
    T: RealNumber,
{
    pub fn without_incumbent(status: Status, stats: SolveStats<T>) -> Self {
        Self {
            primal: Vec::new(),
            status,
            objective_value: T::infinity(),
            bound: T::neg_infinity(),
            stats,
        }
    }

    pub fn has_incumbent(&self) -> bool {
        !self.primal.is_empty()
    }
}
