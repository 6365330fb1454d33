use crate::math::{cast, RealNumber};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    #[default]
    BranchAndBound,
    Exhaustive,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::BranchAndBound => write!(f, "branch_and_bound"),
            Engine::Exhaustive => write!(f, "exhaustive"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOptions<T: RealNumber> {
    /// Primal feasibility tolerance used by the simplex ratio and phase-one tests.
    pub tolerance: T,
    /// A value within this distance of an integer counts as integral.
    pub integrality_tolerance: T,
    /// Pivot limit for a single LP relaxation.
    pub max_iterations: usize,
    /// Branch-and-bound node budget. Enumeration engines ignore it.
    pub max_nodes: usize,
    /// Per-call limit, applied on top of any deadline the caller's `SolveControl` carries.
    pub max_time: Option<Duration>,
}

impl<T> SolveOptions<T>
where
    T: RealNumber,
{
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.max_time = Some(limit);
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
}

impl<T> Default for SolveOptions<T>
where
    T: RealNumber,
{
    fn default() -> Self {
        Self {
            tolerance: cast(1e-9),
            integrality_tolerance: cast(1e-6),
            max_iterations: 50_000,
            max_nodes: 100_000,
            max_time: Some(Duration::from_secs(5)),
        }
    }
}
