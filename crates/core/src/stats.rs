use crate::math::RealNumber;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Snapshot taken whenever the incumbent improves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncumbentRecord<T: RealNumber> {
    pub node: usize,
    pub objective: T,
    pub bound: T,
    pub elapsed: Duration,
}

impl<T> IncumbentRecord<T>
where
    T: RealNumber,
{
    pub fn new(node: usize, objective: T, bound: T, elapsed: Duration) -> Self {
        Self {
            node,
            objective,
            bound,
            elapsed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveStats<T: RealNumber> {
    pub history: Vec<IncumbentRecord<T>>,
    pub solve_time: Duration,
    pub nodes: usize,
    pub lp_iterations: usize,
}

impl<T> SolveStats<T>
where
    T: RealNumber,
{
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            solve_time: Duration::ZERO,
            nodes: 0,
            lp_iterations: 0,
        }
    }

    pub fn push(&mut self, record: IncumbentRecord<T>) {
        self.history.push(record);
    }

    pub fn incumbent_updates(&self) -> usize {
        self.history.len()
    }
}

impl<T> Default for SolveStats<T>
where
    T: RealNumber,
{
    fn default() -> Self {
        Self::new()
    }
}
