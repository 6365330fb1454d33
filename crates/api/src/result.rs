use crate::project::Project;
use fundalloc_core::math::Scalar;
use fundalloc_core::solution::Status;
use fundalloc_core::stats::SolveStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Optimal,
    Infeasible,
    /// A time, node, or pivot limit stopped the search.
    TimedOut,
    Cancelled,
}

impl AllocationStatus {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, AllocationStatus::TimedOut | AllocationStatus::Cancelled)
    }

    /// Maps an engine status. `None` for outcomes an allocation model cannot
    /// produce.
    pub(crate) fn from_engine(status: Status) -> Option<Self> {
        match status {
            Status::Optimal => Some(AllocationStatus::Optimal),
            Status::Infeasible => Some(AllocationStatus::Infeasible),
            Status::TimeLimit | Status::NodeLimit | Status::IterationLimit => {
                Some(AllocationStatus::TimedOut)
            }
            Status::Cancelled => Some(AllocationStatus::Cancelled),
            Status::Unbounded => None,
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AllocationStatus::Optimal => "optimal",
            AllocationStatus::Infeasible => "infeasible",
            AllocationStatus::TimedOut => "timed_out",
            AllocationStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Work done across all lexicographic stages of one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveSummary {
    pub engine: String,
    pub nodes: usize,
    pub lp_iterations: usize,
    pub incumbent_updates: usize,
    pub stages_completed: usize,
    /// Relative gap between the first-stage incumbent and its proven bound.
    pub gap: Option<Scalar>,
    pub solve_time: Duration,
}

impl SolveSummary {
    pub(crate) fn new(engine: &str) -> Self {
        Self {
            engine: engine.to_string(),
            nodes: 0,
            lp_iterations: 0,
            incumbent_updates: 0,
            stages_completed: 0,
            gap: None,
            solve_time: Duration::ZERO,
        }
    }

    pub(crate) fn absorb(&mut self, stats: &SolveStats<Scalar>) {
        self.nodes += stats.nodes;
        self.lp_iterations += stats.lp_iterations;
        self.incumbent_updates += stats.incumbent_updates();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Funded share of each project, in `[0, 1]`; `{0, 1}` for all-or-nothing projects.
    pub decisions: Vec<Scalar>,
    pub total_cost: Scalar,
    pub total_impact: Scalar,
    pub status: AllocationStatus,
    /// Set whenever optimality was not proven.
    pub suboptimal: bool,
    pub incumbent_found: bool,
    pub summary: SolveSummary,
}

impl AllocationResult {
    /// All-zero decisions, used when no incumbent exists.
    pub(crate) fn empty(status: AllocationStatus, nprojects: usize, summary: SolveSummary) -> Self {
        Self {
            decisions: vec![0.0; nprojects],
            total_cost: 0.0,
            total_impact: 0.0,
            status,
            suboptimal: status.is_interrupted(),
            incumbent_found: status == AllocationStatus::Optimal,
            summary,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == AllocationStatus::Optimal
    }

    /// Indices of projects that receive any funding.
    pub fn selected(&self) -> Vec<usize> {
        self.decisions
            .iter()
            .enumerate()
            .filter(|&(_, &decision)| decision > 0.0)
            .map(|(index, _)| index)
            .collect()
    }

    /// Pairs each project with its decision and funded amount.
    pub fn allocations<'a>(&'a self, projects: &'a [Project]) -> Vec<ProjectAllocation<'a>> {
        projects
            .iter()
            .zip(&self.decisions)
            .map(|(project, &decision)| ProjectAllocation {
                id: &project.id,
                decision,
                funded: decision * project.cost,
                impact: decision * project.impact,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectAllocation<'a> {
    pub id: &'a str,
    pub decision: Scalar,
    pub funded: Scalar,
    pub impact: Scalar,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_in_snake_case() {
        let json = serde_json::to_string(&AllocationStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
        assert_eq!(AllocationStatus::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn limits_map_to_timed_out() {
        for status in [Status::TimeLimit, Status::NodeLimit, Status::IterationLimit] {
            assert_eq!(
                AllocationStatus::from_engine(status),
                Some(AllocationStatus::TimedOut)
            );
        }
        assert_eq!(AllocationStatus::from_engine(Status::Unbounded), None);
    }

    #[test]
    fn allocations_report_funded_amounts() {
        let mut result =
            AllocationResult::empty(AllocationStatus::Optimal, 2, SolveSummary::new("test"));
        result.decisions = vec![1.0, 0.5];
        let projects = [Project::new("a", 4.0, 10.0), Project::new("b", 2.0, 8.0)];
        let rows = result.allocations(&projects);
        assert_eq!(rows[1].id, "b");
        assert_eq!(rows[1].funded, 4.0);
        assert_eq!(rows[1].impact, 1.0);
        assert_eq!(result.selected(), vec![0, 1]);
    }
}
