use crate::constraints::ConstraintSpec;
use crate::error::AllocationError;
use crate::optimizer::AllocationOptimizer;
use crate::project::Project;
use crate::result::AllocationResult;
use fundalloc_core::math::Scalar;
use rayon::prelude::*;
use tracing::debug;

impl AllocationOptimizer {
    /// Solves the same instance once per budget level on the rayon pool.
    /// Results keep the order of `budgets`.
    pub fn budget_sweep(
        &self,
        impacts: &[Scalar],
        costs: &[Scalar],
        budgets: &[Scalar],
        constraints: &ConstraintSpec,
    ) -> Vec<Result<AllocationResult, AllocationError>> {
        debug!(levels = budgets.len(), "starting budget sweep");
        budgets
            .par_iter()
            .map(|&budget| self.optimize(impacts, costs, budget, constraints))
            .collect()
    }

    pub fn project_sweep(
        &self,
        projects: &[Project],
        budgets: &[Scalar],
        constraints: &ConstraintSpec,
    ) -> Vec<Result<AllocationResult, AllocationError>> {
        debug!(
            levels = budgets.len(),
            projects = projects.len(),
            "starting project budget sweep"
        );
        budgets
            .par_iter()
            .map(|&budget| self.optimize_projects(projects, budget, constraints))
            .collect()
    }
}
