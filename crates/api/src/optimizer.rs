use crate::config::OptimizerConfig;
use crate::constraints::ConstraintSpec;
use crate::error::AllocationError;
use crate::formulation::{decisions_from, formulate, pinned_stage, verify, Formulation};
use crate::project::{tagged_groups, validate_inputs, validate_projects, Project};
use crate::result::{AllocationResult, AllocationStatus, SolveSummary};
use fundalloc_algos::{BranchAndBound, ExhaustiveSearch};
use fundalloc_core::control::{CancellationToken, SolveControl};
use fundalloc_core::math::{dot, relative_gap, scaled_tolerance, Scalar, Timer};
use fundalloc_core::options::{Engine, SolveOptions};
use fundalloc_core::problem::{MilpProblem, RowSense, WarmStart};
use fundalloc_core::solution::Status;
use fundalloc_core::traits::SolveEngine;
use std::fmt;
use tracing::{debug, info, warn};

/// Selects projects to maximise total impact under a budget and a
/// [`ConstraintSpec`].
///
/// Among equal-impact optima the lower total cost wins, then the lower sum of
/// selected indices. The optimizer keeps no state between calls and can be
/// shared across threads.
pub struct AllocationOptimizer {
    config: OptimizerConfig,
    engine: Box<dyn SolveEngine<Scalar>>,
}

impl AllocationOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let engine: Box<dyn SolveEngine<Scalar>> = match config.engine {
            Engine::BranchAndBound => Box::new(BranchAndBound::new()),
            Engine::Exhaustive => Box::new(ExhaustiveSearch::new()),
        };
        Self { config, engine }
    }

    /// Replaces the engine chosen by `config.engine`.
    pub fn with_engine<E>(mut self, engine: E) -> Self
    where
        E: SolveEngine<Scalar> + 'static,
    {
        self.engine = Box::new(engine);
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn optimize(
        &self,
        impacts: &[Scalar],
        costs: &[Scalar],
        budget: Scalar,
        constraints: &ConstraintSpec,
    ) -> Result<AllocationResult, AllocationError> {
        self.optimize_with_cancel(impacts, costs, budget, constraints, &CancellationToken::new())
    }

    /// Like [`optimize`](Self::optimize), stopping with status `cancelled`
    /// once `token` is cancelled.
    pub fn optimize_with_cancel(
        &self,
        impacts: &[Scalar],
        costs: &[Scalar],
        budget: Scalar,
        constraints: &ConstraintSpec,
        token: &CancellationToken,
    ) -> Result<AllocationResult, AllocationError> {
        self.run(impacts, costs, budget, constraints, &[], token)
    }

    /// Solves over project records: group tags extend `constraints.groups`
    /// and per-project fractional flags override the global default.
    pub fn optimize_projects(
        &self,
        projects: &[Project],
        budget: Scalar,
        constraints: &ConstraintSpec,
    ) -> Result<AllocationResult, AllocationError> {
        validate_projects(projects)?;
        let mut merged = constraints.clone();
        merged.merge_groups(tagged_groups(projects));
        let impacts = projects.iter().map(|p| p.impact).collect::<Vec<_>>();
        let costs = projects.iter().map(|p| p.cost).collect::<Vec<_>>();
        let defaults = projects.iter().map(|p| p.fractional).collect::<Vec<_>>();
        self.run(
            &impacts,
            &costs,
            budget,
            &merged,
            &defaults,
            &CancellationToken::new(),
        )
    }

    fn run(
        &self,
        impacts: &[Scalar],
        costs: &[Scalar],
        budget: Scalar,
        spec: &ConstraintSpec,
        fractional_defaults: &[Option<bool>],
        token: &CancellationToken,
    ) -> Result<AllocationResult, AllocationError> {
        validate_inputs(impacts, costs, budget)?;
        spec.validate(impacts.len())?;
        self.config.validate()?;

        let timer = Timer::start();
        let n = impacts.len();
        let mut summary = SolveSummary::new(self.engine.name());
        if n == 0 {
            debug!("no projects to allocate");
            return Ok(AllocationResult::empty(AllocationStatus::Optimal, 0, summary));
        }

        let fractional = spec.fractional_flags(n, fractional_defaults);
        let base = match formulate(
            impacts,
            costs,
            budget,
            spec,
            &fractional,
            self.config.integrality_tolerance,
        ) {
            Formulation::Model(problem) => problem,
            Formulation::EmptyDomain { project } => {
                info!(project, "funding limits leave a project without admissible decisions");
                summary.solve_time = timer.elapsed();
                return Ok(AllocationResult::empty(AllocationStatus::Infeasible, n, summary));
            }
        };
        debug!(
            projects = n,
            rows = base.nrows(),
            fractional = fractional.iter().filter(|&&f| f).count(),
            "formulated allocation model"
        );

        let control = SolveControl::new(Some(self.config.time_limit), token.clone());
        let options = self.config.solve_options();

        let first = self.engine.solve(&base, &options, &control, None)?;
        summary.absorb(&first.stats);
        let mut status = engine_status(first.status)?;
        if !first.has_incumbent() {
            if status == AllocationStatus::Optimal {
                return Err(AllocationError::InternalFormulation(
                    "engine reported optimality without an assignment".to_string(),
                ));
            }
            summary.solve_time = timer.elapsed();
            log_outcome(status, &summary);
            return Ok(AllocationResult::empty(status, n, summary));
        }

        summary.gap = Some(relative_gap(first.objective_value, first.bound)).filter(|gap| gap.is_finite());
        let mut decisions = decisions_from(&base, &first.primal);
        verify(&base, &decisions, self.config.verification_tolerance)?;
        self.reconcile(impacts, &decisions, first.objective_value)?;

        if status == AllocationStatus::Optimal {
            summary.stages_completed = 1;
            if self.config.tie_break {
                debug!(
                    remaining_ms = control.remaining().map(|left| left.as_millis() as u64),
                    "breaking ties among optimal selections"
                );
                status = self.break_ties(
                    &base,
                    impacts,
                    costs,
                    &mut decisions,
                    &options,
                    &control,
                    &mut summary,
                )?;
            }
        }

        summary.solve_time = timer.elapsed();
        log_outcome(status, &summary);
        Ok(AllocationResult {
            total_cost: dot(costs, &decisions),
            total_impact: dot(impacts, &decisions),
            decisions,
            status,
            suboptimal: status != AllocationStatus::Optimal,
            incumbent_found: true,
            summary,
        })
    }

    /// Pins the optimal impact and minimises cost, then pins that cost and
    /// minimises the index sum. Each stage is warm-started from the previous
    /// decisions.
    #[allow(clippy::too_many_arguments)]
    fn break_ties(
        &self,
        base: &MilpProblem<Scalar>,
        impacts: &[Scalar],
        costs: &[Scalar],
        decisions: &mut Vec<Scalar>,
        options: &SolveOptions<Scalar>,
        control: &SolveControl,
        summary: &mut SolveSummary,
    ) -> Result<AllocationStatus, AllocationError> {
        let tie = self.config.tie_tolerance;

        let impact = dot(impacts, decisions);
        let by_cost = pinned_stage(
            base,
            "tie_break:impact",
            impacts,
            RowSense::Ge,
            impact - scaled_tolerance(tie, impact),
            costs.to_vec(),
        );
        let status = self.refine(&by_cost, decisions, options, control, summary)?;
        if status != AllocationStatus::Optimal {
            return Ok(status);
        }

        let cost = dot(costs, decisions);
        let by_index = pinned_stage(
            &by_cost,
            "tie_break:cost",
            costs,
            RowSense::Le,
            cost + scaled_tolerance(tie, cost),
            (0..impacts.len()).map(|i| i as Scalar).collect(),
        );
        self.refine(&by_index, decisions, options, control, summary)
    }

    fn refine(
        &self,
        stage: &MilpProblem<Scalar>,
        decisions: &mut Vec<Scalar>,
        options: &SolveOptions<Scalar>,
        control: &SolveControl,
        summary: &mut SolveSummary,
    ) -> Result<AllocationStatus, AllocationError> {
        let warm = WarmStart::new(decisions.clone());
        let solution = self.engine.solve(stage, options, control, Some(&warm))?;
        summary.absorb(&solution.stats);
        let status = engine_status(solution.status)?;
        if status == AllocationStatus::Infeasible || !solution.has_incumbent() {
            if status.is_interrupted() {
                return Ok(status);
            }
            return Err(AllocationError::InternalFormulation(format!(
                "tie-break stage {} lost its feasible warm start",
                summary.stages_completed + 1
            )));
        }
        let refined = decisions_from(stage, &solution.primal);
        verify(stage, &refined, self.config.verification_tolerance)?;
        *decisions = refined;
        if status == AllocationStatus::Optimal {
            summary.stages_completed += 1;
        }
        Ok(status)
    }

    /// The engine minimises negated impact; its objective must agree with
    /// the impact recomputed from the snapped decisions.
    fn reconcile(
        &self,
        impacts: &[Scalar],
        decisions: &[Scalar],
        objective: Scalar,
    ) -> Result<(), AllocationError> {
        let recomputed = -dot(impacts, decisions);
        let scale = impacts.iter().map(|v| v.abs()).sum::<Scalar>();
        let gap = (recomputed - objective).abs();
        if gap > scaled_tolerance(self.config.verification_tolerance, scale) {
            return Err(AllocationError::InternalFormulation(format!(
                "engine objective {objective} disagrees with recomputed impact {}",
                -recomputed
            )));
        }
        Ok(())
    }
}

impl Default for AllocationOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl fmt::Debug for AllocationOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationOptimizer")
            .field("config", &self.config)
            .field("engine", &self.engine.name())
            .finish()
    }
}

fn engine_status(status: Status) -> Result<AllocationStatus, AllocationError> {
    AllocationStatus::from_engine(status).ok_or_else(|| {
        AllocationError::InternalFormulation(format!(
            "engine reported {status:?} for a bounded allocation model"
        ))
    })
}

fn log_outcome(status: AllocationStatus, summary: &SolveSummary) {
    if status.is_interrupted() {
        warn!(
            %status,
            nodes = summary.nodes,
            stages = summary.stages_completed,
            "allocation stopped before proving optimality"
        );
    } else {
        info!(
            %status,
            engine = %summary.engine,
            nodes = summary.nodes,
            lp_iterations = summary.lp_iterations,
            stages = summary.stages_completed,
            elapsed_ms = summary.solve_time.as_millis() as u64,
            "allocation solved"
        );
    }
}

/// Solves with the default configuration.
pub fn optimize(
    impacts: &[Scalar],
    costs: &[Scalar],
    budget: Scalar,
    constraints: &ConstraintSpec,
) -> Result<AllocationResult, AllocationError> {
    AllocationOptimizer::default().optimize(impacts, costs, budget, constraints)
}
