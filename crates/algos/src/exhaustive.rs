use fundalloc_core::control::SolveControl;
use fundalloc_core::math::{cast, scaled_tolerance, RealNumber, Timer};
use fundalloc_core::options::SolveOptions;
use fundalloc_core::problem::{MilpProblem, WarmStart};
use fundalloc_core::scaling::RowEquilibrator;
use fundalloc_core::solution::{Solution, Status};
use fundalloc_core::stats::{IncumbentRecord, SolveStats};
use fundalloc_core::traits::{EngineError, Scaler, SolveEngine};
use tracing::{debug, info};

pub const MAX_EXHAUSTIVE_VARIABLES: usize = 24;
const CONTROL_CHECK_INTERVAL: u64 = 1024;

/// Enumerates every assignment of a pure 0/1 problem in increasing bitmask
/// order, keeping the first assignment that attains the best objective.
///
/// Only the deadline and cancellation stop the enumeration; `max_nodes` is a
/// branch-and-bound budget and does not apply here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveSearch;

impl ExhaustiveSearch {
    pub fn new() -> Self {
        Self
    }

    fn binary_domains<T: RealNumber>(
        &self,
        problem: &MilpProblem<T>,
        tolerance: T,
    ) -> Result<Option<Vec<(bool, bool)>>, EngineError> {
        if problem.nvars() > MAX_EXHAUSTIVE_VARIABLES {
            return Err(EngineError::Unsupported {
                engine: "exhaustive",
                reason: format!(
                    "{} variables exceed the limit of {MAX_EXHAUSTIVE_VARIABLES}",
                    problem.nvars()
                ),
            });
        }
        let mut domains = Vec::with_capacity(problem.nvars());
        for var in 0..problem.nvars() {
            if !problem.is_integer(var) {
                return Err(EngineError::Unsupported {
                    engine: "exhaustive",
                    reason: format!("variable {var} is continuous"),
                });
            }
            let lo = (problem.bounds.lower[var] - tolerance).ceil();
            let hi = (problem.bounds.upper[var] + tolerance).floor();
            if lo < T::zero() || hi > T::one() {
                return Err(EngineError::Unsupported {
                    engine: "exhaustive",
                    reason: format!("variable {var} is not binary"),
                });
            }
            if lo > hi {
                return Ok(None);
            }
            domains.push((lo == T::zero(), hi == T::one()));
        }
        Ok(Some(domains))
    }
}

impl<T> SolveEngine<T> for ExhaustiveSearch
where
    T: RealNumber,
{
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn solve(
        &self,
        problem: &MilpProblem<T>,
        options: &SolveOptions<T>,
        control: &SolveControl,
        warm_start: Option<&WarmStart<T>>,
    ) -> Result<Solution<T>, EngineError> {
        problem.validate()?;
        let control = &control.tightened(options.max_time);
        let timer = Timer::start();
        let mut stats = SolveStats::new();
        let Some(domains) = self.binary_domains(problem, options.integrality_tolerance)? else {
            return Ok(Solution::without_incumbent(Status::Infeasible, stats));
        };
        let mut scaled = problem.clone();
        RowEquilibrator::new().scale(&mut scaled)?;

        let n = problem.nvars();
        let feasibility = options.integrality_tolerance * cast::<T>(n.max(1) as f64);
        let mut best: Option<Vec<T>> = None;
        let mut best_value = T::infinity();
        if let Some(warm) = warm_start {
            if warm.primal.len() == n && scaled.is_feasible(&warm.primal, feasibility) {
                best_value = problem.objective(&warm.primal);
                best = Some(warm.primal.clone());
            }
        }

        let mut point = vec![T::zero(); n];
        let mut status = Status::Optimal;
        'masks: for mask in 0u64..(1u64 << n) {
            if mask % CONTROL_CHECK_INTERVAL == 0 {
                if let Some(interrupt) = control.interrupted() {
                    status = interrupt.into();
                    break 'masks;
                }
            }
            for (var, &(can_be_zero, can_be_one)) in domains.iter().enumerate() {
                let bit = (mask >> var) & 1 == 1;
                if (bit && !can_be_one) || (!bit && !can_be_zero) {
                    continue 'masks;
                }
                point[var] = if bit { T::one() } else { T::zero() };
            }
            stats.nodes += 1;
            if !scaled.is_feasible(&point, feasibility) {
                continue;
            }
            let value = problem.objective(&point);
            if best.is_none() || value < best_value - scaled_tolerance(options.tolerance, best_value) {
                debug!(mask, "new incumbent");
                stats.push(IncumbentRecord::new(
                    stats.nodes,
                    value,
                    T::neg_infinity(),
                    timer.elapsed(),
                ));
                best_value = value;
                best = Some(point.clone());
            }
        }
        stats.solve_time = timer.elapsed();
        info!(?status, assignments = stats.nodes, "exhaustive search finished");

        Ok(match best {
            Some(primal) => Solution {
                primal,
                status,
                objective_value: best_value,
                bound: if status == Status::Optimal {
                    best_value
                } else {
                    T::neg_infinity()
                },
                stats,
            },
            None if status == Status::Optimal => {
                Solution::without_incumbent(Status::Infeasible, stats)
            }
            None => Solution::without_incumbent(status, stats),
        })
    }
}
