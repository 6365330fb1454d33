use crate::control::SolveControl;
use crate::math::RealNumber;
use crate::options::SolveOptions;
use crate::problem::{MilpProblem, ProblemError, ProblemResult, WarmStart};
use crate::solution::Solution;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error("{engine} cannot solve this problem: {reason}")]
    Unsupported {
        engine: &'static str,
        reason: String,
    },
    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// A mixed-integer linear solver. Implementations hold no per-call state, so a
/// single engine may serve concurrent solves.
pub trait SolveEngine<T: RealNumber>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimises `problem.cost · x`. Limits and cancellation are reported
    /// through `Solution::status`, never as errors. A feasible `warm_start`
    /// seeds the incumbent.
    fn solve(
        &self,
        problem: &MilpProblem<T>,
        options: &SolveOptions<T>,
        control: &SolveControl,
        warm_start: Option<&WarmStart<T>>,
    ) -> Result<Solution<T>, EngineError>;
}

pub trait Scaler<T: RealNumber> {
    fn scale(&mut self, problem: &mut MilpProblem<T>) -> ProblemResult<()>;

    fn unscale_primal(&self, _primal: &mut [T]) {}
}
