use fundalloc_core::problem::ProblemError;
use fundalloc_core::traits::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocationError {
    /// Malformed impact/cost vectors, budget, or project records.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Malformed constraint specification.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),
    /// The engine reported an outcome the formulation rules out.
    #[error("internal formulation error: {0}")]
    InternalFormulation(String),
    #[error("solve engine failed: {0}")]
    Engine(EngineError),
}

impl From<ProblemError> for AllocationError {
    fn from(err: ProblemError) -> Self {
        AllocationError::InternalFormulation(err.to_string())
    }
}

impl From<EngineError> for AllocationError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Problem(problem) => problem.into(),
            other => AllocationError::Engine(other),
        }
    }
}
