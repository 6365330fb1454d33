use crate::error::AllocationError;
use fundalloc_core::math::Scalar;
use fundalloc_core::options::{Engine, SolveOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-optimizer solve configuration. Every field has a default, so a
/// scenario file may override any subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub engine: Engine,
    /// Wall-clock limit for one `optimize` call, covering all tie-break stages.
    #[serde(rename = "time_limit_secs", with = "seconds")]
    pub time_limit: Duration,
    /// Node budget for branch-and-bound; exhaustive search is bounded by time.
    pub max_nodes: usize,
    /// Pivot limit for a single LP relaxation.
    pub max_iterations: usize,
    pub feasibility_tolerance: Scalar,
    pub integrality_tolerance: Scalar,
    /// Allowed row violation, relative to the row's largest coefficient.
    pub verification_tolerance: Scalar,
    /// Slack ε used when an earlier objective is pinned by a tie-break stage.
    pub tie_tolerance: Scalar,
    /// Prefer lower cost, then lower index sum, among equal-impact optima.
    pub tie_break: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            time_limit: Duration::from_secs(5),
            max_nodes: 100_000,
            max_iterations: 50_000,
            feasibility_tolerance: 1e-9,
            integrality_tolerance: 1e-6,
            verification_tolerance: 1e-6,
            tie_tolerance: 1e-9,
            tie_break: true,
        }
    }
}

impl OptimizerConfig {
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Scalar) -> Self {
        self.feasibility_tolerance = tolerance;
        self
    }

    pub fn without_tie_break(mut self) -> Self {
        self.tie_break = false;
        self
    }

    pub fn validate(&self) -> Result<(), AllocationError> {
        let tolerances = [
            ("feasibility_tolerance", self.feasibility_tolerance),
            ("integrality_tolerance", self.integrality_tolerance),
            ("verification_tolerance", self.verification_tolerance),
            ("tie_tolerance", self.tie_tolerance),
        ];
        for (name, value) in tolerances {
            if !(value.is_finite() && value > 0.0) {
                return Err(AllocationError::InvalidInput(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if self.integrality_tolerance >= 0.5 {
            return Err(AllocationError::InvalidInput(format!(
                "integrality_tolerance must be below 0.5, got {}",
                self.integrality_tolerance
            )));
        }
        Ok(())
    }

    /// Engine options for one stage. The deadline lives in the shared
    /// `SolveControl`, so `max_time` stays unset here.
    pub fn solve_options(&self) -> SolveOptions<Scalar> {
        SolveOptions {
            tolerance: self.feasibility_tolerance,
            integrality_tolerance: self.integrality_tolerance,
            max_iterations: self.max_iterations,
            max_nodes: self.max_nodes,
            max_time: None,
        }
    }
}

mod seconds {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: OptimizerConfig =
            serde_json::from_str(r#"{"engine": "exhaustive", "time_limit_secs": 0.5}"#).unwrap();
        assert_eq!(config.engine, Engine::Exhaustive);
        assert_eq!(config.time_limit, Duration::from_millis(500));
        assert_eq!(config.max_nodes, 100_000);
        assert!(config.tie_break);
    }

    #[test]
    fn negative_time_limit_is_rejected() {
        let parsed = serde_json::from_str::<OptimizerConfig>(r#"{"time_limit_secs": -1.0}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn rejects_non_positive_tolerances() {
        let config = OptimizerConfig::default().with_tolerance(0.0);
        assert!(matches!(
            config.validate(),
            Err(AllocationError::InvalidInput(_))
        ));
        assert!(OptimizerConfig::default().validate().is_ok());
    }
}
