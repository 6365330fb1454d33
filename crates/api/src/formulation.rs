use crate::constraints::{Constraint, ConstraintSpec, Measure, NamedConstraint};
use crate::error::AllocationError;
use fundalloc_core::math::{is_integral, norm_inf, scaled_tolerance, Scalar};
use fundalloc_core::problem::{MilpProblem, RowSense, VariableKind};
use itertools::Itertools;

pub(crate) const BUDGET_ROW: &str = "budget";

pub(crate) enum Formulation {
    Model(MilpProblem<Scalar>),
    /// Funding limits leave `project` with no admissible decision.
    EmptyDomain { project: usize },
}

/// Builds the impact-maximising MILP (stated as a minimisation of negated
/// impact). Assumes inputs and `spec` were validated.
pub(crate) fn formulate(
    impacts: &[Scalar],
    costs: &[Scalar],
    budget: Scalar,
    spec: &ConstraintSpec,
    fractional: &[bool],
    integrality_tolerance: Scalar,
) -> Formulation {
    let n = impacts.len();
    let kinds = fractional
        .iter()
        .map(|&partial| {
            if partial {
                VariableKind::Continuous
            } else {
                VariableKind::Integer
            }
        })
        .collect();
    let mut problem = MilpProblem::unit_box(impacts.iter().map(|v| -v).collect(), kinds);

    for named in &spec.constraints {
        if let Constraint::FundingLimit {
            project,
            min_share,
            max_share,
        } = named.constraint
        {
            let lower = &mut problem.bounds.lower[project];
            *lower = lower.max(min_share.unwrap_or(0.0));
            let upper = &mut problem.bounds.upper[project];
            *upper = upper.min(max_share.unwrap_or(1.0));
        }
    }
    for project in 0..n {
        if problem.is_integer(project) {
            problem.bounds.lower[project] = (problem.bounds.lower[project] - integrality_tolerance).ceil();
            problem.bounds.upper[project] = (problem.bounds.upper[project] + integrality_tolerance).floor();
        }
        if problem.bounds.lower[project] > problem.bounds.upper[project] {
            return Formulation::EmptyDomain { project };
        }
    }

    problem.constraints.push(
        BUDGET_ROW,
        costs.iter().copied().enumerate(),
        RowSense::Le,
        budget,
    );
    for NamedConstraint { name, constraint } in &spec.constraints {
        let rows = &mut problem.constraints;
        match constraint {
            Constraint::GroupCap {
                group,
                measure,
                min,
                max,
            } => {
                let members = spec.groups.get(group).map_or(&[][..], Vec::as_slice);
                let entries = members
                    .iter()
                    .copied()
                    .sorted()
                    .dedup()
                    .map(|i| match measure {
                        Measure::Cost => (i, costs[i]),
                        Measure::Count => (i, 1.0),
                    })
                    .collect::<Vec<_>>();
                if let Some(hi) = max {
                    rows.push(format!("{name}:max"), entries.clone(), RowSense::Le, *hi);
                }
                if let Some(lo) = min {
                    rows.push(format!("{name}:min"), entries, RowSense::Ge, *lo);
                }
            }
            Constraint::MutualExclusion { projects } => {
                let entries = projects.iter().copied().sorted().dedup().map(|i| (i, 1.0));
                rows.push(name.clone(), entries, RowSense::Le, 1.0);
            }
            Constraint::Dependency { project, requires } if project != requires => {
                rows.push(
                    name.clone(),
                    [(*project, 1.0), (*requires, -1.0)],
                    RowSense::Le,
                    0.0,
                );
            }
            Constraint::Cardinality { min, max } => {
                if let Some(hi) = max {
                    rows.push(format!("{name}:max"), (0..n).map(|i| (i, 1.0)), RowSense::Le, *hi as Scalar);
                }
                if let Some(lo) = min {
                    rows.push(format!("{name}:min"), (0..n).map(|i| (i, 1.0)), RowSense::Ge, *lo as Scalar);
                }
            }
            Constraint::Dependency { .. }
            | Constraint::FundingLimit { .. }
            | Constraint::FractionalAllowance { .. } => {}
        }
    }
    Formulation::Model(problem)
}

/// Next lexicographic stage: `previous` plus a row pinning the objective just
/// optimised, minimising `next_cost`.
pub(crate) fn pinned_stage(
    previous: &MilpProblem<Scalar>,
    name: &str,
    pinned: &[Scalar],
    sense: RowSense,
    rhs: Scalar,
    next_cost: Vec<Scalar>,
) -> MilpProblem<Scalar> {
    let mut stage = previous.clone().with_cost(next_cost);
    stage
        .constraints
        .push(name, pinned.iter().copied().enumerate(), sense, rhs);
    stage
}

/// Rounds integer decisions and clamps every decision into its bounds.
pub(crate) fn decisions_from(problem: &MilpProblem<Scalar>, primal: &[Scalar]) -> Vec<Scalar> {
    primal
        .iter()
        .enumerate()
        .map(|(var, &value)| {
            let value = if problem.is_integer(var) {
                value.round()
            } else {
                value
            };
            // `+ 0.0` folds -0.0 into 0.0
            value
                .max(problem.bounds.lower[var])
                .min(problem.bounds.upper[var])
                + 0.0
        })
        .collect()
}

/// Checks `x` against every row and bound of `problem`. Row violations are
/// measured relative to the row's largest coefficient.
pub(crate) fn verify(
    problem: &MilpProblem<Scalar>,
    x: &[Scalar],
    tolerance: Scalar,
) -> Result<(), AllocationError> {
    let constraints = &problem.constraints;
    let activities = constraints.activities(x)?;
    for (row, activity) in activities.into_iter().enumerate() {
        let (_, coefficients) = constraints.matrix.row(row);
        let scale = norm_inf(coefficients).max(1.0);
        let violation = constraints.violation(row, activity) / scale;
        if violation > scaled_tolerance(tolerance, constraints.rhs[row] / scale) {
            return Err(AllocationError::InternalFormulation(format!(
                "decision violates '{}' by {violation:e}",
                constraints.names[row]
            )));
        }
    }
    for (var, &value) in x.iter().enumerate() {
        let (lo, hi) = (problem.bounds.lower[var], problem.bounds.upper[var]);
        if value < lo - tolerance || value > hi + tolerance {
            return Err(AllocationError::InternalFormulation(format!(
                "decision {value} for project {var} is outside [{lo}, {hi}]"
            )));
        }
        if problem.is_integer(var) && !is_integral(value, tolerance) {
            return Err(AllocationError::InternalFormulation(format!(
                "all-or-nothing project {var} received decision {value}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(formulation: Formulation) -> MilpProblem<Scalar> {
        match formulation {
            Formulation::Model(problem) => problem,
            Formulation::EmptyDomain { project } => panic!("empty domain for {project}"),
        }
    }

    #[test]
    fn builds_one_row_per_declared_side() {
        let spec = ConstraintSpec::new()
            .with_group("health", [0, 1, 1])
            .group_cap("health_cost", "health", Measure::Cost, Some(1.0), Some(5.0))
            .mutual_exclusion("pick_one", [2, 0, 2])
            .dependency("self", 1, 1)
            .cardinality("count", None, Some(2));
        let problem = model(formulate(
            &[10.0, 6.0, 5.0],
            &[5.0, 5.0, 5.0],
            10.0,
            &spec,
            &[false; 3],
            1e-6,
        ));
        assert_eq!(
            problem.constraints.names,
            ["budget", "health_cost:max", "health_cost:min", "pick_one", "count:max"]
        );
        assert_eq!(problem.constraints.matrix.row(1), (&[0, 1][..], &[5.0, 5.0][..]));
        assert_eq!(problem.constraints.matrix.row(3), (&[0, 2][..], &[1.0, 1.0][..]));
        assert_eq!(problem.cost, vec![-10.0, -6.0, -5.0]);
    }

    #[test]
    fn funding_limits_round_inward_for_binaries() {
        let spec = ConstraintSpec::new()
            .funding_limit("partial", 0, Some(0.3), Some(0.8))
            .funding_limit("forced", 1, Some(1.0), None);
        let formulation = formulate(
            &[1.0, 1.0, 1.0],
            &[1.0, 1.0, 1.0],
            3.0,
            &spec,
            &[false; 3],
            1e-6,
        );
        assert!(matches!(formulation, Formulation::EmptyDomain { project: 0 }));

        let problem = model(formulate(
            &[1.0, 1.0, 1.0],
            &[1.0, 1.0, 1.0],
            3.0,
            &spec,
            &[true, false, false],
            1e-6,
        ));
        assert_eq!(problem.bounds.lower, vec![0.3, 1.0, 0.0]);
        assert_eq!(problem.bounds.upper, vec![0.8, 1.0, 1.0]);
    }

    #[test]
    fn verification_is_relative_to_row_scale() {
        let problem = model(formulate(
            &[1.0, 1.0],
            &[2.5e6, 2.5e6],
            5.0e6,
            &ConstraintSpec::new(),
            &[true, true],
            1e-6,
        ));
        assert!(verify(&problem, &[1.0, 1.0 + 1e-9], 1e-6).is_ok());
        assert!(matches!(
            verify(&problem, &[1.0, 1.1], 1e-6),
            Err(AllocationError::InternalFormulation(_))
        ));
    }

    #[test]
    fn decisions_are_snapped_and_clamped() {
        let problem = model(formulate(
            &[1.0, 1.0],
            &[1.0, 1.0],
            2.0,
            &ConstraintSpec::new(),
            &[false, true],
            1e-6,
        ));
        assert_eq!(decisions_from(&problem, &[0.9999999, -1e-12]), vec![1.0, 0.0]);
    }
}
