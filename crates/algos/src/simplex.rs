//! Dense two-phase primal simplex for the LP relaxation of a [`MilpProblem`].
//!
//! Variables are shifted to `y = x - lower`; finite upper bounds become
//! explicit rows and variables whose bounds coincide are substituted out.
//! Pricing uses Dantzig's rule and falls back to Bland's rule after a run of
//! degenerate pivots, so the pivot sequence is deterministic and cannot cycle.

use fundalloc_core::control::{Interrupt, SolveControl};
use fundalloc_core::math::{cast, scaled_tolerance, RealNumber};
use fundalloc_core::options::SolveOptions;
use fundalloc_core::problem::{MilpProblem, RowSense};
use fundalloc_core::traits::EngineError;
use fundalloc_linsys::DenseTableau;

const DEGENERATE_STREAK_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
    Interrupted(Interrupt),
}

#[derive(Debug, Clone)]
pub struct LpSolution<T: RealNumber> {
    pub status: LpStatus,
    /// Populated only for [`LpStatus::Optimal`].
    pub primal: Vec<T>,
    pub objective: T,
    pub iterations: usize,
}

impl<T> LpSolution<T>
where
    T: RealNumber,
{
    fn terminal(status: LpStatus, iterations: usize) -> Self {
        Self {
            status,
            primal: Vec::new(),
            objective: T::infinity(),
            iterations,
        }
    }
}

struct StandardRow<T> {
    entries: Vec<(usize, T)>,
    sense: RowSense,
    rhs: T,
}

enum Pricing {
    Optimal,
    Unbounded,
    Limit(LpStatus),
}

pub struct SimplexSolver<'a, T: RealNumber> {
    problem: &'a MilpProblem<T>,
    options: &'a SolveOptions<T>,
    control: &'a SolveControl,
}

impl<'a, T> SimplexSolver<'a, T>
where
    T: RealNumber,
{
    pub fn new(
        problem: &'a MilpProblem<T>,
        options: &'a SolveOptions<T>,
        control: &'a SolveControl,
    ) -> Self {
        Self {
            problem,
            options,
            control,
        }
    }

    fn pivot_tolerance() -> T {
        cast(1e-9)
    }

    /// Solves the relaxation with the variable bounds replaced by `lower`/`upper`.
    pub fn solve(&self, lower: &[T], upper: &[T]) -> Result<LpSolution<T>, EngineError> {
        let n = self.problem.nvars();
        let tol = self.options.tolerance;
        if lower.len() != n || upper.len() != n {
            return Err(EngineError::Numerical(format!(
                "bound vectors of length {}/{} for {} variables",
                lower.len(),
                upper.len(),
                n
            )));
        }
        if lower.iter().zip(upper.iter()).any(|(lo, hi)| *lo > *hi + tol) {
            return Ok(LpSolution::terminal(LpStatus::Infeasible, 0));
        }

        let mut column_of = vec![None; n];
        let mut free_vars = Vec::new();
        for var in 0..n {
            if upper[var] - lower[var] > tol {
                column_of[var] = Some(free_vars.len());
                free_vars.push(var);
            }
        }
        let structural = free_vars.len();

        let Some(rows) = self.standard_rows(lower, upper, &column_of, &free_vars) else {
            return Ok(LpSolution::terminal(LpStatus::Infeasible, 0));
        };
        let m = rows.len();
        let slack_count = rows.iter().filter(|row| row.sense != RowSense::Eq).count();
        let artificial_count = rows.iter().filter(|row| row.sense != RowSense::Le).count();
        let first_artificial = structural + slack_count;
        let rhs_col = first_artificial + artificial_count;

        let mut tableau = DenseTableau::new(m + 1, rhs_col + 1);
        let mut basis = vec![0usize; m];
        let mut next_slack = structural;
        let mut next_artificial = first_artificial;
        for (i, row) in rows.iter().enumerate() {
            for &(col, value) in &row.entries {
                tableau.set(i, col, value);
            }
            tableau.set(i, rhs_col, row.rhs);
            match row.sense {
                RowSense::Le => {
                    tableau.set(i, next_slack, T::one());
                    basis[i] = next_slack;
                    next_slack += 1;
                }
                RowSense::Ge => {
                    tableau.set(i, next_slack, -T::one());
                    next_slack += 1;
                    tableau.set(i, next_artificial, T::one());
                    basis[i] = next_artificial;
                    next_artificial += 1;
                }
                RowSense::Eq => {
                    tableau.set(i, next_artificial, T::one());
                    basis[i] = next_artificial;
                    next_artificial += 1;
                }
            }
        }

        let mut iterations = 0;
        if artificial_count > 0 {
            for col in first_artificial..rhs_col {
                tableau.set(m, col, T::one());
            }
            for i in 0..m {
                if basis[i] >= first_artificial {
                    tableau.add_scaled_row(m, i, -T::one());
                }
            }
            match self.iterate(&mut tableau, &mut basis, rhs_col, &mut iterations)? {
                Pricing::Optimal => {}
                Pricing::Unbounded => {
                    return Err(EngineError::Numerical(
                        "phase one reported an unbounded ray".into(),
                    ))
                }
                Pricing::Limit(status) => return Ok(LpSolution::terminal(status, iterations)),
            }
            let rhs_scale = rows
                .iter()
                .fold(T::zero(), |acc, row| acc.max(row.rhs.abs()));
            let infeasibility = -tableau.get(m, rhs_col);
            if infeasibility > scaled_tolerance(tol, rhs_scale) {
                return Ok(LpSolution::terminal(LpStatus::Infeasible, iterations));
            }
            for i in 0..m {
                if basis[i] < first_artificial {
                    continue;
                }
                let replacement = (0..first_artificial)
                    .find(|&col| tableau.get(i, col).abs() > Self::pivot_tolerance());
                if let Some(col) = replacement {
                    tableau
                        .pivot(i, col)
                        .map_err(|err| EngineError::Numerical(err.to_string()))?;
                    basis[i] = col;
                    iterations += 1;
                }
            }
        }

        for value in tableau.row_mut(m) {
            *value = T::zero();
        }
        for (col, &var) in free_vars.iter().enumerate() {
            tableau.set(m, col, self.problem.cost[var]);
        }
        for i in 0..m {
            if basis[i] < structural {
                let cost = self.problem.cost[free_vars[basis[i]]];
                tableau.add_scaled_row(m, i, -cost);
            }
        }
        match self.iterate(&mut tableau, &mut basis, first_artificial, &mut iterations)? {
            Pricing::Optimal => {}
            Pricing::Unbounded => {
                return Ok(LpSolution::terminal(LpStatus::Unbounded, iterations))
            }
            Pricing::Limit(status) => return Ok(LpSolution::terminal(status, iterations)),
        }

        let mut primal = lower.to_vec();
        for (i, &col) in basis.iter().enumerate() {
            if col < structural {
                let var = free_vars[col];
                primal[var] = lower[var] + tableau.get(i, rhs_col).max(T::zero());
            }
        }
        let shift = self
            .problem
            .cost
            .iter()
            .zip(lower.iter())
            .fold(T::zero(), |acc, (c, lo)| acc + *c * *lo);
        Ok(LpSolution {
            status: LpStatus::Optimal,
            primal,
            objective: shift - tableau.get(m, rhs_col),
            iterations,
        })
    }

    /// Shifted rows with non-negative right-hand sides, or `None` if a row
    /// without free variables is already violated.
    fn standard_rows(
        &self,
        lower: &[T],
        upper: &[T],
        column_of: &[Option<usize>],
        free_vars: &[usize],
    ) -> Option<Vec<StandardRow<T>>> {
        let tol = self.options.tolerance;
        let constraints = &self.problem.constraints;
        let mut rows = Vec::with_capacity(constraints.len() + free_vars.len());
        for i in 0..constraints.len() {
            let (cols, values) = constraints.matrix.row(i);
            let mut rhs = constraints.rhs[i];
            let mut entries = Vec::with_capacity(cols.len());
            for (&var, &value) in cols.iter().zip(values.iter()) {
                rhs -= value * lower[var];
                if let Some(col) = column_of[var] {
                    entries.push((col, value));
                }
            }
            let sense = constraints.senses[i];
            if entries.is_empty() {
                let violated = match sense {
                    RowSense::Le => rhs < -tol,
                    RowSense::Ge => rhs > tol,
                    RowSense::Eq => rhs.abs() > tol,
                };
                if violated {
                    return None;
                }
                continue;
            }
            rows.push(StandardRow { entries, sense, rhs });
        }
        for (col, &var) in free_vars.iter().enumerate() {
            if upper[var].is_finite() {
                rows.push(StandardRow {
                    entries: vec![(col, T::one())],
                    sense: RowSense::Le,
                    rhs: upper[var] - lower[var],
                });
            }
        }
        for row in &mut rows {
            if row.rhs < T::zero() {
                for entry in &mut row.entries {
                    entry.1 = -entry.1;
                }
                row.rhs = -row.rhs;
                row.sense = row.sense.flipped();
            }
        }
        Some(rows)
    }

    /// Pivots until no column below `column_limit` has a negative reduced cost.
    fn iterate(
        &self,
        tableau: &mut DenseTableau<T>,
        basis: &mut [usize],
        column_limit: usize,
        iterations: &mut usize,
    ) -> Result<Pricing, EngineError> {
        let m = basis.len();
        let rhs_col = tableau.cols() - 1;
        let tol = self.options.tolerance;
        let pivot_tol = Self::pivot_tolerance();
        let mut degenerate_streak = 0;
        loop {
            if let Some(interrupt) = self.control.interrupted() {
                return Ok(Pricing::Limit(LpStatus::Interrupted(interrupt)));
            }
            if *iterations >= self.options.max_iterations {
                return Ok(Pricing::Limit(LpStatus::IterationLimit));
            }

            let entering = if degenerate_streak >= DEGENERATE_STREAK_LIMIT {
                (0..column_limit).find(|&col| tableau.get(m, col) < -tol)
            } else {
                let mut best: Option<(usize, T)> = None;
                for col in 0..column_limit {
                    let reduced = tableau.get(m, col);
                    if reduced < -tol && best.map_or(true, |(_, value)| reduced < value) {
                        best = Some((col, reduced));
                    }
                }
                best.map(|(col, _)| col)
            };
            let Some(entering) = entering else {
                return Ok(Pricing::Optimal);
            };

            let mut leaving: Option<(usize, T)> = None;
            for i in 0..m {
                let coefficient = tableau.get(i, entering);
                if coefficient <= pivot_tol {
                    continue;
                }
                let ratio = tableau.get(i, rhs_col).max(T::zero()) / coefficient;
                leaving = match leaving {
                    None => Some((i, ratio)),
                    Some((row, best)) => {
                        let tie = (ratio - best).abs() <= tol;
                        if (!tie && ratio < best) || (tie && basis[i] < basis[row]) {
                            Some((i, ratio))
                        } else {
                            Some((row, best))
                        }
                    }
                };
            }
            let Some((row, ratio)) = leaving else {
                return Ok(Pricing::Unbounded);
            };

            tableau
                .pivot(row, entering)
                .map_err(|err| EngineError::Numerical(err.to_string()))?;
            basis[row] = entering;
            *iterations += 1;
            if ratio <= tol {
                degenerate_streak += 1;
            } else {
                degenerate_streak = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundalloc_core::problem::VariableKind;

    fn solve(problem: &MilpProblem<f64>) -> LpSolution<f64> {
        let options = SolveOptions::default();
        let control = SolveControl::unbounded();
        SimplexSolver::new(problem, &options, &control)
            .solve(&problem.bounds.lower, &problem.bounds.upper)
            .unwrap()
    }

    #[test]
    fn fractional_knapsack_relaxation() {
        let mut problem = MilpProblem::unit_box(
            vec![-10.0, -6.0, -5.0],
            vec![VariableKind::Continuous; 3],
        );
        problem
            .constraints
            .push("budget", vec![(0, 5.0), (1, 5.0), (2, 5.0)], RowSense::Le, 7.5);
        let lp = solve(&problem);
        assert_eq!(lp.status, LpStatus::Optimal);
        assert!((lp.primal[0] - 1.0).abs() < 1e-9);
        assert!((lp.primal[1] - 0.5).abs() < 1e-9);
        assert!(lp.primal[2].abs() < 1e-9);
        assert!((lp.objective + 13.0).abs() < 1e-9);
    }

    #[test]
    fn greater_equal_rows_need_phase_one() {
        let mut problem = MilpProblem::unit_box(
            vec![3.0, 1.0],
            vec![VariableKind::Continuous; 2],
        );
        problem
            .constraints
            .push("cover", vec![(0, 1.0), (1, 1.0)], RowSense::Ge, 1.5);
        let lp = solve(&problem);
        assert_eq!(lp.status, LpStatus::Optimal);
        assert!((lp.primal[0] - 0.5).abs() < 1e-9);
        assert!((lp.primal[1] - 1.0).abs() < 1e-9);
        assert!((lp.objective - 2.5).abs() < 1e-9);
    }

    #[test]
    fn detects_infeasibility() {
        let mut problem = MilpProblem::unit_box(
            vec![1.0, 1.0],
            vec![VariableKind::Continuous; 2],
        );
        problem
            .constraints
            .push("too_many", vec![(0, 1.0), (1, 1.0)], RowSense::Ge, 3.0);
        assert_eq!(solve(&problem).status, LpStatus::Infeasible);
    }

    #[test]
    fn detects_unbounded_direction() {
        let mut problem = MilpProblem::unit_box(vec![-1.0], vec![VariableKind::Continuous]);
        problem.bounds.upper[0] = f64::INFINITY;
        assert_eq!(solve(&problem).status, LpStatus::Unbounded);
    }

    #[test]
    fn fixed_variables_are_substituted() {
        let mut problem = MilpProblem::unit_box(
            vec![-1.0, -1.0],
            vec![VariableKind::Continuous; 2],
        );
        problem
            .constraints
            .push("pair", vec![(0, 1.0), (1, 1.0)], RowSense::Eq, 1.25);
        let options: SolveOptions<f64> = SolveOptions::default();
        let control = SolveControl::unbounded();
        let lp = SimplexSolver::new(&problem, &options, &control)
            .solve(&[1.0, 0.0], &[1.0, 1.0])
            .unwrap();
        assert_eq!(lp.status, LpStatus::Optimal);
        assert_eq!(lp.primal[0], 1.0);
        assert!((lp.primal[1] - 0.25).abs() < 1e-9);

        let lp = SimplexSolver::new(&problem, &options, &control)
            .solve(&[1.0, 1.0], &[1.0, 1.0])
            .unwrap();
        assert_eq!(lp.status, LpStatus::Infeasible);
    }

    #[test]
    fn honours_cancellation() {
        let problem = MilpProblem::unit_box(vec![-1.0], vec![VariableKind::Continuous]);
        let options = SolveOptions::default();
        let token = fundalloc_core::control::CancellationToken::new();
        token.cancel();
        let control = SolveControl::new(None, token);
        let lp = SimplexSolver::new(&problem, &options, &control)
            .solve(&problem.bounds.lower, &problem.bounds.upper)
            .unwrap();
        assert_eq!(lp.status, LpStatus::Interrupted(Interrupt::Cancelled));
    }
}
