use approx::assert_abs_diff_eq;
use fundalloc_algos::{BranchAndBound, ExhaustiveSearch};
use fundalloc_core::control::{CancellationToken, SolveControl};
use fundalloc_core::options::SolveOptions;
use fundalloc_core::problem::{MilpProblem, RowSense, VariableKind, WarmStart};
use fundalloc_core::solution::Status;
use fundalloc_core::traits::SolveEngine;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::time::Duration;

fn knapsack(values: &[f64], weights: &[f64], capacity: f64) -> MilpProblem<f64> {
    let cost = values.iter().map(|v| -v).collect::<Vec<_>>();
    let mut problem = MilpProblem::unit_box(cost, vec![VariableKind::Integer; values.len()]);
    problem.constraints.push(
        "capacity",
        weights.iter().copied().enumerate(),
        RowSense::Le,
        capacity,
    );
    problem
}

fn random_problem(n: usize, rng: &mut SmallRng) -> MilpProblem<f64> {
    let values = (0..n)
        .map(|_| rng.gen_range(-2.0..20.0))
        .collect::<Vec<f64>>();
    let weights = (0..n)
        .map(|_| rng.gen_range(1.0..10.0))
        .collect::<Vec<f64>>();
    let capacity = weights.iter().sum::<f64>() * 0.4;
    let mut problem = knapsack(&values, &weights, capacity);
    let a = rng.gen_range(0..n);
    let b = (a + 1) % n;
    problem
        .constraints
        .push("exclusive", vec![(a, 1.0), (b, 1.0)], RowSense::Le, 1.0);
    let c = rng.gen_range(0..n);
    let d = (c + 2) % n;
    problem
        .constraints
        .push("depends", vec![(c, 1.0), (d, -1.0)], RowSense::Le, 0.0);
    problem
        .constraints
        .push("at_least_two", (0..n).map(|i| (i, 1.0)), RowSense::Ge, 2.0);
    problem
}

fn unlimited() -> SolveOptions<f64> {
    SolveOptions {
        max_time: None,
        ..SolveOptions::default()
    }
}

#[test]
fn branch_and_bound_solves_small_knapsack() {
    let problem = knapsack(&[10.0, 6.0, 5.0], &[5.0, 5.0, 5.0], 10.0);
    let solution = BranchAndBound::new()
        .solve(&problem, &unlimited(), &SolveControl::unbounded(), None)
        .expect("solve");
    assert_eq!(solution.status, Status::Optimal);
    assert_eq!(solution.primal, vec![1.0, 1.0, 0.0]);
    assert_abs_diff_eq!(solution.objective_value, -16.0, epsilon = 1e-9);
    assert_abs_diff_eq!(solution.bound, -16.0, epsilon = 1e-9);
}

#[test]
fn branch_and_bound_matches_enumeration() {
    let mut rng = SmallRng::seed_from_u64(7);
    for _ in 0..25 {
        let n = rng.gen_range(3..11);
        let problem = random_problem(n, &mut rng);
        let control = SolveControl::unbounded();
        let exact = ExhaustiveSearch
            .solve(&problem, &unlimited(), &control, None)
            .expect("enumeration");
        let searched = BranchAndBound::new()
            .solve(&problem, &unlimited(), &control, None)
            .expect("branch and bound");
        assert_eq!(searched.status, exact.status);
        if exact.status == Status::Optimal {
            assert_abs_diff_eq!(searched.objective_value, exact.objective_value, epsilon = 1e-6);
            assert!(problem.is_feasible(&searched.primal, 1e-6));
        }
    }
}

#[test]
fn heuristic_does_not_change_the_optimum() {
    let mut rng = SmallRng::seed_from_u64(11);
    for _ in 0..10 {
        let problem = random_problem(9, &mut rng);
        let control = SolveControl::unbounded();
        let with = BranchAndBound::new()
            .solve(&problem, &unlimited(), &control, None)
            .unwrap();
        let without = BranchAndBound::new()
            .without_heuristic()
            .solve(&problem, &unlimited(), &control, None)
            .unwrap();
        assert_eq!(with.status, without.status);
        if with.status == Status::Optimal {
            assert_abs_diff_eq!(with.objective_value, without.objective_value, epsilon = 1e-6);
        }
    }
}

#[test]
fn mixed_problem_keeps_continuous_variables_fractional() {
    let mut problem = knapsack(&[10.0, 6.0, 5.0], &[5.0, 5.0, 5.0], 12.5);
    problem.kinds[2] = VariableKind::Continuous;
    let solution = BranchAndBound::new()
        .solve(&problem, &unlimited(), &SolveControl::unbounded(), None)
        .unwrap();
    assert_eq!(solution.status, Status::Optimal);
    assert_abs_diff_eq!(solution.primal[0], 1.0);
    assert_abs_diff_eq!(solution.primal[1], 1.0);
    assert_abs_diff_eq!(solution.primal[2], 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(solution.objective_value, -18.5, epsilon = 1e-9);
}

#[test]
fn infeasible_rows_are_reported() {
    let mut problem = knapsack(&[1.0, 1.0], &[1.0, 1.0], 5.0);
    problem
        .constraints
        .push("too_many", vec![(0, 1.0), (1, 1.0)], RowSense::Ge, 3.0);
    let engines: [&dyn SolveEngine<f64>; 2] = [&BranchAndBound::new(), &ExhaustiveSearch];
    for engine in engines {
        let solution = engine
            .solve(&problem, &unlimited(), &SolveControl::unbounded(), None)
            .unwrap();
        assert_eq!(solution.status, Status::Infeasible, "{}", engine.name());
        assert!(!solution.has_incumbent());
    }
}

#[test]
fn unbounded_relaxation_is_reported() {
    let mut problem = MilpProblem::unit_box(vec![-1.0], vec![VariableKind::Integer]);
    problem.bounds.upper[0] = f64::INFINITY;
    let solution = BranchAndBound::new()
        .solve(&problem, &unlimited(), &SolveControl::unbounded(), None)
        .unwrap();
    assert_eq!(solution.status, Status::Unbounded);
}

#[test]
fn cancelled_search_returns_warm_start() {
    let problem = knapsack(&[10.0, 6.0, 5.0], &[5.0, 5.0, 5.0], 10.0);
    let token = CancellationToken::new();
    token.cancel();
    let control = SolveControl::new(None, token);
    let warm = WarmStart::new(vec![0.0, 1.0, 1.0]);
    let solution = BranchAndBound::new()
        .solve(&problem, &unlimited(), &control, Some(&warm))
        .unwrap();
    assert_eq!(solution.status, Status::Cancelled);
    assert_eq!(solution.primal, vec![0.0, 1.0, 1.0]);
    assert_abs_diff_eq!(solution.objective_value, -11.0);
}

#[test]
fn expired_deadline_without_incumbent() {
    let problem = knapsack(&[10.0, 6.0, 5.0], &[5.0, 5.0, 5.0], 10.0);
    let control = SolveControl::new(Some(Duration::ZERO), CancellationToken::new());
    let solution = BranchAndBound::new()
        .solve(&problem, &unlimited(), &control, None)
        .unwrap();
    assert_eq!(solution.status, Status::TimeLimit);
    assert!(!solution.has_incumbent());
}

#[test]
fn per_call_time_limit_applies_without_caller_deadline() {
    let problem = knapsack(&[10.0, 6.0, 5.0], &[5.0, 5.0, 5.0], 10.0);
    let options = unlimited().with_time_limit(Duration::ZERO);
    let engines: [&dyn SolveEngine<f64>; 2] = [&BranchAndBound::new(), &ExhaustiveSearch];
    for engine in engines {
        let solution = engine
            .solve(&problem, &options, &SolveControl::unbounded(), None)
            .unwrap();
        assert_eq!(solution.status, Status::TimeLimit, "{}", engine.name());
    }
}

#[test]
fn node_limit_keeps_best_incumbent() {
    // Root relaxation: x = (1, 1, 1/3, 2/3, 0, 0).
    let mut problem = knapsack(
        &[10.0, 9.0, 8.0, 7.0, 6.0, 5.0],
        &[4.0, 4.0, 4.0, 1.0, 1.0, 1.0],
        10.0,
    );
    problem
        .constraints
        .push("one_small", vec![(3, 1.0), (4, 1.0), (5, 1.0)], RowSense::Le, 1.0);
    problem
        .constraints
        .push("at_most_three", (0..6).map(|i| (i, 1.0)), RowSense::Le, 3.0);
    let options = unlimited().with_max_nodes(1);
    let solution = BranchAndBound::new()
        .solve(&problem, &options, &SolveControl::unbounded(), None)
        .unwrap();
    assert_eq!(solution.status, Status::NodeLimit);
    assert!(solution.has_incumbent());
    assert_eq!(solution.stats.nodes, 1);
    assert!(problem.is_feasible(&solution.primal, 1e-6));
    assert!(solution.bound < solution.objective_value);
}

#[test]
fn infeasible_warm_start_is_ignored() {
    let problem = knapsack(&[10.0, 6.0, 5.0], &[5.0, 5.0, 5.0], 10.0);
    let warm = WarmStart::new(vec![1.0, 1.0, 1.0]);
    let solution = BranchAndBound::new()
        .solve(&problem, &unlimited(), &SolveControl::unbounded(), Some(&warm))
        .unwrap();
    assert_eq!(solution.status, Status::Optimal);
    assert_eq!(solution.primal, vec![1.0, 1.0, 0.0]);
}
