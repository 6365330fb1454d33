use crate::heuristics::round_and_raise;
use crate::simplex::{LpStatus, SimplexSolver};
use fundalloc_core::control::SolveControl;
use fundalloc_core::math::{cast, fractionality, project_box, scaled_tolerance, RealNumber, Timer};
use fundalloc_core::options::SolveOptions;
use fundalloc_core::problem::{MilpProblem, WarmStart};
use fundalloc_core::scaling::RowEquilibrator;
use fundalloc_core::solution::{Solution, Status};
use fundalloc_core::stats::{IncumbentRecord, SolveStats};
use fundalloc_core::traits::{EngineError, Scaler, SolveEngine};
use tracing::{debug, info, warn};

/// Depth-first branch-and-bound over simplex relaxations.
///
/// Branches on the most fractional integer variable (lowest index on ties)
/// and explores the rounded-up child first.
#[derive(Debug, Clone, Copy)]
pub struct BranchAndBound {
    rounding_heuristic: bool,
}

impl BranchAndBound {
    pub fn new() -> Self {
        Self {
            rounding_heuristic: true,
        }
    }

    pub fn without_heuristic(mut self) -> Self {
        self.rounding_heuristic = false;
        self
    }
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self::new()
    }
}

struct Node<T> {
    lower: Vec<T>,
    upper: Vec<T>,
    bound: T,
    depth: usize,
}

struct Search<'a, T: RealNumber> {
    original: &'a MilpProblem<T>,
    scaled: &'a MilpProblem<T>,
    options: &'a SolveOptions<T>,
    control: &'a SolveControl,
    incumbent: Option<Vec<T>>,
    incumbent_value: T,
    stats: SolveStats<T>,
    timer: Timer,
    rounding: bool,
}

impl<'a, T> Search<'a, T>
where
    T: RealNumber,
{
    fn prunable(&self, bound: T) -> bool {
        self.incumbent.is_some()
            && bound >= self.incumbent_value - scaled_tolerance(self.options.tolerance, self.incumbent_value)
    }

    fn acceptance_tolerance(&self) -> T {
        let n: T = cast(self.original.nvars().max(1) as f64);
        self.options.integrality_tolerance * n
    }

    fn offer(&mut self, point: Vec<T>, value: T, bound: T) {
        if self.incumbent.is_some()
            && value >= self.incumbent_value - scaled_tolerance(self.options.tolerance, self.incumbent_value)
        {
            return;
        }
        debug!(
            node = self.stats.nodes,
            objective = value.to_f64().unwrap_or(f64::NAN),
            "new incumbent"
        );
        self.stats.push(IncumbentRecord::new(
            self.stats.nodes,
            value,
            bound,
            self.timer.elapsed(),
        ));
        self.incumbent = Some(point);
        self.incumbent_value = value;
    }

    fn seed(&mut self, warm_start: Option<&WarmStart<T>>) {
        let Some(warm) = warm_start else {
            return;
        };
        if warm.primal.len() != self.original.nvars() {
            warn!(
                expected = self.original.nvars(),
                got = warm.primal.len(),
                "ignoring warm start with wrong dimension"
            );
            return;
        }
        if self
            .scaled
            .is_feasible(&warm.primal, self.acceptance_tolerance())
        {
            let value = self.original.objective(&warm.primal);
            self.offer(warm.primal.clone(), value, T::neg_infinity());
        } else {
            debug!("warm start is infeasible; searching from scratch");
        }
    }

    /// Rounds the integer coordinates of an integral LP point.
    fn snap(&self, mut point: Vec<T>, node: &Node<T>) -> Vec<T> {
        for var in 0..point.len() {
            if self.original.is_integer(var) {
                point[var] = point[var].round();
            }
        }
        project_box(&mut point, &node.lower, &node.upper);
        point
    }

    fn branching_variable(&self, point: &[T]) -> Option<usize> {
        let mut best: Option<(usize, T)> = None;
        for (var, &value) in point.iter().enumerate() {
            if !self.original.is_integer(var) {
                continue;
            }
            let frac = fractionality(value);
            if frac <= self.options.integrality_tolerance {
                continue;
            }
            if best.map_or(true, |(_, current)| frac > current) {
                best = Some((var, frac));
            }
        }
        best.map(|(var, _)| var)
    }

    fn run(&mut self) -> Result<(Status, T), EngineError> {
        let mut root = Node {
            lower: self.scaled.bounds.lower.clone(),
            upper: self.scaled.bounds.upper.clone(),
            bound: T::neg_infinity(),
            depth: 0,
        };
        let int_tol = self.options.integrality_tolerance;
        for var in 0..self.scaled.nvars() {
            if self.scaled.is_integer(var) {
                root.lower[var] = (root.lower[var] - int_tol).ceil();
                if root.upper[var].is_finite() {
                    root.upper[var] = (root.upper[var] + int_tol).floor();
                }
            }
        }
        if root.lower.iter().zip(root.upper.iter()).any(|(lo, hi)| lo > hi) {
            return Ok((Status::Infeasible, T::infinity()));
        }

        let mut stack = vec![root];
        let mut stopped: Option<Status> = None;
        while let Some(node) = stack.pop() {
            if let Some(interrupt) = self.control.interrupted() {
                stack.push(node);
                stopped = Some(interrupt.into());
                break;
            }
            if self.stats.nodes >= self.options.max_nodes {
                stack.push(node);
                stopped = Some(Status::NodeLimit);
                break;
            }
            if self.prunable(node.bound) {
                continue;
            }
            self.stats.nodes += 1;

            let lp = SimplexSolver::new(self.scaled, self.options, self.control)
                .solve(&node.lower, &node.upper)?;
            self.stats.lp_iterations += lp.iterations;
            match lp.status {
                LpStatus::Optimal => {}
                LpStatus::Infeasible => continue,
                LpStatus::Unbounded => return Ok((Status::Unbounded, T::neg_infinity())),
                LpStatus::IterationLimit => {
                    stack.push(node);
                    stopped = Some(Status::IterationLimit);
                    break;
                }
                LpStatus::Interrupted(interrupt) => {
                    stack.push(node);
                    stopped = Some(interrupt.into());
                    break;
                }
            }
            if self.prunable(lp.objective) {
                continue;
            }

            match self.branching_variable(&lp.primal) {
                None => {
                    let snapped = self.snap(lp.primal.clone(), &node);
                    if self.scaled.is_feasible(&snapped, self.acceptance_tolerance()) {
                        self.offer(snapped, lp.objective, lp.objective);
                    } else {
                        warn!(
                            node = self.stats.nodes,
                            "rounded LP point violates rows; keeping the unrounded point"
                        );
                        self.offer(lp.primal, lp.objective, lp.objective);
                    }
                }
                Some(var) => {
                    if self.rounding && node.depth == 0 && self.incumbent.is_none() {
                        self.try_rounding(&lp.primal, &node);
                    }
                    let value = lp.primal[var];
                    let mut down = Node {
                        lower: node.lower.clone(),
                        upper: node.upper.clone(),
                        bound: lp.objective,
                        depth: node.depth + 1,
                    };
                    down.upper[var] = value.floor();
                    let mut up = node;
                    up.lower[var] = value.ceil();
                    up.bound = lp.objective;
                    up.depth += 1;
                    stack.push(down);
                    stack.push(up);
                }
            }
        }

        let open_bound = stack
            .iter()
            .map(|node| node.bound)
            .fold(self.incumbent_value, |acc, bound| acc.min(bound));
        let status = match stopped {
            Some(status) => status,
            None if self.incumbent.is_some() => Status::Optimal,
            None => Status::Infeasible,
        };
        Ok((status, open_bound))
    }

    fn try_rounding(&mut self, lp_primal: &[T], node: &Node<T>) {
        if let Some(point) = round_and_raise(
            self.scaled,
            lp_primal,
            &node.lower,
            &node.upper,
            self.options.integrality_tolerance,
        ) {
            let value = self.original.objective(&point);
            self.offer(point, value, T::neg_infinity());
        }
    }
}

impl<T> SolveEngine<T> for BranchAndBound
where
    T: RealNumber,
{
    fn name(&self) -> &'static str {
        "branch_and_bound"
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
        let mut scaled = problem.clone();
        let mut scaler = RowEquilibrator::new();
        scaler.scale(&mut scaled)?;

        let mut search = Search {
            original: problem,
            scaled: &scaled,
            options,
            control,
            incumbent: None,
            incumbent_value: T::infinity(),
            stats: SolveStats::new(),
            timer: Timer::start(),
            rounding: self.rounding_heuristic,
        };
        search.seed(warm_start);
        let (status, bound) = search.run()?;
        search.stats.solve_time = search.timer.elapsed();
        let stats = search.stats;

        if status.is_interrupted() {
            warn!(?status, nodes = stats.nodes, "branch-and-bound stopped early");
        } else {
            info!(
                ?status,
                nodes = stats.nodes,
                lp_iterations = stats.lp_iterations,
                elapsed_ms = stats.solve_time.as_millis() as u64,
                "branch-and-bound finished"
            );
        }

        let solution = match (status, search.incumbent) {
            (Status::Unbounded | Status::Infeasible, _) | (_, None) => {
                let mut empty = Solution::without_incumbent(status, stats);
                empty.bound = bound;
                empty
            }
            (status, Some(mut primal)) => {
                scaler.unscale_primal(&mut primal);
                Solution {
                    primal,
                    status,
                    objective_value: search.incumbent_value,
                    bound: if status == Status::Optimal {
                        search.incumbent_value
                    } else {
                        bound
                    },
                    stats,
                }
            }
        };
        Ok(solution)
    }
}
