use fundalloc_core::math::RealNumber;
use fundalloc_core::problem::MilpProblem;
use ordered_float::OrderedFloat;

/// Rounds the integer variables of an LP point down, then greedily raises the
/// ones with the largest LP values while the point stays feasible and the
/// objective improves. Continuous variables keep their LP values.
pub fn round_and_raise<T: RealNumber>(
    problem: &MilpProblem<T>,
    lp_primal: &[T],
    lower: &[T],
    upper: &[T],
    tolerance: T,
) -> Option<Vec<T>> {
    let mut point = lp_primal.to_vec();
    let mut candidates = Vec::new();
    for var in 0..problem.nvars() {
        if !problem.is_integer(var) {
            continue;
        }
        point[var] = (point[var] + tolerance).floor().max(lower[var]).min(upper[var]);
        if problem.cost[var] < T::zero() && point[var] + T::one() <= upper[var] {
            candidates.push(var);
        }
    }
    if !problem.is_feasible(&point, tolerance) {
        return None;
    }

    candidates.sort_by_key(|&var| {
        (
            std::cmp::Reverse(OrderedFloat(lp_primal[var].to_f64().unwrap_or(0.0))),
            var,
        )
    });
    for var in candidates {
        point[var] += T::one();
        if !problem.is_feasible(&point, tolerance) {
            point[var] -= T::one();
        }
    }
    Some(point)
}
