use num_traits::{Float as NumFloat, FromPrimitive};
use std::ops::{AddAssign, MulAssign, SubAssign};
use std::time::{Duration, Instant};

pub trait RealNumber:
    NumFloat + FromPrimitive + Send + Sync + AddAssign + SubAssign + MulAssign + 'static
{
}

impl<T> RealNumber for T where
    T: NumFloat + FromPrimitive + Send + Sync + AddAssign + SubAssign + MulAssign + 'static
{
}

#[cfg(not(feature = "f32"))]
pub type Scalar = f64;

#[cfg(feature = "f32")]
pub type Scalar = f32;

/// Converts an `f64` constant into `T`, yielding NaN if `T` cannot represent it.
pub fn cast<T: RealNumber>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

pub fn dot<T: RealNumber>(lhs: &[T], rhs: &[T]) -> T {
    assert_eq!(lhs.len(), rhs.len(), "dot product dimension mismatch");
    lhs.iter()
        .zip(rhs.iter())
        .fold(T::zero(), |acc, (a, b)| acc + (*a) * (*b))
}

pub fn norm_inf<T: RealNumber>(data: &[T]) -> T {
    data.iter()
        .copied()
        .map(|v| v.abs())
        .fold(T::zero(), |acc, value| acc.max(value))
}

pub fn project_box<T: RealNumber>(x: &mut [T], lower: &[T], upper: &[T]) {
    assert_eq!(x.len(), lower.len());
    assert_eq!(x.len(), upper.len());
    for ((xi, lo), hi) in x.iter_mut().zip(lower.iter()).zip(upper.iter()) {
        *xi = xi.max(*lo).min(*hi);
    }
}

/// Distance from `value` to the nearest integer.
pub fn fractionality<T: RealNumber>(value: T) -> T {
    (value - value.round()).abs()
}

pub fn is_integral<T: RealNumber>(value: T, tolerance: T) -> bool {
    fractionality(value) <= tolerance
}

/// Absolute tolerance scaled by the magnitude of `reference`.
pub fn scaled_tolerance<T: RealNumber>(tolerance: T, reference: T) -> T {
    tolerance * (T::one() + reference.abs())
}

pub fn relative_gap<T: RealNumber>(primal_obj: T, dual_obj: T) -> T {
    if primal_obj.is_infinite() || dual_obj.is_infinite() {
        return T::infinity();
    }
    let gap = (primal_obj - dual_obj).abs();
    let denom = T::one() + primal_obj.abs().max(dual_obj.abs());
    gap / denom
}

#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::{dot, fractionality, is_integral, norm_inf, project_box, relative_gap, Scalar};

    #[test]
    fn test_dot_norms() {
        let v = [3.0 as Scalar, -4.0];
        assert!((dot(&v, &v) - 25.0).abs() < 1e-9);
        assert!((norm_inf(&v) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_box() {
        let mut x = [5.0 as Scalar, -1.0];
        let lower = [0.0, 0.0];
        let upper = [1.0, 1.0];
        project_box(&mut x, &lower, &upper);
        assert_eq!(x, [1.0, 0.0]);
    }

    #[test]
    fn test_integrality() {
        assert!(is_integral(0.9999999 as Scalar, 1e-6));
        assert!(!is_integral(0.5 as Scalar, 1e-6));
        assert!((fractionality(0.25 as Scalar) - 0.25).abs() < 1e-12);
        assert!((fractionality(0.75 as Scalar) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_relative_gap_handles_infinity() {
        assert!(relative_gap(Scalar::INFINITY, 3.0).is_infinite());
        assert!(relative_gap(10.0 as Scalar, 10.0) < 1e-12);
    }
}
