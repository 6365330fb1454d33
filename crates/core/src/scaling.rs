use crate::math::{norm_inf, RealNumber};
use crate::problem::{MilpProblem, ProblemResult};
use crate::traits::Scaler;
use tracing::trace;

/// Divides every constraint row (and its right-hand side) by its largest
/// absolute coefficient. Variables are untouched, so primal values need no
/// unscaling.
#[derive(Debug, Clone)]
pub struct RowEquilibrator<T: RealNumber> {
    row_scaling: Vec<T>,
}

impl<T> RowEquilibrator<T>
where
    T: RealNumber,
{
    pub fn new() -> Self {
        Self {
            row_scaling: Vec::new(),
        }
    }

    pub fn row_scaling(&self) -> &[T] {
        &self.row_scaling
    }
}

impl<T> Default for RowEquilibrator<T>
where
    T: RealNumber,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scaler<T> for RowEquilibrator<T>
where
    T: RealNumber,
{
    fn scale(&mut self, problem: &mut MilpProblem<T>) -> ProblemResult<()> {
        problem.validate()?;
        let constraints = &mut problem.constraints;
        let nrows = constraints.len();
        self.row_scaling = vec![T::one(); nrows];
        for row in 0..nrows {
            let start = constraints.matrix.indptr[row];
            let end = constraints.matrix.indptr[row + 1];
            let max_abs = norm_inf(&constraints.matrix.data[start..end]);
            if max_abs <= T::zero() {
                continue;
            }
            let factor = T::one() / max_abs;
            for value in &mut constraints.matrix.data[start..end] {
                *value *= factor;
            }
            constraints.rhs[row] *= factor;
            self.row_scaling[row] = factor;
        }
        trace!(rows = nrows, "equilibrated constraint rows");
        Ok(())
    }
}
