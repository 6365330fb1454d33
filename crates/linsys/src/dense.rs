use fundalloc_core::math::{cast, RealNumber};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TableauError {
    #[error("near-singular pivot at row {row}, column {col} (|a| = {magnitude:.3e})")]
    SingularPivot {
        row: usize,
        col: usize,
        magnitude: f64,
    },
    #[error("entry ({row}, {col}) is outside a {rows}x{cols} tableau")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

/// Row-major dense tableau with Gauss-Jordan pivoting.
#[derive(Debug, Clone)]
pub struct DenseTableau<T: RealNumber> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
    scratch: Vec<T>,
}

impl<T> DenseTableau<T>
where
    T: RealNumber,
{
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::zero(); rows * cols],
            scratch: vec![T::zero(); cols],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn epsilon() -> T {
        cast(1e-12)
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// `target += factor * source`.
    pub fn add_scaled_row(&mut self, target: usize, source: usize, factor: T) {
        if factor == T::zero() || target == source {
            return;
        }
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.copy_from_slice(self.row(source));
        for (value, &src) in self.row_mut(target).iter_mut().zip(scratch.iter()) {
            *value += factor * src;
        }
        self.scratch = scratch;
    }

    /// Makes column `col` the unit vector `e_row`.
    pub fn pivot(&mut self, row: usize, col: usize) -> Result<(), TableauError> {
        if row >= self.rows || col >= self.cols {
            return Err(TableauError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let pivot = self.get(row, col);
        if pivot.abs() <= Self::epsilon() {
            return Err(TableauError::SingularPivot {
                row,
                col,
                magnitude: pivot.abs().to_f64().unwrap_or(f64::NAN),
            });
        }
        let inv = T::one() / pivot;
        for value in self.row_mut(row) {
            *value *= inv;
        }
        self.set(row, col, T::one());
        for other in 0..self.rows {
            if other == row {
                continue;
            }
            let factor = self.get(other, col);
            if factor != T::zero() {
                self.add_scaled_row(other, row, -factor);
                self.set(other, col, T::zero());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivoting_solves_a_small_system() {
        // [2 1 | 5]
        // [1 3 | 10]
        let mut tableau = DenseTableau::<f64>::new(2, 3);
        tableau.row_mut(0).copy_from_slice(&[2.0, 1.0, 5.0]);
        tableau.row_mut(1).copy_from_slice(&[1.0, 3.0, 10.0]);
        tableau.pivot(0, 0).unwrap();
        tableau.pivot(1, 1).unwrap();
        assert!((tableau.get(0, 2) - 1.0).abs() < 1e-12);
        assert!((tableau.get(1, 2) - 3.0).abs() < 1e-12);
        assert_eq!(tableau.get(1, 0), 0.0);
    }

    #[test]
    fn rejects_zero_pivot() {
        let mut tableau = DenseTableau::<f64>::new(2, 2);
        tableau.set(0, 1, 1.0);
        assert!(matches!(
            tableau.pivot(0, 0),
            Err(TableauError::SingularPivot { row: 0, col: 0, .. })
        ));
        assert!(matches!(
            tableau.pivot(3, 0),
            Err(TableauError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn row_helpers() {
        let mut tableau = DenseTableau::<f64>::new(2, 2);
        tableau.row_mut(0).copy_from_slice(&[1.0, 2.0]);
        tableau.row_mut(1).copy_from_slice(&[3.0, 4.0]);
        tableau.add_scaled_row(1, 0, -3.0);
        assert_eq!(tableau.row(1), &[0.0, -2.0]);
        tableau.add_scaled_row(0, 0, 5.0);
        assert_eq!(tableau.row(0), &[1.0, 2.0]);
    }
}
