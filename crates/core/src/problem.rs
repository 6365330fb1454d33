use crate::math::{dot, RealNumber};
use serde::{Deserialize, Serialize};
use sprs::CsMat;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
}

pub type ProblemResult<T> = Result<T, ProblemError>;

/// Compressed sparse row storage; one row per linear constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrMatrix<T> {
    pub nrows: usize,
    pub ncols: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> CsrMatrix<T>
where
    T: RealNumber,
{
    pub fn empty(ncols: usize) -> Self {
        Self {
            nrows: 0,
            ncols,
            indptr: vec![0],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Appends a row. Entries are sorted by column, duplicates are summed and
    /// exact zeros dropped.
    pub fn push_row<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (usize, T)>,
    {
        let mut entries: Vec<(usize, T)> = entries.into_iter().collect();
        entries.sort_by_key(|(col, _)| *col);
        let mut merged: Vec<(usize, T)> = Vec::with_capacity(entries.len());
        for (col, value) in entries {
            match merged.last_mut() {
                Some((last, acc)) if *last == col => *acc += value,
                _ => merged.push((col, value)),
            }
        }
        for (col, value) in merged {
            if value != T::zero() {
                self.indices.push(col);
                self.data.push(value);
            }
        }
        self.indptr.push(self.indices.len());
        self.nrows += 1;
    }

    pub fn row(&self, row: usize) -> (&[usize], &[T]) {
        let start = self.indptr[row];
        let end = self.indptr[row + 1];
        (&self.indices[start..end], &self.data[start..end])
    }

    pub fn row_dot(&self, row: usize, x: &[T]) -> T {
        let (cols, values) = self.row(row);
        cols.iter()
            .zip(values.iter())
            .fold(T::zero(), |acc, (&col, &value)| acc + value * x[col])
    }

    pub fn validate(&self) -> ProblemResult<()> {
        if self.indptr.len() != self.nrows + 1 {
            return Err(ProblemError::DimensionMismatch(format!(
                "indptr length {} != nrows + 1 ({})",
                self.indptr.len(),
                self.nrows + 1
            )));
        }
        if self.indices.len() != self.data.len() {
            return Err(ProblemError::DimensionMismatch(format!(
                "indices length {} != data length {}",
                self.indices.len(),
                self.data.len()
            )));
        }
        if self.indptr.first().copied() != Some(0)
            || self.indptr.last().copied() != Some(self.indices.len())
        {
            return Err(ProblemError::InvalidStructure(
                "indptr must start at 0 and end at nnz".into(),
            ));
        }
        for row in 0..self.nrows {
            if self.indptr[row] > self.indptr[row + 1] {
                return Err(ProblemError::InvalidStructure(format!(
                    "indptr decreases at row {row}"
                )));
            }
            let (cols, values) = self.row(row);
            for (pos, (&col, value)) in cols.iter().zip(values.iter()).enumerate() {
                if col >= self.ncols {
                    return Err(ProblemError::InvalidStructure(format!(
                        "column {col} out of range in row {row} (ncols {})",
                        self.ncols
                    )));
                }
                if pos > 0 && cols[pos - 1] >= col {
                    return Err(ProblemError::InvalidStructure(format!(
                        "columns of row {row} are not strictly increasing"
                    )));
                }
                if !value.is_finite() {
                    return Err(ProblemError::InvalidStructure(format!(
                        "non-finite coefficient in row {row}, column {col}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn to_csmat(&self) -> ProblemResult<CsMat<T>> {
        self.validate()?;
        Ok(CsMat::new(
            (self.nrows, self.ncols),
            self.indptr.clone(),
            self.indices.clone(),
            self.data.clone(),
        ))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowSense {
    Le,
    Ge,
    Eq,
}

impl RowSense {
    pub fn flipped(self) -> Self {
        match self {
            RowSense::Le => RowSense::Ge,
            RowSense::Ge => RowSense::Le,
            RowSense::Eq => RowSense::Eq,
        }
    }
}

impl fmt::Display for RowSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowSense::Le => write!(f, "<="),
            RowSense::Ge => write!(f, ">="),
            RowSense::Eq => write!(f, "=="),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearConstraints<T> {
    pub matrix: CsrMatrix<T>,
    pub senses: Vec<RowSense>,
    pub rhs: Vec<T>,
    pub names: Vec<String>,
}

impl<T> LinearConstraints<T>
where
    T: RealNumber,
{
    pub fn new(nvars: usize) -> Self {
        Self {
            matrix: CsrMatrix::empty(nvars),
            senses: Vec::new(),
            rhs: Vec::new(),
            names: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    pub fn push<I>(&mut self, name: impl Into<String>, entries: I, sense: RowSense, rhs: T)
    where
        I: IntoIterator<Item = (usize, T)>,
    {
        self.matrix.push_row(entries);
        self.senses.push(sense);
        self.rhs.push(rhs);
        self.names.push(name.into());
    }

    /// Amount by which `activity` exceeds the feasible side of `row`.
    pub fn violation(&self, row: usize, activity: T) -> T {
        let rhs = self.rhs[row];
        match self.senses[row] {
            RowSense::Le => (activity - rhs).max(T::zero()),
            RowSense::Ge => (rhs - activity).max(T::zero()),
            RowSense::Eq => (activity - rhs).abs(),
        }
    }

    pub fn activities(&self, x: &[T]) -> ProblemResult<Vec<T>> {
        if x.len() != self.matrix.ncols {
            return Err(ProblemError::DimensionMismatch(format!(
                "point length {} != nvars {}",
                x.len(),
                self.matrix.ncols
            )));
        }
        let matrix = self.matrix.to_csmat()?;
        Ok(matrix
            .outer_iterator()
            .map(|row| {
                row.iter()
                    .fold(T::zero(), |acc, (col, &value)| acc + value * x[col])
            })
            .collect())
    }

    fn validate(&self, nvars: usize) -> ProblemResult<()> {
        self.matrix.validate()?;
        if self.matrix.ncols != nvars {
            return Err(ProblemError::DimensionMismatch(format!(
                "constraint matrix columns {} != nvars {}",
                self.matrix.ncols, nvars
            )));
        }
        let rows = self.matrix.nrows;
        if self.rhs.len() != rows || self.senses.len() != rows || self.names.len() != rows {
            return Err(ProblemError::DimensionMismatch(format!(
                "constraint rows {} do not match rhs/sense/name lengths ({}, {}, {})",
                rows,
                self.rhs.len(),
                self.senses.len(),
                self.names.len()
            )));
        }
        if let Some(row) = self.rhs.iter().position(|value| !value.is_finite()) {
            return Err(ProblemError::InvalidStructure(format!(
                "non-finite right-hand side in row '{}'",
                self.names[row]
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub lower: Vec<T>,
    pub upper: Vec<T>,
}

impl<T> Bounds<T>
where
    T: RealNumber,
{
    pub fn unit(dim: usize) -> Self {
        Self {
            lower: vec![T::zero(); dim],
            upper: vec![T::one(); dim],
        }
    }

    pub fn validate(&self) -> ProblemResult<()> {
        if self.lower.len() != self.upper.len() {
            return Err(ProblemError::DimensionMismatch(format!(
                "lower len {} != upper len {}",
                self.lower.len(),
                self.upper.len()
            )));
        }
        for (i, (lo, hi)) in self.lower.iter().zip(self.upper.iter()).enumerate() {
            if !lo.is_finite() {
                return Err(ProblemError::InvalidStructure(format!(
                    "lower bound must be finite at index {i}"
                )));
            }
            if hi.is_nan() {
                return Err(ProblemError::InvalidStructure(format!(
                    "upper bound is NaN at index {i}"
                )));
            }
            if lo > hi {
                return Err(ProblemError::InvalidStructure(format!(
                    "lower bound exceeds upper bound at index {i}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Continuous,
    Integer,
}

/// Minimise `cost · x` subject to linear rows, finite lower bounds, and
/// integrality on the `Integer` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilpProblem<T> {
    pub cost: Vec<T>,
    pub constraints: LinearConstraints<T>,
    pub bounds: Bounds<T>,
    pub kinds: Vec<VariableKind>,
}

impl<T> MilpProblem<T>
where
    T: RealNumber,
{
    /// A problem over `[0, 1]` variables with no rows.
    pub fn unit_box(cost: Vec<T>, kinds: Vec<VariableKind>) -> Self {
        let n = cost.len();
        Self {
            cost,
            constraints: LinearConstraints::new(n),
            bounds: Bounds::unit(n),
            kinds,
        }
    }

    pub fn nvars(&self) -> usize {
        self.cost.len()
    }

    pub fn nrows(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_integer(&self, var: usize) -> bool {
        self.kinds[var] == VariableKind::Integer
    }

    pub fn objective(&self, x: &[T]) -> T {
        dot(&self.cost, x)
    }

    pub fn with_cost(mut self, cost: Vec<T>) -> Self {
        self.cost = cost;
        self
    }

    pub fn validate(&self) -> ProblemResult<()> {
        let n = self.nvars();
        if let Some(var) = self.cost.iter().position(|value| !value.is_finite()) {
            return Err(ProblemError::InvalidStructure(format!(
                "non-finite objective coefficient at index {var}"
            )));
        }
        if self.bounds.lower.len() != n {
            return Err(ProblemError::DimensionMismatch(format!(
                "bounds size {} != nvars {n}",
                self.bounds.lower.len()
            )));
        }
        self.bounds.validate()?;
        if self.kinds.len() != n {
            return Err(ProblemError::DimensionMismatch(format!(
                "variable kinds size {} != nvars {n}",
                self.kinds.len()
            )));
        }
        self.constraints.validate(n)?;
        Ok(())
    }

    /// Largest violation of any row, bound, or integrality requirement at `x`.
    pub fn max_violation(&self, x: &[T]) -> ProblemResult<T> {
        if x.len() != self.nvars() {
            return Err(ProblemError::DimensionMismatch(format!(
                "point length {} != nvars {}",
                x.len(),
                self.nvars()
            )));
        }
        let mut worst = T::zero();
        for row in 0..self.nrows() {
            let activity = self.constraints.matrix.row_dot(row, x);
            worst = worst.max(self.constraints.violation(row, activity));
        }
        for (var, value) in x.iter().enumerate() {
            worst = worst
                .max(self.bounds.lower[var] - *value)
                .max(*value - self.bounds.upper[var]);
            if self.is_integer(var) {
                worst = worst.max((*value - value.round()).abs());
            }
        }
        Ok(worst)
    }

    pub fn is_feasible(&self, x: &[T], tolerance: T) -> bool {
        self.max_violation(x)
            .map(|violation| violation <= tolerance)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmStart<T> {
    pub primal: Vec<T>,
}

impl<T> WarmStart<T>
where
    T: RealNumber,
{
    pub fn new(primal: Vec<T>) -> Self {
        Self { primal }
    }
}
