#![forbid(unsafe_code)]

pub mod dense;

pub use dense::{DenseTableau, TableauError};
