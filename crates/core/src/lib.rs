#![forbid(unsafe_code)]

pub mod control;
pub mod math;
pub mod options;
pub mod problem;
pub mod scaling;
pub mod solution;
pub mod stats;
pub mod traits;

pub use control::*;
pub use math::*;
pub use options::*;
pub use problem::*;
pub use scaling::*;
pub use solution::*;
pub use stats::*;
pub use traits::*;
