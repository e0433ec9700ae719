//! SVM solver implementations
//!
//! The default [`SMOSolver`] reduces every SVM type to one or more dual
//! problems and solves them with Sequential Minimal Optimization using
//! second-order working set selection (Fan, Chen and Lin, 2005).

pub(crate) mod probability;
mod qmatrix;
mod shrinking;
mod smo;
mod train;

pub use self::train::SMOSolver;
