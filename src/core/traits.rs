//! Core traits for SVM implementation

use crate::core::{Parameters, Problem, Result, SparseVector};
use crate::model::Model;

/// Dataset abstraction for efficient data access
pub trait Dataset: Send + Sync {
    /// Number of samples in the dataset
    fn len(&self) -> usize;

    /// Number of features (largest feature index)
    fn dim(&self) -> usize;

    /// Get a single sample by index
    ///
    /// # Panics
    /// Panics if index >= len()
    fn instance(&self, i: usize) -> (&SparseVector, f64);

    /// All labels in instance order
    fn labels(&self) -> &[f64];

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The optimization engine behind the training facade
///
/// Implementations may assume the parameters were validated against the
/// problem and that `gamma` has already been resolved.
pub trait Solver: Send + Sync {
    fn train(&self, problem: &Problem, params: &Parameters) -> Result<Model>;
}
