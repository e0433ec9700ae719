//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) controls the kernel width.

use crate::core::SparseVector;
use crate::kernel::linear::dot_product_sparse;
use crate::kernel::Kernel;
use std::cmp::Ordering;

/// RBF kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// High gamma lets only close points influence each other; low gamma
/// widens the reach of every training example.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with specified gamma parameter
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Default for RBFKernel {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        let squared_distance = compute_squared_euclidean_distance(x, y);
        (-self.gamma * squared_distance).exp()
    }

    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        // ||x - y||² = ||x||² + ||y||² - 2*x^T*y
        let dot_product = dot_product_sparse(x, y);
        let squared_distance = (x_norm_sq + y_norm_sq - 2.0 * dot_product).max(0.0);

        (-self.gamma * squared_distance).exp()
    }

    fn uses_norms(&self) -> bool {
        true
    }
}

/// Compute squared Euclidean distance between two sparse vectors
///
/// Indices present in only one vector contribute the square of that value.
fn compute_squared_euclidean_distance(x: &SparseVector, y: &SparseVector) -> f64 {
    let mut distance_sq = 0.0;
    let mut xs = x.entries().peekable();
    let mut ys = y.entries().peekable();

    loop {
        match (xs.peek().copied().copied(), ys.peek().copied().copied()) {
            (Some(a), Some(b)) => match a.index.cmp(&b.index) {
                Ordering::Equal => {
                    let diff = a.value - b.value;
                    distance_sq += diff * diff;
                    xs.next();
                    ys.next();
                }
                Ordering::Less => {
                    distance_sq += a.value * a.value;
                    xs.next();
                }
                Ordering::Greater => {
                    distance_sq += b.value * b.value;
                    ys.next();
                }
            },
            (Some(a), None) => {
                distance_sq += a.value * a.value;
                xs.next();
            }
            (None, Some(b)) => {
                distance_sq += b.value * b.value;
                ys.next();
            }
            (None, None) => break,
        }
    }

    distance_sq
}
