//! Sigmoid kernel: K(x, y) = tanh(γ * <x, y> + r)
//!
//! Not positive semi-definite for every (γ, r); the solver copes with the
//! resulting non-convex sub-problems through its curvature floor.

use crate::core::SparseVector;
use crate::kernel::linear::dot_product_sparse;
use crate::kernel::Kernel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidKernel {
    pub gamma: f64,
    pub coef0: f64,
}

impl SigmoidKernel {
    pub fn new(gamma: f64, coef0: f64) -> Self {
        Self { gamma, coef0 }
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        (self.gamma * dot_product_sparse(x, y) + self.coef0).tanh()
    }
}
