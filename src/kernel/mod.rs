//! Kernel functions for SVM

pub mod linear;
pub mod polynomial;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::linear::*;
pub use self::polynomial::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;

use crate::core::{KernelType, Parameters, SparseVector};

/// Kernel chosen at runtime from a parameter set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelFunction {
    Linear(LinearKernel),
    Polynomial(PolynomialKernel),
    Rbf(RBFKernel),
    Sigmoid(SigmoidKernel),
}

impl KernelFunction {
    /// Build the kernel described by `params`
    ///
    /// `gamma` is taken as-is; resolve it before training.
    pub fn from_parameters(params: &Parameters) -> Self {
        match params.kernel_type {
            KernelType::Linear => KernelFunction::Linear(LinearKernel::new()),
            KernelType::Polynomial => KernelFunction::Polynomial(PolynomialKernel::new(
                params.degree,
                params.gamma,
                params.coef0,
            )),
            KernelType::Rbf => KernelFunction::Rbf(RBFKernel::new(params.gamma)),
            KernelType::Sigmoid => {
                KernelFunction::Sigmoid(SigmoidKernel::new(params.gamma, params.coef0))
            }
        }
    }

    fn as_kernel(&self) -> &dyn Kernel {
        match self {
            KernelFunction::Linear(k) => k,
            KernelFunction::Polynomial(k) => k,
            KernelFunction::Rbf(k) => k,
            KernelFunction::Sigmoid(k) => k,
        }
    }
}

impl Kernel for KernelFunction {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        self.as_kernel().compute(x, y)
    }

    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        self.as_kernel()
            .compute_with_norms(x, y, x_norm_sq, y_norm_sq)
    }

    fn uses_norms(&self) -> bool {
        self.as_kernel().uses_norms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_function_dispatch() {
        let x = SparseVector::from_dense(&[1.0, 2.0]).expect("valid dense vector");
        let y = SparseVector::from_dense(&[2.0, 0.5]).expect("valid dense vector");

        let linear = KernelFunction::from_parameters(&Parameters::new());
        assert_eq!(linear.compute(&x, &y), 3.0);
        assert!(!linear.uses_norms());

        let poly = KernelFunction::from_parameters(&Parameters::new().polynomial(1.0, 1.0, 2));
        assert_eq!(poly.compute(&x, &y), 16.0);

        let rbf = KernelFunction::from_parameters(&Parameters::new().rbf(0.5));
        assert!(rbf.uses_norms());
        // ||x - y||² = 1 + 2.25
        assert_relative_eq!(rbf.compute(&x, &y), (-0.5f64 * 3.25).exp(), epsilon = 1e-12);

        let sigmoid = KernelFunction::from_parameters(&Parameters::new().sigmoid(0.1, 0.0));
        assert_relative_eq!(sigmoid.compute(&x, &y), 0.3f64.tanh(), epsilon = 1e-12);
    }

    #[test]
    fn test_kernel_function_equality() {
        assert_eq!(
            KernelFunction::from_parameters(&Parameters::new()),
            KernelFunction::Linear(LinearKernel::new())
        );
        assert_eq!(LinearKernel::new(), LinearKernel);
        assert_ne!(
            KernelFunction::from_parameters(&Parameters::new().rbf(0.5)),
            KernelFunction::from_parameters(&Parameters::new().rbf(0.25))
        );
        assert_ne!(
            KernelFunction::from_parameters(&Parameters::new()),
            KernelFunction::from_parameters(&Parameters::new().rbf(0.5))
        );
    }
}
