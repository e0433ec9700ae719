//! Linear kernel implementation

use crate::core::SparseVector;
use crate::kernel::Kernel;
use std::cmp::Ordering;

/// Linear kernel: K(x, y) = x^T * y
///
/// The dot product only visits written entries of both vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearKernel;

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        dot_product_sparse(x, y)
    }
}

/// Compute dot product between two sparse vectors
///
/// Both vectors keep their indices sorted, so this is a merge over the two
/// entry lists in O(nnz(x) + nnz(y)) time.
pub(crate) fn dot_product_sparse(x: &SparseVector, y: &SparseVector) -> f64 {
    let mut result = 0.0;
    let mut xs = x.entries().peekable();
    let mut ys = y.entries().peekable();

    while let (Some(&&a), Some(&&b)) = (xs.peek(), ys.peek()) {
        match a.index.cmp(&b.index) {
            Ordering::Equal => {
                result += a.value * b.value;
                xs.next();
                ys.next();
            }
            Ordering::Less => {
                xs.next();
            }
            Ordering::Greater => {
                ys.next();
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sv(pairs: &[(i32, f64)]) -> SparseVector {
        SparseVector::from_pairs(pairs.iter().copied()).expect("valid pairs")
    }

    #[test]
    fn test_linear_kernel_basic() {
        let kernel = LinearKernel::new();

        let x = sv(&[(0, 1.0), (2, 2.0), (4, 3.0)]);
        let y = sv(&[(1, 1.0), (2, 2.0), (3, 3.0)]);

        // Only index 2 overlaps: 2.0 * 2.0 = 4.0
        assert_eq!(kernel.compute(&x, &y), 4.0);
    }

    #[test]
    fn test_linear_kernel_identical() {
        let kernel = LinearKernel::new();
        let x = sv(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
        assert_eq!(kernel.compute(&x, &x), 14.0);
    }

    #[test]
    fn test_dot_product_skips_unwritten_slots() {
        let mut x = SparseVector::new(3).expect("allocation should succeed");
        x.put(0, 2, 3.0).expect("put should succeed");
        x.put(2, 5, 2.0).expect("put should succeed");
        let y = sv(&[(2, 2.0), (3, 1.0), (5, 4.0)]);

        // 3.0 * 2.0 + 2.0 * 4.0
        assert_eq!(dot_product_sparse(&x, &y), 14.0);
    }

    #[test]
    fn test_dot_product_empty() {
        let x = SparseVector::empty();
        let y = sv(&[(0, 1.0), (1, 2.0)]);

        assert_eq!(dot_product_sparse(&x, &y), 0.0);
        assert_eq!(dot_product_sparse(&y, &x), 0.0);
    }
}
