//! Q matrices consumed by the SMO solver
//!
//! `Q[i][j] = y_i * y_j * K(x_i, x_j)` for classification, `K(x_i, x_j)` for
//! one-class, and a doubled, signed matrix of size `2l` for regression.
//! Rows are computed on demand and kept in a [`KernelCache`].

use crate::cache::KernelCache;
use crate::core::SparseVector;
use crate::kernel::{Kernel, KernelFunction};
use std::sync::Arc;

/// Row access to the quadratic term of the dual problem
pub(crate) trait QMatrix {
    /// Number of dual variables
    fn size(&self) -> usize;

    /// Full row `i` of Q
    fn row(&mut self, i: usize) -> Arc<[f64]>;

    /// Diagonal of Q
    fn diagonal(&self) -> &[f64];

    /// Row cache backing [`QMatrix::row`]
    fn cache(&self) -> &KernelCache;
}

/// Kernel evaluations over a fixed set of training vectors
struct KernelMatrix<'a> {
    x: &'a [&'a SparseVector],
    kernel: KernelFunction,
    norms: Option<Vec<f64>>,
}

impl<'a> KernelMatrix<'a> {
    fn new(x: &'a [&'a SparseVector], kernel: KernelFunction) -> Self {
        let norms = kernel
            .uses_norms()
            .then(|| x.iter().map(|v| v.norm_squared()).collect());
        Self { x, kernel, norms }
    }

    fn len(&self) -> usize {
        self.x.len()
    }

    fn eval(&self, i: usize, j: usize) -> f64 {
        match &self.norms {
            Some(norms) => {
                self.kernel
                    .compute_with_norms(self.x[i], self.x[j], norms[i], norms[j])
            }
            None => self.kernel.compute(self.x[i], self.x[j]),
        }
    }
}

/// Q matrix for C-SVC and nu-SVC
pub(crate) struct SvcQ<'a> {
    kernel: KernelMatrix<'a>,
    y: Vec<f64>,
    cache: KernelCache,
    qd: Vec<f64>,
}

impl<'a> SvcQ<'a> {
    pub fn new(
        x: &'a [&'a SparseVector],
        y: &[i8],
        kernel: KernelFunction,
        cache_size_mb: f64,
    ) -> Self {
        let kernel = KernelMatrix::new(x, kernel);
        let qd = (0..kernel.len()).map(|i| kernel.eval(i, i)).collect();
        Self {
            cache: KernelCache::with_memory_limit(cache_size_mb, kernel.len()),
            y: y.iter().map(|&s| f64::from(s)).collect(),
            kernel,
            qd,
        }
    }
}

impl QMatrix for SvcQ<'_> {
    fn size(&self) -> usize {
        self.kernel.len()
    }

    fn row(&mut self, i: usize) -> Arc<[f64]> {
        let kernel = &self.kernel;
        let y = &self.y;
        self.cache.get_or_insert_with(i, || {
            (0..kernel.len())
                .map(|j| y[i] * y[j] * kernel.eval(i, j))
                .collect()
        })
    }

    fn diagonal(&self) -> &[f64] {
        &self.qd
    }

    fn cache(&self) -> &KernelCache {
        &self.cache
    }
}

/// Q matrix for one-class SVM
pub(crate) struct OneClassQ<'a> {
    kernel: KernelMatrix<'a>,
    cache: KernelCache,
    qd: Vec<f64>,
}

impl<'a> OneClassQ<'a> {
    pub fn new(x: &'a [&'a SparseVector], kernel: KernelFunction, cache_size_mb: f64) -> Self {
        let kernel = KernelMatrix::new(x, kernel);
        let qd = (0..kernel.len()).map(|i| kernel.eval(i, i)).collect();
        Self {
            cache: KernelCache::with_memory_limit(cache_size_mb, kernel.len()),
            kernel,
            qd,
        }
    }
}

impl QMatrix for OneClassQ<'_> {
    fn size(&self) -> usize {
        self.kernel.len()
    }

    fn row(&mut self, i: usize) -> Arc<[f64]> {
        let kernel = &self.kernel;
        self.cache
            .get_or_insert_with(i, || (0..kernel.len()).map(|j| kernel.eval(i, j)).collect())
    }

    fn diagonal(&self) -> &[f64] {
        &self.qd
    }

    fn cache(&self) -> &KernelCache {
        &self.cache
    }
}

/// Q matrix for epsilon-SVR and nu-SVR
///
/// Variables `0..l` carry sign +1 and `l..2l` sign -1, both referring to
/// training vector `k % l`. Kernel rows are cached per training vector.
pub(crate) struct SvrQ<'a> {
    kernel: KernelMatrix<'a>,
    cache: KernelCache,
    qd: Vec<f64>,
}

impl<'a> SvrQ<'a> {
    pub fn new(x: &'a [&'a SparseVector], kernel: KernelFunction, cache_size_mb: f64) -> Self {
        let kernel = KernelMatrix::new(x, kernel);
        let l = kernel.len();
        let mut qd: Vec<f64> = (0..l).map(|i| kernel.eval(i, i)).collect();
        qd.extend_from_within(..);
        Self {
            cache: KernelCache::with_memory_limit(cache_size_mb, l),
            kernel,
            qd,
        }
    }

    fn sign(&self, k: usize) -> f64 {
        if k < self.kernel.len() {
            1.0
        } else {
            -1.0
        }
    }
}

impl QMatrix for SvrQ<'_> {
    fn size(&self) -> usize {
        2 * self.kernel.len()
    }

    fn row(&mut self, i: usize) -> Arc<[f64]> {
        let l = self.kernel.len();
        let real_i = i % l;
        let kernel = &self.kernel;
        let kernel_row = self
            .cache
            .get_or_insert_with(real_i, || (0..l).map(|j| kernel.eval(real_i, j)).collect());

        let si = self.sign(i);
        (0..2 * l)
            .map(|j| si * self.sign(j) * kernel_row[j % l])
            .collect()
    }

    fn diagonal(&self) -> &[f64] {
        &self.qd
    }

    fn cache(&self) -> &KernelCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::LinearKernel;

    fn vectors() -> Vec<SparseVector> {
        vec![
            SparseVector::from_dense(&[1.0, 0.0]).expect("valid dense vector"),
            SparseVector::from_dense(&[0.5, 2.0]).expect("valid dense vector"),
        ]
    }

    #[test]
    fn test_svc_q_signs() {
        let data = vectors();
        let x: Vec<&SparseVector> = data.iter().collect();
        let mut q = SvcQ::new(&x, &[1, -1], KernelFunction::Linear(LinearKernel), 1.0);

        assert_eq!(q.size(), 2);
        assert_eq!(q.diagonal(), &[1.0, 4.25]);
        assert_eq!(&q.row(0)[..], &[1.0, -0.5]);
        assert_eq!(&q.row(1)[..], &[-0.5, 4.25]);
    }

    #[test]
    fn test_rows_are_cached() {
        let data = vectors();
        let x: Vec<&SparseVector> = data.iter().collect();
        let mut q = SvcQ::new(&x, &[1, -1], KernelFunction::Linear(LinearKernel), 1.0);

        let first = q.row(1);
        let second = q.row(1);
        assert!(Arc::ptr_eq(&first, &second));

        let stats = q.cache().stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
        assert_eq!(q.cache().hit_rate(), 0.5);
    }

    #[test]
    fn test_one_class_q() {
        let data = vectors();
        let x: Vec<&SparseVector> = data.iter().collect();
        let mut q = OneClassQ::new(&x, KernelFunction::Linear(LinearKernel), 1.0);
        assert_eq!(&q.row(1)[..], &[0.5, 4.25]);
    }

    #[test]
    fn test_svr_q_doubles_variables() {
        let data = vectors();
        let x: Vec<&SparseVector> = data.iter().collect();
        let mut q = SvrQ::new(&x, KernelFunction::Linear(LinearKernel), 1.0);

        assert_eq!(q.size(), 4);
        assert_eq!(q.diagonal(), &[1.0, 4.25, 1.0, 4.25]);
        assert_eq!(&q.row(0)[..], &[1.0, 0.5, -1.0, -0.5]);
        assert_eq!(&q.row(3)[..], &[-0.5, -4.25, 0.5, 4.25]);
    }
}
