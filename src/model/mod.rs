//! Trained SVM models
//!
//! A [`Model`] is produced by training or loaded from disk and is immutable
//! afterwards. Predictions take `&self`, so one model can serve any number
//! of threads, e.g. behind an `Arc`.

mod predict;

use crate::core::{Parameters, SparseVector, SvmType};
use crate::kernel::KernelFunction;

/// Result of training: support vectors, dual coefficients and offsets
///
/// For a classification model with `k` classes, `sv_coef` has `k - 1` rows
/// and the support vectors are grouped by class in `labels` order. Regression
/// and one-class models have a single row and a single `rho`.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub(crate) params: Parameters,
    pub(crate) nr_class: usize,
    pub(crate) labels: Vec<i32>,
    pub(crate) support_vectors: Vec<SparseVector>,
    pub(crate) sv_coef: Vec<Vec<f64>>,
    pub(crate) rho: Vec<f64>,
    /// Support vectors per class, classification only
    pub(crate) n_sv: Vec<usize>,
    /// 1-based positions of the support vectors in the training problem
    pub(crate) sv_indices: Vec<usize>,
    /// Sigmoid slopes per class pair, or the Laplace sigma for regression
    pub(crate) prob_a: Vec<f64>,
    pub(crate) prob_b: Vec<f64>,
    pub(crate) prob_density_marks: Vec<f64>,
}

impl Model {
    pub fn svm_type(&self) -> SvmType {
        self.params.svm_type
    }

    /// Parameters the model was trained with, `gamma` resolved
    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Number of classes
    ///
    /// Regression and one-class models report 2.
    pub fn nr_class(&self) -> usize {
        self.nr_class
    }

    /// Class labels in internal order; empty unless this is a classifier
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn support_vectors(&self) -> &[SparseVector] {
        &self.support_vectors
    }

    /// 1-based training positions of the support vectors
    pub fn support_vector_indices(&self) -> &[usize] {
        &self.sv_indices
    }

    /// Support vectors per class, in `labels()` order
    pub fn n_sv_per_class(&self) -> &[usize] {
        &self.n_sv
    }

    pub fn sv_coef(&self) -> &[Vec<f64>] {
        &self.sv_coef
    }

    /// Offsets of the decision functions
    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    /// Laplace scale of the residuals for a calibrated regression model
    pub fn svr_probability(&self) -> Option<f64> {
        if self.svm_type().is_regression() {
            self.prob_a.first().copied()
        } else {
            None
        }
    }

    /// Check whether probability estimates are available
    pub fn has_probability_model(&self) -> bool {
        match self.svm_type() {
            SvmType::CSvc | SvmType::NuSvc => !self.prob_a.is_empty() && !self.prob_b.is_empty(),
            SvmType::OneClass => !self.prob_density_marks.is_empty(),
            SvmType::EpsilonSvr | SvmType::NuSvr => !self.prob_a.is_empty(),
        }
    }

    /// Length of the buffer filled by `predict_values`
    pub fn decision_value_count(&self) -> usize {
        if self.svm_type().is_classification() {
            self.nr_class * self.nr_class.saturating_sub(1) / 2
        } else {
            1
        }
    }

    /// Release the model
    ///
    /// Consumes `self`; a destroyed model cannot be used again.
    pub fn destroy(self) {
        drop(self);
    }

    pub(crate) fn kernel(&self) -> KernelFunction {
        KernelFunction::from_parameters(&self.params)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two-class linear model with decision value `x1 - x2`
    pub(crate) fn difference_model() -> Model {
        Model {
            params: Parameters::new(),
            nr_class: 2,
            labels: vec![1, -1],
            support_vectors: vec![
                SparseVector::from_pairs([(1, 1.0)]).expect("valid pairs"),
                SparseVector::from_pairs([(2, 1.0)]).expect("valid pairs"),
            ],
            sv_coef: vec![vec![1.0, -1.0]],
            rho: vec![0.0],
            n_sv: vec![1, 1],
            sv_indices: vec![1, 2],
            prob_a: Vec::new(),
            prob_b: Vec::new(),
            prob_density_marks: Vec::new(),
        }
    }

    #[test]
    fn test_accessors() {
        let model = difference_model();
        assert_eq!(model.nr_class(), 2);
        assert_eq!(model.labels(), &[1, -1]);
        assert_eq!(model.svm_type(), SvmType::CSvc);
        assert_eq!(model.n_support_vectors(), 2);
        assert_eq!(model.n_sv_per_class(), &[1, 1]);
        assert_eq!(model.decision_value_count(), 1);
        assert!(!model.has_probability_model());
        assert_eq!(model.svr_probability(), None);
    }

    #[test]
    fn test_regression_probability_accessor() {
        let mut model = difference_model();
        model.params = Parameters::epsilon_svr(1.0, 0.1);
        model.labels.clear();
        model.n_sv.clear();
        model.prob_a = vec![0.25];

        assert!(model.has_probability_model());
        assert_eq!(model.svr_probability(), Some(0.25));
        assert_eq!(model.decision_value_count(), 1);
    }
}
