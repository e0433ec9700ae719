//! High-level API for Support Vector Machine operations
//!
//! This module wraps the parameter set, the training facade and the model
//! in a builder-style interface for common tasks.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use svmkit::api::SVM;
//! use svmkit::KernelType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Train a model on data
//! let svm = SVM::new()
//!     .with_kernel(KernelType::Rbf)
//!     .with_c(1.0)
//!     .train_from_file("data.libsvm")?;
//!
//! // Make predictions
//! let predictions = svm.predict_from_file("test.libsvm")?;
//! println!("Accuracy: {:.2}%", svm.evaluate_from_file("test.libsvm")?.accuracy() * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{Dataset, KernelType, Parameters, Problem, Result, SparseVector, SvmType};
use crate::data::LibSVMDataset;
use crate::model::Model;
use crate::optimizer::train;
use std::path::Path;

/// High-level SVM interface with builder pattern
#[derive(Debug, Clone, Default)]
pub struct SVM {
    params: Parameters,
}

impl SVM {
    /// Create a C-SVC with linear kernel and default parameters
    pub fn new() -> Self {
        Self {
            params: Parameters::new(),
        }
    }

    /// Start from an existing parameter set
    pub fn with_parameters(params: Parameters) -> Self {
        Self { params }
    }

    pub fn with_svm_type(mut self, svm_type: SvmType) -> Self {
        self.params = self.params.with_svm_type(svm_type);
        self
    }

    pub fn with_kernel(mut self, kernel_type: KernelType) -> Self {
        self.params = self.params.with_kernel(kernel_type);
        self
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.params = self.params.with_c(c);
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.params = self.params.with_gamma(gamma);
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.params = self.params.with_nu(nu);
        self
    }

    /// Set convergence tolerance
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.params = self.params.with_epsilon(epsilon);
        self
    }

    /// Set kernel cache size in megabytes
    pub fn with_cache_size(mut self, megabytes: f64) -> Self {
        self.params = self.params.with_cache_size(megabytes);
        self
    }

    /// Enable probability estimates
    pub fn with_probability(mut self, probability: bool) -> Self {
        self.params = self.params.with_probability(probability);
        self
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Train on a problem
    pub fn train(&self, problem: &Problem) -> Result<TrainedModel> {
        let model = train(problem, &self.params)?;
        Ok(TrainedModel { model })
    }

    /// Train from LibSVM format file
    pub fn train_from_file<P: AsRef<Path>>(&self, path: P) -> Result<TrainedModel> {
        let dataset = LibSVMDataset::from_file(path)?;
        self.train(dataset.problem())
    }
}

/// Trained SVM model with high-level prediction interface
#[derive(Debug, Clone)]
pub struct TrainedModel {
    model: Model,
}

impl TrainedModel {
    /// Load a model saved with [`Model::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            model: Model::load(path)?,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.model.save(path)
    }

    /// Predict a single vector
    pub fn predict(&self, x: &SparseVector) -> f64 {
        self.model.predict(x)
    }

    /// Predict every instance of a dataset
    pub fn predict_dataset<D: Dataset>(&self, dataset: &D) -> Vec<f64> {
        (0..dataset.len())
            .map(|i| self.model.predict(dataset.instance(i).0))
            .collect()
    }

    /// Predict from LibSVM file
    pub fn predict_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<f64>> {
        let dataset = LibSVMDataset::from_file(path)?;
        Ok(self.predict_dataset(&dataset))
    }

    /// Compare predictions with the labels of a dataset
    pub fn evaluate<D: Dataset>(&self, dataset: &D) -> EvaluationMetrics {
        let predictions = self.predict_dataset(dataset);
        EvaluationMetrics::from_predictions(&predictions, dataset.labels())
    }

    /// Evaluate from LibSVM file
    pub fn evaluate_from_file<P: AsRef<Path>>(&self, path: P) -> Result<EvaluationMetrics> {
        let dataset = LibSVMDataset::from_file(path)?;
        Ok(self.evaluate(&dataset))
    }

    /// Get model information
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            svm_type: self.model.svm_type(),
            kernel_type: self.model.parameters().kernel_type,
            nr_class: self.model.nr_class(),
            n_support_vectors: self.model.n_support_vectors(),
            has_probability_model: self.model.has_probability_model(),
        }
    }

    /// Get the underlying model
    pub fn inner(&self) -> &Model {
        &self.model
    }

    pub fn into_inner(self) -> Model {
        self.model
    }
}

/// Agreement between predictions and true targets
///
/// Accuracy is meaningful for classification, the error and correlation
/// figures for regression.
#[derive(Debug, Clone, Default)]
pub struct EvaluationMetrics {
    pub total: usize,
    pub correct: usize,
    pub squared_error: f64,
    sum_p: f64,
    sum_y: f64,
    sum_pp: f64,
    sum_yy: f64,
    sum_py: f64,
}

impl EvaluationMetrics {
    pub fn from_predictions(predictions: &[f64], targets: &[f64]) -> Self {
        let mut metrics = Self::default();
        for (&p, &y) in predictions.iter().zip(targets) {
            metrics.total += 1;
            if p == y {
                metrics.correct += 1;
            }
            metrics.squared_error += (p - y) * (p - y);
            metrics.sum_p += p;
            metrics.sum_y += y;
            metrics.sum_pp += p * p;
            metrics.sum_yy += y * y;
            metrics.sum_py += p * y;
        }
        metrics
    }

    /// Fraction of exact matches
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn mean_squared_error(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.squared_error / self.total as f64
        }
    }

    /// Squared correlation coefficient between predictions and targets
    pub fn squared_correlation(&self) -> f64 {
        let n = self.total as f64;
        let cov = n * self.sum_py - self.sum_p * self.sum_y;
        let var_p = n * self.sum_pp - self.sum_p * self.sum_p;
        let var_y = n * self.sum_yy - self.sum_y * self.sum_y;
        let denominator = var_p * var_y;
        if denominator == 0.0 {
            0.0
        } else {
            cov * cov / denominator
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    pub nr_class: usize,
    pub n_support_vectors: usize,
    pub has_probability_model: bool,
}

/// Convenience functions for quick operations
pub mod quick {
    use super::*;

    /// Train a linear C-SVC on LibSVM data with default parameters
    pub fn train_libsvm<P: AsRef<Path>>(path: P) -> Result<TrainedModel> {
        SVM::new().train_from_file(path)
    }

    /// Quick evaluation: train on training file, test on test file
    pub fn evaluate_split<P1: AsRef<Path>, P2: AsRef<Path>>(
        train_path: P1,
        test_path: P2,
    ) -> Result<EvaluationMetrics> {
        let model = train_libsvm(train_path)?;
        model.evaluate_from_file(test_path)
    }
}
