//! Prediction against a trained model

use crate::core::{Result, SVMError, SparseVector, SvmType};
use crate::kernel::Kernel;
use crate::model::Model;
use crate::solver::probability::{multiclass_probability, one_class_probability, sigmoid_predict};
use std::collections::HashMap;

/// Pairwise probabilities are kept inside `[MIN_PROB, 1 - MIN_PROB]`
const MIN_PROB: f64 = 1e-7;

impl Model {
    /// Predict the label (classification) or value (regression) of `x`
    ///
    /// One-class models return `1` for inliers and `-1` for outliers.
    /// Unwritten slots of `x` are ignored.
    pub fn predict(&self, x: &SparseVector) -> f64 {
        self.decision_values(x).0
    }

    /// Predict `x` and write the raw decision values into `out`
    ///
    /// Classification writes one value per class pair `(i, j)`, `i < j` in
    /// `labels()` order; the other types write a single value.
    /// `out.len()` must equal [`Model::decision_value_count`].
    pub fn predict_values(&self, x: &SparseVector, out: &mut [f64]) -> Result<f64> {
        let expected = self.decision_value_count();
        if out.len() != expected {
            return Err(SVMError::DimensionMismatch {
                expected,
                actual: out.len(),
            });
        }

        let (prediction, values) = self.decision_values(x);
        out.copy_from_slice(&values);
        Ok(prediction)
    }

    /// Predict `x` and write per-class probabilities into `out`
    ///
    /// Returns the most probable label. One-class models write the inlier
    /// and outlier probabilities. Fails with
    /// [`SVMError::UnsupportedOperation`] unless the model was trained
    /// with probability estimates, and for regression models, whose
    /// calibration is [`Model::svr_probability`].
    pub fn predict_probability(&self, x: &SparseVector, out: &mut [f64]) -> Result<f64> {
        if self.svm_type().is_regression() {
            return Err(SVMError::UnsupportedOperation(
                "regression models provide svr_probability() instead of class probabilities"
                    .to_string(),
            ));
        }
        if !self.has_probability_model() {
            return Err(SVMError::UnsupportedOperation(
                "model was trained without probability estimates".to_string(),
            ));
        }
        if out.len() != self.nr_class {
            return Err(SVMError::DimensionMismatch {
                expected: self.nr_class,
                actual: out.len(),
            });
        }

        if self.svm_type() == SvmType::OneClass {
            let (prediction, values) = self.decision_values(x);
            out[0] = one_class_probability(&self.prob_density_marks, values[0]);
            out[1] = 1.0 - out[0];
            return Ok(prediction);
        }

        let k = self.nr_class;
        let (_, dec_values) = self.decision_values(x);
        let mut pairwise = vec![vec![0.0; k]; k];
        let mut p = 0;
        for i in 0..k {
            for j in i + 1..k {
                let prob = sigmoid_predict(dec_values[p], self.prob_a[p], self.prob_b[p])
                    .clamp(MIN_PROB, 1.0 - MIN_PROB);
                pairwise[i][j] = prob;
                pairwise[j][i] = 1.0 - prob;
                p += 1;
            }
        }

        if k == 2 {
            out[0] = pairwise[0][1];
            out[1] = pairwise[1][0];
        } else {
            out.copy_from_slice(&multiclass_probability(&pairwise));
        }

        let best = out
            .iter()
            .enumerate()
            .fold(0, |best, (i, &v)| if v > out[best] { i } else { best });
        Ok(f64::from(self.labels[best]))
    }

    /// Like [`Model::predict_probability`], keyed by class label
    pub fn predict_probability_map(&self, x: &SparseVector) -> Result<(f64, HashMap<i32, f64>)> {
        let mut out = vec![0.0; self.nr_class];
        let prediction = self.predict_probability(x, &mut out)?;

        let labels: Vec<i32> = if self.svm_type() == SvmType::OneClass {
            vec![1, -1]
        } else {
            self.labels.clone()
        };
        Ok((prediction, labels.into_iter().zip(out).collect()))
    }

    /// Prediction and decision values for `x`
    pub(crate) fn decision_values(&self, x: &SparseVector) -> (f64, Vec<f64>) {
        let kernel = self.kernel();

        if !self.svm_type().is_classification() {
            let sum: f64 = self.sv_coef[0]
                .iter()
                .zip(&self.support_vectors)
                .map(|(&coef, sv)| coef * kernel.compute(x, sv))
                .sum();
            let value = sum - self.rho[0];
            let prediction = match self.svm_type() {
                SvmType::OneClass if value > 0.0 => 1.0,
                SvmType::OneClass => -1.0,
                _ => value,
            };
            return (prediction, vec![value]);
        }

        let k = self.nr_class;
        let kvalue: Vec<f64> = self
            .support_vectors
            .iter()
            .map(|sv| kernel.compute(x, sv))
            .collect();

        let mut start = Vec::with_capacity(k);
        let mut offset = 0;
        for &count in &self.n_sv {
            start.push(offset);
            offset += count;
        }

        let mut votes = vec![0usize; k];
        let mut dec_values = Vec::with_capacity(self.decision_value_count());
        for i in 0..k {
            for j in i + 1..k {
                let (si, ci) = (start[i], self.n_sv[i]);
                let (sj, cj) = (start[j], self.n_sv[j]);
                let coef1 = &self.sv_coef[j - 1];
                let coef2 = &self.sv_coef[i];

                let sum: f64 = (si..si + ci)
                    .map(|s| coef1[s] * kvalue[s])
                    .chain((sj..sj + cj).map(|s| coef2[s] * kvalue[s]))
                    .sum::<f64>()
                    - self.rho[dec_values.len()];

                if sum > 0.0 {
                    votes[i] += 1;
                } else {
                    votes[j] += 1;
                }
                dec_values.push(sum);
            }
        }

        let winner = votes
            .iter()
            .enumerate()
            .fold(0, |best, (i, &v)| if v > votes[best] { i } else { best });
        let prediction = self.labels.get(winner).map_or(0.0, |&l| f64::from(l));
        (prediction, dec_values)
    }
}
