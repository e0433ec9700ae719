//! Model serialization and persistence
//!
//! Models are stored as pretty-printed JSON. Floats use serde_json's exact
//! round trip, so a loaded model predicts bit-for-bit like the saved one.

use crate::core::{FeatureNode, Parameters, Result, SVMError, SparseVector};
use crate::model::Model;
use crate::solver::probability::NR_MARKS;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Version of the on-disk layout
pub const FORMAT_VERSION: u32 = 1;

/// Serializable representation of a trained SVM model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableModel {
    pub format_version: u32,
    pub metadata: ModelMetadata,
    pub parameters: Parameters,
    pub nr_class: usize,
    pub labels: Vec<i32>,
    /// Support vectors without their terminators
    pub support_vectors: Vec<Vec<FeatureNode>>,
    pub sv_coef: Vec<Vec<f64>>,
    pub rho: Vec<f64>,
    pub n_sv: Vec<usize>,
    pub sv_indices: Vec<usize>,
    #[serde(default)]
    pub prob_a: Vec<f64>,
    #[serde(default)]
    pub prob_b: Vec<f64>,
    #[serde(default)]
    pub prob_density_marks: Vec<f64>,
}

/// Model metadata for tracking and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Number of support vectors
    pub n_support_vectors: usize,
    /// Creation timestamp
    pub created_at: String,
}

impl SerializableModel {
    /// Create a serializable model from a trained model
    pub fn from_model(model: &Model) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                n_support_vectors: model.n_support_vectors(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
            parameters: model.params.clone(),
            nr_class: model.nr_class,
            labels: model.labels.clone(),
            support_vectors: model
                .support_vectors
                .iter()
                .map(|sv| sv.entries().copied().collect())
                .collect(),
            sv_coef: model.sv_coef.clone(),
            rho: model.rho.clone(),
            n_sv: model.n_sv.clone(),
            sv_indices: model.sv_indices.clone(),
            prob_a: model.prob_a.clone(),
            prob_b: model.prob_b.clone(),
            prob_density_marks: model.prob_density_marks.clone(),
        }
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(SVMError::IoError)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SVMError::IoError(e.into()))?;
        writer.flush().map_err(SVMError::IoError)?;
        Ok(())
    }

    /// Load model from file
    ///
    /// Only checks that the file is well-formed JSON of the right shape;
    /// [`SerializableModel::into_model`] checks the content.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| {
            if e.is_io() {
                SVMError::IoError(e.into())
            } else {
                SVMError::CorruptModel(e.to_string())
            }
        })
    }

    /// Validate the stored content and rebuild the model
    pub fn into_model(self) -> Result<Model> {
        if self.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        self.check_shape()?;

        let all_finite = self
            .sv_coef
            .iter()
            .flatten()
            .chain(&self.rho)
            .chain(&self.prob_a)
            .chain(&self.prob_b)
            .chain(&self.prob_density_marks)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(corrupt("non-finite coefficient"));
        }

        let support_vectors = self
            .support_vectors
            .iter()
            .enumerate()
            .map(|(i, nodes)| {
                rebuild_vector(nodes).map_err(|e| corrupt(format!("support vector {i}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Model {
            params: self.parameters,
            nr_class: self.nr_class,
            labels: self.labels,
            support_vectors,
            sv_coef: self.sv_coef,
            rho: self.rho,
            n_sv: self.n_sv,
            sv_indices: self.sv_indices,
            prob_a: self.prob_a,
            prob_b: self.prob_b,
            prob_density_marks: self.prob_density_marks,
        })
    }

    fn check_shape(&self) -> Result<()> {
        let l = self.support_vectors.len();

        if self.parameters.svm_type.is_classification() {
            let k = self.nr_class;
            if k == 0 || self.labels.len() != k || self.n_sv.len() != k {
                return Err(corrupt(format!(
                    "{k} classes with {} labels and {} class counts",
                    self.labels.len(),
                    self.n_sv.len()
                )));
            }
            let pairs = k
                .checked_mul(k - 1)
                .map(|n| n / 2)
                .ok_or_else(|| corrupt(format!("class count {k} is too large")))?;
            let total = self
                .n_sv
                .iter()
                .try_fold(0usize, |acc, &n| acc.checked_add(n));
            if total != Some(l) {
                return Err(corrupt("class counts do not add up to the support vectors"));
            }
            if self.sv_coef.len() != k - 1 || self.rho.len() != pairs {
                return Err(corrupt("coefficient table does not match the class count"));
            }
            let calibrated = self.prob_a.len() == pairs && self.prob_b.len() == pairs;
            let uncalibrated = self.prob_a.is_empty() && self.prob_b.is_empty();
            if !(calibrated || uncalibrated) || !self.prob_density_marks.is_empty() {
                return Err(corrupt("probability tables do not match the class count"));
            }
        } else {
            if self.nr_class != 2 || !self.labels.is_empty() || !self.n_sv.is_empty() {
                return Err(corrupt("class information on a single-output model"));
            }
            if self.sv_coef.len() != 1 || self.rho.len() != 1 {
                return Err(corrupt("single-output model needs one coefficient row"));
            }
            let (max_a, marks) = if self.parameters.svm_type.is_regression() {
                (1, 0)
            } else {
                (0, NR_MARKS)
            };
            if self.prob_a.len() > max_a
                || !self.prob_b.is_empty()
                || !(self.prob_density_marks.is_empty() || self.prob_density_marks.len() == marks)
            {
                return Err(corrupt("probability tables do not match the model type"));
            }
        }

        if self.sv_coef.iter().any(|row| row.len() != l) {
            return Err(corrupt("coefficient row length differs from support vector count"));
        }
        if self.sv_indices.len() != l {
            return Err(corrupt("support vector index count differs from support vector count"));
        }
        Ok(())
    }

    /// Print model summary
    pub fn print_summary(&self) {
        let params = &self.parameters;
        println!("=== SVM Model Summary ===");
        println!("SVM Type: {}", params.svm_type);
        println!("Kernel Type: {}", params.kernel_type);
        if params.kernel_type.uses_gamma() {
            println!("  Gamma: {}", params.gamma);
        }
        println!("Classes: {}", self.nr_class);
        if !self.labels.is_empty() {
            let labels: Vec<String> = self.labels.iter().map(i32::to_string).collect();
            println!("Labels: {}", labels.join(" "));
        }
        println!("Support Vectors: {}", self.metadata.n_support_vectors);
        let rho: Vec<String> = self.rho.iter().map(|r| format!("{r:.6}")).collect();
        println!("Rho: {}", rho.join(" "));
        println!(
            "Probability Model: {}",
            if self.prob_a.is_empty() && self.prob_density_marks.is_empty() {
                "no"
            } else {
                "yes"
            }
        );
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
    }
}

fn corrupt(msg: impl Into<String>) -> SVMError {
    SVMError::CorruptModel(msg.into())
}

fn rebuild_vector(nodes: &[FeatureNode]) -> Result<SparseVector> {
    let mut vector = SparseVector::new(nodes.len())?;
    for (position, node) in nodes.iter().enumerate() {
        if !node.value.is_finite() {
            return Err(SVMError::InvalidArgument(format!(
                "non-finite value at index {}",
                node.index
            )));
        }
        vector.put(position, node.index, node.value)?;
    }
    Ok(vector)
}

impl Model {
    /// Save the model as JSON
    ///
    /// Any file system failure is reported as [`SVMError::IoError`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        SerializableModel::from_model(self).save_to_file(path)
    }

    /// Load a model written by [`Model::save`]
    ///
    /// Fails with [`SVMError::IoError`] if the file cannot be read and with
    /// [`SVMError::CorruptModel`] if its content is malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Model> {
        SerializableModel::load_from_file(path)?.into_model()
    }
}
