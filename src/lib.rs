//! Support Vector Machine training and prediction on sparse data
//!
//! Problems are built from sparse vectors, validated against a parameter
//! set and trained with an SMO solver into an immutable [`Model`] that can
//! be shared across threads, saved and loaded.
//!
//! ```rust
//! use svmkit::{train, Parameters, Problem, SparseVector, TrainingInstance};
//!
//! # fn main() -> svmkit::Result<()> {
//! let mut problem = Problem::new();
//! problem.add(TrainingInstance::new(1.0, vec![(1, 1.0), (3, 0.5)]))?;
//! problem.add(TrainingInstance::new(-1.0, vec![(1, 0.2), (2, 0.9)]))?;
//! problem.add(TrainingInstance::new(1.0, vec![(2, 1.0), (4, 1.0)]))?;
//!
//! let model = train(&problem, &Parameters::new())?;
//! let query = SparseVector::from_pairs([(1, 1.0), (3, 0.5)])?;
//! assert_eq!(model.predict(&query), 1.0);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod model;
pub mod optimizer;
pub mod persistence;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::{EvaluationMetrics, ModelInfo, TrainedModel, SVM};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::error::{Result, SVMError};
pub use crate::core::params::{ClassWeight, KernelType, Parameters, SvmType};
pub use crate::core::problem::{Problem, TrainingInstance};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::LibSVMDataset;
pub use crate::kernel::{Kernel, KernelFunction};
pub use crate::model::Model;
pub use crate::optimizer::{check_parameter, check_probability_model, train, Trainer};
pub use crate::persistence::SerializableModel;
pub use crate::solver::SMOSolver;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
