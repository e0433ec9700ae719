//! Core types and traits for the SVM layer

pub mod error;
pub mod params;
pub mod problem;
pub mod traits;
pub mod types;

pub use self::error::*;
pub use self::params::*;
pub use self::problem::*;
pub use self::traits::*;
pub use self::types::*;
