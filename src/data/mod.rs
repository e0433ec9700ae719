//! Data loading
//!
//! Reads training and test sets in the LibSVM text format.

pub mod libsvm;

pub use self::libsvm::*;
