//! Training parameters
//!
//! [`Parameters`] is a flat record of every solver knob. Nothing is checked
//! when it is built; legality is verified against a problem by
//! [`crate::optimizer::check_parameter`] at train time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SVM formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvmType {
    /// C-Support Vector Classification
    CSvc,
    /// nu-Support Vector Classification
    NuSvc,
    /// One-class SVM (distribution estimation)
    OneClass,
    /// epsilon-Support Vector Regression
    EpsilonSvr,
    /// nu-Support Vector Regression
    NuSvr,
}

impl SvmType {
    pub fn is_classification(self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }

    pub fn is_regression(self) -> bool {
        matches!(self, SvmType::EpsilonSvr | SvmType::NuSvr)
    }

    pub fn name(self) -> &'static str {
        match self {
            SvmType::CSvc => "c_svc",
            SvmType::NuSvc => "nu_svc",
            SvmType::OneClass => "one_class",
            SvmType::EpsilonSvr => "epsilon_svr",
            SvmType::NuSvr => "nu_svr",
        }
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SvmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c_svc" | "c-svc" | "0" => Ok(SvmType::CSvc),
            "nu_svc" | "nu-svc" | "1" => Ok(SvmType::NuSvc),
            "one_class" | "one-class" | "2" => Ok(SvmType::OneClass),
            "epsilon_svr" | "epsilon-svr" | "3" => Ok(SvmType::EpsilonSvr),
            "nu_svr" | "nu-svr" | "4" => Ok(SvmType::NuSvr),
            _ => Err(format!("unknown svm type: {s}")),
        }
    }
}

/// Kernel function family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    /// u'v
    Linear,
    /// (gamma*u'v + coef0)^degree
    Polynomial,
    /// exp(-gamma*|u-v|^2)
    Rbf,
    /// tanh(gamma*u'v + coef0)
    Sigmoid,
}

impl KernelType {
    pub fn name(self) -> &'static str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial => "polynomial",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
        }
    }

    /// Whether the kernel reads `gamma`
    pub fn uses_gamma(self) -> bool {
        !matches!(self, KernelType::Linear)
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KernelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" | "0" => Ok(KernelType::Linear),
            "polynomial" | "poly" | "1" => Ok(KernelType::Polynomial),
            "rbf" | "2" => Ok(KernelType::Rbf),
            "sigmoid" | "3" => Ok(KernelType::Sigmoid),
            _ => Err(format!("unknown kernel type: {s}")),
        }
    }
}

/// Multiplier applied to C for one class label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeight {
    pub label: i32,
    pub weight: f64,
}

/// Solver configuration
///
/// The defaults are C-SVC with a linear kernel, C = 1, eps = 0.001,
/// a 100 MB cache, degree 3, gamma 0 (resolved to `1 / max_index` at
/// train time), coef0 0, nu 0.5, p 0.1, shrinking on, probability off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    /// Polynomial degree
    pub degree: i32,
    /// Kernel width; 0 means `1 / max_feature_index`
    pub gamma: f64,
    pub coef0: f64,
    /// Q-row cache size in MB
    pub cache_size: f64,
    /// Stopping tolerance
    pub eps: f64,
    /// Cost for C-SVC, epsilon-SVR and nu-SVR
    pub c: f64,
    /// Per-class multipliers of C
    pub weights: Vec<ClassWeight>,
    /// nu for nu-SVC, one-class and nu-SVR
    pub nu: f64,
    /// Insensitive-loss width for epsilon-SVR
    pub p: f64,
    pub shrinking: bool,
    /// Fit probability calibration during training
    pub probability: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            svm_type: SvmType::CSvc,
            kernel_type: KernelType::Linear,
            degree: 3,
            gamma: 0.0,
            coef0: 0.0,
            cache_size: 100.0,
            eps: 0.001,
            c: 1.0,
            weights: Vec::new(),
            nu: 0.5,
            p: 0.1,
            shrinking: true,
            probability: false,
        }
    }
}

impl Parameters {
    /// Create the default parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// C-SVC with cost `c`
    pub fn c_svc(c: f64) -> Self {
        Self::new().with_svm_type(SvmType::CSvc).with_c(c)
    }

    /// nu-SVC
    pub fn nu_svc(c: f64, nu: f64) -> Self {
        Self::new().with_svm_type(SvmType::NuSvc).with_c(c).with_nu(nu)
    }

    /// One-class SVM
    pub fn one_class(nu: f64) -> Self {
        Self::new().with_svm_type(SvmType::OneClass).with_nu(nu)
    }

    /// epsilon-SVR with cost `c` and insensitive width `p`
    pub fn epsilon_svr(c: f64, p: f64) -> Self {
        Self::new()
            .with_svm_type(SvmType::EpsilonSvr)
            .with_c(c)
            .with_p(p)
    }

    /// nu-SVR
    pub fn nu_svr(c: f64, nu: f64) -> Self {
        Self::new().with_svm_type(SvmType::NuSvr).with_c(c).with_nu(nu)
    }

    pub fn with_svm_type(mut self, svm_type: SvmType) -> Self {
        self.svm_type = svm_type;
        self
    }

    pub fn with_kernel(mut self, kernel_type: KernelType) -> Self {
        self.kernel_type = kernel_type;
        self
    }

    /// Linear kernel
    pub fn linear(self) -> Self {
        self.with_kernel(KernelType::Linear)
    }

    /// Polynomial kernel `(gamma*u'v + coef0)^degree`
    pub fn polynomial(self, gamma: f64, coef0: f64, degree: i32) -> Self {
        self.with_kernel(KernelType::Polynomial)
            .with_gamma(gamma)
            .with_coef0(coef0)
            .with_degree(degree)
    }

    /// RBF kernel `exp(-gamma*|u-v|^2)`
    pub fn rbf(self, gamma: f64) -> Self {
        self.with_kernel(KernelType::Rbf).with_gamma(gamma)
    }

    /// Sigmoid kernel `tanh(gamma*u'v + coef0)`
    pub fn sigmoid(self, gamma: f64, coef0: f64) -> Self {
        self.with_kernel(KernelType::Sigmoid)
            .with_gamma(gamma)
            .with_coef0(coef0)
    }

    pub fn with_degree(mut self, degree: i32) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.coef0 = coef0;
        self
    }

    /// Set cache size in MB
    pub fn with_cache_size(mut self, cache_size: f64) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Set stopping tolerance
    pub fn with_epsilon(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.nu = nu;
        self
    }

    pub fn with_p(mut self, p: f64) -> Self {
        self.p = p;
        self
    }

    pub fn with_shrinking(mut self, shrinking: bool) -> Self {
        self.shrinking = shrinking;
        self
    }

    pub fn with_probability(mut self, probability: bool) -> Self {
        self.probability = probability;
        self
    }

    /// Multiply C by `weight` for class `label`
    ///
    /// A later weight for the same label replaces the earlier one.
    pub fn with_weight(mut self, label: i32, weight: f64) -> Self {
        match self.weights.iter_mut().find(|w| w.label == label) {
            Some(existing) => existing.weight = weight,
            None => self.weights.push(ClassWeight { label, weight }),
        }
        self
    }

    /// Copy with `gamma == 0` replaced by `1 / max_index`
    pub(crate) fn resolved(&self, max_index: i32) -> Self {
        let mut params = self.clone();
        if params.gamma == 0.0 && max_index > 0 {
            params.gamma = 1.0 / f64::from(max_index);
        }
        params
    }

    /// Release the parameter set
    pub fn destroy(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = Parameters::new();
        assert_eq!(params.svm_type, SvmType::CSvc);
        assert_eq!(params.kernel_type, KernelType::Linear);
        assert_eq!(params.c, 1.0);
        assert_eq!(params.eps, 0.001);
        assert_eq!(params.cache_size, 100.0);
        assert_eq!(params.degree, 3);
        assert_eq!(params.gamma, 0.0);
        assert_eq!(params.nu, 0.5);
        assert_eq!(params.p, 0.1);
        assert!(params.shrinking);
        assert!(!params.probability);
        assert!(params.weights.is_empty());
    }

    #[test]
    fn test_builders() {
        let params = Parameters::nu_svc(2.0, 0.3)
            .rbf(0.5)
            .with_probability(true)
            .with_weight(1, 2.0)
            .with_weight(-1, 0.5)
            .with_weight(1, 3.0);

        assert_eq!(params.svm_type, SvmType::NuSvc);
        assert_eq!(params.kernel_type, KernelType::Rbf);
        assert_eq!(params.gamma, 0.5);
        assert_eq!(params.nu, 0.3);
        assert!(params.probability);
        assert_eq!(
            params.weights,
            vec![
                ClassWeight {
                    label: 1,
                    weight: 3.0
                },
                ClassWeight {
                    label: -1,
                    weight: 0.5
                }
            ]
        );

        let poly = Parameters::epsilon_svr(10.0, 0.2).polynomial(1.0, 1.0, 2);
        assert_eq!(poly.kernel_type, KernelType::Polynomial);
        assert_eq!(poly.degree, 2);
        assert_eq!(poly.p, 0.2);
    }

    #[test]
    fn test_destroy_consumes_parameters() {
        let params = Parameters::new().with_weight(1, 2.0);
        let kept = params.clone();
        params.destroy();
        assert_eq!(kept.weights.len(), 1);
        Parameters::default().destroy();
    }

    #[test]
    fn test_resolved_gamma() {
        let params = Parameters::new().with_kernel(KernelType::Rbf);
        assert_eq!(params.resolved(4).gamma, 0.25);
        assert_eq!(params.resolved(0).gamma, 0.0);
        assert_eq!(params.clone().with_gamma(2.0).resolved(4).gamma, 2.0);
    }

    #[test]
    fn test_type_names_round_trip() {
        for svm_type in [
            SvmType::CSvc,
            SvmType::NuSvc,
            SvmType::OneClass,
            SvmType::EpsilonSvr,
            SvmType::NuSvr,
        ] {
            assert_eq!(svm_type.name().parse::<SvmType>(), Ok(svm_type));
        }
        assert_eq!("poly".parse::<KernelType>(), Ok(KernelType::Polynomial));
        assert!("cubic".parse::<KernelType>().is_err());
    }
}
