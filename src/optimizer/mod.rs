//! Training facade
//!
//! Validates a problem/parameter pair and hands it to a [`Solver`]. The
//! free functions use the default [`SMOSolver`]; [`Trainer`] accepts any
//! implementation of the solver boundary.

use crate::core::{KernelType, Parameters, Problem, Result, SVMError, Solver, SvmType};
use crate::model::Model;
use crate::solver::SMOSolver;
use log::info;
use std::collections::HashMap;
use std::time::Instant;

/// Check a parameter set against a problem without training
///
/// `Ok(())` means training may proceed; otherwise the error is a
/// [`SVMError::ValidationError`] naming the first problem found.
pub fn check_parameter(problem: &Problem, params: &Parameters) -> Result<()> {
    let invalid = |msg: &str| Err(SVMError::ValidationError(msg.to_string()));

    if problem.is_empty() {
        return invalid("problem has no training instances");
    }
    if problem.labels().iter().any(|y| !y.is_finite()) {
        return invalid("labels must be finite");
    }

    let svm_type = params.svm_type;
    if svm_type.is_classification() {
        let integral = problem
            .labels()
            .iter()
            .all(|&y| y.fract() == 0.0 && y >= f64::from(i32::MIN) && y <= f64::from(i32::MAX));
        if !integral {
            return invalid("classification labels must be integers");
        }
    }

    if params.kernel_type.uses_gamma() && !(params.gamma >= 0.0 && params.gamma.is_finite()) {
        return invalid("gamma < 0");
    }
    if params.kernel_type == KernelType::Polynomial && params.degree < 0 {
        return invalid("degree of polynomial kernel < 0");
    }
    if !params.coef0.is_finite() {
        return invalid("coef0 must be finite");
    }
    if !positive(params.cache_size) {
        return invalid("cache_size <= 0");
    }
    if !positive(params.eps) {
        return invalid("eps <= 0");
    }

    if matches!(svm_type, SvmType::CSvc | SvmType::EpsilonSvr | SvmType::NuSvr)
        && !positive(params.c)
    {
        return invalid("C <= 0");
    }
    if matches!(svm_type, SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr)
        && !(params.nu > 0.0 && params.nu <= 1.0)
    {
        return invalid("nu <= 0 or nu > 1");
    }
    if svm_type == SvmType::EpsilonSvr && !(params.p >= 0.0 && params.p.is_finite()) {
        return invalid("p < 0");
    }
    if params.weights.iter().any(|w| !positive(w.weight)) {
        return invalid("class weight <= 0");
    }

    if svm_type == SvmType::NuSvc {
        check_nu_feasibility(problem, params.nu)?;
    }
    Ok(())
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn check_nu_feasibility(problem: &Problem, nu: f64) -> Result<()> {
    let mut counts: Vec<(i32, usize)> = Vec::new();
    for &y in problem.labels() {
        let label = y as i32;
        match counts.iter_mut().find(|(known, _)| *known == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    for (i, &(_, n1)) in counts.iter().enumerate() {
        for &(_, n2) in &counts[i + 1..] {
            if nu * (n1 + n2) as f64 / 2.0 > n1.min(n2) as f64 {
                return Err(SVMError::ValidationError(
                    "specified nu is infeasible".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Training facade over a [`Solver`]
#[derive(Debug, Clone, Default)]
pub struct Trainer<S: Solver = SMOSolver> {
    solver: S,
}

impl Trainer<SMOSolver> {
    /// Create a trainer using the default SMO solver
    pub fn new() -> Self {
        Self {
            solver: SMOSolver::new(),
        }
    }
}

impl<S: Solver> Trainer<S> {
    pub fn with_solver(solver: S) -> Self {
        Self { solver }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Validate, then train
    ///
    /// `gamma == 0` is replaced by `1 / max_feature_index` before the solver
    /// sees the parameters. Blocks until the solver finishes.
    pub fn train(&self, problem: &Problem, params: &Parameters) -> Result<Model> {
        check_parameter(problem, params)?;
        let params = params.resolved(problem.max_index());

        info!(
            "Training {} ({} kernel) on {} instances",
            params.svm_type,
            params.kernel_type,
            problem.len()
        );
        let start = Instant::now();
        let model = self.solver.train(problem, &params)?;
        info!(
            "Training finished in {:.2?}: {} support vectors",
            start.elapsed(),
            model.n_support_vectors()
        );

        Ok(model)
    }
}

/// Train with the default solver
pub fn train(problem: &Problem, params: &Parameters) -> Result<Model> {
    Trainer::new().train(problem, params)
}

/// Whether `model` can produce probability estimates
pub fn check_probability_model(model: &Model) -> bool {
    model.has_probability_model()
}

/// Class counts of a problem keyed by label, for reporting
pub fn class_distribution(problem: &Problem) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for &y in problem.labels() {
        *counts.entry(y as i64).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SparseVector, TrainingInstance};
    use crate::model::tests::difference_model;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn toy_problem() -> Problem {
        let mut problem = Problem::new();
        for (label, pairs) in [
            (1.0, vec![(1, 1.0), (3, 0.5)]),
            (-1.0, vec![(1, 0.2), (2, 0.9)]),
            (1.0, vec![(2, 1.0), (4, 1.0)]),
        ] {
            problem
                .add(TrainingInstance::new(label, pairs))
                .expect("add should succeed");
        }
        problem
    }

    fn rejection(params: &Parameters) -> String {
        match check_parameter(&toy_problem(), params) {
            Err(SVMError::ValidationError(msg)) => msg,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(check_parameter(&toy_problem(), &Parameters::new()).is_ok());
    }

    #[test]
    fn test_empty_problem_rejected() {
        let err = check_parameter(&Problem::new(), &Parameters::new())
            .expect_err("empty problem should be rejected");
        assert!(matches!(err, SVMError::ValidationError(ref msg) if !msg.is_empty()));
    }

    #[test]
    fn test_illegal_fields_rejected() {
        assert_eq!(rejection(&Parameters::new().with_c(0.0)), "C <= 0");
        assert_eq!(rejection(&Parameters::new().with_epsilon(-1.0)), "eps <= 0");
        assert_eq!(rejection(&Parameters::new().with_cache_size(0.0)), "cache_size <= 0");
        assert_eq!(rejection(&Parameters::new().rbf(-0.5)), "gamma < 0");
        assert_eq!(
            rejection(&Parameters::new().polynomial(1.0, 0.0, -2)),
            "degree of polynomial kernel < 0"
        );
        assert_eq!(rejection(&Parameters::one_class(1.5)), "nu <= 0 or nu > 1");
        assert_eq!(rejection(&Parameters::nu_svr(1.0, 0.0)), "nu <= 0 or nu > 1");
        assert_eq!(rejection(&Parameters::epsilon_svr(1.0, -0.1)), "p < 0");
        assert_eq!(
            rejection(&Parameters::new().with_weight(1, 0.0)),
            "class weight <= 0"
        );
    }

    #[test]
    fn test_fractional_labels_rejected_for_classification() {
        let mut problem = toy_problem();
        problem
            .add(TrainingInstance::new(0.5, vec![(1, 1.0)]))
            .expect("add should succeed");

        assert!(check_parameter(&problem, &Parameters::new()).is_err());
        assert!(check_parameter(&problem, &Parameters::epsilon_svr(1.0, 0.1)).is_ok());
    }

    #[test]
    fn test_nu_feasibility() {
        // 2 positives, 1 negative: nu * 3 / 2 must not exceed 1
        assert!(check_parameter(&toy_problem(), &Parameters::nu_svc(1.0, 0.5)).is_ok());
        assert_eq!(
            rejection(&Parameters::nu_svc(1.0, 0.9)),
            "specified nu is infeasible"
        );
    }

    struct CountingSolver {
        calls: AtomicUsize,
    }

    impl Solver for CountingSolver {
        fn train(&self, _problem: &Problem, params: &Parameters) -> Result<Model> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(params.gamma > 0.0, "gamma should be resolved");
            Ok(difference_model())
        }
    }

    #[test]
    fn test_trainer_validates_before_solving() {
        let trainer = Trainer::with_solver(CountingSolver {
            calls: AtomicUsize::new(0),
        });

        let err = trainer
            .train(&toy_problem(), &Parameters::new().with_c(-1.0))
            .expect_err("invalid parameters should be rejected");
        assert!(matches!(err, SVMError::ValidationError(_)));
        assert_eq!(trainer.solver().calls.load(Ordering::SeqCst), 0);

        trainer
            .train(&toy_problem(), &Parameters::new())
            .expect("training should succeed");
        assert_eq!(trainer.solver().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_train_toy_problem() {
        let problem = toy_problem();
        let model = train(&problem, &Parameters::new()).expect("training should succeed");

        assert_eq!(model.nr_class(), 2);
        assert_eq!(model.labels(), &[1, -1]);
        assert!(!check_probability_model(&model));

        let query = SparseVector::from_pairs([(1, 1.0), (3, 0.5)]).expect("valid pairs");
        assert_eq!(model.predict(&query), 1.0);
    }

    #[test]
    fn test_class_distribution() {
        let counts = class_distribution(&toy_problem());
        assert_eq!(counts[&1], 2);
        assert_eq!(counts[&-1], 1);
    }
}
