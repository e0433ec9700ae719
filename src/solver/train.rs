//! Dual formulations and model assembly
//!
//! Each SVM type is reduced to one or more SMO problems. Classification is
//! trained one-vs-one over label groups; regression and one-class train a
//! single decision function.

use crate::core::{Parameters, Problem, Result, Solver, SparseVector, SvmType};
use crate::kernel::{Kernel, KernelFunction};
use crate::model::Model;
use crate::solver::probability;
use crate::solver::qmatrix::{OneClassQ, SvcQ, SvrQ};
use crate::solver::smo::{solve, SolutionInfo, Variant};
use log::{debug, info, warn};
use std::iter;

/// Trained coefficients of one binary or single-output problem
#[derive(Debug, Clone)]
pub(crate) struct DecisionFunction {
    /// `y_i * alpha_i` in training order
    pub alpha: Vec<f64>,
    pub rho: f64,
}

impl DecisionFunction {
    /// `sum(alpha_i * K(x_i, query)) - rho`
    pub fn evaluate(
        &self,
        x: &[&SparseVector],
        kernel: &KernelFunction,
        query: &SparseVector,
    ) -> f64 {
        let sum: f64 = x
            .iter()
            .zip(&self.alpha)
            .filter(|(_, a)| **a != 0.0)
            .map(|(sv, &a)| a * kernel.compute(sv, query))
            .sum();
        sum - self.rho
    }
}

/// Train one decision function
///
/// `cp` and `cn` are the box bounds of the positive and negative class for
/// C-SVC; the other formulations take their bounds from `params`.
pub(crate) fn train_one(
    x: &[&SparseVector],
    y: &[f64],
    params: &Parameters,
    cp: f64,
    cn: f64,
) -> DecisionFunction {
    let kernel = KernelFunction::from_parameters(params);
    let (alpha, si) = match params.svm_type {
        SvmType::CSvc => solve_c_svc(x, y, params, kernel, cp, cn),
        SvmType::NuSvc => solve_nu_svc(x, y, params, kernel),
        SvmType::OneClass => solve_one_class(x, params, kernel),
        SvmType::EpsilonSvr => solve_epsilon_svr(x, y, params, kernel),
        SvmType::NuSvr => solve_nu_svr(x, y, params, kernel),
    };

    let mut n_sv = 0;
    let mut n_bsv = 0;
    for (a, &label) in alpha.iter().zip(y) {
        if a.abs() > 0.0 {
            n_sv += 1;
            let bound = if label > 0.0 {
                si.upper_bound_p
            } else {
                si.upper_bound_n
            };
            if a.abs() >= bound {
                n_bsv += 1;
            }
        }
    }
    debug!(
        "obj = {:.6}, rho = {:.6}, nSV = {n_sv}, nBSV = {n_bsv}, #iter = {}",
        si.obj, si.rho, si.iterations
    );

    DecisionFunction { alpha, rho: si.rho }
}

fn signs(y: &[f64]) -> Vec<i8> {
    y.iter().map(|&v| if v > 0.0 { 1 } else { -1 }).collect()
}

fn solve_c_svc(
    x: &[&SparseVector],
    y: &[f64],
    params: &Parameters,
    kernel: KernelFunction,
    cp: f64,
    cn: f64,
) -> (Vec<f64>, SolutionInfo) {
    let l = x.len();
    let y = signs(y);
    let mut alpha = vec![0.0; l];
    let mut q = SvcQ::new(x, &y, kernel, params.cache_size);

    let si = solve(
        Variant::Standard,
        &mut q,
        &vec![-1.0; l],
        &y,
        &mut alpha,
        cp,
        cn,
        params.eps,
        params.shrinking,
    );

    if cp == cn {
        let sum_alpha: f64 = alpha.iter().sum();
        debug!("nu = {:.6}", sum_alpha / (cp * l as f64));
    }
    for (a, &s) in alpha.iter_mut().zip(&y) {
        *a *= f64::from(s);
    }
    (alpha, si)
}

fn solve_nu_svc(
    x: &[&SparseVector],
    y: &[f64],
    params: &Parameters,
    kernel: KernelFunction,
) -> (Vec<f64>, SolutionInfo) {
    let l = x.len();
    let y = signs(y);

    let mut sum_pos = params.nu * l as f64 / 2.0;
    let mut sum_neg = sum_pos;
    let mut alpha = Vec::with_capacity(l);
    for &s in &y {
        let budget = if s == 1 { &mut sum_pos } else { &mut sum_neg };
        let a = budget.min(1.0);
        *budget -= a;
        alpha.push(a);
    }

    let mut q = SvcQ::new(x, &y, kernel, params.cache_size);
    let mut si = solve(
        Variant::Nu,
        &mut q,
        &vec![0.0; l],
        &y,
        &mut alpha,
        1.0,
        1.0,
        params.eps,
        params.shrinking,
    );

    let r = si.r;
    debug!("C = {:.6}", 1.0 / r);
    for (a, &s) in alpha.iter_mut().zip(&y) {
        *a *= f64::from(s) / r;
    }
    si.rho /= r;
    si.obj /= r * r;
    si.upper_bound_p = 1.0 / r;
    si.upper_bound_n = 1.0 / r;
    (alpha, si)
}

fn solve_one_class(
    x: &[&SparseVector],
    params: &Parameters,
    kernel: KernelFunction,
) -> (Vec<f64>, SolutionInfo) {
    let l = x.len();
    let total = params.nu * l as f64;
    let n = (total as usize).min(l);

    let mut alpha = vec![0.0; l];
    alpha[..n].iter_mut().for_each(|a| *a = 1.0);
    if n < l {
        alpha[n] = total - n as f64;
    }

    let mut q = OneClassQ::new(x, kernel, params.cache_size);
    let si = solve(
        Variant::Standard,
        &mut q,
        &vec![0.0; l],
        &vec![1; l],
        &mut alpha,
        1.0,
        1.0,
        params.eps,
        params.shrinking,
    );
    (alpha, si)
}

fn solve_epsilon_svr(
    x: &[&SparseVector],
    y: &[f64],
    params: &Parameters,
    kernel: KernelFunction,
) -> (Vec<f64>, SolutionInfo) {
    let l = x.len();
    let mut alpha2 = vec![0.0; 2 * l];
    let linear_term: Vec<f64> = y
        .iter()
        .map(|&t| params.p - t)
        .chain(y.iter().map(|&t| params.p + t))
        .collect();
    let y2: Vec<i8> = iter::repeat(1)
        .take(l)
        .chain(iter::repeat(-1).take(l))
        .collect();

    let mut q = SvrQ::new(x, kernel, params.cache_size);
    let si = solve(
        Variant::Standard,
        &mut q,
        &linear_term,
        &y2,
        &mut alpha2,
        params.c,
        params.c,
        params.eps,
        params.shrinking,
    );

    let alpha: Vec<f64> = (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect();
    let sum_alpha: f64 = alpha.iter().map(|a| a.abs()).sum();
    debug!("nu = {:.6}", sum_alpha / (params.c * l as f64));
    (alpha, si)
}

fn solve_nu_svr(
    x: &[&SparseVector],
    y: &[f64],
    params: &Parameters,
    kernel: KernelFunction,
) -> (Vec<f64>, SolutionInfo) {
    let l = x.len();
    let c = params.c;
    let mut sum = c * params.nu * l as f64 / 2.0;

    let mut alpha2 = vec![0.0; 2 * l];
    for i in 0..l {
        let a = sum.min(c);
        alpha2[i] = a;
        alpha2[i + l] = a;
        sum -= a;
    }
    let linear_term: Vec<f64> = y
        .iter()
        .map(|&t| -t)
        .chain(y.iter().copied())
        .collect();
    let y2: Vec<i8> = iter::repeat(1)
        .take(l)
        .chain(iter::repeat(-1).take(l))
        .collect();

    let mut q = SvrQ::new(x, kernel, params.cache_size);
    let si = solve(
        Variant::Nu,
        &mut q,
        &linear_term,
        &y2,
        &mut alpha2,
        c,
        c,
        params.eps,
        params.shrinking,
    );
    debug!("epsilon = {:.6}", -si.r);

    let alpha = (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect();
    (alpha, si)
}

/// Training instances grouped by class label
#[derive(Debug)]
struct ClassGroups {
    /// Labels in first-seen order, with `+1` ahead of `-1` for binary data
    labels: Vec<i32>,
    counts: Vec<usize>,
    starts: Vec<usize>,
    /// Original instance index for each grouped position
    perm: Vec<usize>,
}

fn group_classes(y: &[f64]) -> ClassGroups {
    let mut labels: Vec<i32> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut data_label = Vec::with_capacity(y.len());

    for &value in y {
        let label = value as i32;
        match labels.iter().position(|&known| known == label) {
            Some(k) => {
                counts[k] += 1;
                data_label.push(k);
            }
            None => {
                labels.push(label);
                counts.push(1);
                data_label.push(labels.len() - 1);
            }
        }
    }

    if labels == [-1, 1] {
        labels.swap(0, 1);
        counts.swap(0, 1);
        data_label.iter_mut().for_each(|k| *k = 1 - *k);
    }

    let starts = offsets(&counts);
    let mut next = starts.clone();
    let mut perm = vec![0; y.len()];
    for (i, &k) in data_label.iter().enumerate() {
        perm[next[k]] = i;
        next[k] += 1;
    }

    ClassGroups {
        labels,
        counts,
        starts,
        perm,
    }
}

fn offsets(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0, |acc, &c| {
            let start = *acc;
            *acc += c;
            Some(start)
        })
        .collect()
}

fn train_classification(problem: &Problem, params: &Parameters) -> Model {
    let groups = group_classes(problem.labels());
    let nr_class = groups.labels.len();
    if nr_class == 1 {
        warn!(
            "training data contains only class {}, every prediction will return it",
            groups.labels[0]
        );
    }

    let vectors = problem.vectors();
    let x: Vec<&SparseVector> = groups.perm.iter().map(|&i| &vectors[i]).collect();

    let mut weighted_c = vec![params.c; nr_class];
    for w in &params.weights {
        match groups.labels.iter().position(|&label| label == w.label) {
            Some(k) => weighted_c[k] *= w.weight,
            None => warn!("class label {} specified in weight is not found", w.label),
        }
    }

    let l = x.len();
    let mut nonzero = vec![false; l];
    let mut decisions = Vec::with_capacity(nr_class * nr_class.saturating_sub(1) / 2);
    let mut prob_a = Vec::new();
    let mut prob_b = Vec::new();

    for i in 0..nr_class {
        for j in i + 1..nr_class {
            let (si, ci) = (groups.starts[i], groups.counts[i]);
            let (sj, cj) = (groups.starts[j], groups.counts[j]);

            let sub_x: Vec<&SparseVector> = x[si..si + ci]
                .iter()
                .chain(&x[sj..sj + cj])
                .copied()
                .collect();
            let sub_y: Vec<f64> = iter::repeat(1.0)
                .take(ci)
                .chain(iter::repeat(-1.0).take(cj))
                .collect();

            if params.probability {
                let (a, b) = probability::binary_svc_probability(
                    &sub_x,
                    &sub_y,
                    params,
                    weighted_c[i],
                    weighted_c[j],
                );
                prob_a.push(a);
                prob_b.push(b);
            }

            let f = train_one(&sub_x, &sub_y, params, weighted_c[i], weighted_c[j]);
            for (k, a) in f.alpha[..ci].iter().enumerate() {
                if a.abs() > 0.0 {
                    nonzero[si + k] = true;
                }
            }
            for (k, a) in f.alpha[ci..].iter().enumerate() {
                if a.abs() > 0.0 {
                    nonzero[sj + k] = true;
                }
            }
            decisions.push(f);
        }
    }

    if params.probability && nr_class < 2 {
        warn!("probability calibration skipped, it needs at least two classes");
    }

    let n_sv: Vec<usize> = (0..nr_class)
        .map(|k| {
            let start = groups.starts[k];
            nonzero[start..start + groups.counts[k]]
                .iter()
                .filter(|&&nz| nz)
                .count()
        })
        .collect();
    let total_sv: usize = n_sv.iter().sum();
    info!("Total nSV = {total_sv}");

    let mut support_vectors = Vec::with_capacity(total_sv);
    let mut sv_indices = Vec::with_capacity(total_sv);
    for (pos, &nz) in nonzero.iter().enumerate() {
        if nz {
            support_vectors.push(x[pos].compacted());
            sv_indices.push(groups.perm[pos] + 1);
        }
    }

    // Row j-1 holds the coefficients of class i's vectors against class j,
    // row i those of class j's vectors against class i.
    let nz_start = offsets(&n_sv);
    let mut sv_coef = vec![vec![0.0; total_sv]; nr_class.saturating_sub(1)];
    let mut pairs = decisions.iter();
    for i in 0..nr_class {
        for j in i + 1..nr_class {
            let Some(f) = pairs.next() else { break };
            let (si, ci) = (groups.starts[i], groups.counts[i]);
            let (sj, cj) = (groups.starts[j], groups.counts[j]);

            let mut q = nz_start[i];
            for k in 0..ci {
                if nonzero[si + k] {
                    sv_coef[j - 1][q] = f.alpha[k];
                    q += 1;
                }
            }
            let mut q = nz_start[j];
            for k in 0..cj {
                if nonzero[sj + k] {
                    sv_coef[i][q] = f.alpha[ci + k];
                    q += 1;
                }
            }
        }
    }

    Model {
        params: params.clone(),
        nr_class,
        labels: groups.labels,
        support_vectors,
        sv_coef,
        rho: decisions.iter().map(|f| f.rho).collect(),
        n_sv,
        sv_indices,
        prob_a,
        prob_b,
        prob_density_marks: Vec::new(),
    }
}

fn train_single_output(problem: &Problem, params: &Parameters) -> Model {
    let x: Vec<&SparseVector> = problem.vectors().iter().collect();
    let y = problem.labels();

    let mut prob_a = Vec::new();
    if params.probability && params.svm_type.is_regression() {
        prob_a.push(probability::svr_probability(&x, y, params));
    }

    let f = train_one(&x, y, params, 0.0, 0.0);

    let prob_density_marks = if params.probability && params.svm_type == SvmType::OneClass {
        let kernel = KernelFunction::from_parameters(params);
        let decision_values: Vec<f64> = x.iter().map(|xi| f.evaluate(&x, &kernel, xi)).collect();
        probability::one_class_density_marks(decision_values).unwrap_or_default()
    } else {
        Vec::new()
    };

    let mut support_vectors = Vec::new();
    let mut coef = Vec::new();
    let mut sv_indices = Vec::new();
    for (i, &a) in f.alpha.iter().enumerate() {
        if a.abs() > 0.0 {
            support_vectors.push(x[i].compacted());
            coef.push(a);
            sv_indices.push(i + 1);
        }
    }
    info!("Total nSV = {}", support_vectors.len());

    Model {
        params: params.clone(),
        nr_class: 2,
        labels: Vec::new(),
        support_vectors,
        sv_coef: vec![coef],
        rho: vec![f.rho],
        n_sv: Vec::new(),
        sv_indices,
        prob_a,
        prob_b: Vec::new(),
        prob_density_marks,
    }
}

/// SMO-based solver for every SVM type
///
/// Expects validated parameters with `gamma` already resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct SMOSolver;

impl SMOSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for SMOSolver {
    fn train(&self, problem: &Problem, params: &Parameters) -> Result<Model> {
        let model = if params.svm_type.is_classification() {
            train_classification(problem, params)
        } else {
            train_single_output(problem, params)
        };
        Ok(model)
    }
}
