//! Probability calibration
//!
//! Binary classifiers get a Platt sigmoid fitted on decision values from an
//! internal 5-fold cross-validation; multiclass probabilities couple the
//! pairwise estimates. Regression models carry the scale of a Laplace noise
//! model, one-class models a table of decision-value marks.

use crate::core::{Parameters, SparseVector};
use crate::kernel::KernelFunction;
use crate::solver::train::train_one;
use log::{info, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const NR_FOLD: usize = 5;
const FOLD_SEED: u64 = 1;

/// Number of one-class density marks
pub(crate) const NR_MARKS: usize = 10;

/// Shuffled fold assignment: fold `k` is `perm[starts[k]..starts[k + 1]]`
fn folds(l: usize) -> (Vec<usize>, Vec<usize>) {
    let mut perm: Vec<usize> = (0..l).collect();
    let mut rng = SmallRng::seed_from_u64(FOLD_SEED);
    perm.shuffle(&mut rng);
    let starts = (0..=NR_FOLD).map(|k| k * l / NR_FOLD).collect();
    (perm, starts)
}

/// Fit `P(y = 1 | f) = 1 / (1 + exp(A f + B))` to decision values
///
/// Newton's method with backtracking line search on the regularized
/// cross-entropy, after Lin, Lin and Weng.
pub(crate) fn sigmoid_train(dec_values: &[f64], labels: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let t: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        dec_values
            .iter()
            .zip(&t)
            .map(|(&f, &ti)| {
                let f_apb = f * a + b;
                if f_apb >= 0.0 {
                    ti * f_apb + (-f_apb).exp().ln_1p()
                } else {
                    (ti - 1.0) * f_apb + f_apb.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    let mut iter = 0;
    while iter < MAX_ITER {
        let mut h11 = SIGMA;
        let mut h22 = SIGMA;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for (&f, &ti) in dec_values.iter().zip(&t) {
            let f_apb = f * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = ti - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let new_a = a + step * da;
            let new_b = b + step * db;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            info!("line search fails in two-class probability estimates");
            break;
        }
        iter += 1;
    }

    if iter >= MAX_ITER {
        info!("reaching maximal iterations in two-class probability estimates");
    }
    (a, b)
}

pub(crate) fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        let e = (-f_apb).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Couple pairwise probabilities `r[i][j] = P(i | i or j)` into class probabilities
///
/// Fixed-point iteration of Wu, Lin and Weng (2004), method 2.
pub(crate) fn multiclass_probability(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    let max_iter = k.max(100);
    let eps = 0.005 / k as f64;

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in t + 1..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];
    let mut iter = 0;
    while iter < max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = q[t].iter().zip(&p).map(|(q_tj, p_j)| q_tj * p_j).sum();
            pqp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - pqp).abs())
            .fold(0.0, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
        iter += 1;
    }

    if iter >= max_iter {
        info!("exceeds max_iter in multiclass probability");
    }
    p
}

/// Sigmoid parameters for one class pair
///
/// `y` is `+1` / `-1`; decision values come from 5-fold cross-validation so
/// the fit does not see the training points it is evaluated on.
pub(crate) fn binary_svc_probability(
    x: &[&SparseVector],
    y: &[f64],
    params: &Parameters,
    cp: f64,
    cn: f64,
) -> (f64, f64) {
    let l = x.len();
    let (perm, starts) = folds(l);
    let kernel = KernelFunction::from_parameters(params);
    let mut dec_values = vec![0.0; l];

    for fold in 0..NR_FOLD {
        let (begin, end) = (starts[fold], starts[fold + 1]);
        let held_out = &perm[begin..end];
        let train_idx: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();

        let sub_x: Vec<&SparseVector> = train_idx.iter().map(|&i| x[i]).collect();
        let sub_y: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let p_count = sub_y.iter().filter(|&&v| v > 0.0).count();
        let n_count = sub_y.len() - p_count;

        let constant = match (p_count, n_count) {
            (0, 0) => Some(0.0),
            (_, 0) => Some(1.0),
            (0, _) => Some(-1.0),
            _ => None,
        };

        match constant {
            Some(value) => held_out.iter().for_each(|&i| dec_values[i] = value),
            None => {
                let f = train_one(&sub_x, &sub_y, params, cp, cn);
                for &i in held_out {
                    dec_values[i] = f.evaluate(&sub_x, &kernel, x[i]);
                }
            }
        }
    }

    sigmoid_train(&dec_values, y)
}

/// Laplace scale `sigma` of the regression residuals
///
/// Residuals come from 5-fold cross-validation; values beyond five standard
/// deviations are dropped before averaging.
pub(crate) fn svr_probability(x: &[&SparseVector], y: &[f64], params: &Parameters) -> f64 {
    let l = x.len();
    let (perm, starts) = folds(l);
    let kernel = KernelFunction::from_parameters(params);
    let mut residuals = vec![0.0; l];

    for fold in 0..NR_FOLD {
        let (begin, end) = (starts[fold], starts[fold + 1]);
        let held_out = &perm[begin..end];
        let train_idx: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
        if held_out.is_empty() {
            continue;
        }

        let sub_x: Vec<&SparseVector> = train_idx.iter().map(|&i| x[i]).collect();
        let sub_y: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let f = (!sub_x.is_empty()).then(|| train_one(&sub_x, &sub_y, params, 0.0, 0.0));

        for &i in held_out {
            let predicted = f
                .as_ref()
                .map_or(0.0, |f| f.evaluate(&sub_x, &kernel, x[i]));
            residuals[i] = y[i] - predicted;
        }
    }

    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / l as f64;
    let std = (2.0 * mae * mae).sqrt();
    let kept: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|&r| r <= 5.0 * std)
        .collect();
    let sigma = kept.iter().sum::<f64>() / kept.len().max(1) as f64;

    info!(
        "prob. model for test data: target value = predicted value + z, \
         z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {sigma}"
    );
    sigma
}

/// Decision-value marks for one-class probability estimates
///
/// `None` when fewer than `NR_MARKS / 2` values fall on either side of 0.
pub(crate) fn one_class_density_marks(mut dec_values: Vec<f64>) -> Option<Vec<f64>> {
    dec_values.sort_by(f64::total_cmp);
    let l = dec_values.len();
    let neg_counter = dec_values.iter().take_while(|&&v| v < 0.0).count();
    let pos_counter = l - neg_counter;
    let mid = NR_MARKS / 2;

    if neg_counter < mid || pos_counter < mid {
        warn!(
            "fewer than {mid} positive or negative decision values, \
             too few to estimate one-class probabilities"
        );
        return None;
    }

    let mut tmp = vec![0.0; NR_MARKS + 1];
    for (i, mark) in tmp.iter_mut().enumerate().take(mid) {
        *mark = dec_values[i * neg_counter / mid];
    }
    for (i, mark) in tmp.iter_mut().enumerate().skip(mid + 1) {
        *mark = dec_values[neg_counter - 1 + (i - mid) * pos_counter / mid];
    }

    Some(tmp.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect())
}

/// Probability that a decision value belongs to the training distribution
pub(crate) fn one_class_probability(marks: &[f64], dec_value: f64) -> f64 {
    match (marks.first(), marks.last()) {
        (Some(&lo), _) if dec_value < lo => 0.001,
        (_, Some(&hi)) if dec_value > hi => 0.999,
        _ => (1..marks.len())
            .find(|&i| dec_value < marks[i])
            .map_or(0.999, |i| i as f64 / marks.len() as f64),
    }
}
