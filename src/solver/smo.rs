//! Sequential Minimal Optimization (SMO) for the SVM dual problem
//!
//! Solves
//!
//! ```text
//! min  0.5 * a'Qa + p'a
//! s.t. y'a = const (and e'a = const for the nu variant)
//!      0 <= a_i <= C_i
//! ```
//!
//! by repeatedly optimizing the pair of variables chosen with second-order
//! working set selection. Variables whose bound is unlikely to change are
//! removed from the active set (see [`crate::solver::shrinking`]).

use crate::solver::qmatrix::QMatrix;
use log::{debug, warn};

/// Curvature floor for non-positive-definite pairs
const TAU: f64 = 1e-12;
const INF: f64 = f64::INFINITY;

/// Which equality constraints the dual carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Variant {
    /// Only `y'a = const`
    Standard,
    /// Separate constraints per sign, as in nu-SVC and nu-SVR
    Nu,
}

/// Outcome of one SMO run
#[derive(Debug, Clone)]
pub(crate) struct SolutionInfo {
    pub obj: f64,
    pub rho: f64,
    pub upper_bound_p: f64,
    pub upper_bound_n: f64,
    /// `(r1 + r2) / 2`, only meaningful for the nu variant
    pub r: f64,
    pub iterations: usize,
}

/// Box constraint status of one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AlphaStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// Dual problem state while the solver runs
///
/// Indices always refer to the original variable order; shrinking only
/// edits `active`.
pub(super) struct SmoState<'q> {
    pub(super) l: usize,
    pub(super) variant: Variant,
    pub(super) q: &'q mut dyn QMatrix,
    pub(super) qd: Vec<f64>,
    pub(super) y: Vec<i8>,
    pub(super) p: Vec<f64>,
    pub(super) alpha: Vec<f64>,
    pub(super) status: Vec<AlphaStatus>,
    /// Gradient of the objective
    pub(super) g: Vec<f64>,
    /// Gradient contribution of variables at their upper bound
    pub(super) g_bar: Vec<f64>,
    pub(super) active: Vec<usize>,
    pub(super) is_active: Vec<bool>,
    pub(super) unshrink: bool,
    pub(super) cp: f64,
    pub(super) cn: f64,
    pub(super) eps: f64,
}

/// Run SMO until the KKT violation drops below `eps`
///
/// `alpha` holds the feasible starting point and receives the solution.
#[allow(clippy::too_many_arguments)]
pub(crate) fn solve(
    variant: Variant,
    q: &mut dyn QMatrix,
    p: &[f64],
    y: &[i8],
    alpha: &mut [f64],
    cp: f64,
    cn: f64,
    eps: f64,
    shrinking: bool,
) -> SolutionInfo {
    let l = q.size();
    let qd = q.diagonal().to_vec();
    let mut state = SmoState {
        l,
        variant,
        q,
        qd,
        y: y.to_vec(),
        p: p.to_vec(),
        alpha: alpha.to_vec(),
        status: vec![AlphaStatus::LowerBound; l],
        g: p.to_vec(),
        g_bar: vec![0.0; l],
        active: (0..l).collect(),
        is_active: vec![true; l],
        unshrink: false,
        cp,
        cn,
        eps,
    };
    state.initialize();

    let max_iter = l.saturating_mul(100).max(10_000_000);
    let mut counter = l.min(1000) + 1;
    let mut iterations = 0;

    while iterations < max_iter {
        counter -= 1;
        if counter == 0 {
            counter = l.min(1000);
            if shrinking {
                state.do_shrinking();
            }
        }

        let (i, j) = match state.select_working_set() {
            Some(pair) => pair,
            None => {
                state.reconstruct_gradient();
                state.activate_all();
                match state.select_working_set() {
                    Some(pair) => {
                        counter = 1;
                        pair
                    }
                    None => break,
                }
            }
        };

        iterations += 1;
        state.update_pair(i, j);
    }

    if iterations >= max_iter {
        if state.active.len() < l {
            state.reconstruct_gradient();
            state.activate_all();
        }
        warn!("SMO reached the iteration limit of {max_iter}");
    }

    let (rho, r) = state.calculate_rho();
    let obj = (0..l)
        .map(|i| state.alpha[i] * (state.g[i] + state.p[i]))
        .sum::<f64>()
        / 2.0;
    debug!("optimization finished, #iter = {iterations}");
    let cache = state.q.cache();
    let stats = cache.stats();
    debug!(
        "kernel cache: {} of {} rows used, hit rate {:.1}%",
        stats.size,
        stats.capacity,
        cache.hit_rate() * 100.0
    );

    alpha.copy_from_slice(&state.alpha);

    SolutionInfo {
        obj,
        rho,
        upper_bound_p: cp,
        upper_bound_n: cn,
        r,
        iterations,
    }
}

impl SmoState<'_> {
    fn initialize(&mut self) {
        for i in 0..self.l {
            self.update_alpha_status(i);
        }

        for i in 0..self.l {
            if self.is_lower_bound(i) {
                continue;
            }
            let row = self.q.row(i);
            let alpha_i = self.alpha[i];
            for (g, &q_ij) in self.g.iter_mut().zip(row.iter()) {
                *g += alpha_i * q_ij;
            }
            if self.is_upper_bound(i) {
                let c_i = self.bound(i);
                for (g_bar, &q_ij) in self.g_bar.iter_mut().zip(row.iter()) {
                    *g_bar += c_i * q_ij;
                }
            }
        }
    }

    pub(super) fn bound(&self, i: usize) -> f64 {
        if self.y[i] > 0 {
            self.cp
        } else {
            self.cn
        }
    }

    fn update_alpha_status(&mut self, i: usize) {
        self.status[i] = if self.alpha[i] >= self.bound(i) {
            AlphaStatus::UpperBound
        } else if self.alpha[i] <= 0.0 {
            AlphaStatus::LowerBound
        } else {
            AlphaStatus::Free
        };
    }

    pub(super) fn is_upper_bound(&self, i: usize) -> bool {
        self.status[i] == AlphaStatus::UpperBound
    }

    pub(super) fn is_lower_bound(&self, i: usize) -> bool {
        self.status[i] == AlphaStatus::LowerBound
    }

    pub(super) fn is_free(&self, i: usize) -> bool {
        self.status[i] == AlphaStatus::Free
    }

    fn select_working_set(&mut self) -> Option<(usize, usize)> {
        match self.variant {
            Variant::Standard => self.select_working_set_standard(),
            Variant::Nu => self.select_working_set_nu(),
        }
    }

    fn select_working_set_standard(&mut self) -> Option<(usize, usize)> {
        let mut gmax = -INF;
        let mut gmax2 = -INF;
        let mut gmax_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for &t in &self.active {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmax {
                    gmax = -self.g[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmax {
                gmax = self.g[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        let q_i = self.q.row(i);
        let y_i = f64::from(self.y[i]);

        for &j in &self.active {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmax + self.g[j];
                    if self.g[j] >= gmax2 {
                        gmax2 = self.g[j];
                    }
                    if grad_diff > 0.0 {
                        let quad_coef = self.qd[i] + self.qd[j] - 2.0 * y_i * q_i[j];
                        let obj_diff = -(grad_diff * grad_diff) / curvature(quad_coef);
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmax - self.g[j];
                if -self.g[j] >= gmax2 {
                    gmax2 = -self.g[j];
                }
                if grad_diff > 0.0 {
                    let quad_coef = self.qd[i] + self.qd[j] + 2.0 * y_i * q_i[j];
                    let obj_diff = -(grad_diff * grad_diff) / curvature(quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if gmax + gmax2 < self.eps {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    fn select_working_set_nu(&mut self) -> Option<(usize, usize)> {
        let mut gmaxp = -INF;
        let mut gmaxp2 = -INF;
        let mut gmaxp_idx = None;
        let mut gmaxn = -INF;
        let mut gmaxn2 = -INF;
        let mut gmaxn_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for &t in &self.active {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmaxp {
                    gmaxp = -self.g[t];
                    gmaxp_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmaxn {
                gmaxn = self.g[t];
                gmaxn_idx = Some(t);
            }
        }

        let q_ip = gmaxp_idx.map(|ip| self.q.row(ip));
        let q_in = gmaxn_idx.map(|in_| self.q.row(in_));

        for &j in &self.active {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmaxp + self.g[j];
                    if self.g[j] >= gmaxp2 {
                        gmaxp2 = self.g[j];
                    }
                    if let (true, Some(ip), Some(q_ip)) = (grad_diff > 0.0, gmaxp_idx, &q_ip) {
                        let quad_coef = self.qd[ip] + self.qd[j] - 2.0 * q_ip[j];
                        let obj_diff = -(grad_diff * grad_diff) / curvature(quad_coef);
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmaxn - self.g[j];
                if -self.g[j] >= gmaxn2 {
                    gmaxn2 = -self.g[j];
                }
                if let (true, Some(in_), Some(q_in)) = (grad_diff > 0.0, gmaxn_idx, &q_in) {
                    let quad_coef = self.qd[in_] + self.qd[j] - 2.0 * q_in[j];
                    let obj_diff = -(grad_diff * grad_diff) / curvature(quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if f64::max(gmaxp + gmaxp2, gmaxn + gmaxn2) < self.eps {
            return None;
        }
        let j = gmin_idx?;
        let i = if self.y[j] == 1 { gmaxp_idx? } else { gmaxn_idx? };
        Some((i, j))
    }

    /// Solve the two-variable sub-problem for `(i, j)` and update gradients
    fn update_pair(&mut self, i: usize, j: usize) {
        let q_i = self.q.row(i);
        let q_j = self.q.row(j);

        let c_i = self.bound(i);
        let c_j = self.bound(j);
        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];

        if self.y[i] != self.y[j] {
            let quad_coef = curvature(self.qd[i] + self.qd[j] + 2.0 * q_i[j]);
            let delta = (-self.g[i] - self.g[j]) / quad_coef;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let quad_coef = curvature(self.qd[i] + self.qd[j] - 2.0 * q_i[j]);
            let delta = (self.g[i] - self.g[j]) / quad_coef;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }
            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_alpha_i = self.alpha[i] - old_alpha_i;
        let delta_alpha_j = self.alpha[j] - old_alpha_j;
        for &k in &self.active {
            self.g[k] += q_i[k] * delta_alpha_i + q_j[k] * delta_alpha_j;
        }

        let was_upper_i = self.is_upper_bound(i);
        let was_upper_j = self.is_upper_bound(j);
        self.update_alpha_status(i);
        self.update_alpha_status(j);

        if was_upper_i != self.is_upper_bound(i) {
            let sign = if was_upper_i { -1.0 } else { 1.0 };
            for (g_bar, &q) in self.g_bar.iter_mut().zip(q_i.iter()) {
                *g_bar += sign * c_i * q;
            }
        }
        if was_upper_j != self.is_upper_bound(j) {
            let sign = if was_upper_j { -1.0 } else { 1.0 };
            for (g_bar, &q) in self.g_bar.iter_mut().zip(q_j.iter()) {
                *g_bar += sign * c_j * q;
            }
        }
    }

    fn calculate_rho(&self) -> (f64, f64) {
        match self.variant {
            Variant::Standard => (self.calculate_rho_standard(), 0.0),
            Variant::Nu => self.calculate_rho_nu(),
        }
    }

    fn calculate_rho_standard(&self) -> f64 {
        let mut nr_free = 0usize;
        let mut ub = INF;
        let mut lb = -INF;
        let mut sum_free = 0.0;

        for &i in &self.active {
            let yg = f64::from(self.y[i]) * self.g[i];
            if self.is_free(i) {
                nr_free += 1;
                sum_free += yg;
            } else if self.is_upper_bound(i) == (self.y[i] == -1) {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        }

        if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            midpoint(lb, ub)
        }
    }

    fn calculate_rho_nu(&self) -> (f64, f64) {
        let mut nr_free = [0usize; 2];
        let mut ub = [INF; 2];
        let mut lb = [-INF; 2];
        let mut sum_free = [0.0; 2];

        for &i in &self.active {
            let s = usize::from(self.y[i] != 1);
            if self.is_upper_bound(i) {
                lb[s] = lb[s].max(self.g[i]);
            } else if self.is_lower_bound(i) {
                ub[s] = ub[s].min(self.g[i]);
            } else {
                nr_free[s] += 1;
                sum_free[s] += self.g[i];
            }
        }

        let mut r = [0.0; 2];
        for s in 0..2 {
            r[s] = if nr_free[s] > 0 {
                sum_free[s] / nr_free[s] as f64
            } else {
                midpoint(lb[s], ub[s])
            };
        }

        ((r[0] - r[1]) / 2.0, (r[0] + r[1]) / 2.0)
    }

    pub(super) fn activate_all(&mut self) {
        self.active = (0..self.l).collect();
        self.is_active.iter_mut().for_each(|a| *a = true);
    }
}

fn curvature(quad_coef: f64) -> f64 {
    if quad_coef > 0.0 {
        quad_coef
    } else {
        TAU
    }
}

/// Midpoint of the feasible interval for rho; falls back to the finite end
fn midpoint(lb: f64, ub: f64) -> f64 {
    match (lb.is_finite(), ub.is_finite()) {
        (true, true) => (lb + ub) / 2.0,
        (true, false) => lb,
        (false, true) => ub,
        (false, false) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseVector;
    use crate::kernel::{KernelFunction, LinearKernel};
    use crate::solver::qmatrix::SvcQ;
    use approx::assert_relative_eq;

    fn run(data: &[SparseVector], y: &[i8], c: f64, shrinking: bool) -> (Vec<f64>, SolutionInfo) {
        let x: Vec<&SparseVector> = data.iter().collect();
        let mut q = SvcQ::new(&x, y, KernelFunction::Linear(LinearKernel), 1.0);
        let p = vec![-1.0; data.len()];
        let mut alpha = vec![0.0; data.len()];
        let si = solve(
            Variant::Standard,
            &mut q,
            &p,
            y,
            &mut alpha,
            c,
            c,
            1e-5,
            shrinking,
        );
        (alpha, si)
    }

    #[test]
    fn test_two_point_hard_margin() {
        // x1 - x2 = (0, 1, 0, -1, -1); margin solution has alpha = 2/3 for both
        let data = vec![
            SparseVector::from_dense(&[1.0, 1.0, 1.0, 0.0, 0.0]).expect("valid dense vector"),
            SparseVector::from_dense(&[1.0, 0.0, 1.0, 1.0, 1.0]).expect("valid dense vector"),
        ];
        let (alpha, si) = run(&data, &[1, -1], 1.0, true);

        assert_relative_eq!(alpha[0], 2.0 / 3.0, epsilon = 1e-4);
        assert_relative_eq!(alpha[1], 2.0 / 3.0, epsilon = 1e-4);
        assert_relative_eq!(si.rho, -1.0 / 3.0, epsilon = 1e-4);
        assert_relative_eq!(si.obj, -2.0 / 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_box_constraint_respected() {
        let data = vec![
            SparseVector::from_dense(&[1.0]).expect("valid dense vector"),
            SparseVector::from_dense(&[1.1]).expect("valid dense vector"),
            SparseVector::from_dense(&[-1.0]).expect("valid dense vector"),
            SparseVector::from_dense(&[0.9]).expect("valid dense vector"),
        ];
        let y = [1, -1, -1, 1];
        let (alpha, _) = run(&data, &y, 0.5, false);

        let balance: f64 = alpha.iter().zip(y.iter()).map(|(a, &s)| a * f64::from(s)).sum();
        assert_relative_eq!(balance, 0.0, epsilon = 1e-9);
        assert!(alpha.iter().all(|&a| (0.0..=0.5).contains(&a)));
    }

    #[test]
    fn test_shrinking_does_not_change_solution() {
        let data: Vec<SparseVector> = (0..40)
            .map(|k| {
                let t = k as f64 / 10.0;
                SparseVector::from_dense(&[t.sin() + t * 0.1, t.cos()]).expect("valid dense vector")
            })
            .collect();
        let y: Vec<i8> = (0..40).map(|k| if k % 3 == 0 { 1 } else { -1 }).collect();

        let (a1, s1) = run(&data, &y, 1.0, true);
        let (a2, s2) = run(&data, &y, 1.0, false);
        assert_relative_eq!(s1.obj, s2.obj, epsilon = 1e-3);
        assert_eq!(a1.len(), a2.len());
    }

    #[test]
    fn test_midpoint_uses_finite_end() {
        assert_eq!(midpoint(-1.0, 3.0), 1.0);
        assert_eq!(midpoint(-INF, 3.0), 3.0);
        assert_eq!(midpoint(2.0, INF), 2.0);
        assert_eq!(midpoint(-INF, INF), 0.0);
    }
}
