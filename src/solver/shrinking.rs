//! Shrinking heuristic for the SMO solver
//!
//! Variables sitting at a bound whose gradient says they will stay there
//! are dropped from the active set. Their gradients go stale while they
//! are inactive and are rebuilt from `g_bar` before the final check.

use crate::solver::smo::{SmoState, Variant};
use log::debug;

const INF: f64 = f64::INFINITY;

impl SmoState<'_> {
    /// Shrink the active set
    ///
    /// Once the violation is within `10 * eps` every variable is
    /// reactivated one time so shrinking mistakes can be undone.
    pub(super) fn do_shrinking(&mut self) {
        match self.variant {
            Variant::Standard => self.do_shrinking_standard(),
            Variant::Nu => self.do_shrinking_nu(),
        }
    }

    fn do_shrinking_standard(&mut self) {
        // gmax1 over I_up of -y*G, gmax2 over I_low of y*G
        let mut gmax1 = -INF;
        let mut gmax2 = -INF;

        for &i in &self.active {
            let g = self.g[i];
            if self.y[i] == 1 {
                if !self.is_upper_bound(i) {
                    gmax1 = gmax1.max(-g);
                }
                if !self.is_lower_bound(i) {
                    gmax2 = gmax2.max(g);
                }
            } else {
                if !self.is_upper_bound(i) {
                    gmax2 = gmax2.max(-g);
                }
                if !self.is_lower_bound(i) {
                    gmax1 = gmax1.max(g);
                }
            }
        }

        if !self.unshrink && gmax1 + gmax2 <= self.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.activate_all();
            debug!("unshrinking all {} variables", self.l);
        }

        self.retain_active(|state, i| !state.be_shrunk_standard(i, gmax1, gmax2));
    }

    fn do_shrinking_nu(&mut self) {
        let mut gmax1 = -INF; // y = +1, not at upper bound
        let mut gmax2 = -INF; // y = +1, not at lower bound
        let mut gmax3 = -INF; // y = -1, not at upper bound
        let mut gmax4 = -INF; // y = -1, not at lower bound

        for &i in &self.active {
            let g = self.g[i];
            if !self.is_upper_bound(i) {
                if self.y[i] == 1 {
                    gmax1 = gmax1.max(-g);
                } else {
                    gmax4 = gmax4.max(-g);
                }
            }
            if !self.is_lower_bound(i) {
                if self.y[i] == 1 {
                    gmax2 = gmax2.max(g);
                } else {
                    gmax3 = gmax3.max(g);
                }
            }
        }

        if !self.unshrink && f64::max(gmax1 + gmax2, gmax3 + gmax4) <= self.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.activate_all();
            debug!("unshrinking all {} variables", self.l);
        }

        self.retain_active(|state, i| !state.be_shrunk_nu(i, gmax1, gmax2, gmax3, gmax4));
    }

    fn be_shrunk_standard(&self, i: usize, gmax1: f64, gmax2: f64) -> bool {
        let g = self.g[i];
        if self.is_upper_bound(i) {
            if self.y[i] == 1 {
                -g > gmax1
            } else {
                -g > gmax2
            }
        } else if self.is_lower_bound(i) {
            if self.y[i] == 1 {
                g > gmax2
            } else {
                g > gmax1
            }
        } else {
            false
        }
    }

    fn be_shrunk_nu(&self, i: usize, gmax1: f64, gmax2: f64, gmax3: f64, gmax4: f64) -> bool {
        let g = self.g[i];
        if self.is_upper_bound(i) {
            if self.y[i] == 1 {
                -g > gmax1
            } else {
                -g > gmax4
            }
        } else if self.is_lower_bound(i) {
            if self.y[i] == 1 {
                g > gmax2
            } else {
                g > gmax3
            }
        } else {
            false
        }
    }

    fn retain_active<F>(&mut self, keep: F)
    where
        F: Fn(&Self, usize) -> bool,
    {
        let candidates = std::mem::take(&mut self.active);
        let mut active = Vec::with_capacity(candidates.len());
        for i in candidates {
            if keep(self, i) {
                active.push(i);
            } else {
                self.is_active[i] = false;
            }
        }
        self.active = active;
    }

    /// Rebuild the gradient of every inactive variable
    pub(super) fn reconstruct_gradient(&mut self) {
        if self.active.len() == self.l {
            return;
        }

        let inactive: Vec<usize> = (0..self.l).filter(|&j| !self.is_active[j]).collect();
        for &j in &inactive {
            self.g[j] = self.g_bar[j] + self.p[j];
        }

        let free: Vec<usize> = self
            .active
            .iter()
            .copied()
            .filter(|&i| self.is_free(i))
            .collect();
        if free.len() * 2 < self.active.len() {
            debug!("few free variables while reconstructing the gradient, training without shrinking may be faster");
        }

        for i in free {
            let row = self.q.row(i);
            let alpha_i = self.alpha[i];
            for &j in &inactive {
                self.g[j] += alpha_i * row[j];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::SparseVector;
    use crate::kernel::{KernelFunction, RBFKernel};
    use crate::solver::qmatrix::SvcQ;
    use crate::solver::smo::{solve, Variant};
    use approx::assert_relative_eq;

    fn dataset() -> (Vec<SparseVector>, Vec<i8>) {
        let data = (0..60)
            .map(|k| {
                let t = k as f64 * 0.37;
                SparseVector::from_dense(&[t.sin() * 2.0, (t * 1.3).cos()])
                    .expect("valid dense vector")
            })
            .collect();
        let y = (0..60).map(|k| if (k * 7) % 5 < 2 { 1 } else { -1 }).collect();
        (data, y)
    }

    fn objective(variant: Variant, shrinking: bool) -> (f64, f64) {
        let (data, y) = dataset();
        let x: Vec<&SparseVector> = data.iter().collect();
        let mut q = SvcQ::new(&x, &y, KernelFunction::Rbf(RBFKernel::new(0.5)), 1.0);
        let (p, mut alpha) = match variant {
            Variant::Standard => (vec![-1.0; 60], vec![0.0; 60]),
            // feasible nu start: equal mass on each side
            Variant::Nu => {
                let mut alpha = vec![0.0; 60];
                let mut budget = [6.0f64, 6.0f64];
                for (a, &s) in alpha.iter_mut().zip(y.iter()) {
                    let side = usize::from(s != 1);
                    *a = budget[side].min(1.0);
                    budget[side] -= *a;
                }
                (vec![0.0; 60], alpha)
            }
        };
        let si = solve(variant, &mut q, &p, &y, &mut alpha, 1.0, 1.0, 1e-6, shrinking);
        (si.obj, si.rho)
    }

    #[test]
    fn test_shrinking_matches_unshrunk_standard() {
        let (obj_shrunk, rho_shrunk) = objective(Variant::Standard, true);
        let (obj_full, rho_full) = objective(Variant::Standard, false);
        assert_relative_eq!(obj_shrunk, obj_full, epsilon = 1e-4);
        assert_relative_eq!(rho_shrunk, rho_full, epsilon = 1e-2);
    }

    #[test]
    fn test_shrinking_matches_unshrunk_nu() {
        let (obj_shrunk, _) = objective(Variant::Nu, true);
        let (obj_full, _) = objective(Variant::Nu, false);
        assert_relative_eq!(obj_shrunk, obj_full, epsilon = 1e-4);
    }
}
