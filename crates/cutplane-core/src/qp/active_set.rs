//! # Active-Set Solver
//!
//! Primal active-set method for `f(alpha) = 1/2 alpha' K alpha - l' alpha` over
//! `[0, C]`. Every coefficient is either free or pinned at a bound. A step
//! either minimizes `f` over the free coefficients with conjugate gradients and
//! moves towards that minimizer until a bound blocks, or, once the free face is
//! optimal, releases the pinned coefficient whose multiplier has the wrong sign.
//!
//! Working-set Gram matrices have rank at most `size_psi`, so CG on a face
//! finishes in a handful of iterations or meets a direction of zero curvature,
//! along which `f` falls linearly until some coefficient reaches its bound.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use super::{QpError, QpProblem, QpSolve};
use crate::config::QpConfig;

/// Relative curvature below which a CG direction is treated as flat.
const CURVATURE_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Free,
    Lower,
    Upper,
}

impl Bound {
    fn of(alpha: f64, c: f64) -> Self {
        if alpha <= 0.0 {
            Bound::Lower
        } else if alpha >= c {
            Bound::Upper
        } else {
            Bound::Free
        }
    }
}

/// Search direction over the free coefficients, zero elsewhere.
#[derive(Debug)]
enum Direction {
    /// Minimizer of `f` on the free face, reached by a unit step.
    Newton(DVector<f64>),
    /// Flat descent direction; `f` decreases linearly along it.
    Ray(DVector<f64>),
}

/// Active-set solver for the box-constrained QP.
#[derive(Debug, Clone)]
pub struct ActiveSet {
    tolerance: f64,
    max_steps: usize,
}

impl ActiveSet {
    /// # Arguments
    /// * `tolerance` - Largest projected-gradient entry accepted as optimal
    /// * `max_steps` - Face solves plus bound releases before giving up
    pub fn new(tolerance: f64, max_steps: usize) -> Self {
        Self {
            tolerance,
            max_steps,
        }
    }

    pub fn from_config(config: &QpConfig) -> Self {
        Self::new(config.tolerance, config.max_steps)
    }
}

impl Default for ActiveSet {
    fn default() -> Self {
        Self::from_config(&QpConfig::default())
    }
}

/// Gradient component restricted to the feasible directions at `alpha`.
fn projected_gradient(g: f64, alpha: f64, c: f64) -> f64 {
    if alpha <= 0.0 {
        g.min(0.0)
    } else if alpha >= c {
        g.max(0.0)
    } else {
        g
    }
}

/// Minimizes the quadratic over `free` by conjugate gradients from the current point.
fn face_direction(
    gram: &DMatrix<f64>,
    grad: &DVector<f64>,
    free: &[usize],
    tolerance: f64,
) -> Direction {
    let n = grad.len();
    let max_diagonal = gram.diagonal().amax();

    let mut step = DVector::zeros(n);
    let mut residual = DVector::zeros(n);
    for &i in free {
        residual[i] = -grad[i];
    }
    let mut p = residual.clone();
    let mut omega = residual.norm_squared();

    // Exact arithmetic needs at most |free| iterations; allow slack for rounding.
    for _ in 0..2 * free.len() + 2 {
        let full = gram * &p;
        let mut q = DVector::zeros(n);
        for &i in free {
            q[i] = full[i];
        }

        let curvature = p.dot(&q);
        if curvature <= CURVATURE_FLOOR * max_diagonal * p.norm_squared() {
            return Direction::Ray(p);
        }

        let gamma = omega / curvature;
        step.axpy(gamma, &p, 1.0);
        residual.axpy(-gamma, &q, 1.0);
        if residual.amax() <= 0.1 * tolerance {
            break;
        }

        let omega_new = residual.norm_squared();
        p = &residual + &p * (omega_new / omega);
        omega = omega_new;
    }

    Direction::Newton(step)
}

/// Moves the free coefficients along `direction` and pins the first one to hit a bound.
fn advance(
    alpha: &mut DVector<f64>,
    state: &mut [Bound],
    free: &[usize],
    direction: Direction,
    c: f64,
) {
    let (d, mut reach) = match direction {
        Direction::Newton(d) => (d, 1.0),
        Direction::Ray(d) => (d, f64::INFINITY),
    };

    let mut blocking = None;
    for &i in free {
        let limit = if d[i] > 0.0 {
            (c - alpha[i]) / d[i]
        } else if d[i] < 0.0 {
            -alpha[i] / d[i]
        } else {
            continue;
        };
        if limit < reach {
            reach = limit;
            blocking = Some(i);
        }
    }
    if !reach.is_finite() {
        return;
    }

    for &i in free {
        alpha[i] = (alpha[i] + reach * d[i]).clamp(0.0, c);
    }
    if let Some(i) = blocking {
        if d[i] > 0.0 {
            alpha[i] = c;
            state[i] = Bound::Upper;
        } else {
            alpha[i] = 0.0;
            state[i] = Bound::Lower;
        }
    }
}

/// Pinned coefficient whose multiplier is most negative beyond `tolerance`.
fn worst_bound(state: &[Bound], grad: &DVector<f64>, tolerance: f64) -> Option<usize> {
    let mut worst = tolerance;
    let mut index = None;
    for (i, bound) in state.iter().enumerate() {
        let pull = match bound {
            Bound::Free => continue,
            Bound::Lower => -grad[i],
            Bound::Upper => grad[i],
        };
        if pull > worst {
            worst = pull;
            index = Some(i);
        }
    }
    index
}

impl QpSolve for ActiveSet {
    fn solve(
        &self,
        problem: &QpProblem,
        warm_start: Option<&DVector<f64>>,
    ) -> Result<DVector<f64>, QpError> {
        problem.validate()?;
        let n = problem.len();
        let c = problem.c;
        let gram = &problem.gram;

        let mut alpha = DVector::zeros(n);
        if let Some(init) = warm_start {
            for (i, &a) in init.iter().take(n).enumerate() {
                if !a.is_finite() {
                    return Err(QpError::NonFinite { index: i });
                }
                alpha[i] = a.clamp(0.0, c);
            }
        }
        if n == 0 {
            return Ok(alpha);
        }

        let mut state: Vec<Bound> = alpha.iter().map(|&a| Bound::of(a, c)).collect();
        let mut violation = f64::INFINITY;

        for step in 0..self.max_steps {
            let grad = gram * &alpha - &problem.losses;
            if let Some(index) = grad.iter().position(|g| !g.is_finite()) {
                return Err(QpError::NonFinite { index });
            }

            violation = alpha
                .iter()
                .zip(grad.iter())
                .map(|(&a, &g)| projected_gradient(g, a, c).abs())
                .fold(0.0, f64::max);
            if violation <= self.tolerance {
                debug!(steps = step, violation, constraints = n, "dual QP converged");
                return Ok(alpha);
            }

            let free: Vec<usize> = (0..n).filter(|&i| state[i] == Bound::Free).collect();
            let free_violation = free.iter().map(|&i| grad[i].abs()).fold(0.0, f64::max);
            if free_violation > self.tolerance {
                let direction = face_direction(gram, &grad, &free, self.tolerance);
                advance(&mut alpha, &mut state, &free, direction, c);
            } else if let Some(i) = worst_bound(&state, &grad, self.tolerance) {
                state[i] = Bound::Free;
            }
        }

        Err(QpError::NotConverged {
            steps: self.max_steps,
            violation,
        })
    }
}
