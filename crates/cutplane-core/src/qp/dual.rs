use std::hash::Hash;

use nalgebra::DVector;
use tracing::{debug, warn};

use super::{QpError, QpProblem, QpSolve};
use crate::config::QpConfig;
use crate::working_set::WorkingSet;

/// Outcome of one dual solve over the working set.
#[derive(Debug, Clone)]
pub struct QpSolution {
    /// Dual coefficients, one per working-set entry.
    pub alphas: DVector<f64>,
    /// Primal weights `sum alpha_i * d_i` over the support vectors.
    pub weights: DVector<f64>,
    /// Number of coefficients above the support threshold.
    pub support_vectors: usize,
    /// Number of coefficients pinned at `C`.
    pub at_upper_bound: usize,
}

/// Dual QP driver owned by a single training run.
///
/// When warm starting is enabled, the coefficients of the previous solve seed the
/// next one. The stored state lives only as long as this value.
#[derive(Debug)]
pub struct DualQp<Q> {
    solver: Q,
    c: f64,
    support_threshold: f64,
    upper_bound_tolerance: f64,
    box_slack: f64,
    warm_start: bool,
    previous: Option<DVector<f64>>,
}

impl<Q: QpSolve> DualQp<Q> {
    pub fn new(solver: Q, c: f64, config: &QpConfig, warm_start: bool) -> Self {
        Self {
            solver,
            c,
            support_threshold: config.support_threshold,
            upper_bound_tolerance: config.upper_bound_tolerance,
            box_slack: config.box_slack,
            warm_start,
            previous: None,
        }
    }

    /// Whether solves are seeded from the previous solution.
    pub fn warm_start(&self) -> bool {
        self.warm_start
    }

    /// Coefficients kept from the last solve, if warm starting.
    pub fn previous(&self) -> Option<&DVector<f64>> {
        self.previous.as_ref()
    }

    /// Solves the dual over the whole working set and derives the weight vector.
    pub fn solve<K>(&mut self, working_set: &WorkingSet<K>) -> Result<QpSolution, QpError>
    where
        K: Clone + Eq + Hash,
    {
        let problem = QpProblem::new(working_set.gram(), working_set.losses(), self.c);
        let warm = if self.warm_start {
            self.previous.as_ref()
        } else {
            None
        };
        let mut alphas = self.solver.solve(&problem, warm)?;

        if alphas.len() != problem.len() {
            return Err(QpError::ShapeMismatch {
                gram: problem.len(),
                losses: alphas.len(),
            });
        }
        for (index, a) in alphas.iter_mut().enumerate() {
            if !a.is_finite() || *a < -self.box_slack || *a > self.c + self.box_slack {
                return Err(QpError::OutOfBox { index, value: *a });
            }
            *a = a.clamp(0.0, self.c);
        }

        let support_vectors = alphas
            .iter()
            .filter(|&&a| a > self.support_threshold)
            .count();
        let at_upper_bound = alphas
            .iter()
            .filter(|&&a| self.c - a < self.upper_bound_tolerance)
            .count();
        let weights = working_set.combine(&alphas, self.support_threshold);

        debug!(
            support_vectors,
            constraints = alphas.len(),
            at_upper_bound,
            objective = problem.objective(&alphas),
            "dual solve finished"
        );
        if at_upper_bound > 0 && at_upper_bound == support_vectors {
            warn!(
                at_upper_bound,
                c = self.c,
                "every support vector is at the upper bound; C may be too small"
            );
        }

        if self.warm_start {
            self.previous = Some(alphas.clone());
        }

        Ok(QpSolution {
            alphas,
            weights,
            support_vectors,
            at_upper_bound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qp::ActiveSet;
    use crate::working_set::SampleConstraint;
    use approx::assert_relative_eq;

    fn working_set(diffs: &[[f64; 2]], losses: &[f64]) -> WorkingSet<SampleConstraint<u8>> {
        let mut ws = WorkingSet::new(2);
        for (i, (d, &l)) in diffs.iter().zip(losses).enumerate() {
            ws.insert(
                SampleConstraint {
                    sample: i,
                    label: 0,
                    predicted: 1,
                },
                DVector::from_row_slice(d),
                l,
            );
        }
        ws
    }

    fn dual(c: f64, warm_start: bool) -> DualQp<ActiveSet> {
        DualQp::new(
            ActiveSet::new(1e-10, 10_000),
            c,
            &QpConfig::default(),
            warm_start,
        )
    }

    #[test]
    fn weights_are_support_vector_combination() {
        let ws = working_set(&[[1.0, 0.0], [0.0, 2.0], [1.0, 1.0]], &[0.5, 1.0, 0.25]);
        let solution = dual(10.0, false).solve(&ws).unwrap();

        let mut expected = DVector::zeros(2);
        for (entry, &a) in ws.entries().iter().zip(solution.alphas.iter()) {
            if a > 1e-5 {
                expected += entry.feature_difference.clone() * a;
            }
        }
        assert_relative_eq!(solution.weights, expected, epsilon = 1e-9);
        for &a in solution.alphas.iter() {
            assert!((0.0..=10.0).contains(&a));
        }
    }

    #[test]
    fn counts_support_vectors_and_bound_coefficients() {
        // Tiny differences push both coefficients to C.
        let ws = working_set(&[[1e-3, 0.0], [0.0, 1e-3]], &[1.0, 1.0]);
        let solution = dual(1.0, false).solve(&ws).unwrap();
        assert_eq!(solution.support_vectors, 2);
        assert_eq!(solution.at_upper_bound, 2);
        assert_relative_eq!(solution.weights[0], 1e-3);
    }

    #[test]
    fn warm_start_state_is_kept_only_when_enabled() {
        let ws = working_set(&[[1.0, 0.0]], &[1.0]);

        let mut cold = dual(1.0, false);
        cold.solve(&ws).unwrap();
        assert!(cold.previous().is_none());

        let mut warm = dual(1.0, true);
        let first = warm.solve(&ws).unwrap();
        assert_eq!(warm.previous(), Some(&first.alphas));

        let ws = working_set(&[[1.0, 0.0], [0.0, 1.0]], &[1.0, 0.5]);
        let second = warm.solve(&ws).unwrap();
        assert_eq!(second.alphas.len(), 2);
        assert_relative_eq!(second.alphas[1], 0.5, epsilon = 1e-9);
    }

    /// Returns the same coefficient for every constraint.
    struct ConstantSolver(f64);

    impl QpSolve for ConstantSolver {
        fn solve(
            &self,
            problem: &QpProblem,
            _warm_start: Option<&DVector<f64>>,
        ) -> Result<DVector<f64>, QpError> {
            Ok(DVector::from_element(problem.len(), self.0))
        }
    }

    #[test]
    fn rejects_coefficients_outside_the_box() {
        let ws = working_set(&[[1.0, 0.0]], &[1.0]);
        let mut qp = DualQp::new(ConstantSolver(5.0), 1.0, &QpConfig::default(), false);
        let err = qp.solve(&ws).unwrap_err();
        assert_eq!(
            err,
            QpError::OutOfBox {
                index: 0,
                value: 5.0
            }
        );
    }

    #[test]
    fn box_slack_is_clipped_and_exceeding_it_is_rejected() {
        let ws = working_set(&[[1.0, 0.0]], &[1.0]);
        let config = QpConfig {
            box_slack: 1e-4,
            ..QpConfig::default()
        };

        let mut qp = DualQp::new(ConstantSolver(1.0 + 5e-5), 1.0, &config, false);
        let solution = qp.solve(&ws).unwrap();
        assert_eq!(solution.alphas[0], 1.0);

        let mut qp = DualQp::new(ConstantSolver(-5e-5), 1.0, &config, false);
        assert_eq!(qp.solve(&ws).unwrap().alphas[0], 0.0);

        let mut qp = DualQp::new(ConstantSolver(1.0 + 2e-4), 1.0, &config, false);
        assert!(matches!(
            qp.solve(&ws),
            Err(QpError::OutOfBox { index: 0, .. })
        ));
    }
}
