//! # Working Set
//!
//! Append-only, duplicate-free store of cutting planes. Each entry pairs a
//! constraint key with its scaled feature difference and its loss. Membership is
//! decided by value equality of the key.

use std::collections::HashSet;
use std::hash::Hash;

use nalgebra::{DMatrix, DVector};

/// Constraint key of the fully observed trainer.
///
/// The sample index is part of the key, so the same `(label, predicted)` pair
/// coming from two different samples yields two constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleConstraint<Y> {
    pub sample: usize,
    pub label: Y,
    pub predicted: Y,
}

/// Constraint key of the latent trainer.
///
/// Carries the input itself instead of a sample index: identical inputs with
/// identical completions collapse into one constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LatentConstraint<X, H, Y> {
    pub input: X,
    pub latent: H,
    pub label: Y,
    pub predicted_latent: H,
    pub predicted: Y,
}

/// One cutting plane.
#[derive(Debug, Clone)]
pub struct WorkingEntry<K> {
    pub key: K,
    /// Scaled `psi(x, y) - psi(x, y_hat)`.
    pub feature_difference: DVector<f64>,
    pub loss: f64,
}

/// Insertion-ordered set of cutting planes.
#[derive(Debug, Clone)]
pub struct WorkingSet<K> {
    size_psi: usize,
    index: HashSet<K>,
    entries: Vec<WorkingEntry<K>>,
}

impl<K> WorkingSet<K>
where
    K: Clone + Eq + Hash,
{
    /// Create an empty working set over feature vectors of dimension `size_psi`.
    pub fn new(size_psi: usize) -> Self {
        Self {
            size_psi,
            index: HashSet::new(),
            entries: Vec::new(),
        }
    }

    pub fn size_psi(&self) -> usize {
        self.size_psi
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains(key)
    }

    /// Appends a constraint unless an equal key is already present.
    ///
    /// Returns `true` if the constraint was inserted. The caller guarantees a
    /// strictly positive loss and a difference vector of length `size_psi`.
    pub fn insert(&mut self, key: K, feature_difference: DVector<f64>, loss: f64) -> bool {
        debug_assert!(loss > 0.0);
        debug_assert_eq!(feature_difference.len(), self.size_psi);
        if self.index.contains(&key) {
            return false;
        }
        self.index.insert(key.clone());
        self.entries.push(WorkingEntry {
            key,
            feature_difference,
            loss,
        });
        true
    }

    pub fn entries(&self) -> &[WorkingEntry<K>] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Gram matrix of the feature differences, `K[i][j] = d_i . d_j`.
    pub fn gram(&self) -> DMatrix<f64> {
        let n = self.entries.len();
        let mut gram = DMatrix::zeros(n, n);
        for i in 0..n {
            let di = &self.entries[i].feature_difference;
            for j in i..n {
                let v = di.dot(&self.entries[j].feature_difference);
                gram[(i, j)] = v;
                gram[(j, i)] = v;
            }
        }
        gram
    }

    /// Loss vector aligned with the Gram matrix rows.
    pub fn losses(&self) -> DVector<f64> {
        DVector::from_iterator(self.entries.len(), self.entries.iter().map(|e| e.loss))
    }

    /// `sum_i coeffs[i] * d_i` over the entries whose coefficient exceeds `threshold`.
    pub fn combine(&self, coeffs: &DVector<f64>, threshold: f64) -> DVector<f64> {
        debug_assert_eq!(coeffs.len(), self.entries.len());
        let mut w = DVector::zeros(self.size_psi);
        for (entry, &alpha) in self.entries.iter().zip(coeffs.iter()) {
            if alpha > threshold {
                w.axpy(alpha, &entry.feature_difference, 1.0);
            }
        }
        w
    }
}
