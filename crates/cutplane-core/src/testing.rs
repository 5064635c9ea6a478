//! Toy oracles shared by the unit tests.

use std::cell::Cell;

use nalgebra::DVector;
use thiserror::Error;

use crate::oracle::{LatentStructuredModel, StructuredModel};

#[derive(Debug, Error)]
#[error("toy oracle failure: {0}")]
pub struct ToyError(pub &'static str);

/// One-dimensional sign problem: `psi(x, y) = x * y`, labels in `{-1, 1}`.
#[derive(Debug, Default)]
pub struct SignModel;

impl SignModel {
    const LABELS: [i32; 2] = [-1, 1];

    fn score(x: f64, y: i32, w: &DVector<f64>) -> f64 {
        w[0] * x * f64::from(y)
    }
}

impl StructuredModel for SignModel {
    type Input = f64;
    type Label = i32;
    type Error = ToyError;

    fn size_psi(&self) -> usize {
        1
    }

    fn psi(&self, x: &f64, y: &i32) -> Result<DVector<f64>, ToyError> {
        Ok(DVector::from_element(1, x * f64::from(*y)))
    }

    fn loss(&self, y: &i32, y_hat: &i32) -> Result<f64, ToyError> {
        Ok(f64::from((y - y_hat).abs()))
    }

    fn inference(&self, x: &f64, w: &DVector<f64>) -> Result<i32, ToyError> {
        let mut best = Self::LABELS[0];
        for y in Self::LABELS {
            if Self::score(*x, y, w) > Self::score(*x, best, w) {
                best = y;
            }
        }
        Ok(best)
    }

    fn loss_augmented_inference(
        &self,
        x: &f64,
        y: &i32,
        w: &DVector<f64>,
    ) -> Result<i32, ToyError> {
        let objective = |y_hat: i32| f64::from((y - y_hat).abs()) + Self::score(*x, y_hat, w);
        let mut best = Self::LABELS[0];
        for y_hat in Self::LABELS {
            if objective(y_hat) > objective(best) {
                best = y_hat;
            }
        }
        Ok(best)
    }
}

/// Multiclass problem with one weight block per class and 0/1 loss.
#[derive(Debug)]
pub struct MulticlassModel {
    pub features: usize,
    pub classes: usize,
    pub inference_calls: Cell<usize>,
}

impl MulticlassModel {
    pub fn new(features: usize, classes: usize) -> Self {
        Self {
            features,
            classes,
            inference_calls: Cell::new(0),
        }
    }

    fn score(&self, x: &[f64], y: usize, w: &DVector<f64>) -> f64 {
        x.iter()
            .enumerate()
            .map(|(j, v)| v * w[y * self.features + j])
            .sum()
    }
}

impl StructuredModel for MulticlassModel {
    type Input = Vec<f64>;
    type Label = usize;
    type Error = ToyError;

    fn size_psi(&self) -> usize {
        self.features * self.classes
    }

    fn psi(&self, x: &Vec<f64>, y: &usize) -> Result<DVector<f64>, ToyError> {
        if *y >= self.classes {
            return Err(ToyError("label out of range"));
        }
        let mut psi = DVector::zeros(self.size_psi());
        for (j, v) in x.iter().enumerate() {
            psi[y * self.features + j] = *v;
        }
        Ok(psi)
    }

    fn loss(&self, y: &usize, y_hat: &usize) -> Result<f64, ToyError> {
        Ok(if y == y_hat { 0.0 } else { 1.0 })
    }

    fn inference(&self, x: &Vec<f64>, w: &DVector<f64>) -> Result<usize, ToyError> {
        self.inference_calls.set(self.inference_calls.get() + 1);
        let mut best = 0;
        for y in 1..self.classes {
            if self.score(x, y, w) > self.score(x, best, w) {
                best = y;
            }
        }
        Ok(best)
    }

    fn loss_augmented_inference(
        &self,
        x: &Vec<f64>,
        y: &usize,
        w: &DVector<f64>,
    ) -> Result<usize, ToyError> {
        let objective = |c: usize| {
            let loss = if c == *y { 0.0 } else { 1.0 };
            loss + self.score(x, c, w)
        };
        let mut best = 0;
        for c in 1..self.classes {
            if objective(c) > objective(best) {
                best = c;
            }
        }
        Ok(best)
    }
}

/// Three well separated clusters in two dimensions plus a bias feature.
pub fn three_clusters() -> (Vec<Vec<f64>>, Vec<usize>) {
    let centers = [(4.0, 0.0), (-2.0, 3.5), (-2.0, -3.5)];
    let offsets = [(0.3, 0.2), (-0.2, 0.4), (0.1, -0.3)];
    let mut inputs = Vec::new();
    let mut labels = Vec::new();
    for (class, (cx, cy)) in centers.iter().enumerate() {
        for (dx, dy) in offsets {
            inputs.push(vec![cx + dx, cy + dy, 1.0]);
            labels.push(class);
        }
    }
    (inputs, labels)
}

/// Three clusters at half the spread of [`three_clusters`], jittered by up to
/// 3 in each coordinate so the classes overlap heavily.
pub fn overlapping_clusters() -> (Vec<Vec<f64>>, Vec<usize>) {
    let centers = [(2.0, 0.0), (-1.0, 1.75), (-1.0, -1.75)];
    (0..90)
        .map(|i| {
            let (cx, cy) = centers[i % 3];
            let x = cx + 3.0 * ((i * 7) as f64).sin();
            let y = cy + 3.0 * ((i * 7 + 13) as f64).sin();
            (vec![x, y, 1.0], i % 3)
        })
        .unzip()
}

/// Which call of [`FaultyModel`] misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Both inference calls error on the given sample input.
    Inference(i64),
    /// `psi` returns a vector of the wrong length.
    WrongDimension,
    /// `loss` returns a negative value.
    NegativeLoss,
}

/// Sign problem over integer inputs with an injected fault.
#[derive(Debug)]
pub struct FaultyModel {
    pub fault: Fault,
}

impl StructuredModel for FaultyModel {
    type Input = i64;
    type Label = i32;
    type Error = ToyError;

    fn size_psi(&self) -> usize {
        1
    }

    fn psi(&self, x: &i64, y: &i32) -> Result<DVector<f64>, ToyError> {
        let len = if self.fault == Fault::WrongDimension { 2 } else { 1 };
        Ok(DVector::from_element(len, (*x as f64) * f64::from(*y)))
    }

    fn loss(&self, y: &i32, y_hat: &i32) -> Result<f64, ToyError> {
        let loss = f64::from((y - y_hat).abs());
        Ok(if self.fault == Fault::NegativeLoss { -loss - 1.0 } else { loss })
    }

    fn inference(&self, x: &i64, w: &DVector<f64>) -> Result<i32, ToyError> {
        if self.fault == Fault::Inference(*x) {
            return Err(ToyError("inference exploded"));
        }
        Ok(if w[0] * (*x as f64) >= 0.0 { 1 } else { -1 })
    }

    fn loss_augmented_inference(
        &self,
        x: &i64,
        y: &i32,
        _w: &DVector<f64>,
    ) -> Result<i32, ToyError> {
        if self.fault == Fault::Inference(*x) {
            return Err(ToyError("inference exploded"));
        }
        Ok(-y)
    }
}

/// Latent view selection: the input carries two integer views, the latent state
/// picks one, and `psi(x, h, y)` puts `y * x[h]` into coordinate `h`.
#[derive(Debug, Default)]
pub struct ViewModel;

impl ViewModel {
    const LABELS: [i32; 2] = [-1, 1];
    const VIEWS: [usize; 2] = [0, 1];

    fn score(x: &[i32], h: usize, y: i32, w: &DVector<f64>) -> f64 {
        w[h] * f64::from(y * x[h])
    }
}

impl LatentStructuredModel for ViewModel {
    type Input = Vec<i32>;
    type Label = i32;
    type Latent = usize;
    type Error = ToyError;

    fn size_psi(&self) -> usize {
        2
    }

    fn psi(&self, x: &Vec<i32>, h: &usize, y: &i32) -> Result<DVector<f64>, ToyError> {
        let mut psi = DVector::zeros(2);
        psi[*h] = f64::from(y * x[*h]);
        Ok(psi)
    }

    fn loss(&self, y: &i32, y_hat: &i32) -> Result<f64, ToyError> {
        Ok(if y == y_hat { 0.0 } else { 1.0 })
    }

    fn latent(&self, x: &Vec<i32>, y: &i32, w: &DVector<f64>) -> Result<usize, ToyError> {
        let mut best = Self::VIEWS[0];
        for h in Self::VIEWS {
            if Self::score(x, h, *y, w) > Self::score(x, best, *y, w) {
                best = h;
            }
        }
        Ok(best)
    }

    fn inference(&self, x: &Vec<i32>, w: &DVector<f64>) -> Result<(usize, i32), ToyError> {
        let mut best = (Self::VIEWS[0], Self::LABELS[0]);
        for h in Self::VIEWS {
            for y in Self::LABELS {
                if Self::score(x, h, y, w) > Self::score(x, best.0, best.1, w) {
                    best = (h, y);
                }
            }
        }
        Ok(best)
    }

    fn loss_augmented_inference(
        &self,
        x: &Vec<i32>,
        y: &i32,
        w: &DVector<f64>,
    ) -> Result<(usize, i32), ToyError> {
        let objective = |h: usize, y_hat: i32| {
            let loss = if y_hat == *y { 0.0 } else { 1.0 };
            loss + Self::score(x, h, y_hat, w)
        };
        let mut best = (Self::VIEWS[0], Self::LABELS[0]);
        for h in Self::VIEWS {
            for y_hat in Self::LABELS {
                if objective(h, y_hat) > objective(best.0, best.1) {
                    best = (h, y_hat);
                }
            }
        }
        Ok(best)
    }
}
