//! Synthetic structured problems used by the demo.

use cutplane::{LatentStructuredModel, StructuredModel};
use nalgebra::DVector;
use oorandom::Rand64;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("label {label} is out of range for {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },

    #[error("unknown bag {0}")]
    UnknownBag(usize),

    #[error("view {view} is out of range for {views} views")]
    ViewOutOfRange { view: usize, views: usize },
}

fn uniform(rng: &mut Rand64, spread: f64) -> f64 {
    (rng.rand_float() * 2.0 - 1.0) * spread
}

/// Multiclass classification with one weight block per class and 0/1 loss.
///
/// Inputs carry a trailing bias feature.
#[derive(Debug, Clone)]
pub struct Multiclass {
    features: usize,
    classes: usize,
}

impl Multiclass {
    pub fn new(features: usize, classes: usize) -> Self {
        Self {
            features: features + 1,
            classes,
        }
    }

    /// Samples `n` points around `classes` random centers, cycling through the classes.
    pub fn generate(&self, rng: &mut Rand64, n: usize, noise: f64) -> (Vec<Vec<f64>>, Vec<usize>) {
        let dims = self.features - 1;
        let centers: Vec<Vec<f64>> = (0..self.classes)
            .map(|_| (0..dims).map(|_| uniform(rng, 5.0)).collect())
            .collect();

        let mut inputs = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let class = i % self.classes;
            let mut x: Vec<f64> = centers[class]
                .iter()
                .map(|c| c + uniform(rng, noise))
                .collect();
            x.push(1.0);
            inputs.push(x);
            labels.push(class);
        }
        (inputs, labels)
    }

    fn score(&self, x: &[f64], y: usize, w: &DVector<f64>) -> f64 {
        let offset = y * self.features;
        x.iter().enumerate().map(|(j, v)| v * w[offset + j]).sum()
    }

    fn argmax(&self, objective: impl Fn(usize) -> f64) -> usize {
        let mut best = 0;
        let mut best_value = objective(0);
        for y in 1..self.classes {
            let value = objective(y);
            if value > best_value {
                best = y;
                best_value = value;
            }
        }
        best
    }
}

impl StructuredModel for Multiclass {
    type Input = Vec<f64>;
    type Label = usize;
    type Error = ProblemError;

    fn size_psi(&self) -> usize {
        self.features * self.classes
    }

    fn psi(&self, x: &Vec<f64>, y: &usize) -> Result<DVector<f64>, ProblemError> {
        if *y >= self.classes {
            return Err(ProblemError::LabelOutOfRange {
                label: *y,
                classes: self.classes,
            });
        }
        let mut psi = DVector::zeros(self.size_psi());
        psi.rows_mut(y * self.features, self.features)
            .copy_from_slice(x);
        Ok(psi)
    }

    fn loss(&self, y: &usize, y_hat: &usize) -> Result<f64, ProblemError> {
        Ok(if y == y_hat { 0.0 } else { 1.0 })
    }

    fn inference(&self, x: &Vec<f64>, w: &DVector<f64>) -> Result<usize, ProblemError> {
        Ok(self.argmax(|y| self.score(x, y, w)))
    }

    fn loss_augmented_inference(
        &self,
        x: &Vec<f64>,
        y: &usize,
        w: &DVector<f64>,
    ) -> Result<usize, ProblemError> {
        Ok(self.argmax(|c| {
            let loss = if c == *y { 0.0 } else { 1.0 };
            loss + self.score(x, c, w)
        }))
    }
}

/// Binary classification of bags of views, where only one view of each bag
/// carries the class signal. The latent state names that view.
///
/// Inputs are bag ids into the data held by the model, so they can key
/// constraints. `psi(x, h, y) = y * view_h(x)`.
#[derive(Debug, Clone)]
pub struct ViewSelection {
    features: usize,
    views: usize,
    bags: Vec<Vec<DVector<f64>>>,
}

impl ViewSelection {
    pub fn new(features: usize, views: usize) -> Self {
        Self {
            features,
            views,
            bags: Vec::new(),
        }
    }

    /// Adds `n` bags with alternating labels and returns their ids and labels.
    pub fn generate(&mut self, rng: &mut Rand64, n: usize, noise: f64) -> (Vec<usize>, Vec<i32>) {
        let direction: DVector<f64> = DVector::from_fn(self.features, |_, _| uniform(rng, 1.0));
        let direction = direction.normalize() * 2.0;

        let mut ids = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let label = if i % 2 == 0 { 1 } else { -1 };
            let informative = rng.rand_range(0..self.views as u64) as usize;
            let bag = (0..self.views)
                .map(|v| {
                    let noise_vec = DVector::from_fn(self.features, |_, _| uniform(rng, noise));
                    if v == informative {
                        &direction * f64::from(label) + noise_vec
                    } else {
                        noise_vec
                    }
                })
                .collect();
            ids.push(self.bags.len());
            self.bags.push(bag);
            labels.push(label);
        }
        (ids, labels)
    }

    fn view(&self, bag: usize, h: usize) -> Result<&DVector<f64>, ProblemError> {
        let views = self.bags.get(bag).ok_or(ProblemError::UnknownBag(bag))?;
        views.get(h).ok_or(ProblemError::ViewOutOfRange {
            view: h,
            views: self.views,
        })
    }

    fn score(&self, bag: usize, h: usize, y: i32, w: &DVector<f64>) -> Result<f64, ProblemError> {
        Ok(f64::from(y) * w.dot(self.view(bag, h)?))
    }

    fn argmax(
        &self,
        objective: impl Fn(usize, i32) -> Result<f64, ProblemError>,
        labels: &[i32],
    ) -> Result<(usize, i32), ProblemError> {
        let mut best = (0, labels[0]);
        let mut best_value = f64::NEG_INFINITY;
        for h in 0..self.views {
            for &y in labels {
                let value = objective(h, y)?;
                if value > best_value {
                    best = (h, y);
                    best_value = value;
                }
            }
        }
        Ok(best)
    }
}

impl LatentStructuredModel for ViewSelection {
    type Input = usize;
    type Label = i32;
    type Latent = usize;
    type Error = ProblemError;

    fn size_psi(&self) -> usize {
        self.features
    }

    fn psi(&self, x: &usize, h: &usize, y: &i32) -> Result<DVector<f64>, ProblemError> {
        Ok(self.view(*x, *h)? * f64::from(*y))
    }

    fn loss(&self, y: &i32, y_hat: &i32) -> Result<f64, ProblemError> {
        Ok(if y == y_hat { 0.0 } else { 1.0 })
    }

    fn latent(&self, x: &usize, y: &i32, w: &DVector<f64>) -> Result<usize, ProblemError> {
        let (h, _) = self.argmax(|h, _| self.score(*x, h, *y, w), &[*y])?;
        Ok(h)
    }

    fn inference(&self, x: &usize, w: &DVector<f64>) -> Result<(usize, i32), ProblemError> {
        self.argmax(|h, y| self.score(*x, h, y, w), &[1, -1])
    }

    fn loss_augmented_inference(
        &self,
        x: &usize,
        y: &i32,
        w: &DVector<f64>,
    ) -> Result<(usize, i32), ProblemError> {
        self.argmax(
            |h, y_hat| {
                let loss = if y_hat == *y { 0.0 } else { 1.0 };
                Ok(loss + self.score(*x, h, y_hat, w)?)
            },
            &[1, -1],
        )
    }
}
