//! # Structured Model Oracles
//!
//! The problem-specific half of a structured SVM. An oracle knows how to map an
//! (input, label) pair into a joint feature vector, how to compare labels, and how
//! to search the label space. The trainers only ever talk to the problem through
//! these traits.

use nalgebra::DVector;

/// Oracle for a fully observed structured prediction problem.
pub trait StructuredModel {
    /// Structured input `x`.
    type Input;
    /// Structured label `y`.
    type Label: Clone;
    /// Error returned by the oracle calls.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Dimension of the joint feature map.
    fn size_psi(&self) -> usize;

    /// Joint feature map `psi(x, y)`.
    fn psi(&self, x: &Self::Input, y: &Self::Label) -> Result<DVector<f64>, Self::Error>;

    /// Task loss `loss(y, y_hat) >= 0`.
    fn loss(&self, y: &Self::Label, y_hat: &Self::Label) -> Result<f64, Self::Error>;

    /// Highest scoring label `argmax_y w . psi(x, y)`.
    fn inference(&self, x: &Self::Input, w: &DVector<f64>) -> Result<Self::Label, Self::Error>;

    /// Most violated label `argmax_y_hat loss(y, y_hat) + w . psi(x, y_hat)`.
    fn loss_augmented_inference(
        &self,
        x: &Self::Input,
        y: &Self::Label,
        w: &DVector<f64>,
    ) -> Result<Self::Label, Self::Error>;
}

/// Oracle for a structured problem with an unobserved latent variable `h`.
pub trait LatentStructuredModel {
    type Input;
    type Label: Clone;
    /// Latent state `h`.
    type Latent: Clone;
    type Error: std::error::Error + Send + Sync + 'static;

    fn size_psi(&self) -> usize;

    /// Joint feature map `psi(x, h, y)`.
    fn psi(
        &self,
        x: &Self::Input,
        h: &Self::Latent,
        y: &Self::Label,
    ) -> Result<DVector<f64>, Self::Error>;

    fn loss(&self, y: &Self::Label, y_hat: &Self::Label) -> Result<f64, Self::Error>;

    /// Best latent completion of a labelled example, `argmax_h w . psi(x, h, y)`.
    fn latent(
        &self,
        x: &Self::Input,
        y: &Self::Label,
        w: &DVector<f64>,
    ) -> Result<Self::Latent, Self::Error>;

    /// Joint prediction `argmax_(h, y) w . psi(x, h, y)`.
    fn inference(
        &self,
        x: &Self::Input,
        w: &DVector<f64>,
    ) -> Result<(Self::Latent, Self::Label), Self::Error>;

    /// Joint loss-augmented search `argmax_(h, y_hat) loss(y, y_hat) + w . psi(x, h, y_hat)`.
    fn loss_augmented_inference(
        &self,
        x: &Self::Input,
        y: &Self::Label,
        w: &DVector<f64>,
    ) -> Result<(Self::Latent, Self::Label), Self::Error>;
}
