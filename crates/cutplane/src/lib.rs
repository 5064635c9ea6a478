//! # Cutplane
//!
//! Structured SVM training by the cutting-plane method. This crate re-exports
//! [`cutplane_core`]; see its documentation for the oracle traits and trainers.

pub use cutplane_core::*;
