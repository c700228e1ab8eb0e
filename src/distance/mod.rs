//! Distance and travel time lookups.
//!
//! Provides the id-keyed [`MatrixPair`], the [`MatrixProvider`] seam for
//! external routing services, and an incremental [`MatrixCache`].

mod matrix;
mod provider;

pub use matrix::{Edge, MatrixPair};
pub use provider::{EuclideanProvider, MatrixCache, MatrixProvider};
