//! Contract with the external convergence-diagnostics collaborator.
//!
//! The estimators themselves (effective sample size, potential scale
//! reduction) live outside this crate; criteria only consume their
//! per-cell output. Translating bundle axis order into whatever layout the
//! estimator expects is the implementor's concern.

use ndarray::Array1;
use std::collections::BTreeMap;

use crate::bundle::SampleBundle;
use crate::error::Result;

/// One diagnostic value per parameter dimension, keyed by variable name.
pub type DiagnosticCells = BTreeMap<String, Array1<f64>>;

pub trait Diagnostics {
    /// Effective sample size per (variable, dimension) cell, restricted to
    /// `variables` when given.
    fn effective_sample_size(
        &self,
        samples: &SampleBundle,
        variables: Option<&[String]>,
    ) -> Result<DiagnosticCells>;

    /// Potential scale reduction ("R-hat", ideal value 1) per
    /// (variable, dimension) cell, restricted to `variables` when given.
    fn scale_reduction(
        &self,
        samples: &SampleBundle,
        variables: Option<&[String]>,
    ) -> Result<DiagnosticCells>;
}
