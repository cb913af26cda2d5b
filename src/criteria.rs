/*!
# Convergence Criteria

A [`ConvergenceCriterion`] decides whether a sample bundle is "good
enough" to stop incremental sampling. The three variants form a closed
set: a minimum effective sample size, a maximum deviation of the potential
scale reduction from its ideal value of 1, and the conjunction of both.

The effective-sample-size variant takes the *minimum* over all monitored
cells and the scale-reduction variant the *maximum* deviation: convergence
must hold uniformly, and a single poorly-mixed cell invalidates it.

Evaluation is pure with respect to the bundle. The only side effect is the
verbose report of the computed values through [`log`], which never alters
the returned boolean.
*/

use log::info;
use ndarray_stats::QuantileExt;

use crate::bundle::SampleBundle;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};

/// Immutable criterion configuration; holds no sampling state between
/// calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvergenceCriterion {
    /// Satisfied iff the minimum effective sample size across all
    /// monitored cells reaches `minimum_ess`.
    EffectiveSampleSize {
        minimum_ess: usize,
        variables: Option<Vec<String>>,
    },
    /// Satisfied iff the maximum absolute deviation of the scale-reduction
    /// statistic from 1 stays within `maximum_deviation`.
    ScaleReductionDeviation {
        maximum_deviation: f64,
        variables: Option<Vec<String>>,
    },
    /// Satisfied iff both component criteria are, over the same variable
    /// subset.
    Combined {
        minimum_ess: usize,
        maximum_deviation: f64,
        variables: Option<Vec<String>>,
    },
}

impl ConvergenceCriterion {
    /// The variable subset this criterion monitors, if restricted.
    pub fn variables(&self) -> Option<&[String]> {
        match self {
            ConvergenceCriterion::EffectiveSampleSize { variables, .. }
            | ConvergenceCriterion::ScaleReductionDeviation { variables, .. }
            | ConvergenceCriterion::Combined { variables, .. } => variables.as_deref(),
        }
    }

    /// Evaluates the criterion on a bundle using the given diagnostics
    /// collaborator.
    pub fn evaluate<D: Diagnostics>(
        &self,
        diagnostics: &D,
        samples: &SampleBundle,
        verbose: bool,
    ) -> Result<bool> {
        match self {
            ConvergenceCriterion::EffectiveSampleSize {
                minimum_ess,
                variables,
            } => {
                let minimum =
                    minimum_effective_sample_size(diagnostics, samples, variables.as_deref())?;
                if verbose {
                    info!("minimum effective sample size = {minimum}");
                }
                Ok(minimum >= *minimum_ess as f64)
            }
            ConvergenceCriterion::ScaleReductionDeviation {
                maximum_deviation,
                variables,
            } => {
                let maximum =
                    maximum_scale_reduction_deviation(diagnostics, samples, variables.as_deref())?;
                if verbose {
                    info!("maximum scale reduction deviation = {maximum}");
                }
                Ok(maximum <= *maximum_deviation)
            }
            ConvergenceCriterion::Combined {
                minimum_ess,
                maximum_deviation,
                variables,
            } => {
                // Both diagnostics are computed before either comparison so
                // a verbose run always reports both values.
                let minimum =
                    minimum_effective_sample_size(diagnostics, samples, variables.as_deref())?;
                let maximum =
                    maximum_scale_reduction_deviation(diagnostics, samples, variables.as_deref())?;
                if verbose {
                    info!("minimum effective sample size = {minimum}");
                    info!("maximum scale reduction deviation = {maximum}");
                }
                Ok(minimum >= *minimum_ess as f64 && maximum <= *maximum_deviation)
            }
        }
    }
}

fn minimum_effective_sample_size<D: Diagnostics>(
    diagnostics: &D,
    samples: &SampleBundle,
    variables: Option<&[String]>,
) -> Result<f64> {
    let cells = diagnostics.effective_sample_size(samples, variables)?;
    if cells.is_empty() {
        return Err(Error::EmptyInput(
            "the effective sample size diagnostic returned no cells".into(),
        ));
    }
    let mut minimum = f64::INFINITY;
    for values in cells.values() {
        let value = values.min().map_err(|e| Error::Diagnostics(e.to_string()))?;
        minimum = minimum.min(*value);
    }
    Ok(minimum)
}

fn maximum_scale_reduction_deviation<D: Diagnostics>(
    diagnostics: &D,
    samples: &SampleBundle,
    variables: Option<&[String]>,
) -> Result<f64> {
    let cells = diagnostics.scale_reduction(samples, variables)?;
    if cells.is_empty() {
        return Err(Error::EmptyInput(
            "the scale reduction diagnostic returned no cells".into(),
        ));
    }
    let mut maximum = f64::NEG_INFINITY;
    for values in cells.values() {
        let deviations = values.mapv(|value| (value - 1.0).abs());
        let value = deviations
            .max()
            .map_err(|e| Error::Diagnostics(e.to_string()))?;
        maximum = maximum.max(*value);
    }
    Ok(maximum)
}
