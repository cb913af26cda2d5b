/*!
# Sample Bundles and Chain Algebra

A [`SampleBundle`] is the in-memory representation of multi-chain,
multi-variable posterior draws: a mapping from variable name to a 3-axis
array with axes `(parameter_dimension, chain_length, number_of_chains)`.
The parameter dimension may differ between variables; the chain length and
the number of chains must not.

Bundles are values. Every operation in this module returns a new bundle and
leaves its inputs untouched, so bundles may be freely shared read-only.

The two merge operations are deliberately distinct: [`merge_consecutive`]
continues existing chains along the iteration axis, while [`merge_parallel`]
adds independently-run chains. Picking the wrong one produces a shape-valid
but statistically meaningless bundle, so callers must choose based on how
the runs were actually produced.

[`merge_consecutive`]: SampleBundle::merge_consecutive
[`merge_parallel`]: SampleBundle::merge_parallel
*/

use ndarray::prelude::*;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Multi-chain posterior draws for a set of variables.
///
/// Axis order per variable is `(parameter_dimension, chain_length,
/// number_of_chains)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBundle {
    variables: BTreeMap<String, Array3<f64>>,
}

/// A single variable's value at the final retained iteration of one chain,
/// with singleton parameter dimensions collapsed.
#[derive(Debug, Clone, PartialEq)]
pub enum InitValue {
    Scalar(f64),
    Vector(Array1<f64>),
}

/// Per-variable starting values used to seed a subsequent engine run.
/// One such mapping exists per chain in the source bundle.
pub type InitialValues = BTreeMap<String, InitValue>;

impl SampleBundle {
    /// Builds a bundle from a map of variable draws, checking that all
    /// variables share the same chain length.
    pub fn from_variables(variables: BTreeMap<String, Array3<f64>>) -> Result<Self> {
        let bundle = SampleBundle { variables };
        if !bundle.is_empty() {
            bundle.chain_length()?;
        }
        Ok(bundle)
    }

    /// The draws for one variable, if present.
    pub fn get(&self, name: &str) -> Option<&Array3<f64>> {
        self.variables.get(name)
    }

    /// Variable names in sorted order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Iterates over `(name, draws)` pairs in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Array3<f64>)> {
        self.variables.iter()
    }

    /// Number of variables in the bundle.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// The chain length shared by all variables.
    ///
    /// Fails with [`Error::EmptyInput`] on a variable-less bundle and with
    /// [`Error::InconsistentShape`] when variables disagree.
    pub fn chain_length(&self) -> Result<usize> {
        let mut lengths = self.variables.values().map(|draws| draws.len_of(Axis(1)));
        let first = lengths
            .next()
            .ok_or_else(|| Error::EmptyInput("the sample bundle contains no variables".into()))?;
        if lengths.any(|length| length != first) {
            return Err(Error::InconsistentShape(
                "the chain lengths are not consistent across variables".into(),
            ));
        }
        Ok(first)
    }

    /// Drops the first `burn_in` iterations from every chain of every
    /// variable.
    ///
    /// A `burn_in` beyond the available chain length yields an empty
    /// chain-length axis rather than an error.
    pub fn discard_burn_in(&self, burn_in: usize) -> SampleBundle {
        let variables = self
            .variables
            .iter()
            .map(|(name, draws)| {
                let start = burn_in.min(draws.len_of(Axis(1)));
                (name.clone(), draws.slice(s![.., start.., ..]).to_owned())
            })
            .collect();
        SampleBundle { variables }
    }

    /// Extracts the last retained iteration of each chain for the given
    /// variables, one [`InitialValues`] mapping per chain.
    ///
    /// Fails with [`Error::InconsistentShape`] if the number of chains
    /// differs across the requested variables.
    pub fn extract_final_iterations(&self, variable_names: &[&str]) -> Result<Vec<InitialValues>> {
        if variable_names.is_empty() {
            return Err(Error::EmptyInput(
                "at least one variable is required to extract final iterations".into(),
            ));
        }

        let mut selected = Vec::with_capacity(variable_names.len());
        for &name in variable_names {
            let draws = self
                .variables
                .get(name)
                .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
            if draws.len_of(Axis(1)) == 0 {
                return Err(Error::EmptyInput(format!(
                    "variable `{name}` has no retained iterations"
                )));
            }
            selected.push((name, draws));
        }

        let number_of_chains = selected[0].1.len_of(Axis(2));
        if selected
            .iter()
            .any(|(_, draws)| draws.len_of(Axis(2)) != number_of_chains)
        {
            return Err(Error::InconsistentShape(
                "the number of chains must be identical across variables".into(),
            ));
        }

        let mut result = Vec::with_capacity(number_of_chains);
        for chain in 0..number_of_chains {
            let mut values = InitialValues::new();
            for &(name, draws) in &selected {
                let last = draws.len_of(Axis(1)) - 1;
                let point = draws.slice(s![.., last, chain]);
                let value = if point.len() == 1 {
                    InitValue::Scalar(point[0])
                } else {
                    InitValue::Vector(point.to_owned())
                };
                values.insert(name.to_string(), value);
            }
            result.push(values);
        }
        Ok(result)
    }

    /// Concatenates bundles along the chain-length axis, continuing the
    /// chains: chain `i` of the result is chain `i` of each input in
    /// sequence order.
    ///
    /// No chain identifier is carried in the data; treating the `i`-th
    /// chain of every input as the same logical chain is the caller's
    /// responsibility.
    pub fn merge_consecutive(bundles: &[SampleBundle]) -> Result<SampleBundle> {
        Self::merge(bundles, Axis(1))
    }

    /// Concatenates bundles along the chain axis, adding independent
    /// chains of equal length.
    pub fn merge_parallel(bundles: &[SampleBundle]) -> Result<SampleBundle> {
        Self::merge(bundles, Axis(2))
    }

    fn merge(bundles: &[SampleBundle], along: Axis) -> Result<SampleBundle> {
        if bundles.is_empty() {
            return Err(Error::EmptyInput(
                "at least one sample bundle is required to merge".into(),
            ));
        }
        check_variable_names(bundles)?;

        let mut variables = BTreeMap::new();
        for (name, first_draws) in &bundles[0].variables {
            let views: Vec<_> = bundles
                .iter()
                .map(|bundle| bundle.variables[name].view())
                .collect();

            // The axes not being concatenated along must agree between
            // inputs; the concatenation axis may differ freely.
            for axis in [Axis(0), Axis(1), Axis(2)] {
                if axis == along {
                    continue;
                }
                let expected = first_draws.len_of(axis);
                if views.iter().any(|view| view.len_of(axis) != expected) {
                    return Err(Error::InconsistentShape(format!(
                        "the {} of `{name}` is inconsistent between bundles",
                        axis_label(axis)
                    )));
                }
            }

            let merged = ndarray::concatenate(along, &views)
                .map_err(|e| Error::InconsistentShape(e.to_string()))?;
            variables.insert(name.clone(), merged);
        }
        Ok(SampleBundle { variables })
    }
}

fn check_variable_names(bundles: &[SampleBundle]) -> Result<()> {
    let first: Vec<&String> = bundles[0].variables.keys().collect();
    for bundle in &bundles[1..] {
        let names: Vec<&String> = bundle.variables.keys().collect();
        if names != first {
            return Err(Error::VariableSetMismatch);
        }
    }
    Ok(())
}

fn axis_label(axis: Axis) -> &'static str {
    match axis {
        Axis(0) => "parameter dimension",
        Axis(1) => "chain length",
        _ => "number of chains",
    }
}
