/*!
# I/O Utilities for Saving Sample Bundles to CSV

This module saves and loads sample bundles as long-format CSV files.
Enable via the `csv` feature.

Each record is one cell: `variable,dim,iteration,chain,value`. Values are
written with Rust's shortest-round-trip float formatting, so a save/load
round trip reproduces variable names, shapes, and numeric values exactly.
*/

use csv::{Reader, Writer};
use ndarray::Array3;
use std::collections::BTreeMap;
use std::path::Path;

use crate::bundle::SampleBundle;
use crate::error::{Error, Result};

/// Saves a sample bundle as a CSV file.
///
/// The file has a header row `variable,dim,iteration,chain,value` and one
/// record per cell of every variable's draws.
pub fn save_csv<P: AsRef<Path>>(samples: &SampleBundle, path: P) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["variable", "dim", "iteration", "chain", "value"])?;

    for (name, draws) in samples.iter() {
        for ((dim, iteration, chain), value) in draws.indexed_iter() {
            writer.write_record([
                name.clone(),
                dim.to_string(),
                iteration.to_string(),
                chain.to_string(),
                value.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Loads a sample bundle saved by [`save_csv`].
///
/// Shapes are reconstructed from the largest index seen per axis; a file
/// with missing or duplicated cells fails with
/// [`Error::InvalidSampleFile`].
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<SampleBundle> {
    let mut reader = Reader::from_path(path)?;

    let mut entries: BTreeMap<String, Vec<(usize, usize, usize, f64)>> = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != 5 {
            return Err(Error::InvalidSampleFile(format!(
                "expected 5 fields per record, found {}",
                record.len()
            )));
        }
        let dim = parse_index(&record[1])?;
        let iteration = parse_index(&record[2])?;
        let chain = parse_index(&record[3])?;
        let value = record[4]
            .parse::<f64>()
            .map_err(|e| Error::InvalidSampleFile(e.to_string()))?;
        entries
            .entry(record[0].to_string())
            .or_default()
            .push((dim, iteration, chain, value));
    }

    let mut variables = BTreeMap::new();
    for (name, cells) in entries {
        let mut shape = (0, 0, 0);
        for &(dim, iteration, chain, _) in &cells {
            shape.0 = shape.0.max(dim + 1);
            shape.1 = shape.1.max(iteration + 1);
            shape.2 = shape.2.max(chain + 1);
        }
        if cells.len() != shape.0 * shape.1 * shape.2 {
            return Err(Error::InvalidSampleFile(format!(
                "variable `{name}` does not cover its {shape:?} shape"
            )));
        }
        let mut draws = Array3::zeros(shape);
        for (dim, iteration, chain, value) in cells {
            draws[(dim, iteration, chain)] = value;
        }
        variables.insert(name, draws);
    }

    SampleBundle::from_variables(variables)
}

fn parse_index(field: &str) -> Result<usize> {
    field
        .parse::<usize>()
        .map_err(|e| Error::InvalidSampleFile(e.to_string()))
}
