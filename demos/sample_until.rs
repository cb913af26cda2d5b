//! Drives the incremental controller against a toy autoregressive engine
//! until a combined convergence criterion is met, then prints the final
//! chain states.
//!
//! The diagnostics here are crude stand-ins for a real estimator: the ESS
//! assumes a fixed autocorrelation time and the scale reduction decays
//! toward 1 with the chain length. A real application would plug in an
//! actual ESS/R-hat implementation behind the same trait.

use mcmc_incremental::bundle::SampleBundle;
use mcmc_incremental::criteria::ConvergenceCriterion;
use mcmc_incremental::diagnostics::{DiagnosticCells, Diagnostics};
use mcmc_incremental::engine::{MonitorKind, SamplingEngine};
use mcmc_incremental::error::{Error, Result};
use mcmc_incremental::incremental::{sample_until_with_progress, SampleUntilOptions};
use ndarray::prelude::*;
use rand::prelude::*;
use rand_distr::StandardNormal;
use std::collections::BTreeMap;

/// A stationary AR(1) process per chain, standing in for a real MCMC
/// engine.
struct RandomWalkEngine {
    states: Vec<f64>,
    rng: SmallRng,
}

impl RandomWalkEngine {
    fn new(chains: usize, seed: u64) -> Self {
        Self {
            states: vec![0.0; chains],
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl SamplingEngine for RandomWalkEngine {
    fn draw(
        &mut self,
        iterations: usize,
        _variables: Option<&[String]>,
        thin: usize,
        _monitor_kind: MonitorKind,
    ) -> Result<SampleBundle> {
        let chains = self.states.len();
        let mut draws = Array3::zeros((1, iterations, chains));
        for i in 0..iterations {
            for chain in 0..chains {
                for _ in 0..thin.max(1) {
                    let step: f64 = self.rng.sample(StandardNormal);
                    self.states[chain] = 0.9 * self.states[chain] + step;
                }
                draws[(0, i, chain)] = self.states[chain];
            }
        }
        SampleBundle::from_variables([("x".to_string(), draws)].into_iter().collect())
    }

    fn chain_count(&self) -> usize {
        self.states.len()
    }

    fn set_monitors(
        &mut self,
        _names: &[&str],
        _thin: usize,
        _aggregation: MonitorKind,
    ) -> Result<()> {
        Err(Error::Engine("the toy engine has no monitors".into()))
    }

    fn advance(&mut self, _iterations: usize) -> Result<()> {
        Err(Error::Engine("the toy engine has no monitors".into()))
    }

    fn monitor_means(&mut self, _names: &[&str]) -> Result<BTreeMap<String, Array1<f64>>> {
        Err(Error::Engine("the toy engine has no monitors".into()))
    }

    fn clear_monitor(&mut self, _name: &str, _aggregation: MonitorKind) -> Result<()> {
        Err(Error::Engine("the toy engine has no monitors".into()))
    }

    fn load_extension(&mut self, _name: &str) -> Result<()> {
        Err(Error::Engine("the toy engine has no extensions".into()))
    }
}

struct CrudeDiagnostics {
    autocorrelation_time: f64,
}

impl CrudeDiagnostics {
    fn cells(
        &self,
        samples: &SampleBundle,
        variables: Option<&[String]>,
        value: f64,
    ) -> DiagnosticCells {
        samples
            .iter()
            .filter(|(name, _)| variables.is_none_or(|names| names.contains(*name)))
            .map(|(name, draws)| (name.clone(), Array1::from_elem(draws.len_of(Axis(0)), value)))
            .collect()
    }
}

impl Diagnostics for CrudeDiagnostics {
    fn effective_sample_size(
        &self,
        samples: &SampleBundle,
        variables: Option<&[String]>,
    ) -> Result<DiagnosticCells> {
        let ess = samples.chain_length()? as f64 / self.autocorrelation_time;
        Ok(self.cells(samples, variables, ess))
    }

    fn scale_reduction(
        &self,
        samples: &SampleBundle,
        variables: Option<&[String]>,
    ) -> Result<DiagnosticCells> {
        let rhat = 1.0 + 1.0 / samples.chain_length()?.max(1) as f64;
        Ok(self.cells(samples, variables, rhat))
    }
}

fn main() -> Result<()> {
    let mut engine = RandomWalkEngine::new(4, 42);
    let diagnostics = CrudeDiagnostics {
        autocorrelation_time: 10.0,
    };
    let criterion = ConvergenceCriterion::Combined {
        minimum_ess: 200,
        maximum_deviation: 0.01,
        variables: None,
    };
    let options = SampleUntilOptions {
        chunk_size: 500,
        max_iterations: 10_000,
        verbose: true,
        ..Default::default()
    };

    let samples = sample_until_with_progress(
        &mut engine,
        &diagnostics,
        &criterion,
        None,
        &options,
        None,
    )?;

    println!(
        "accumulated {} iterations across {} chains",
        samples.chain_length()?,
        engine.chain_count()
    );

    for (chain, values) in samples.extract_final_iterations(&["x"])?.iter().enumerate() {
        println!("chain {chain}: final state {:?}", values["x"]);
    }
    Ok(())
}
