//! End-to-end tests of the incremental sampling controller against stub
//! engine and diagnostics implementations.
//!
//! The stub engine produces ramp-valued draws (cell value = global
//! iteration index), so chain continuation across merges is checkable by
//! value.

use mcmc_incremental::bundle::SampleBundle;
use mcmc_incremental::criteria::ConvergenceCriterion;
use mcmc_incremental::diagnostics::{DiagnosticCells, Diagnostics};
use mcmc_incremental::engine::{MonitorKind, SamplingEngine};
use mcmc_incremental::error::{Error, Result};
use mcmc_incremental::incremental::{sample_until, SampleUntilOptions};
use ndarray::prelude::*;
use std::collections::BTreeMap;

/// Engine stub whose draws encode the global iteration index, continuing
/// from wherever the previous draw stopped.
struct RampEngine {
    chains: usize,
    variables: Vec<(String, usize)>,
    position: usize,
    draw_calls: usize,
}

impl RampEngine {
    fn new(chains: usize, variables: &[(&str, usize)]) -> Self {
        Self {
            chains,
            variables: variables
                .iter()
                .map(|&(name, dim)| (name.to_string(), dim))
                .collect(),
            position: 0,
            draw_calls: 0,
        }
    }
}

impl SamplingEngine for RampEngine {
    fn draw(
        &mut self,
        iterations: usize,
        variables: Option<&[String]>,
        _thin: usize,
        _monitor_kind: MonitorKind,
    ) -> Result<SampleBundle> {
        self.draw_calls += 1;
        let selected: Vec<(String, usize)> = self
            .variables
            .iter()
            .filter(|(name, _)| variables.is_none_or(|names| names.contains(name)))
            .cloned()
            .collect();

        let start = self.position;
        let map: BTreeMap<String, Array3<f64>> = selected
            .into_iter()
            .map(|(name, dim)| {
                let draws = Array3::from_shape_fn((dim, iterations, self.chains), |(_, i, _)| {
                    (start + i) as f64
                });
                (name, draws)
            })
            .collect();
        self.position += iterations;
        SampleBundle::from_variables(map)
    }

    fn chain_count(&self) -> usize {
        self.chains
    }

    // The monitor facility is not exercised by the controller.
    fn set_monitors(
        &mut self,
        _names: &[&str],
        _thin: usize,
        _aggregation: MonitorKind,
    ) -> Result<()> {
        Err(Error::Engine("monitors are not supported".into()))
    }

    fn advance(&mut self, _iterations: usize) -> Result<()> {
        Err(Error::Engine("monitors are not supported".into()))
    }

    fn monitor_means(&mut self, _names: &[&str]) -> Result<BTreeMap<String, Array1<f64>>> {
        Err(Error::Engine("monitors are not supported".into()))
    }

    fn clear_monitor(&mut self, _name: &str, _aggregation: MonitorKind) -> Result<()> {
        Err(Error::Engine("monitors are not supported".into()))
    }

    fn load_extension(&mut self, _name: &str) -> Result<()> {
        Err(Error::Engine("extensions are not supported".into()))
    }
}

fn cells_for(samples: &SampleBundle, variables: Option<&[String]>, value: f64) -> DiagnosticCells {
    samples
        .iter()
        .filter(|(name, _)| variables.is_none_or(|names| names.contains(*name)))
        .map(|(name, draws)| (name.clone(), Array1::from_elem(draws.len_of(Axis(0)), value)))
        .collect()
}

/// Diagnostics stub reporting the same values regardless of the bundle.
struct ConstantDiagnostics {
    ess: f64,
    rhat: f64,
}

impl Diagnostics for ConstantDiagnostics {
    fn effective_sample_size(
        &self,
        samples: &SampleBundle,
        variables: Option<&[String]>,
    ) -> Result<DiagnosticCells> {
        Ok(cells_for(samples, variables, self.ess))
    }

    fn scale_reduction(
        &self,
        samples: &SampleBundle,
        variables: Option<&[String]>,
    ) -> Result<DiagnosticCells> {
        Ok(cells_for(samples, variables, self.rhat))
    }
}

/// Diagnostics stub whose ESS grows linearly with the accumulated chain
/// length, like a well-mixed chain.
struct LengthProportionalDiagnostics {
    ess_per_iteration: f64,
}

impl Diagnostics for LengthProportionalDiagnostics {
    fn effective_sample_size(
        &self,
        samples: &SampleBundle,
        variables: Option<&[String]>,
    ) -> Result<DiagnosticCells> {
        let ess = samples.chain_length()? as f64 * self.ess_per_iteration;
        Ok(cells_for(samples, variables, ess))
    }

    fn scale_reduction(
        &self,
        samples: &SampleBundle,
        variables: Option<&[String]>,
    ) -> Result<DiagnosticCells> {
        Ok(cells_for(samples, variables, 1.0))
    }
}

fn always_satisfied() -> (ConstantDiagnostics, ConvergenceCriterion) {
    (
        ConstantDiagnostics {
            ess: f64::INFINITY,
            rhat: 1.0,
        },
        ConvergenceCriterion::EffectiveSampleSize {
            minimum_ess: 1,
            variables: None,
        },
    )
}

fn never_satisfied() -> (ConstantDiagnostics, ConvergenceCriterion) {
    (
        ConstantDiagnostics {
            ess: 0.0,
            rhat: 10.0,
        },
        ConvergenceCriterion::EffectiveSampleSize {
            minimum_ess: 1,
            variables: None,
        },
    )
}

#[test]
fn test_satisfied_immediately_draws_exactly_one_chunk() {
    let mut engine = RampEngine::new(3, &[("theta", 1)]);
    let (diagnostics, criterion) = always_satisfied();
    let options = SampleUntilOptions {
        chunk_size: 50,
        max_iterations: 1000,
        ..Default::default()
    };

    let samples = sample_until(&mut engine, &diagnostics, &criterion, None, &options, None).unwrap();

    assert_eq!(engine.draw_calls, 1);
    assert_eq!(samples.chain_length().unwrap(), 50);
    assert_eq!(samples.get("theta").unwrap().shape(), &[1, 50, 3]);
}

#[test]
fn test_satisfying_previous_bundle_short_circuits() {
    let mut engine = RampEngine::new(3, &[("theta", 1)]);
    let previous = engine.draw(10, None, 1, MonitorKind::Trace).unwrap();
    engine.draw_calls = 0;

    let (diagnostics, criterion) = always_satisfied();
    let options = SampleUntilOptions {
        chunk_size: 50,
        max_iterations: 1000,
        ..Default::default()
    };

    let samples = sample_until(
        &mut engine,
        &diagnostics,
        &criterion,
        Some(previous.clone()),
        &options,
        None,
    )
    .unwrap();

    assert_eq!(engine.draw_calls, 0);
    assert_eq!(samples, previous);
}

#[test]
fn test_budget_exhaustion_makes_exactly_k_engine_calls() {
    let mut engine = RampEngine::new(2, &[("theta", 1)]);
    let (diagnostics, criterion) = never_satisfied();
    let options = SampleUntilOptions {
        chunk_size: 25,
        max_iterations: 100,
        ..Default::default()
    };

    let samples = sample_until(&mut engine, &diagnostics, &criterion, None, &options, None).unwrap();

    assert_eq!(engine.draw_calls, 4);
    assert_eq!(samples.chain_length().unwrap(), 100);

    // The merged ramp is contiguous: iteration j holds the value j.
    let draws = samples.get("theta").unwrap();
    for j in 0..100 {
        assert_eq!(draws[(0, j, 0)], j as f64);
        assert_eq!(draws[(0, j, 1)], j as f64);
    }
}

#[test]
fn test_budget_stops_at_one_remaining_iteration() {
    let mut engine = RampEngine::new(2, &[("theta", 1)]);
    let (diagnostics, criterion) = never_satisfied();
    let options = SampleUntilOptions {
        chunk_size: 5,
        max_iterations: 11,
        ..Default::default()
    };

    let samples = sample_until(&mut engine, &diagnostics, &criterion, None, &options, None).unwrap();

    // Two rounds of five; the leftover single iteration is never drawn.
    assert_eq!(engine.draw_calls, 2);
    assert_eq!(samples.chain_length().unwrap(), 10);
}

#[test]
fn test_criterion_satisfied_once_enough_samples_accumulate() {
    let mut engine = RampEngine::new(2, &[("theta", 1), ("mu", 2)]);
    let diagnostics = LengthProportionalDiagnostics {
        ess_per_iteration: 0.5,
    };
    let criterion = ConvergenceCriterion::EffectiveSampleSize {
        minimum_ess: 150,
        variables: None,
    };
    let options = SampleUntilOptions {
        chunk_size: 100,
        max_iterations: 10_000,
        ..Default::default()
    };

    let samples = sample_until(&mut engine, &diagnostics, &criterion, None, &options, None).unwrap();

    // ESS reaches 150 at chain length 300, i.e. after the third chunk.
    assert_eq!(engine.draw_calls, 3);
    assert_eq!(samples.chain_length().unwrap(), 300);
    assert_eq!(samples.get("mu").unwrap().shape(), &[2, 300, 2]);
}

#[test]
fn test_unsatisfying_previous_bundle_is_continued() {
    let mut engine = RampEngine::new(2, &[("theta", 1)]);
    let previous = engine.draw(30, None, 1, MonitorKind::Trace).unwrap();
    engine.draw_calls = 0;

    let diagnostics = LengthProportionalDiagnostics {
        ess_per_iteration: 1.0,
    };
    let criterion = ConvergenceCriterion::EffectiveSampleSize {
        minimum_ess: 50,
        variables: None,
    };
    let options = SampleUntilOptions {
        chunk_size: 10,
        max_iterations: 1000,
        ..Default::default()
    };

    let samples = sample_until(
        &mut engine,
        &diagnostics,
        &criterion,
        Some(previous),
        &options,
        None,
    )
    .unwrap();

    // 30 previous iterations plus two chunks of 10.
    assert_eq!(engine.draw_calls, 2);
    assert_eq!(samples.chain_length().unwrap(), 50);
    let draws = samples.get("theta").unwrap();
    for j in 0..50 {
        assert_eq!(draws[(0, j, 0)], j as f64);
    }
}

#[test]
fn test_variable_subset_is_passed_to_the_engine() {
    let mut engine = RampEngine::new(2, &[("theta", 1), ("mu", 2)]);
    let (diagnostics, criterion) = always_satisfied();
    let options = SampleUntilOptions {
        chunk_size: 10,
        max_iterations: 100,
        variables: Some(vec!["theta".to_string()]),
        ..Default::default()
    };

    let samples = sample_until(&mut engine, &diagnostics, &criterion, None, &options, None).unwrap();

    assert_eq!(samples.len(), 1);
    assert!(samples.get("theta").is_some());
    assert!(samples.get("mu").is_none());
}

#[test]
fn test_iteration_callback_sees_every_round() {
    let mut engine = RampEngine::new(2, &[("theta", 1)]);
    let (diagnostics, criterion) = never_satisfied();
    let options = SampleUntilOptions {
        chunk_size: 20,
        max_iterations: 60,
        ..Default::default()
    };

    let mut rounds: Vec<(bool, usize, usize)> = Vec::new();
    let mut callback = |samples: &SampleBundle, satisfied: bool, iterations: usize| -> Result<()> {
        rounds.push((satisfied, iterations, samples.chain_length().unwrap()));
        Ok(())
    };

    sample_until(
        &mut engine,
        &diagnostics,
        &criterion,
        None,
        &options,
        Some(&mut callback),
    )
    .unwrap();

    assert_eq!(
        rounds,
        vec![(false, 20, 20), (false, 40, 40), (false, 60, 60)]
    );
}

#[test]
fn test_iteration_callback_error_aborts_the_loop() {
    let mut engine = RampEngine::new(2, &[("theta", 1)]);
    let (diagnostics, criterion) = never_satisfied();
    let options = SampleUntilOptions {
        chunk_size: 20,
        max_iterations: 1000,
        ..Default::default()
    };

    let mut seen = 0;
    let mut callback = |_: &SampleBundle, _: bool, _: usize| -> Result<()> {
        seen += 1;
        if seen == 2 {
            Err(Error::Engine("cancelled from the callback".into()))
        } else {
            Ok(())
        }
    };

    let result = sample_until(
        &mut engine,
        &diagnostics,
        &criterion,
        None,
        &options,
        Some(&mut callback),
    );

    assert!(matches!(result, Err(Error::Engine(_))));
    assert_eq!(engine.draw_calls, 2);
}
