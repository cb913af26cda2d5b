/*!
# Model Comparison via the Deviance Information Criterion

[`dic_samples`] drives the engine's monitor facility to accumulate mean
deviance and a penalty statistic over a fixed number of iterations, and
returns them as a [`Dic`] score. Two scores of the same penalty kind can be
differenced with [`Dic::diff`] to judge whether one model fits
significantly better.
*/

use ndarray::Array1;
use std::fmt;
use std::str::FromStr;

use crate::engine::{MonitorKind, SamplingEngine};
use crate::error::{Error, Result};

/// Name of the engine extension providing deviance and penalty monitors.
const DIC_EXTENSION: &str = "dic";
const DEVIANCE_MONITOR: &str = "deviance";

/// The penalty statistic a DIC score is sampled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyKind {
    /// Effective parameter count, the classical `pD` penalty.
    EffectiveParameterCount,
    /// Optimism-corrected penalty, `popt`.
    OptimismCorrected,
}

impl PenaltyKind {
    /// Monitor name understood by the engine's dic extension.
    pub fn monitor_name(&self) -> &'static str {
        match self {
            PenaltyKind::EffectiveParameterCount => "pD",
            PenaltyKind::OptimismCorrected => "popt",
        }
    }
}

impl fmt::Display for PenaltyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.monitor_name())
    }
}

impl FromStr for PenaltyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pD" => Ok(PenaltyKind::EffectiveParameterCount),
            "popt" => Ok(PenaltyKind::OptimismCorrected),
            other => Err(Error::Configuration(format!(
                "penalty kind must be either pD or popt but is {other}"
            ))),
        }
    }
}

/// A sampled Deviance Information Criterion score.
#[derive(Debug, Clone, PartialEq)]
pub struct Dic {
    /// Mean deviance per observation.
    pub deviance: Array1<f64>,
    /// Mean penalty per observation.
    pub penalty: Array1<f64>,
    /// The penalty kind the score was sampled with.
    pub kind: PenaltyKind,
}

impl Dic {
    /// Total penalized deviance; lower is better.
    pub fn penalized_deviance(&self) -> f64 {
        self.deviance.sum() + self.penalty.sum()
    }

    /// Renders the score with the given number of decimal digits.
    pub fn report(&self, digits: usize) -> String {
        let deviance = self.deviance.sum();
        let penalty = self.penalty.sum();
        let penalized = deviance + penalty;
        format!(
            "Mean deviance: {deviance:.digits$}\npenalty: {penalty:.digits$}\nPenalized deviance: {penalized:.digits$}"
        )
    }

    /// Pointwise difference in penalized deviance against another score of
    /// the same penalty kind.
    pub fn diff(&self, other: &Dic) -> Result<DicDiff> {
        if self.kind != other.kind {
            return Err(Error::PenaltyKindMismatch(self.kind, other.kind));
        }
        if self.deviance.len() != other.deviance.len()
            || self.penalty.len() != other.penalty.len()
        {
            return Err(Error::InconsistentShape(
                "the scores cover a different number of observations".into(),
            ));
        }
        let delta = &self.deviance + &self.penalty - &other.deviance - &other.penalty;
        Ok(DicDiff { delta })
    }
}

impl fmt::Display for Dic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report(2))
    }
}

/// The difference between two DIC scores of the same penalty kind.
#[derive(Debug, Clone, PartialEq)]
pub struct DicDiff {
    /// Pointwise difference in penalized deviance, one entry per
    /// observation.
    pub delta: Array1<f64>,
}

impl DicDiff {
    /// Total difference; negative favors the left-hand score.
    pub fn sum(&self) -> f64 {
        self.delta.sum()
    }

    /// Sample standard error of the total difference,
    /// `sqrt(n) * stddev(delta)`.
    pub fn standard_error(&self) -> f64 {
        let n = self.delta.len() as f64;
        n.sqrt() * self.delta.std(0.0)
    }
}

impl fmt::Display for DicDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Difference: {}", self.sum())?;
        write!(f, "Sample standard error: {}", self.standard_error())
    }
}

/// Samples a DIC score from the engine.
///
/// Loads the `dic` engine extension (a no-op when already loaded), tracks
/// a deviance monitor and a penalty monitor of the requested kind with
/// mean aggregation, advances the engine by exactly `n_iter` iterations,
/// reads both monitor means back, and clears both monitors so repeated
/// scoring calls do not accumulate stale state.
///
/// Fails with [`Error::InsufficientChains`] on a single-chain engine and
/// with [`Error::Configuration`] when `n_iter` is zero.
pub fn dic_samples<E: SamplingEngine>(
    engine: &mut E,
    n_iter: usize,
    thin: usize,
    kind: PenaltyKind,
) -> Result<Dic> {
    if engine.chain_count() < 2 {
        return Err(Error::InsufficientChains);
    }
    if n_iter == 0 {
        return Err(Error::Configuration(
            "n_iter must be a positive integer".into(),
        ));
    }

    engine.load_extension(DIC_EXTENSION)?;

    let penalty_monitor = kind.monitor_name();
    engine.set_monitors(&[DEVIANCE_MONITOR, penalty_monitor], thin, MonitorKind::Mean)?;
    engine.advance(n_iter)?;

    let mut means = engine.monitor_means(&[DEVIANCE_MONITOR, penalty_monitor])?;

    engine.clear_monitor(DEVIANCE_MONITOR, MonitorKind::Mean)?;
    engine.clear_monitor(penalty_monitor, MonitorKind::Mean)?;

    let deviance = means.remove(DEVIANCE_MONITOR).ok_or_else(|| {
        Error::Engine(format!("the engine returned no `{DEVIANCE_MONITOR}` monitor"))
    })?;
    let penalty = means.remove(penalty_monitor).ok_or_else(|| {
        Error::Engine(format!("the engine returned no `{penalty_monitor}` monitor"))
    })?;

    if deviance.len() != penalty.len() {
        return Err(Error::Engine(
            "the deviance and penalty monitors cover a different number of observations".into(),
        ));
    }

    Ok(Dic {
        deviance,
        penalty,
        kind,
    })
}
