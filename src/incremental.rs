/*!
# Incremental Sampling

[`sample_until`] repeatedly asks the engine for a chunk of iterations,
continues the accumulated chains with a consecutive merge, and evaluates a
[`ConvergenceCriterion`] until it is satisfied or the iteration budget runs
out. Running out of budget is not an error: the warning is logged and the
best-effort bundle accumulated so far is still returned.

[`sample_until_with_progress`] does the same while driving an `indicatif`
progress bar over the iteration budget.
*/

use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

use crate::bundle::SampleBundle;
use crate::criteria::ConvergenceCriterion;
use crate::diagnostics::Diagnostics;
use crate::engine::{MonitorKind, SamplingEngine};
use crate::error::{Error, Result};

/// Configuration for [`sample_until`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleUntilOptions {
    /// Number of iterations drawn from the engine per round.
    pub chunk_size: usize,
    /// Total iteration budget across all rounds.
    pub max_iterations: usize,
    /// Variables to monitor; `None` uses the engine's default set.
    pub variables: Option<Vec<String>>,
    /// Thinning interval passed through to the engine.
    pub thin: usize,
    /// Monitor kind passed through to the engine.
    pub monitor_kind: MonitorKind,
    /// Report criterion values through `log` on every evaluation.
    pub verbose: bool,
}

impl Default for SampleUntilOptions {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            max_iterations: 250_000,
            variables: None,
            thin: 1,
            monitor_kind: MonitorKind::Trace,
            verbose: false,
        }
    }
}

/// Called at the end of every round with the accumulated samples, whether
/// the criterion is satisfied, and the cumulative iteration count.
///
/// Returning an error aborts the loop immediately and propagates to the
/// caller; there is no partial-bundle recovery beyond what was merged
/// before the abort.
pub type IterationCallback<'a> = dyn FnMut(&SampleBundle, bool, usize) -> Result<()> + 'a;

/// Progressively samples from `engine` until `criterion` is met.
///
/// If `previous_samples` is supplied and already satisfies the criterion
/// it is returned immediately without any engine call. Otherwise each round
/// draws `min(remaining_budget, chunk_size)` iterations, continues the
/// accumulated chains via [`SampleBundle::merge_consecutive`], and
/// re-evaluates the criterion. The loop stops when the criterion is
/// satisfied or the remaining budget drops to one iteration or less; the
/// latter logs a warning and still returns the accumulated bundle.
pub fn sample_until<E, D>(
    engine: &mut E,
    diagnostics: &D,
    criterion: &ConvergenceCriterion,
    previous_samples: Option<SampleBundle>,
    options: &SampleUntilOptions,
    on_iteration: Option<&mut IterationCallback<'_>>,
) -> Result<SampleBundle>
where
    E: SamplingEngine,
    D: Diagnostics,
{
    sample_until_inner(
        engine,
        diagnostics,
        criterion,
        previous_samples,
        options,
        on_iteration,
        None,
    )
}

/// [`sample_until`] with a progress bar over the iteration budget.
pub fn sample_until_with_progress<E, D>(
    engine: &mut E,
    diagnostics: &D,
    criterion: &ConvergenceCriterion,
    previous_samples: Option<SampleBundle>,
    options: &SampleUntilOptions,
    on_iteration: Option<&mut IterationCallback<'_>>,
) -> Result<SampleBundle>
where
    E: SamplingEngine,
    D: Diagnostics,
{
    let progress = ProgressBar::new(options.max_iterations as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:8} {bar:40.white} {pos}/{len} | {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    progress.set_prefix("sampling");

    let samples = sample_until_inner(
        engine,
        diagnostics,
        criterion,
        previous_samples,
        options,
        on_iteration,
        Some(&progress),
    )?;
    progress.finish();
    Ok(samples)
}

fn sample_until_inner<E, D>(
    engine: &mut E,
    diagnostics: &D,
    criterion: &ConvergenceCriterion,
    previous_samples: Option<SampleBundle>,
    options: &SampleUntilOptions,
    mut on_iteration: Option<&mut IterationCallback<'_>>,
    progress: Option<&ProgressBar>,
) -> Result<SampleBundle>
where
    E: SamplingEngine,
    D: Diagnostics,
{
    if options.chunk_size == 0 {
        return Err(Error::Configuration("chunk_size must be at least 1".into()));
    }
    if options.chunk_size > options.max_iterations {
        return Err(Error::Configuration(
            "chunk_size must be less than or equal to max_iterations".into(),
        ));
    }

    let mut accumulated = previous_samples;
    if let Some(samples) = accumulated.take() {
        if criterion.evaluate(diagnostics, &samples, options.verbose)? {
            return Ok(samples);
        }
        accumulated = Some(samples);
    }

    let mut iterations_left = options.max_iterations;
    loop {
        let iterations = iterations_left.min(options.chunk_size);
        let chunk = engine.draw(
            iterations,
            options.variables.as_deref(),
            options.thin,
            options.monitor_kind,
        )?;

        // The new chunk always continues the same chains.
        let samples = match accumulated.take() {
            None => chunk,
            Some(previous) => SampleBundle::merge_consecutive(&[previous, chunk])?,
        };

        iterations_left -= iterations;
        if let Some(progress) = progress {
            progress.inc(iterations as u64);
        }

        let satisfied = criterion.evaluate(diagnostics, &samples, options.verbose)?;
        if let Some(progress) = progress {
            progress.set_message(format!("criterion satisfied: {satisfied}"));
        }

        if let Some(callback) = &mut on_iteration {
            callback(&samples, satisfied, options.max_iterations - iterations_left)?;
        }

        if satisfied {
            return Ok(samples);
        }
        if iterations_left <= 1 {
            warn!("maximum number of iterations reached without satisfying the criterion");
            return Ok(samples);
        }
        accumulated = Some(samples);
    }
}
