/*!
# Sampling-Engine Contract

The crate never builds a model graph or draws posterior samples itself;
that is the job of an external engine reached through the narrow
[`SamplingEngine`] trait. The incremental controller only calls
[`draw`](SamplingEngine::draw), while DIC scoring drives the monitor
facility (`set_monitors` / `advance` / `monitor_means` / `clear_monitor`)
and the extension loader.
*/

use ndarray::Array1;
use std::collections::BTreeMap;
use std::fmt;

use crate::bundle::SampleBundle;
use crate::error::Result;

/// How a monitor records the values it observes: the full trace of retained
/// draws, or a running mean per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorKind {
    #[default]
    Trace,
    Mean,
}

impl MonitorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorKind::Trace => "trace",
            MonitorKind::Mean => "mean",
        }
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The contract with an external MCMC sampling engine.
///
/// An engine owns its chains and advances all of them together; every call
/// is blocking and the engine is exclusively borrowed for the duration of a
/// sampling or scoring run.
pub trait SamplingEngine {
    /// Draws `iterations` further iterations for the given variables
    /// (engine default set if `None`), retaining every `thin`-th draw, and
    /// returns them as a new [`SampleBundle`]. Each call continues the
    /// engine's chains from their current state.
    fn draw(
        &mut self,
        iterations: usize,
        variables: Option<&[String]>,
        thin: usize,
        monitor_kind: MonitorKind,
    ) -> Result<SampleBundle>;

    /// The number of parallel chains the engine runs.
    fn chain_count(&self) -> usize;

    /// Registers a monitor for each named quantity with the given thinning
    /// and aggregation.
    fn set_monitors(&mut self, names: &[&str], thin: usize, aggregation: MonitorKind)
        -> Result<()>;

    /// Advances all chains by `iterations` steps without returning draws;
    /// registered monitors keep accumulating.
    fn advance(&mut self, iterations: usize) -> Result<()>;

    /// Reads back the per-observation means recorded by the named
    /// mean-aggregating monitors.
    fn monitor_means(&mut self, names: &[&str]) -> Result<BTreeMap<String, Array1<f64>>>;

    /// Removes a previously registered monitor so later scoring calls do
    /// not see stale state.
    fn clear_monitor(&mut self, name: &str, aggregation: MonitorKind) -> Result<()>;

    /// Loads an engine extension module by name. Loading an extension that
    /// is already present is a no-op; the set of loaded extension names is
    /// state owned by the engine implementation, never a process-wide
    /// registry.
    fn load_extension(&mut self, name: &str) -> Result<()>;
}
