//! One complete global-manager run, start to finish

use std::cell::RefCell;
use std::rc::Rc;

use cirrus_core::{AllocationStrategy, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::RunConfig;
use crate::executor::{SharedExecutor, SimulatedExecutor};
use crate::manager::{GlobalManager, ManagedEntityRecord};
use crate::metrics::PerformanceReport;
use crate::simulator::{RunOutcome, Simulation, SimulationStats};
use crate::types::SimEvent;

/// Result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// `None` when a fatal error halted the run
    pub outcome: Option<RunOutcome>,
    /// The fatal error, if any. Records below are whatever existed when it hit.
    pub error: Option<String>,
    pub stats: SimulationStats,
    pub final_strategy: AllocationStrategy,
    pub records: Vec<ManagedEntityRecord>,
    pub creation_failures: Vec<String>,
    /// Analysis taken when the manager shut down
    pub report: Option<PerformanceReport>,
}

impl RunSummary {
    pub fn halted(&self) -> bool {
        self.error.is_some()
    }
}

/// Register a global manager backed by a `SimulatedExecutor` and run it.
///
/// Only setup errors are returned as `Err`. A run halted by a fatal error
/// still yields a summary with the partial records and the error attached.
pub fn run_global_manager(config: &RunConfig) -> Result<RunSummary> {
    let executor: SharedExecutor = Rc::new(RefCell::new(SimulatedExecutor::new(config.executor.clone())?));

    let mut sim: Simulation<SimEvent> = Simulation::new(config.simulation.clone());
    info!("Running {} until the queue drains", config.manager.name);
    let result = sim
        .register(Box::new(GlobalManager::new(config.manager.clone(), executor)))
        .and_then(|_| sim.run());

    Ok(summarize(&sim, config, result))
}

fn summarize(sim: &Simulation<SimEvent>, config: &RunConfig, result: Result<RunOutcome>) -> RunSummary {
    let (outcome, error) = match result {
        Ok(outcome) => (Some(outcome), None),
        Err(err) => {
            error!("{} halted at t={:.2}: {}", config.manager.name, sim.now(), err);
            (None, Some(err.to_string()))
        }
    };
    let stats = sim.stats();

    match sim.entity_ids().find_map(|id| sim.entity::<GlobalManager>(id)) {
        Some(manager) => RunSummary {
            outcome,
            error,
            stats,
            final_strategy: manager.strategy(),
            records: manager.records().to_vec(),
            creation_failures: manager.creation_failures().iter().map(|f| f.to_string()).collect(),
            report: manager.final_report().cloned(),
        },
        None => RunSummary {
            outcome,
            error,
            stats,
            final_strategy: config.manager.initial_strategy,
            records: Vec::new(),
            creation_failures: Vec::new(),
            report: None,
        },
    }
}
