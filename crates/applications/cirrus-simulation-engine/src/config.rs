//! Run configuration
//!
//! Everything here deserializes from JSON with every field optional; missing
//! fields take the defaults of the global manager demo.

use cirrus_core::{AllocationStrategy, SimTime};
use serde::{Deserialize, Serialize};

use crate::broker::CollectionPolicy;
use crate::executor::ExecutorConfig;
use crate::simulator::SimulationConfig;
use crate::types::SimEvent;

/// Something the manager does at a fixed time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManagerAction {
    CreateSubordinate {
        #[serde(default)]
        workload: Option<String>,
    },
    MonitorResources,
    RedistributeWorkload,
    AnalyzePerformance,
}

impl ManagerAction {
    pub fn to_event(&self) -> SimEvent {
        match self {
            ManagerAction::CreateSubordinate { workload } => SimEvent::CreateSubordinate {
                workload: workload.clone(),
            },
            ManagerAction::MonitorResources => SimEvent::MonitorResources,
            ManagerAction::RedistributeWorkload => SimEvent::RedistributeWorkload,
            ManagerAction::AnalyzePerformance => SimEvent::AnalyzePerformance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAction {
    /// Delay from manager start
    pub at: SimTime,
    #[serde(flatten)]
    pub action: ManagerAction,
}

impl ScheduledAction {
    pub fn new(at: SimTime, action: ManagerAction) -> Self {
        ScheduledAction { at, action }
    }

    pub fn create(at: SimTime, workload: &str) -> Self {
        Self::new(
            at,
            ManagerAction::CreateSubordinate {
                workload: Some(workload.to_string()),
            },
        )
    }
}

/// Global manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub name: String,
    /// Creation requests beyond this many subordinates are refused
    pub max_subordinates: usize,
    pub initial_strategy: AllocationStrategy,
    /// Subordinate result polling interval
    pub collection_interval: f64,
    /// Subordinate result deadline, relative to its start
    pub results_timeout: f64,
    pub schedule: Vec<ScheduledAction>,
}

impl ManagerConfig {
    pub fn collection_policy(&self) -> CollectionPolicy {
        CollectionPolicy {
            interval: self.collection_interval,
            timeout: self.results_timeout,
        }
    }

    /// The demo timeline: three subordinates, two monitors, one
    /// redistribution and a final analysis
    pub fn demo_schedule() -> Vec<ScheduledAction> {
        vec![
            ScheduledAction::create(5.0, "InitialWorkload"),
            ScheduledAction::create(20.0, "PeakWorkload"),
            ScheduledAction::create(40.0, "LateWorkload"),
            ScheduledAction::new(30.0, ManagerAction::MonitorResources),
            ScheduledAction::new(60.0, ManagerAction::MonitorResources),
            ScheduledAction::new(50.0, ManagerAction::RedistributeWorkload),
            ScheduledAction::new(90.0, ManagerAction::AnalyzePerformance),
        ]
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let policy = CollectionPolicy::default();
        ManagerConfig {
            name: "GlobalManager".to_string(),
            max_subordinates: 20,
            initial_strategy: AllocationStrategy::RoundRobin,
            collection_interval: policy.interval,
            results_timeout: policy.timeout,
            schedule: Self::demo_schedule(),
        }
    }
}

/// Full configuration for one `cirrus-sim` run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub simulation: SimulationConfig,
    pub manager: ManagerConfig,
    pub executor: ExecutorConfig,
}

impl RunConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
