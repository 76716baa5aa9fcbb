//! Event vocabulary for the global-manager simulation

use serde::{Deserialize, Serialize};

use crate::entity::Message;

/// Messages exchanged between the manager and its subordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Create one subordinate for the given workload label
    CreateSubordinate { workload: Option<String> },

    /// Log per-subordinate and total resource counts
    MonitorResources,

    /// Advance the allocation strategy and apply it to every subordinate
    RedistributeWorkload,

    /// Aggregate completed-task statistics across subordinates
    AnalyzePerformance,

    /// Subordinate polls the execution collaborator for its results
    CollectResults,

    /// Subordinate gives up waiting for results
    ResultsDeadline,
}

impl Message for SimEvent {
    fn tag(&self) -> &'static str {
        match self {
            SimEvent::CreateSubordinate { .. } => "CREATE_SUBORDINATE",
            SimEvent::MonitorResources => "MONITOR_RESOURCES",
            SimEvent::RedistributeWorkload => "REDISTRIBUTE_WORKLOAD",
            SimEvent::AnalyzePerformance => "ANALYZE_PERFORMANCE",
            SimEvent::CollectResults => "COLLECT_RESULTS",
            SimEvent::ResultsDeadline => "RESULTS_DEADLINE",
        }
    }
}

impl SimEvent {
    pub fn create(workload: impl Into<String>) -> Self {
        SimEvent::CreateSubordinate {
            workload: Some(workload.into()),
        }
    }
}
