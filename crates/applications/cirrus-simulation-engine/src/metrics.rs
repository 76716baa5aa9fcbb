//! Performance aggregation over completed tasks

use cirrus_core::{EntityId, SimTime, TaskResult};
use serde::{Deserialize, Serialize};

/// Completed-task figures for one subordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubordinateStats {
    pub id: EntityId,
    pub name: String,
    pub successful: usize,
    /// Every non-success status counts here
    pub failed: usize,
    /// Sum of CPU time over successful tasks
    pub execution_time: f64,
}

impl SubordinateStats {
    pub fn from_results(id: EntityId, name: impl Into<String>, results: &[TaskResult]) -> Self {
        let (successful, failed): (Vec<&TaskResult>, Vec<&TaskResult>) =
            results.iter().partition(|result| result.status.is_success());

        SubordinateStats {
            id,
            name: name.into(),
            successful: successful.len(),
            failed: failed.len(),
            execution_time: successful.iter().map(|result| result.cpu_time).sum(),
        }
    }

    /// Stats for a subordinate whose results could not be fetched
    pub fn empty(id: EntityId, name: impl Into<String>) -> Self {
        Self::from_results(id, name, &[])
    }
}

/// Global performance figures at one point in simulated time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub time: SimTime,
    pub subordinates: Vec<SubordinateStats>,
    pub total_successful: usize,
    pub total_failed: usize,
    pub total_execution_time: f64,
    /// Fraction of completed tasks that succeeded, within [0, 1]
    pub success_rate: f64,
    /// Total execution time divided by the number of subordinates
    pub average_execution_time: f64,
}

impl PerformanceReport {
    pub fn aggregate(time: SimTime, subordinates: Vec<SubordinateStats>) -> Self {
        let total_successful: usize = subordinates.iter().map(|s| s.successful).sum();
        let total_failed: usize = subordinates.iter().map(|s| s.failed).sum();
        let total_execution_time: f64 = subordinates.iter().map(|s| s.execution_time).sum();

        PerformanceReport {
            time,
            total_successful,
            total_failed,
            total_execution_time,
            success_rate: success_rate(total_successful, total_failed),
            average_execution_time: total_execution_time / subordinates.len().max(1) as f64,
            subordinates,
        }
    }

    pub fn success_rate_percent(&self) -> f64 {
        self.success_rate * 100.0
    }
}

/// `successful / max(successful + failed, 1)`
pub fn success_rate(successful: usize, failed: usize) -> f64 {
    successful as f64 / (successful + failed).max(1) as f64
}
