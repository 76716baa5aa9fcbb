//! Core types shared across Cirrus components

use serde::{Deserialize, Serialize};

/// Virtual simulation time (seconds since the start of the run)
pub type SimTime = f64;

/// Unique identifier for a simulation entity
///
/// Assigned by the runtime at registration time, starting from 0 and
/// increasing monotonically. Never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Created,
    Running,
    Shutdown,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Created => write!(f, "CREATED"),
            LifecycleState::Running => write!(f, "RUNNING"),
            LifecycleState::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Resource allocation strategy used by the global manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AllocationStrategy {
    /// Spread work across subordinates in turn
    #[default]
    RoundRobin,

    /// Favour the least loaded subordinates
    LoadBalanced,

    /// Favour the subordinates with the best observed execution times
    PerformanceOptimized,
}

impl AllocationStrategy {
    /// The state that follows this one in the redistribution cycle
    pub fn next(self) -> Self {
        match self {
            AllocationStrategy::RoundRobin => AllocationStrategy::LoadBalanced,
            AllocationStrategy::LoadBalanced => AllocationStrategy::PerformanceOptimized,
            AllocationStrategy::PerformanceOptimized => AllocationStrategy::RoundRobin,
        }
    }
}

impl std::fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationStrategy::RoundRobin => write!(f, "ROUND_ROBIN"),
            AllocationStrategy::LoadBalanced => write!(f, "LOAD_BALANCED"),
            AllocationStrategy::PerformanceOptimized => write!(f, "PERFORMANCE_OPTIMIZED"),
        }
    }
}

/// Virtual machine specification handed to the execution collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmDescriptor {
    pub id: u64,
    pub mips_per_core: u32,
    pub cores: u32,
    pub ram_mb: u32,
    pub bandwidth: u64,
    pub disk_mb: u64,
    /// Virtual machine monitor label (e.g. "Xen")
    pub vmm: String,
}

/// Task (cloudlet) specification handed to the execution collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: u64,
    /// Length in million instructions
    pub length: u64,
    pub cores: u32,
    pub input_size: u64,
    pub output_size: u64,
}

/// Status reported by the execution collaborator for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Success,
    Failed,
    Canceled,
    Paused,
    Resumed,
    Created,
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "SUCCESS"),
            TaskStatus::Failed => write!(f, "FAILED"),
            TaskStatus::Canceled => write!(f, "CANCELED"),
            TaskStatus::Paused => write!(f, "PAUSED"),
            TaskStatus::Resumed => write!(f, "RESUMED"),
            TaskStatus::Created => write!(f, "CREATED"),
        }
    }
}

/// Completion record for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: u64,
    pub status: TaskStatus,
    /// Actual CPU time spent executing (seconds)
    pub cpu_time: f64,
    pub start_time: SimTime,
    pub finish_time: SimTime,
    pub vm_id: Option<u64>,
    /// Datacenter (resource) that executed the task
    pub resource_id: Option<u64>,
}

impl TaskResult {
    /// A result for a task that never ran
    pub fn failed(task_id: u64, at: SimTime) -> Self {
        TaskResult {
            task_id,
            status: TaskStatus::Failed,
            cpu_time: 0.0,
            start_time: at,
            finish_time: at,
            vm_id: None,
            resource_id: None,
        }
    }
}
