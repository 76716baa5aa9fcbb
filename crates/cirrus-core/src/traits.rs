//! Core traits for Cirrus
//!
//! The ExecutionService trait is the boundary to the resource/host layer.
//! The simulation core works through this interface ONLY - it never models
//! CPU contention, provisioning or placement itself.

use crate::error::Result;
use crate::types::*;

/// Execution collaborator: accepts VMs and tasks on behalf of a subordinate
/// and later reports completion records for them.
pub trait ExecutionService {
    /// Collaborator identity (for logs)
    fn name(&self) -> &str;

    /// Lifecycle (called by a subordinate when it starts)
    fn submit_vms(&mut self, subordinate: EntityId, vms: &[VmDescriptor]) -> Result<()>;
    fn submit_tasks(&mut self, subordinate: EntityId, tasks: &[TaskDescriptor]) -> Result<()>;

    /// Completion records for everything the subordinate submitted.
    ///
    /// Fails for a subordinate that never submitted anything.
    fn completed_tasks(&self, subordinate: EntityId) -> Result<Vec<TaskResult>>;

    /// Rebalance hook. The manager only decides the strategy label; acting on
    /// it (migration, reassignment) is up to the collaborator.
    fn apply_strategy(&mut self, _subordinate: EntityId, _strategy: AllocationStrategy) -> Result<()> {
        Ok(())
    }
}
