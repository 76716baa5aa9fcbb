//! In-memory execution collaborator
//!
//! Stands in for the resource/host layer. Tasks are bound to their owner's
//! VMs round-robin and each VM runs its tasks back to back, so a task's CPU
//! time depends only on its length and the VM it lands on. Times are measured
//! from submission.
//!
//! Failure injection and jitter draw from a seeded `StdRng`, so two executors
//! built from the same config produce identical results.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use cirrus_core::{
    AllocationStrategy, EntityId, ExecutionService, Result, SimError, SimTime, TaskDescriptor, TaskResult,
    TaskStatus, VmDescriptor,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Execution collaborator shared by the manager and its subordinates
pub type SharedExecutor = Rc<RefCell<dyn ExecutionService>>;

/// Knobs for the simulated collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub seed: u64,
    /// Probability that a task fails instead of running (0.0 - 1.0)
    pub failure_rate: f64,
    /// Standard deviation of the multiplicative execution-time noise
    pub jitter: f64,
    /// Datacenters that VMs are spread over (`vm_id % datacenter_count`)
    pub datacenter_count: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            seed: 42,
            failure_rate: 0.0,
            jitter: 0.0,
            datacenter_count: 3,
        }
    }
}

/// Per-subordinate bookkeeping
#[derive(Debug, Default)]
struct Account {
    vms: Vec<VmDescriptor>,
    /// Time each VM becomes free, parallel to `vms`
    vm_free_at: Vec<SimTime>,
    next_vm: usize,
    results: Vec<TaskResult>,
    strategies: Vec<AllocationStrategy>,
}

/// Deterministic stand-in for the resource layer
pub struct SimulatedExecutor {
    config: ExecutorConfig,
    rng: StdRng,
    jitter: Option<Normal<f64>>,
    accounts: HashMap<EntityId, Account>,
}

impl SimulatedExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.failure_rate) {
            return Err(SimError::execution(format!(
                "failure_rate must be within [0, 1], got {}",
                config.failure_rate
            )));
        }
        if config.datacenter_count == 0 {
            return Err(SimError::execution("datacenter_count must be at least 1"));
        }

        let jitter = if config.jitter > 0.0 {
            let normal = Normal::new(0.0, config.jitter)
                .map_err(|e| SimError::execution(format!("invalid jitter {}: {}", config.jitter, e)))?;
            Some(normal)
        } else {
            None
        };

        Ok(SimulatedExecutor {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            jitter,
            accounts: HashMap::new(),
        })
    }

    /// Strategies applied to `subordinate`, oldest first
    pub fn strategies_applied(&self, subordinate: EntityId) -> &[AllocationStrategy] {
        self.accounts
            .get(&subordinate)
            .map(|account| account.strategies.as_slice())
            .unwrap_or(&[])
    }

    pub fn vm_count(&self, subordinate: EntityId) -> usize {
        self.accounts
            .get(&subordinate)
            .map(|account| account.vms.len())
            .unwrap_or(0)
    }

    fn execute(&mut self, account_id: EntityId, task: &TaskDescriptor) -> TaskResult {
        let failed = self.config.failure_rate > 0.0 && self.rng.gen_bool(self.config.failure_rate);
        let noise = match &self.jitter {
            Some(normal) => (1.0 + normal.sample(&mut self.rng)).max(0.1),
            None => 1.0,
        };
        let datacenters = self.config.datacenter_count;

        let account = self.accounts.entry(account_id).or_default();
        if account.vms.is_empty() {
            return TaskResult::failed(task.id, 0.0);
        }

        let slot = account.next_vm % account.vms.len();
        account.next_vm += 1;
        let vm = &account.vms[slot];
        let start = account.vm_free_at[slot];

        if failed {
            return TaskResult {
                status: TaskStatus::Failed,
                vm_id: Some(vm.id),
                resource_id: Some(vm.id % datacenters),
                ..TaskResult::failed(task.id, start)
            };
        }

        let cores = task.cores.min(vm.cores).max(1);
        let cpu_time = task.length as f64 / (vm.mips_per_core as f64 * cores as f64) * noise;
        let finish = start + cpu_time;
        account.vm_free_at[slot] = finish;

        TaskResult {
            task_id: task.id,
            status: TaskStatus::Success,
            cpu_time,
            start_time: start,
            finish_time: finish,
            vm_id: Some(vm.id),
            resource_id: Some(vm.id % datacenters),
        }
    }
}

impl ExecutionService for SimulatedExecutor {
    fn name(&self) -> &str {
        "simulated"
    }

    fn submit_vms(&mut self, subordinate: EntityId, vms: &[VmDescriptor]) -> Result<()> {
        let account = self.accounts.entry(subordinate).or_default();
        account.vms.extend_from_slice(vms);
        account.vm_free_at.resize(account.vms.len(), 0.0);
        debug!("{} submitted {} VMs", subordinate, vms.len());
        Ok(())
    }

    fn submit_tasks(&mut self, subordinate: EntityId, tasks: &[TaskDescriptor]) -> Result<()> {
        let results: Vec<TaskResult> = tasks.iter().map(|task| self.execute(subordinate, task)).collect();
        debug!("{} submitted {} tasks", subordinate, results.len());
        self.accounts.entry(subordinate).or_default().results.extend(results);
        Ok(())
    }

    fn completed_tasks(&self, subordinate: EntityId) -> Result<Vec<TaskResult>> {
        self.accounts
            .get(&subordinate)
            .map(|account| account.results.clone())
            .ok_or_else(|| SimError::execution(format!("{} never submitted anything", subordinate)))
    }

    fn apply_strategy(&mut self, subordinate: EntityId, strategy: AllocationStrategy) -> Result<()> {
        let account = self
            .accounts
            .get_mut(&subordinate)
            .ok_or_else(|| SimError::execution(format!("cannot apply {} to unknown {}", strategy, subordinate)))?;
        account.strategies.push(strategy);
        Ok(())
    }
}
