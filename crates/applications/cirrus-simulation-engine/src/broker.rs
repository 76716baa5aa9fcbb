//! Subordinate broker entity
//!
//! Created at runtime by the global manager. On start it hands its bundle to
//! the execution collaborator, then polls for results until every task is
//! accounted for or its deadline passes.

use cirrus_core::{CreationFailure, Result, SimError, SimTime, TaskResult};
use tracing::{debug, info, warn};

use crate::entity::{Context, Entity, Message};
use crate::event_queue::{Event, EventHandle};
use crate::executor::SharedExecutor;
use crate::types::SimEvent;
use crate::workload::ResourceBundle;

/// Polling cadence and deadline for a subordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionPolicy {
    /// Delay between result polls
    pub interval: f64,
    /// Time after start at which the subordinate stops waiting
    pub timeout: f64,
}

impl Default for CollectionPolicy {
    fn default() -> Self {
        CollectionPolicy {
            interval: 10.0,
            timeout: 60.0,
        }
    }
}

impl CollectionPolicy {
    /// A zero interval would poll forever without advancing the clock
    pub fn validate(&self) -> std::result::Result<(), CreationFailure> {
        if !(self.interval.is_finite() && self.interval > 0.0) {
            return Err(CreationFailure::InvalidCollectionPolicy(format!(
                "interval must be positive and finite, got {}",
                self.interval
            )));
        }
        if !(self.timeout.is_finite() && self.timeout >= 0.0) {
            return Err(CreationFailure::InvalidCollectionPolicy(format!(
                "timeout must be non-negative and finite, got {}",
                self.timeout
            )));
        }
        Ok(())
    }
}

/// Broker that owns one workload bundle
pub struct Subordinate {
    name: String,
    bundle: ResourceBundle,
    executor: SharedExecutor,
    policy: CollectionPolicy,
    deadline: Option<EventHandle>,
    results: Vec<TaskResult>,
    collected: bool,
    timed_out: bool,
}

impl Subordinate {
    pub fn new(name: impl Into<String>, bundle: ResourceBundle, executor: SharedExecutor, policy: CollectionPolicy) -> Self {
        Subordinate {
            name: name.into(),
            bundle,
            executor,
            policy,
            deadline: None,
            results: Vec::new(),
            collected: false,
            timed_out: false,
        }
    }

    pub fn bundle(&self) -> &ResourceBundle {
        &self.bundle
    }

    /// Results seen by the latest poll
    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    pub fn is_collected(&self) -> bool {
        self.collected
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    fn collect(&mut self, ctx: &mut Context<'_, SimEvent>) -> Result<()> {
        if self.collected || self.timed_out {
            return Ok(());
        }

        self.results = self.executor.borrow().completed_tasks(ctx.self_id())?;
        if self.results.len() >= self.bundle.tasks.len() {
            self.collected = true;
            if let Some(handle) = self.deadline.take() {
                ctx.cancel(handle);
            }
            debug!(
                "{} collected {} results at t={:.2}",
                self.name,
                self.results.len(),
                ctx.now()
            );
        } else {
            ctx.schedule_self(self.policy.interval, SimEvent::CollectResults)?;
        }
        Ok(())
    }
}

impl Entity<SimEvent> for Subordinate {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, ctx: &mut Context<'_, SimEvent>) -> Result<()> {
        let id = ctx.self_id();
        {
            let mut executor = self.executor.borrow_mut();
            executor.submit_vms(id, &self.bundle.vms)?;
            executor.submit_tasks(id, &self.bundle.tasks)?;
        }
        info!(
            "t={:.2} {} ({}) submitted {} VMs and {} tasks for {}",
            ctx.now(),
            self.name,
            id,
            self.bundle.vms.len(),
            self.bundle.tasks.len(),
            self.bundle.class
        );

        ctx.schedule_self(self.policy.interval, SimEvent::CollectResults)?;
        self.deadline = Some(ctx.schedule_self(self.policy.timeout, SimEvent::ResultsDeadline)?);
        Ok(())
    }

    fn react(&mut self, event: &Event<SimEvent>, ctx: &mut Context<'_, SimEvent>) -> Result<()> {
        match &event.message {
            SimEvent::CollectResults => self.collect(ctx),
            SimEvent::ResultsDeadline => {
                self.deadline = None;
                if !self.collected {
                    self.timed_out = true;
                    warn!(
                        "{} gave up waiting at t={:.2}: {} of {} results",
                        self.name,
                        ctx.now(),
                        self.results.len(),
                        self.bundle.tasks.len()
                    );
                }
                Ok(())
            }
            other => Err(SimError::UnhandledEvent {
                entity: ctx.self_id(),
                tag: other.tag(),
            }),
        }
    }

    fn shutdown(&mut self, now: SimTime) {
        info!("t={:.2} {} shutting down with {} results", now, self.name, self.results.len());
        for result in &self.results {
            if result.status.is_success() {
                debug!(
                    "  task {}: {} - {:.2}s, datacenter {:?}, VM {:?}",
                    result.task_id, result.status, result.cpu_time, result.resource_id, result.vm_id
                );
            } else {
                debug!("  task {}: {}", result.task_id, result.status);
            }
        }
    }
}
