//! Global manager: a long-lived entity that creates and supervises
//! subordinate brokers
//!
//! The manager follows a timeline of scheduled actions:
//! - create a subordinate for a workload label (bundle sized per class)
//! - monitor the VM/task counts held by all subordinates
//! - redistribute: switch allocation strategy and push it to the collaborator
//! - analyze: aggregate completed-task statistics
//!
//! Records are kept for every subordinate ever created and never removed.
//! A final analysis runs when the manager shuts down.

use cirrus_core::{
    AllocationStrategy, CreationFailure, EntityId, Result, SimError, SimTime, TaskDescriptor, VmDescriptor,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::broker::Subordinate;
use crate::config::ManagerConfig;
use crate::entity::{Context, Entity, Message};
use crate::event_queue::Event;
use crate::executor::SharedExecutor;
use crate::metrics::{PerformanceReport, SubordinateStats};
use crate::policies::{RedistributionPlan, StrategyCycle};
use crate::types::SimEvent;
use crate::workload::{BundleGenerator, IdAllocator, WorkloadClass};

/// What the manager knows about one subordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedEntityRecord {
    pub subordinate_id: EntityId,
    pub name: String,
    pub workload: WorkloadClass,
    pub assigned_vms: Vec<VmDescriptor>,
    pub assigned_tasks: Vec<TaskDescriptor>,
    /// Execution time of successful tasks as of the latest analysis
    pub cumulative_metric: f64,
    pub created_at: SimTime,
}

/// Resource counts across all subordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTotals {
    pub subordinates: usize,
    pub vms: usize,
    pub tasks: usize,
}

/// Controller entity that spawns and supervises subordinate brokers
pub struct GlobalManager {
    config: ManagerConfig,
    executor: SharedExecutor,
    generator: BundleGenerator,
    ids: IdAllocator,
    strategy: StrategyCycle,
    records: Vec<ManagedEntityRecord>,
    /// Running totals, kept equal to the sum over `records`
    totals: ResourceTotals,
    creation_failures: Vec<CreationFailure>,
    redistributions: Vec<RedistributionPlan>,
    reports: Vec<PerformanceReport>,
    final_report: Option<PerformanceReport>,
}

impl GlobalManager {
    pub fn new(config: ManagerConfig, executor: SharedExecutor) -> Self {
        GlobalManager {
            strategy: StrategyCycle::new(config.initial_strategy),
            config,
            executor,
            generator: BundleGenerator::standard(),
            ids: IdAllocator::new(),
            records: Vec::new(),
            totals: ResourceTotals::default(),
            creation_failures: Vec::new(),
            redistributions: Vec::new(),
            reports: Vec::new(),
            final_report: None,
        }
    }

    /// Replace the bundle table
    pub fn with_generator(mut self, generator: BundleGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Records in creation order
    pub fn records(&self) -> &[ManagedEntityRecord] {
        &self.records
    }

    pub fn record(&self, id: EntityId) -> Option<&ManagedEntityRecord> {
        self.records.iter().find(|record| record.subordinate_id == id)
    }

    pub fn subordinate_ids(&self) -> Vec<EntityId> {
        self.records.iter().map(|record| record.subordinate_id).collect()
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy.current()
    }

    /// VM and task counts summed over all records
    pub fn resource_totals(&self) -> ResourceTotals {
        self.records.iter().fold(
            ResourceTotals {
                subordinates: self.records.len(),
                ..ResourceTotals::default()
            },
            |mut totals, record| {
                totals.vms += record.assigned_vms.len();
                totals.tasks += record.assigned_tasks.len();
                totals
            },
        )
    }

    /// Totals maintained incrementally as subordinates are created
    pub fn tracked_totals(&self) -> ResourceTotals {
        self.totals
    }

    pub fn creation_failures(&self) -> &[CreationFailure] {
        &self.creation_failures
    }

    pub fn redistributions(&self) -> &[RedistributionPlan] {
        &self.redistributions
    }

    /// Reports from scheduled analyses, oldest first
    pub fn reports(&self) -> &[PerformanceReport] {
        &self.reports
    }

    pub fn last_report(&self) -> Option<&PerformanceReport> {
        self.reports.last()
    }

    /// Analysis taken at shutdown
    pub fn final_report(&self) -> Option<&PerformanceReport> {
        self.final_report.as_ref()
    }

    fn create_subordinate(
        &mut self,
        workload: Option<&str>,
        ctx: &mut Context<'_, SimEvent>,
    ) -> std::result::Result<EntityId, CreationFailure> {
        let class = WorkloadClass::from_request(workload)?;
        let policy = self.config.collection_policy();
        policy.validate()?;
        if self.records.len() >= self.config.max_subordinates {
            return Err(CreationFailure::CapacityExceeded {
                limit: self.config.max_subordinates,
            });
        }
        if !class.is_recognized() {
            warn!("Unrecognized workload {:?}, using the default bundle", class.label());
        }

        let label = workload.map(str::trim).unwrap_or_else(|| class.label());
        let name = format!("GlobalManagedBroker_{}_{}", self.records.len() + 1, label);
        let bundle = self.ids.allocate(&self.generator, &class);

        let expected = ctx.next_entity_id();
        let record = ManagedEntityRecord {
            subordinate_id: expected,
            name: name.clone(),
            workload: class,
            assigned_vms: bundle.vms.clone(),
            assigned_tasks: bundle.tasks.clone(),
            cumulative_metric: 0.0,
            created_at: ctx.now(),
        };

        let subordinate = Subordinate::new(name, bundle, self.executor.clone(), policy);
        let id = ctx.spawn(Box::new(subordinate));
        debug_assert_eq!(id, expected);

        info!(
            "t={:.2} {} created {} ({}) for {}: {} VMs, {} tasks",
            ctx.now(),
            self.config.name,
            record.name,
            id,
            record.workload,
            record.assigned_vms.len(),
            record.assigned_tasks.len()
        );

        self.totals.subordinates += 1;
        self.totals.vms += record.assigned_vms.len();
        self.totals.tasks += record.assigned_tasks.len();
        self.records.push(record);

        Ok(id)
    }

    fn monitor(&self, now: SimTime) {
        info!("t={:.2} Monitoring {} subordinates", now, self.records.len());
        for record in &self.records {
            info!(
                "  {} ({}): {} VMs, {} tasks",
                record.name,
                record.subordinate_id,
                record.assigned_vms.len(),
                record.assigned_tasks.len()
            );
        }

        let totals = self.resource_totals();
        debug_assert_eq!(totals, self.totals);
        info!("  Total: {} VMs, {} tasks", totals.vms, totals.tasks);
    }

    fn redistribute(&mut self, now: SimTime) {
        let subordinates = self.subordinate_ids();
        let plan = self.strategy.redistribute(&subordinates);
        info!(
            "t={:.2} Switching strategy {} -> {} across {} subordinates",
            now,
            plan.previous,
            plan.strategy,
            plan.affected.len()
        );

        let mut executor = self.executor.borrow_mut();
        for &id in &plan.affected {
            if let Err(err) = executor.apply_strategy(id, plan.strategy) {
                warn!("Could not apply {} to {}: {}", plan.strategy, id, err);
            } else {
                debug!("Applied {} to {}", plan.strategy, id);
            }
        }
        drop(executor);

        self.redistributions.push(plan);
    }

    fn analyze(&mut self, now: SimTime) -> PerformanceReport {
        let mut subordinates = Vec::with_capacity(self.records.len());
        {
            let executor = self.executor.borrow();
            for record in self.records.iter_mut() {
                let stats = match executor.completed_tasks(record.subordinate_id) {
                    Ok(results) => SubordinateStats::from_results(record.subordinate_id, &record.name, &results),
                    Err(err) => {
                        warn!("No results for {}: {}", record.name, err);
                        SubordinateStats::empty(record.subordinate_id, &record.name)
                    }
                };
                record.cumulative_metric = stats.execution_time;
                subordinates.push(stats);
            }
        }

        let report = PerformanceReport::aggregate(now, subordinates);
        for stats in &report.subordinates {
            info!(
                "  {}: {} successful, {} failed, {:.2}s execution",
                stats.name, stats.successful, stats.failed, stats.execution_time
            );
        }
        info!(
            "t={:.2} {} subordinates, {} successful, {} failed, success rate {:.2}%, average execution {:.2}s, total {:.2}s",
            now,
            self.records.len(),
            report.total_successful,
            report.total_failed,
            report.success_rate_percent(),
            report.average_execution_time,
            report.total_execution_time
        );
        report
    }
}

impl Entity<SimEvent> for GlobalManager {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn start(&mut self, ctx: &mut Context<'_, SimEvent>) -> Result<()> {
        info!(
            "t={:.2} {} starting with {} scheduled actions (collaborator: {})",
            ctx.now(),
            self.config.name,
            self.config.schedule.len(),
            self.executor.borrow().name()
        );
        for scheduled in &self.config.schedule {
            ctx.schedule_self(scheduled.at, scheduled.action.to_event())?;
        }
        Ok(())
    }

    fn react(&mut self, event: &Event<SimEvent>, ctx: &mut Context<'_, SimEvent>) -> Result<()> {
        match &event.message {
            SimEvent::CreateSubordinate { workload } => {
                if let Err(failure) = self.create_subordinate(workload.as_deref(), ctx) {
                    self.creation_failures.push(failure.clone());
                    return Err(SimError::from(failure));
                }
            }
            SimEvent::MonitorResources => self.monitor(ctx.now()),
            SimEvent::RedistributeWorkload => self.redistribute(ctx.now()),
            SimEvent::AnalyzePerformance => {
                let report = self.analyze(ctx.now());
                self.reports.push(report);
            }
            other => {
                return Err(SimError::UnhandledEvent {
                    entity: ctx.self_id(),
                    tag: other.tag(),
                });
            }
        }
        Ok(())
    }

    fn shutdown(&mut self, now: SimTime) {
        info!(
            "t={:.2} {} shutting down: {} subordinates managed, {} creation failures",
            now,
            self.config.name,
            self.records.len(),
            self.creation_failures.len()
        );
        let report = self.analyze(now);
        self.final_report = Some(report);
    }
}
