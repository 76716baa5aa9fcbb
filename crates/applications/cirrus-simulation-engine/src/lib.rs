//! Cirrus Simulation Engine
//!
//! Discrete-event simulation kernel plus a global manager that creates and
//! supervises subordinate broker entities at runtime.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Simulation (clock, event queue, entity registry)         │
//! │   pop ──▶ Entity::react ──▶ Context (schedule / spawn)   │
//! └───────────────┬──────────────────────────┬───────────────┘
//!                 │                          │
//!         ┌───────▼────────┐   spawns  ┌─────▼────────┐
//!         │ GlobalManager  │──────────▶│ Subordinate  │ ...
//!         │ bundles,       │           │ submit, poll │
//!         │ strategy, stats│           └─────┬────────┘
//!         └───────┬────────┘                 │
//!                 └──────────┬───────────────┘
//!                    ┌───────▼──────────┐
//!                    │ ExecutionService │ (SimulatedExecutor)
//!                    └──────────────────┘
//! ```

pub mod types;
pub mod event_queue;
pub mod entity;
pub mod simulator;
pub mod workload;
pub mod policies;
pub mod executor;
pub mod broker;
pub mod metrics;
pub mod config;
pub mod manager;
pub mod scenario;
