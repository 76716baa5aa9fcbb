//! Cirrus Core - Shared types and traits
//!
//! This crate defines the abstractions shared by:
//! - the discrete-event kernel (`cirrus-simulation-engine`)
//! - the global manager and its subordinate brokers
//! - execution collaborators (anything that actually "runs" tasks on VMs)
//!
//! Key types:
//! - `ExecutionService` trait (interface to the resource/host layer)
//! - Entity ids, VM/task descriptors and task results
//! - Error taxonomy (`SimError`)

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
