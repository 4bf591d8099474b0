//! The Tally value registry.
//!
//! Components produce named values once per step and consume values
//! produced by others, possibly in a different distribution across
//! ranks. This crate holds:
//!
//! - [`ValueRecord`]: the bounded rolling history of one typed value.
//! - [`CommPolicy`] and its implementations: how a value is reconciled
//!   across ranks at the end of a step.
//! - [`compat`]: the producer/consumer mode pairing rules.
//! - [`ValueRegistry`]: the map from [`ValueKey`](tally_core::ValueKey)
//!   to record and policy, with the declare/init/finalize/rotate
//!   lifecycle and checkpointing.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod checkpoint;
pub mod compat;
pub mod config;
pub mod info;
pub mod policy;
pub mod record;
pub mod registry;
mod slot;

pub use checkpoint::{FORMAT_VERSION, MAGIC};
pub use compat::{plan_finalize, reconciliation, FinalizePlan, Reconciliation};
pub use config::{ConfigError, RegistryConfig, HISTORY_DEPTH_LIMIT};
pub use info::ValueInfo;
pub use policy::{
    BroadcastPolicy, CommPolicy, GatherPolicy, GeneralPolicy, LocalBuffer, ScatterPolicy,
    VectorPolicy,
};
pub use record::{ConsumerEntry, ValueRecord};
pub use registry::{ValueHandle, ValueRef, ValueRegistry};
