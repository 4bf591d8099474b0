//! Communicator abstraction and collectives for the Tally value store.
//!
//! Execution is SPMD: every rank runs the same program and meets its
//! peers in blocking collectives. The [`Communicator`] trait is the
//! point-to-point seam (object safe, payloads type-erased); the typed
//! collectives in [`collective`] are built on top of it.
//!
//! Two communicators ship with the crate:
//!
//! - [`SerialComm`]: a world of one rank, every collective is a no-op.
//! - [`ThreadComm`]: an in-process world with one OS thread per rank,
//!   wired together with crossbeam channels. [`run_spmd`] spawns such a
//!   world and collects each rank's result.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod collective;
pub mod communicator;
pub mod local;
pub mod serial;

pub use collective::{broadcast, gather, scatter};
pub use communicator::{CollectiveOp, Communicator, Message};
pub use local::{run_spmd, ThreadComm};
pub use serial::SerialComm;
