//! Test fixtures for Tally development.
//!
//! - [`key`]: parse a `"producer/value"` literal.
//! - [`run_ranks`]: run one registry per rank on an in-process world.
//! - [`fixtures`]: canned producers and consumers.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::Arc;

use tally_comm::{run_spmd, Communicator};
use tally_core::ValueKey;
use tally_store::{RegistryConfig, ValueRegistry};

pub use fixtures::{RecordingConsumer, ScriptedProducer};

/// Parse a key literal, panicking on a missing separator.
pub fn key(s: &str) -> ValueKey {
    ValueKey::parse(s).expect("test key needs a '/'")
}

/// A registry over `comm` with the default configuration.
pub fn registry_on(comm: Arc<dyn Communicator>) -> ValueRegistry {
    ValueRegistry::new(comm, RegistryConfig::default()).expect("default config is valid")
}

/// Run `f` once per rank, each with its own registry wired to a
/// `size`-rank thread world. Results are indexed by rank.
pub fn run_ranks<R, F>(size: usize, f: F) -> Vec<R>
where
    F: Fn(usize, ValueRegistry) -> R + Sync,
    R: Send,
{
    run_spmd(size, |comm| {
        let rank = comm.rank();
        f(rank, registry_on(comm))
    })
    .expect("failed to spawn rank threads")
}
