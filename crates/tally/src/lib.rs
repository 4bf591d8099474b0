//! Tally: typed value coordination for SPMD programs.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tally sub-crates. For most users, adding `tally` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use tally::prelude::*;
//!
//! let mut registry = ValueRegistry::serial();
//! let residual = ValueKey::new("solver", "residual");
//!
//! // Producer side: declare, then write once per step.
//! let handle = registry
//!     .declare_value::<f64>(&residual, ProducerMode::Replicated)
//!     .unwrap();
//! // Consumer side: the current value and the one from the previous step.
//! let now = registry
//!     .request_value::<f64>(&residual, "monitor", ConsumerMode::Root, 0)
//!     .unwrap();
//! let old = registry
//!     .request_value::<f64>(&residual, "monitor", ConsumerMode::Root, 1)
//!     .unwrap();
//! registry.init().unwrap();
//!
//! let mut seen = Vec::new();
//! for r in [1.0, 0.1] {
//!     *registry.value_mut(&handle).unwrap() = r;
//!     registry.finalize_producer("solver").unwrap();
//!     seen.push((*registry.read(&now).unwrap(), *registry.read(&old).unwrap()));
//!     registry.copy_values_back();
//! }
//! assert_eq!(seen, vec![(1.0, 0.0), (0.1, 1.0)]);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tally-core` | Keys, modes, type descriptors, errors, codec |
//! | [`comm`] | `tally-comm` | Communicator trait, thread world, collectives |
//! | [`store`] | `tally-store` | Records, policies, registry, checkpoints |
//! | [`transfer`] | `tally-transfer` | Factory table and transfer drivers |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Keys, modes, type descriptors, errors and the slot codec
/// (`tally-core`).
pub use tally_core as types;

/// Communicators and rank-0 collectives (`tally-comm`).
///
/// [`comm::SerialComm`] for one process, [`comm::ThreadComm`] and
/// [`comm::run_spmd`] for an in-process world of ranks.
pub use tally_comm as comm;

/// Value records, communication policies and the registry
/// (`tally-store`).
pub use tally_store as store;

/// Type-erased transfers between registries (`tally-transfer`).
pub use tally_transfer as transfer;

/// Common imports for typical Tally usage.
///
/// ```rust
/// use tally::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use tally_core::{
        ConsumerMode, Persist, ProducerMode, RealValues, ReportValue, TypeDescriptor, ValueKey,
    };

    // Errors
    pub use tally_core::{CodecError, CommError, ErrorKind, RegistryError};

    // Communication
    pub use tally_comm::{run_spmd, Communicator, SerialComm, ThreadComm};

    // Registry
    pub use tally_store::{
        CommPolicy, LocalBuffer, RegistryConfig, ValueHandle, ValueRef, ValueRegistry,
    };

    // Transfers
    pub use tally_transfer::{FanInTransfer, ValueFactories, ValueTransfer};
}
