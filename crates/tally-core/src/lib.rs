//! Core types for the Tally reporter value store.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other Tally crate: value keys,
//! producer/consumer modes, type descriptors, the slot codec used for
//! checkpointing, and the error types of every subsystem.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod key;
pub mod mode;
pub mod type_desc;
pub mod value;

pub use codec::Persist;
pub use error::{CodecError, CommError, ErrorKind, KeyParseError, RegistryError};
pub use key::ValueKey;
pub use mode::{ConsumerMode, ProducerMode};
pub use type_desc::TypeDescriptor;
pub use value::{RealValues, ReportValue};

/// Rank that roots every collective operation.
pub const ROOT_RANK: usize = 0;
