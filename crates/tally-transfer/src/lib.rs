//! Value transfers between Tally registries.
//!
//! A transfer knows only value keys, never the value types. The source
//! value's runtime [`TypeDescriptor`](tally_core::TypeDescriptor) selects
//! a [`ValueFactory`] from a [`ValueFactories`] table, and the factory
//! performs the typed registry calls.
//!
//! - [`transfer`]: one-shot key-level operations.
//! - [`multi`]: [`ValueTransfer`] and [`FanInTransfer`] drivers with a
//!   setup phase and a per-step execute phase.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod factory;
pub mod multi;
pub mod transfer;

pub use factory::{TypedFactory, ValueFactories, ValueFactory};
pub use multi::{FanInTransfer, ValueTransfer};
pub use transfer::{
    declare_clone, declare_vector_clone, register_consumer_mode, transfer_to_vector_element,
    transfer_value,
};
