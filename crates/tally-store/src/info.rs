//! Human-readable description of a registered value.

use std::fmt;

use tally_core::{ProducerMode, ValueKey};

use crate::record::ConsumerEntry;

/// Snapshot of one value's metadata, as returned by
/// [`ValueRegistry::describe`](crate::ValueRegistry::describe).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueInfo {
    /// The value.
    pub key: ValueKey,
    /// Rust type name of the stored value.
    pub type_name: &'static str,
    /// Producer mode, `Unset` if nothing declared the value.
    pub producer_mode: ProducerMode,
    /// Policy name, `None` if nothing declared the value.
    pub policy: Option<&'static str>,
    /// Registered consumers, in registration order.
    pub consumers: Vec<ConsumerEntry>,
    /// Number of stored history entries.
    pub history_len: usize,
    /// History capacity, once sealed.
    pub capacity: Option<usize>,
}

impl fmt::Display for ValueInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.key)?;
        writeln!(f, "  type: {}", self.type_name)?;
        match self.policy {
            Some(policy) => writeln!(f, "  producer: {} ({policy})", self.producer_mode)?,
            None => writeln!(f, "  producer: none")?,
        }
        match self.capacity {
            Some(capacity) => writeln!(f, "  history: {} of {capacity}", self.history_len)?,
            None => writeln!(f, "  history: {} (unsealed)", self.history_len)?,
        }
        if self.consumers.is_empty() {
            writeln!(f, "  consumers: none")?;
        } else {
            writeln!(f, "  consumers:")?;
            for c in &self.consumers {
                writeln!(f, "    {} ({})", c.consumer, c.mode)?;
            }
        }
        Ok(())
    }
}
