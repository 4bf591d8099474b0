//! Registry configuration, validation, and error types.
//!
//! [`RegistryConfig`] is the input for constructing a
//! [`ValueRegistry`](crate::ValueRegistry).
//! [`validate()`](RegistryConfig::validate) checks its invariants once at
//! construction so that every later depth check can trust the bound.

use std::error::Error;
use std::fmt;

use tally_core::ProducerMode;

/// Largest history depth a registry may be configured with.
pub const HISTORY_DEPTH_LIMIT: usize = 1024;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating a [`RegistryConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The default producer mode must be a real mode.
    UnsetDefaultMode,
    /// `max_history_depth` exceeds [`HISTORY_DEPTH_LIMIT`].
    HistoryDepthTooLarge {
        /// The configured depth.
        configured: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsetDefaultMode => {
                write!(f, "default_producer_mode must be Root, Replicated or Distributed")
            }
            Self::HistoryDepthTooLarge { configured } => write!(
                f,
                "max_history_depth {configured} exceeds the limit of {HISTORY_DEPTH_LIMIT}"
            ),
        }
    }
}

impl Error for ConfigError {}

// ── RegistryConfig ─────────────────────────────────────────────────

/// Configuration for a [`ValueRegistry`](crate::ValueRegistry).
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Deepest time index any get or declare may touch. `0` keeps only
    /// the current value. Default: 8.
    pub max_history_depth: usize,
    /// Mode given to values declared with [`ProducerMode::Unset`] under
    /// the general policy. Default: `Replicated`.
    pub default_producer_mode: ProducerMode,
    /// Fail `init()` when a requested value has no producer. Default: false.
    pub require_producers: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_history_depth: 8,
            default_producer_mode: ProducerMode::Replicated,
            require_producers: false,
        }
    }
}

impl RegistryConfig {
    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.default_producer_mode.is_set() {
            return Err(ConfigError::UnsetDefaultMode);
        }
        if self.max_history_depth > HISTORY_DEPTH_LIMIT {
            return Err(ConfigError::HistoryDepthTooLarge {
                configured: self.max_history_depth,
            });
        }
        Ok(())
    }
}
