//! Error types for the Tally value store.
//!
//! Organized by subsystem: key parsing, communication (collectives),
//! slot codec (checkpointing), and the registry itself.

use std::error::Error;
use std::fmt;
use std::io;

use crate::key::ValueKey;
use crate::mode::{ConsumerMode, ProducerMode};

// ── KeyParseError ─────────────────────────────────────────────────

/// A string could not be split into a [`ValueKey`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyParseError {
    /// The offending input.
    pub input: String,
}

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid value key \"{}\": expected \"<producer>/<value>\"",
            self.input
        )
    }
}

impl Error for KeyParseError {}

// ── CommError ─────────────────────────────────────────────────────

/// Errors from point-to-point messaging and the collectives built on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommError {
    /// A rank outside `0..size` was addressed.
    InvalidRank {
        /// The rank that was addressed.
        rank: usize,
        /// Number of ranks in the communicator.
        size: usize,
    },
    /// The peer hung up (its communicator was dropped).
    Disconnected {
        /// Rank of the peer.
        peer: usize,
    },
    /// The peer is in a different collective than this rank.
    OpMismatch {
        /// Collective this rank is executing.
        expected: &'static str,
        /// Collective tag on the received message.
        found: &'static str,
        /// Rank the message came from.
        peer: usize,
    },
    /// The received payload is not of the expected type.
    PayloadType {
        /// Type this rank expected.
        expected: &'static str,
        /// Rank the message came from.
        peer: usize,
    },
    /// A collective received the wrong number of input entries.
    CountMismatch {
        /// Collective being executed.
        op: &'static str,
        /// Entries required.
        expected: usize,
        /// Entries supplied.
        actual: usize,
    },
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRank { rank, size } => {
                write!(f, "rank {rank} out of range for communicator of size {size}")
            }
            Self::Disconnected { peer } => write!(f, "rank {peer} disconnected"),
            Self::OpMismatch {
                expected,
                found,
                peer,
            } => write!(
                f,
                "collective mismatch: expected {expected} but rank {peer} sent {found}"
            ),
            Self::PayloadType { expected, peer } => {
                write!(f, "payload from rank {peer} is not of type {expected}")
            }
            Self::CountMismatch {
                op,
                expected,
                actual,
            } => write!(f, "{op} expected {expected} entries, got {actual}"),
        }
    }
}

impl Error for CommError {}

// ── CodecError ────────────────────────────────────────────────────

/// Errors from encoding or decoding checkpoint data.
#[derive(Debug)]
pub enum CodecError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The container does not start with the expected magic bytes.
    InvalidMagic,
    /// The container format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the data.
        found: u8,
    },
    /// The data could not be decoded (truncated, corrupt, or not matching
    /// the registry it is loaded into).
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported format version {found}")
            }
            Self::Malformed { detail } => write!(f, "malformed data: {detail}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ── RegistryError ─────────────────────────────────────────────────

/// Broad class of a [`RegistryError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input describes an impossible setup; fix the configuration.
    Configuration,
    /// The calling code is wrong (type confusion, missing declaration).
    Programming,
    /// Communication or checkpoint I/O failed.
    Runtime,
}

/// Errors from the value registry and its policies.
///
/// Every variant names the value key involved so that a failing run can
/// be traced back to one declaration. Configuration errors are raised
/// identically on every rank because all checks are local and happen
/// before any collective.
#[derive(Debug)]
pub enum RegistryError {
    /// A second producer declared the same value.
    DuplicateDeclaration {
        /// The value.
        key: ValueKey,
    },
    /// A get or declare arrived after the registry was sealed.
    Sealed {
        /// The value.
        key: ValueKey,
        /// What was attempted (`"declare"`, `"get"`, ...).
        operation: &'static str,
    },
    /// The registry was sealed a second time.
    AlreadySealed,
    /// The producer mode was already committed.
    ModeAlreadySet {
        /// The value.
        key: ValueKey,
        /// The mode already in effect.
        current: ProducerMode,
        /// The mode that was requested.
        requested: ProducerMode,
    },
    /// A consumer requires a layout the producer cannot provide.
    IllegalModePair {
        /// The value.
        key: ValueKey,
        /// The producer's mode.
        producer: ProducerMode,
        /// The consumer's required mode.
        consumer: ConsumerMode,
        /// Identity of the consumer.
        consumer_name: String,
    },
    /// A read asked for history that is not stored.
    TimeIndexUnavailable {
        /// The value.
        key: ValueKey,
        /// The time index requested.
        requested: usize,
        /// Number of stored entries.
        available: usize,
    },
    /// A time index beyond the configured maximum history depth.
    HistoryDepthExceeded {
        /// The value.
        key: ValueKey,
        /// The time index requested.
        requested: usize,
        /// The configured maximum.
        max: usize,
    },
    /// A scatter input has the wrong length on this rank.
    ScatterLengthMismatch {
        /// The value.
        key: ValueKey,
        /// This rank.
        rank: usize,
        /// Required length (world size on rank 0, zero elsewhere).
        expected: usize,
        /// Supplied length.
        actual: usize,
    },
    /// Values were requested but never declared by any producer.
    MissingProducers {
        /// The undeclared values.
        keys: Vec<ValueKey>,
    },
    /// A vector element outside the destination's bounds.
    ElementOutOfRange {
        /// The destination value.
        key: ValueKey,
        /// Requested element.
        index: usize,
        /// Vector length.
        len: usize,
    },
    /// The source value's policy cannot be cloned into another registry.
    CloneUnsupported {
        /// The source value.
        key: ValueKey,
        /// Name of the source value's policy.
        policy: &'static str,
    },
    /// No factory is registered for the value's type.
    UnknownType {
        /// The value.
        key: ValueKey,
        /// Name of the unregistered type.
        type_name: &'static str,
    },
    /// A typed access used a different type than the value was created with.
    TypeMismatch {
        /// The value.
        key: ValueKey,
        /// Type used by the caller.
        requested: &'static str,
        /// Type the value was created with.
        actual: &'static str,
    },
    /// The value exists but has no producer (and hence no policy).
    NotDeclared {
        /// The value.
        key: ValueKey,
    },
    /// The value does not exist in the registry.
    UnknownValue {
        /// The value.
        key: ValueKey,
    },
    /// A collective failed.
    Comm(CommError),
    /// Checkpoint encoding or decoding failed.
    Codec(CodecError),
}

impl RegistryError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeMismatch { .. } | Self::NotDeclared { .. } | Self::UnknownValue { .. } => {
                ErrorKind::Programming
            }
            Self::Comm(_) | Self::Codec(_) => ErrorKind::Runtime,
            _ => ErrorKind::Configuration,
        }
    }

    /// The value key the error is about, if it names exactly one.
    pub fn key(&self) -> Option<&ValueKey> {
        match self {
            Self::DuplicateDeclaration { key }
            | Self::Sealed { key, .. }
            | Self::ModeAlreadySet { key, .. }
            | Self::IllegalModePair { key, .. }
            | Self::TimeIndexUnavailable { key, .. }
            | Self::HistoryDepthExceeded { key, .. }
            | Self::ScatterLengthMismatch { key, .. }
            | Self::ElementOutOfRange { key, .. }
            | Self::CloneUnsupported { key, .. }
            | Self::UnknownType { key, .. }
            | Self::TypeMismatch { key, .. }
            | Self::NotDeclared { key }
            | Self::UnknownValue { key } => Some(key),
            Self::AlreadySealed | Self::MissingProducers { .. } | Self::Comm(_) | Self::Codec(_) => {
                None
            }
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateDeclaration { key } => {
                write!(f, "value '{key}' has already been declared")
            }
            Self::Sealed { key, operation } => write!(
                f,
                "cannot {operation} value '{key}': the registry is sealed"
            ),
            Self::AlreadySealed => write!(f, "the registry is already sealed"),
            Self::ModeAlreadySet {
                key,
                current,
                requested,
            } => write!(
                f,
                "producer mode of '{key}' is already {current}, cannot set {requested}"
            ),
            Self::IllegalModePair {
                key,
                producer,
                consumer,
                consumer_name,
            } => write!(
                f,
                "value '{key}' is produced in {producer} mode but consumer \
                 '{consumer_name}' requires {consumer} mode"
            ),
            Self::TimeIndexUnavailable {
                key,
                requested,
                available,
            } => write!(
                f,
                "time index {requested} not available for '{key}' \
                 ({available} entries stored)"
            ),
            Self::HistoryDepthExceeded {
                key,
                requested,
                max,
            } => write!(
                f,
                "time index {requested} for '{key}' exceeds the maximum history depth {max}"
            ),
            Self::ScatterLengthMismatch {
                key,
                rank,
                expected,
                actual,
            } => write!(
                f,
                "scatter of '{key}' on rank {rank} needs {expected} entries, got {actual}"
            ),
            Self::MissingProducers { keys } => {
                write!(f, "values requested but never declared: ")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{key}'")?;
                }
                Ok(())
            }
            Self::ElementOutOfRange { key, index, len } => write!(
                f,
                "index {index} is outside the bounds of vector value '{key}' (len {len})"
            ),
            Self::CloneUnsupported { key, policy } => {
                write!(f, "cannot clone '{key}': {policy} values do not support cloning")
            }
            Self::UnknownType { key, type_name } => write!(
                f,
                "no factory registered for type {type_name} of value '{key}'"
            ),
            Self::TypeMismatch {
                key,
                requested,
                actual,
            } => write!(
                f,
                "value '{key}' has type {actual}, requested as {requested}"
            ),
            Self::NotDeclared { key } => write!(f, "value '{key}' has no producer"),
            Self::UnknownValue { key } => write!(f, "value '{key}' does not exist"),
            Self::Comm(e) => write!(f, "communication: {e}"),
            Self::Codec(e) => write!(f, "codec: {e}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Comm(e) => Some(e),
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CommError> for RegistryError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}

impl From<CodecError> for RegistryError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_pair_message_names_everything() {
        let err = RegistryError::IllegalModePair {
            key: ValueKey::new("prod", "flux"),
            producer: ProducerMode::Distributed,
            consumer: ConsumerMode::Root,
            consumer_name: "postproc".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("prod/flux"));
        assert!(msg.contains("Distributed"));
        assert!(msg.contains("Root"));
        assert!(msg.contains("postproc"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn time_index_message_names_counts() {
        let err = RegistryError::TimeIndexUnavailable {
            key: ValueKey::new("a", "b"),
            requested: 3,
            available: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("a/b"));
        assert!(msg.contains('3'));
        assert!(msg.contains('1'));
    }

    #[test]
    fn type_mismatch_is_programming_error() {
        let err = RegistryError::TypeMismatch {
            key: ValueKey::new("a", "b"),
            requested: "f64",
            actual: "i32",
        };
        assert_eq!(err.kind(), ErrorKind::Programming);
        assert_eq!(err.key(), Some(&ValueKey::new("a", "b")));
    }

    #[test]
    fn comm_error_wraps_with_source() {
        let err: RegistryError = CommError::Disconnected { peer: 1 }.into();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert!(err.source().is_some());
        assert!(err.key().is_none());
    }

    #[test]
    fn missing_producers_lists_keys() {
        let err = RegistryError::MissingProducers {
            keys: vec![ValueKey::new("a", "x"), ValueKey::new("b", "y")],
        };
        assert_eq!(
            err.to_string(),
            "values requested but never declared: 'a/x', 'b/y'"
        );
    }
}
