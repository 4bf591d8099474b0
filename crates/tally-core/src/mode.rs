//! Producer and consumer distribution modes.
//!
//! A producer commits to how its value is laid out across ranks; a
//! consumer states the layout it needs when reading. The pairing rules
//! live in `tally-store` (`compat`), this module only names the modes.

use std::fmt;

/// How a producer distributes a value across ranks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProducerMode {
    /// Not yet declared by a producer.
    #[default]
    Unset,
    /// Meaningful on rank 0 only; other ranks hold an unspecified value.
    Root,
    /// Identical on every rank.
    Replicated,
    /// Rank-local partition with no implied relationship across ranks.
    Distributed,
}

impl ProducerMode {
    /// Whether a producer has committed to a mode.
    pub fn is_set(self) -> bool {
        self != Self::Unset
    }

    /// Stable one-byte tag used by the checkpoint container.
    pub fn tag(self) -> u8 {
        match self {
            Self::Unset => 0,
            Self::Root => 1,
            Self::Replicated => 2,
            Self::Distributed => 3,
        }
    }

    /// Inverse of [`tag`](Self::tag).
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Unset),
            1 => Some(Self::Root),
            2 => Some(Self::Replicated),
            3 => Some(Self::Distributed),
            _ => None,
        }
    }
}

impl fmt::Display for ProducerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unset => "Unset",
            Self::Root => "Root",
            Self::Replicated => "Replicated",
            Self::Distributed => "Distributed",
        })
    }
}

/// The layout a consumer requires when it reads a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConsumerMode {
    /// Reads only on rank 0.
    Root,
    /// Reads the same value on every rank.
    Replicated,
    /// Reads its own rank's partition.
    Distributed,
}

impl fmt::Display for ConsumerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Root => "Root",
            Self::Replicated => "Replicated",
            Self::Distributed => "Distributed",
        })
    }
}
