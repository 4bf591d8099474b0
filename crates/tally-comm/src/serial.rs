//! Single-rank communicator.

use tally_core::CommError;

use crate::communicator::{Communicator, Message};

/// A world of exactly one rank.
///
/// The collectives short-circuit on a one-rank world, so `send` and
/// `recv` are never reached through them; calling them directly is an
/// [`CommError::InvalidRank`] since there is no peer to address.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialComm;

impl SerialComm {
    /// Create the single-rank communicator.
    pub fn new() -> Self {
        Self
    }
}

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, dest: usize, _message: Message) -> Result<(), CommError> {
        Err(CommError::InvalidRank {
            rank: dest,
            size: 1,
        })
    }

    fn recv(&self, source: usize) -> Result<Message, CommError> {
        Err(CommError::InvalidRank {
            rank: source,
            size: 1,
        })
    }
}
