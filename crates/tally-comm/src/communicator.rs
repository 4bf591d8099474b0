//! The point-to-point communicator trait.

use std::any::Any;
use std::fmt;

use tally_core::CommError;

/// The collective a message belongs to.
///
/// Every message is tagged so a rank that receives a message from a peer
/// executing a different collective reports [`CommError::OpMismatch`]
/// instead of misinterpreting the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectiveOp {
    /// Root sends one value to every other rank.
    Broadcast,
    /// Root sends a distinct value to every other rank.
    Scatter,
    /// Every non-root rank sends one value to root.
    Gather,
}

impl CollectiveOp {
    /// Lower-case name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Scatter => "scatter",
            Self::Gather => "gather",
        }
    }
}

impl fmt::Display for CollectiveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One message between two ranks.
pub struct Message {
    /// Collective the message belongs to.
    pub op: CollectiveOp,
    /// Type-erased value.
    pub payload: Box<dyn Any + Send>,
}

impl Message {
    /// Wrap `value` for collective `op`.
    pub fn new<T: Send + 'static>(op: CollectiveOp, value: T) -> Self {
        Self {
            op,
            payload: Box::new(value),
        }
    }

    /// Unwrap the payload as `T`, checking the collective tag first.
    pub fn open<T: 'static>(self, expected: CollectiveOp, peer: usize) -> Result<T, CommError> {
        if self.op != expected {
            return Err(CommError::OpMismatch {
                expected: expected.name(),
                found: self.op.name(),
                peer,
            });
        }
        self.payload
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| CommError::PayloadType {
                expected: std::any::type_name::<T>(),
                peer,
            })
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message").field("op", &self.op).finish()
    }
}

/// Point-to-point messaging between the ranks of one SPMD world.
///
/// Implementations must deliver messages between any ordered pair of
/// ranks in FIFO order; the collectives rely on that plus the fact that
/// every rank issues collectives in the same order. `send` may buffer;
/// `recv` blocks until a message from `source` arrives or `source` hangs
/// up. There is no timeout.
pub trait Communicator: Send + Sync {
    /// This rank, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks in the world.
    fn size(&self) -> usize;

    /// Send `message` to rank `dest`.
    fn send(&self, dest: usize, message: Message) -> Result<(), CommError>;

    /// Receive the next message sent by rank `source`.
    fn recv(&self, source: usize) -> Result<Message, CommError>;
}
