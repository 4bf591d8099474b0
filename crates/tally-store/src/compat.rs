//! Producer/consumer mode compatibility.
//!
//! Every rank runs [`plan_finalize`] on identical inputs before entering
//! any collective, so an illegal pairing fails on all ranks alike and no
//! rank is left waiting in a collective its peers never join.

use tally_core::{ConsumerMode, ProducerMode, RegistryError, ValueKey};

use crate::record::ConsumerEntry;

/// What finalize must do for one (producer, consumer) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// The producer's layout already satisfies the consumer.
    Direct,
    /// Broadcast rank 0's current value to every rank.
    Broadcast,
}

/// The reconciliation a pair needs, or `None` if the pair is illegal.
///
/// | producer \ consumer | Root   | Replicated | Distributed |
/// |---------------------|--------|------------|-------------|
/// | Root                | direct | broadcast  | illegal     |
/// | Replicated          | direct | direct     | illegal     |
/// | Distributed         | illegal| illegal    | direct      |
///
/// `Unset` pairs with nothing.
pub fn reconciliation(producer: ProducerMode, consumer: ConsumerMode) -> Option<Reconciliation> {
    use ConsumerMode as C;
    use ProducerMode as P;
    match (producer, consumer) {
        (P::Root, C::Root)
        | (P::Replicated, C::Replicated)
        | (P::Distributed, C::Distributed)
        | (P::Replicated, C::Root) => Some(Reconciliation::Direct),
        (P::Root, C::Replicated) => Some(Reconciliation::Broadcast),
        _ => None,
    }
}

/// The transformations one finalize performs after the policy's own
/// collective.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FinalizePlan {
    /// Broadcast slot 0 from rank 0.
    pub broadcast_current: bool,
}

/// Build the plan for a value, checking consumers in registration order.
///
/// The first illegal pair fails with [`RegistryError::IllegalModePair`].
pub fn plan_finalize(
    key: &ValueKey,
    producer: ProducerMode,
    consumers: &[ConsumerEntry],
) -> Result<FinalizePlan, RegistryError> {
    let mut plan = FinalizePlan::default();
    for entry in consumers {
        match reconciliation(producer, entry.mode) {
            Some(Reconciliation::Direct) => {}
            Some(Reconciliation::Broadcast) => plan.broadcast_current = true,
            None => {
                return Err(RegistryError::IllegalModePair {
                    key: key.clone(),
                    producer,
                    consumer: entry.mode,
                    consumer_name: entry.consumer.clone(),
                })
            }
        }
    }
    Ok(plan)
}
