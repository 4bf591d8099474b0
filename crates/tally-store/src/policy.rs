//! Communication policies: how a value is reconciled across ranks at the
//! end of a step.
//!
//! A policy is handed to the registry together with the value's type at
//! declaration and owned by the registry from then on. Policies carry
//! only their parameters; the value itself lives in the record passed to
//! [`CommPolicy::finalize`].
//!
//! # Shared buffers
//!
//! Scatter and gather read a producer-side input that is not the record
//! itself (the scatter source vector, the gather local scalar). The
//! producer and the policy share it through a [`LocalBuffer`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tally_comm::{broadcast, gather, scatter, Communicator};
use tally_core::{ProducerMode, RegistryError, ReportValue, ROOT_RANK};

use crate::record::ValueRecord;

/// End-of-step reconciliation for values of type `T`.
pub trait CommPolicy<T: ReportValue>: Send + 'static {
    /// Short name for diagnostics (`"general"`, `"broadcast"`, ...).
    fn name(&self) -> &'static str;

    /// The mode this policy imposes, or `None` to use the declared mode.
    fn producer_mode(&self) -> Option<ProducerMode> {
        None
    }

    /// Whether the value may be cloned into another registry.
    fn supports_clone(&self) -> bool {
        true
    }

    /// Run the policy's collective. Called once per step on every rank.
    fn finalize(
        &mut self,
        _record: &mut ValueRecord<T>,
        _comm: &dyn Communicator,
    ) -> Result<(), RegistryError> {
        Ok(())
    }
}

// ── LocalBuffer ────────────────────────────────────────────────────

/// A producer-side input shared between a producer and its policy.
///
/// Cloning yields another handle to the same buffer. A poisoned lock is
/// recovered: the buffer holds plain data with no invariant a panicking
/// writer could break.
pub struct LocalBuffer<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for LocalBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for LocalBuffer<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for LocalBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LocalBuffer").field(&*self.lock()).finish()
    }
}

impl<T> LocalBuffer<T> {
    /// Wrap `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Replace the contents.
    pub fn set(&self, value: T) {
        *self.lock() = value;
    }

    /// Run `f` with mutable access to the contents.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    /// A copy of the contents.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── GeneralPolicy ──────────────────────────────────────────────────

/// Mode as declared; no collective of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeneralPolicy;

impl<T: ReportValue> CommPolicy<T> for GeneralPolicy {
    fn name(&self) -> &'static str {
        "general"
    }
}

// ── BroadcastPolicy ────────────────────────────────────────────────

/// Replicated; every finalize broadcasts rank 0's current value.
#[derive(Clone, Copy, Debug, Default)]
pub struct BroadcastPolicy;

impl<T: ReportValue> CommPolicy<T> for BroadcastPolicy {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn producer_mode(&self) -> Option<ProducerMode> {
        Some(ProducerMode::Replicated)
    }

    fn finalize(
        &mut self,
        record: &mut ValueRecord<T>,
        comm: &dyn Communicator,
    ) -> Result<(), RegistryError> {
        broadcast(comm, record.value_mut(0)?)?;
        Ok(())
    }
}

// ── ScatterPolicy ──────────────────────────────────────────────────

/// Distributed; rank 0 supplies one entry per rank, each rank's current
/// value becomes its entry.
///
/// The source buffer is left as the producer filled it.
pub struct ScatterPolicy<T> {
    source: LocalBuffer<Vec<T>>,
}

impl<T> ScatterPolicy<T> {
    /// A policy reading from `source`.
    pub fn new(source: LocalBuffer<Vec<T>>) -> Self {
        Self { source }
    }
}

impl<T: ReportValue> CommPolicy<T> for ScatterPolicy<T> {
    fn name(&self) -> &'static str {
        "scatter"
    }

    fn producer_mode(&self) -> Option<ProducerMode> {
        Some(ProducerMode::Distributed)
    }

    fn finalize(
        &mut self,
        record: &mut ValueRecord<T>,
        comm: &dyn Communicator,
    ) -> Result<(), RegistryError> {
        let input = self.source.get();
        let rank = comm.rank();
        let expected = if rank == ROOT_RANK { comm.size() } else { 0 };
        if input.len() != expected {
            return Err(RegistryError::ScatterLengthMismatch {
                key: record.key().clone(),
                rank,
                expected,
                actual: input.len(),
            });
        }
        scatter(comm, input, record.value_mut(0)?)?;
        Ok(())
    }
}

// ── GatherPolicy ───────────────────────────────────────────────────

/// Root; the record holds `Vec<T>`. Every finalize stores `[local]` into
/// the record, then rank 0's record receives every rank's local value in
/// rank order.
///
/// Non-root ranks keep `[local]`.
pub struct GatherPolicy<T> {
    local: LocalBuffer<T>,
}

impl<T> GatherPolicy<T> {
    /// A policy gathering `local`.
    pub fn new(local: LocalBuffer<T>) -> Self {
        Self { local }
    }
}

impl<T: ReportValue> CommPolicy<Vec<T>> for GatherPolicy<T> {
    fn name(&self) -> &'static str {
        "gather"
    }

    fn producer_mode(&self) -> Option<ProducerMode> {
        Some(ProducerMode::Root)
    }

    fn finalize(
        &mut self,
        record: &mut ValueRecord<Vec<T>>,
        comm: &dyn Communicator,
    ) -> Result<(), RegistryError> {
        let local = self.local.get();
        let current = record.value_mut(0)?;
        *current = vec![local.clone()];
        gather(comm, local, current)?;
        Ok(())
    }
}

// ── VectorPolicy ───────────────────────────────────────────────────

/// General behaviour for vector values assembled element by element from
/// several sources. Such values cannot themselves be cloned.
#[derive(Clone, Copy, Debug, Default)]
pub struct VectorPolicy;

impl<T: ReportValue> CommPolicy<Vec<T>> for VectorPolicy {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn supports_clone(&self) -> bool {
        false
    }
}
