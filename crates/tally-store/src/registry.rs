//! The value registry: typed get/declare, seal, finalize and rotation.
//!
//! # Lifecycle
//!
//! 1. Construction phase. Producers call the `declare_*` methods,
//!    consumers call [`get_value`](ValueRegistry::get_value) or
//!    [`request_value`](ValueRegistry::request_value), in any order.
//! 2. [`init`](ValueRegistry::init) seals the registry. History storage
//!    is sized to the deepest time index anyone asked for; new keys and
//!    new depths are refused from here on.
//! 3. Each step: producers write through
//!    [`value_mut`](ValueRegistry::value_mut),
//!    [`finalize_producer`](ValueRegistry::finalize_producer) reconciles
//!    their values across ranks, consumers read, and
//!    [`copy_values_back`](ValueRegistry::copy_values_back) rotates
//!    history.
//!
//! The ordering inside a step is the driver's contract; the registry
//! does not check it.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tally_comm::{Communicator, SerialComm};
use tally_core::{
    ConsumerMode, ProducerMode, RealValues, RegistryError, ReportValue, TypeDescriptor, ValueKey,
};
use tracing::debug;

use crate::config::{ConfigError, RegistryConfig};
use crate::info::ValueInfo;
use crate::policy::{
    BroadcastPolicy, CommPolicy, GatherPolicy, GeneralPolicy, LocalBuffer, ScatterPolicy,
};
use crate::record::{ConsumerEntry, ValueRecord};
use crate::slot::{DeclaredValue, Slot};

// ── Handles ────────────────────────────────────────────────────────

/// Typed write handle returned by a declaration.
///
/// A handle is only a key plus a type; it borrows nothing, so it can be
/// stored by the producer and used every step.
pub struct ValueHandle<T> {
    key: ValueKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ValueHandle<T> {
    pub(crate) fn new(key: ValueKey) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    /// The declared value's key.
    pub fn key(&self) -> &ValueKey {
        &self.key
    }
}

impl<T> Clone for ValueHandle<T> {
    fn clone(&self) -> Self {
        Self::new(self.key.clone())
    }
}

impl<T> fmt::Debug for ValueHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueHandle").field(&self.key).finish()
    }
}

/// Typed read handle returned by
/// [`request_value`](ValueRegistry::request_value): a key, a type and
/// the time index the consumer reads.
pub struct ValueRef<T> {
    key: ValueKey,
    time_index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ValueRef<T> {
    /// The requested value's key.
    pub fn key(&self) -> &ValueKey {
        &self.key
    }

    /// The time index read through this handle.
    pub fn time_index(&self) -> usize {
        self.time_index
    }
}

impl<T> Clone for ValueRef<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            time_index: self.time_index,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ValueRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueRef")
            .field("key", &self.key)
            .field("time_index", &self.time_index)
            .finish()
    }
}

// ── ValueRegistry ──────────────────────────────────────────────────

/// Owns every value record and policy of one rank.
///
/// All mutation goes through `&mut self`. Every rank of a run builds its
/// own registry with the same declarations and calls the collective
/// operations ([`finalize_producer`](Self::finalize_producer)) in the
/// same order.
pub struct ValueRegistry {
    values: BTreeMap<ValueKey, Slot>,
    /// Producer name → keys it declared, in declaration order.
    producers: IndexMap<String, IndexSet<ValueKey>>,
    sealed: bool,
    config: RegistryConfig,
    comm: Arc<dyn Communicator>,
}

// Compile-time assertion: a registry can be moved to a rank's thread.
const _: fn() = || {
    fn assert<T: Send>() {}
    assert::<ValueRegistry>();
};

impl ValueRegistry {
    /// A registry communicating over `comm`.
    pub fn new(comm: Arc<dyn Communicator>, config: RegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            values: BTreeMap::new(),
            producers: IndexMap::new(),
            sealed: false,
            config,
            comm,
        })
    }

    /// A single-rank registry with the default configuration.
    pub fn serial() -> Self {
        Self {
            values: BTreeMap::new(),
            producers: IndexMap::new(),
            sealed: false,
            config: RegistryConfig::default(),
            comm: Arc::new(SerialComm::new()),
        }
    }

    /// The registry's communicator.
    pub fn comm(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    /// The registry's configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Whether [`init`](Self::init) has run.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    // ── Consumers ──────────────────────────────────────────────────

    /// Read a value during construction, creating it if nobody has
    /// touched it yet.
    ///
    /// Records that `time_index` is needed, growing the history by
    /// repetition if it is deeper than anything stored. The first get or
    /// declare fixes the value's type.
    pub fn get_value<T: ReportValue>(
        &mut self,
        key: &ValueKey,
        time_index: usize,
    ) -> Result<&T, RegistryError> {
        self.check_open(key, "get")?;
        self.check_depth(key, time_index)?;
        let slot = self
            .values
            .entry(key.clone())
            .or_insert_with(|| Slot::Requested(Box::new(ValueRecord::<T>::new(key.clone()))));
        let value = slot.typed_mut::<T>()?.value_mut(time_index)?;
        Ok(&*value)
    }

    /// Register `consumer` as needing `key` in layout `mode` at
    /// `time_index`, and return a handle for reading it after seal.
    pub fn request_value<T: ReportValue>(
        &mut self,
        key: &ValueKey,
        consumer: &str,
        mode: ConsumerMode,
        time_index: usize,
    ) -> Result<ValueRef<T>, RegistryError> {
        self.get_value::<T>(key, time_index)?;
        self.add_consumer_mode(key, mode, consumer)?;
        Ok(ValueRef {
            key: key.clone(),
            time_index,
            _marker: PhantomData,
        })
    }

    /// Register a consumer without touching the value's type or history.
    ///
    /// Allowed after seal. The registration only takes effect for
    /// finalizes that run after it.
    pub fn add_consumer_mode(
        &mut self,
        key: &ValueKey,
        mode: ConsumerMode,
        consumer: &str,
    ) -> Result<(), RegistryError> {
        self.slot_mut(key)?.record_mut().add_consumer(mode, consumer);
        Ok(())
    }

    /// Read slot `time_index` of a value. Never grows.
    pub fn value<T: ReportValue>(
        &self,
        key: &ValueKey,
        time_index: usize,
    ) -> Result<&T, RegistryError> {
        self.slot(key)?.typed::<T>()?.value(time_index)
    }

    /// Read through a handle from [`request_value`](Self::request_value).
    pub fn read<T: ReportValue>(&self, value: &ValueRef<T>) -> Result<&T, RegistryError> {
        self.value(&value.key, value.time_index)
    }

    // ── Producers ──────────────────────────────────────────────────

    /// Declare a value under the general policy.
    ///
    /// `ProducerMode::Unset` takes the configured default mode.
    pub fn declare_value<T: ReportValue>(
        &mut self,
        key: &ValueKey,
        mode: ProducerMode,
    ) -> Result<ValueHandle<T>, RegistryError> {
        self.declare_with_policy::<T, _>(key, mode, GeneralPolicy, None)
    }

    /// Declare a value under the general policy with an initial value.
    pub fn declare_value_with<T: ReportValue>(
        &mut self,
        key: &ValueKey,
        mode: ProducerMode,
        default: T,
    ) -> Result<ValueHandle<T>, RegistryError> {
        self.declare_with_policy(key, mode, GeneralPolicy, Some(default))
    }

    /// Declare a value with an explicit policy.
    ///
    /// Record and policy are built together here. A policy that fixes its
    /// own mode rejects any other explicitly requested mode with
    /// [`RegistryError::ModeAlreadySet`]; pass `ProducerMode::Unset` to
    /// accept it. If `default` is given it becomes the current value.
    pub fn declare_with_policy<T, P>(
        &mut self,
        key: &ValueKey,
        mode: ProducerMode,
        policy: P,
        default: Option<T>,
    ) -> Result<ValueHandle<T>, RegistryError>
    where
        T: ReportValue,
        P: CommPolicy<T>,
    {
        self.check_open(key, "declare")?;
        match self.values.get(key) {
            Some(Slot::Declared(_)) => {
                return Err(RegistryError::DuplicateDeclaration { key: key.clone() })
            }
            Some(slot) => {
                slot.typed::<T>()?;
            }
            None => {}
        }
        let mode = self.resolve_mode(key, mode, policy.producer_mode())?;

        let mut record = match self.values.remove(key) {
            Some(Slot::Requested(erased)) => *erased
                .into_any()
                .downcast::<ValueRecord<T>>()
                .expect("record type checked"),
            _ => ValueRecord::new(key.clone()),
        };
        record.set_producer_mode(mode)?;
        match default {
            Some(value) => record.set_current(value),
            None => {
                record.value_mut(0)?;
            }
        }

        let policy_name = policy.name();
        self.values.insert(
            key.clone(),
            Slot::Declared(Box::new(DeclaredValue {
                record,
                policy: Box::new(policy),
            })),
        );
        self.producers
            .entry(key.producer_name().to_string())
            .or_default()
            .insert(key.clone());
        debug!(key = %key, mode = %mode, policy = policy_name, "declared value");
        Ok(ValueHandle::new(key.clone()))
    }

    /// Declare a replicated value that rank 0 broadcasts every finalize.
    pub fn declare_broadcast<T: ReportValue>(
        &mut self,
        key: &ValueKey,
    ) -> Result<ValueHandle<T>, RegistryError> {
        self.declare_with_policy(key, ProducerMode::Unset, BroadcastPolicy, None)
    }

    /// Declare a distributed value scattered from rank 0.
    ///
    /// Returns the write handle and the source buffer rank 0 fills with
    /// one entry per rank before each finalize (other ranks leave it
    /// empty).
    pub fn declare_scatter<T: ReportValue>(
        &mut self,
        key: &ValueKey,
    ) -> Result<(ValueHandle<T>, LocalBuffer<Vec<T>>), RegistryError> {
        let source = LocalBuffer::default();
        let handle = self.declare_with_policy(
            key,
            ProducerMode::Unset,
            ScatterPolicy::new(source.clone()),
            None,
        )?;
        Ok((handle, source))
    }

    /// Declare a root value gathering one local scalar from every rank.
    ///
    /// Returns the handle of the gathered vector and the local buffer each
    /// rank sets before finalize.
    pub fn declare_gather<T: ReportValue>(
        &mut self,
        key: &ValueKey,
    ) -> Result<(ValueHandle<Vec<T>>, LocalBuffer<T>), RegistryError> {
        let local = LocalBuffer::default();
        let handle = self.declare_with_policy(
            key,
            ProducerMode::Unset,
            GatherPolicy::new(local.clone()),
            None,
        )?;
        Ok((handle, local))
    }

    /// Mutable access to a declared value's current slot.
    pub fn value_mut<T: ReportValue>(
        &mut self,
        handle: &ValueHandle<T>,
    ) -> Result<&mut T, RegistryError> {
        self.slot_mut(&handle.key)?.typed_mut::<T>()?.value_mut(0)
    }

    /// Mutable access to slot `time_index` of any value by key.
    ///
    /// `time_index` is bounded by the configured history depth. Grows by
    /// repetition before seal; once sealed, `time_index` must be within
    /// the capacity.
    pub fn value_mut_at<T: ReportValue>(
        &mut self,
        key: &ValueKey,
        time_index: usize,
    ) -> Result<&mut T, RegistryError> {
        self.check_depth(key, time_index)?;
        self.slot_mut(key)?.typed_mut::<T>()?.value_mut(time_index)
    }

    /// Overwrite slot `time_index` of a value.
    pub fn set_value<T: ReportValue>(
        &mut self,
        key: &ValueKey,
        value: T,
        time_index: usize,
    ) -> Result<(), RegistryError> {
        *self.value_mut_at::<T>(key, time_index)? = value;
        Ok(())
    }

    /// Ask for history depth `time_index` on a declared value.
    pub fn need_time_index<T: ReportValue>(
        &mut self,
        key: &ValueKey,
        time_index: usize,
    ) -> Result<(), RegistryError> {
        self.check_open(key, "extend history of")?;
        self.check_depth(key, time_index)?;
        let slot = self.slot_mut(key)?;
        if !slot.is_declared() {
            return Err(RegistryError::NotDeclared { key: key.clone() });
        }
        slot.typed::<T>()?;
        slot.record_mut().need_time_index(time_index)
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Fail with every value that was requested but never declared.
    pub fn check(&self) -> Result<(), RegistryError> {
        let keys: Vec<ValueKey> = self
            .values
            .iter()
            .filter(|(_, slot)| !slot.is_declared())
            .map(|(key, _)| key.clone())
            .collect();
        if keys.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::MissingProducers { keys })
        }
    }

    /// Seal the registry and size every history.
    ///
    /// Runs [`check`](Self::check) first when the configuration requires
    /// producers.
    pub fn init(&mut self) -> Result<(), RegistryError> {
        if self.sealed {
            return Err(RegistryError::AlreadySealed);
        }
        if self.config.require_producers {
            self.check()?;
        }
        for slot in self.values.values_mut() {
            slot.record_mut().seal();
        }
        self.sealed = true;
        debug!(
            rank = self.comm.rank(),
            values = self.values.len(),
            "registry sealed"
        );
        Ok(())
    }

    /// Reconcile every value declared by `producer` across ranks.
    ///
    /// Collective: every rank must call this for the same producers in
    /// the same order. Mode checks run locally before any communication.
    /// An unknown producer owns nothing and succeeds.
    pub fn finalize_producer(&mut self, producer: &str) -> Result<(), RegistryError> {
        let Some(keys) = self.producers.get(producer) else {
            return Ok(());
        };
        for key in keys {
            if let Some(Slot::Declared(value)) = self.values.get_mut(key) {
                value.finalize(&*self.comm)?;
            }
        }
        debug!(producer, values = keys.len(), "finalized producer");
        Ok(())
    }

    /// Shift every value's history one step into the past.
    pub fn copy_values_back(&mut self) {
        for slot in self.values.values_mut() {
            slot.record_mut().copy_values_back();
        }
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Whether `key` is declared with type `T`.
    pub fn has_value<T: ReportValue>(&self, key: &ValueKey) -> bool {
        self.values
            .get(key)
            .is_some_and(|s| s.is_declared() && s.record().type_desc().is::<T>())
    }

    /// Whether `key` is declared with any type.
    pub fn has_any_value(&self, key: &ValueKey) -> bool {
        self.values.get(key).is_some_and(Slot::is_declared)
    }

    /// Whether `key` exists (requested or declared) with type `T`.
    pub fn has_state<T: ReportValue>(&self, key: &ValueKey) -> bool {
        self.values
            .get(key)
            .is_some_and(|s| s.record().type_desc().is::<T>())
    }

    /// Whether `key` exists with any type.
    pub fn has_any_state(&self, key: &ValueKey) -> bool {
        self.values.contains_key(key)
    }

    /// Every known key, in key order.
    pub fn value_keys(&self) -> impl Iterator<Item = &ValueKey> {
        self.values.keys()
    }

    /// Keys declared by `producer`, in declaration order.
    pub fn producer_keys(&self, producer: &str) -> impl Iterator<Item = &ValueKey> {
        self.producers.get(producer).into_iter().flatten()
    }

    /// Producer mode of `key`, `None` if unknown.
    pub fn producer_mode(&self, key: &ValueKey) -> Option<ProducerMode> {
        self.values.get(key).map(|s| s.record().producer_mode())
    }

    /// Runtime type of `key`, `None` if unknown.
    pub fn declared_type(&self, key: &ValueKey) -> Option<TypeDescriptor> {
        self.values.get(key).map(|s| s.record().type_desc())
    }

    /// Policy name of `key`, `None` unless declared.
    pub fn policy_name(&self, key: &ValueKey) -> Option<&'static str> {
        self.values.get(key).and_then(Slot::policy_name)
    }

    /// Whether `key` is declared under a policy that allows cloning.
    pub fn supports_clone(&self, key: &ValueKey) -> bool {
        self.values.get(key).is_some_and(Slot::supports_clone)
    }

    /// Registered consumers of `key`, `None` if unknown.
    pub fn consumers(&self, key: &ValueKey) -> Option<&[ConsumerEntry]> {
        self.values.get(key).map(|s| s.record().consumers())
    }

    /// Whether `producer` declared any value in `mode`.
    pub fn has_value_with_mode(&self, producer: &str, mode: ProducerMode) -> bool {
        self.producer_keys(producer)
            .any(|key| self.producer_mode(key) == Some(mode))
    }

    // ── Reporting ──────────────────────────────────────────────────

    /// Current value of every declared numeric value, flattened in key
    /// order. Aligned with [`all_real_full_names`](Self::all_real_full_names).
    pub fn all_real_values(&self) -> Vec<f64> {
        self.declared_reals()
            .flat_map(|(_, reals)| reals.into_vec())
            .collect()
    }

    /// Names for [`all_real_values`](Self::all_real_values): `prod/value`
    /// for scalars, `prod/value/i` for each vector element.
    pub fn all_real_full_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (key, reals) in self.declared_reals() {
            match reals {
                RealValues::Scalar(_) => names.push(key.to_string()),
                RealValues::Vector(v) => {
                    names.extend((0..v.len()).map(|i| format!("{key}/{i}")));
                }
            }
        }
        names
    }

    /// Metadata of one value.
    pub fn describe(&self, key: &ValueKey) -> Result<ValueInfo, RegistryError> {
        let slot = self.slot(key)?;
        let record = slot.record();
        Ok(ValueInfo {
            key: key.clone(),
            type_name: record.type_desc().name(),
            producer_mode: record.producer_mode(),
            policy: slot.policy_name(),
            consumers: record.consumers().to_vec(),
            history_len: record.len(),
            capacity: record.capacity(),
        })
    }

    /// [`describe`](Self::describe) of every value, concatenated.
    pub fn describe_all(&self) -> String {
        self.values
            .keys()
            .filter_map(|key| self.describe(key).ok())
            .map(|info| info.to_string())
            .collect()
    }

    // ── Internals ──────────────────────────────────────────────────

    pub(crate) fn slots(&self) -> &BTreeMap<ValueKey, Slot> {
        &self.values
    }

    pub(crate) fn slots_mut(&mut self) -> &mut BTreeMap<ValueKey, Slot> {
        &mut self.values
    }

    fn slot(&self, key: &ValueKey) -> Result<&Slot, RegistryError> {
        self.values
            .get(key)
            .ok_or_else(|| RegistryError::UnknownValue { key: key.clone() })
    }

    fn slot_mut(&mut self, key: &ValueKey) -> Result<&mut Slot, RegistryError> {
        self.values
            .get_mut(key)
            .ok_or_else(|| RegistryError::UnknownValue { key: key.clone() })
    }

    fn declared_reals(&self) -> impl Iterator<Item = (&ValueKey, RealValues)> {
        self.values
            .iter()
            .filter(|(_, slot)| slot.is_declared())
            .filter_map(|(key, slot)| slot.record().real_values().map(|r| (key, r)))
    }

    fn check_open(&self, key: &ValueKey, operation: &'static str) -> Result<(), RegistryError> {
        if self.sealed {
            return Err(RegistryError::Sealed {
                key: key.clone(),
                operation,
            });
        }
        Ok(())
    }

    fn check_depth(&self, key: &ValueKey, time_index: usize) -> Result<(), RegistryError> {
        if time_index > self.config.max_history_depth {
            return Err(RegistryError::HistoryDepthExceeded {
                key: key.clone(),
                requested: time_index,
                max: self.config.max_history_depth,
            });
        }
        Ok(())
    }

    fn resolve_mode(
        &self,
        key: &ValueKey,
        requested: ProducerMode,
        fixed: Option<ProducerMode>,
    ) -> Result<ProducerMode, RegistryError> {
        match fixed {
            Some(fixed) if requested.is_set() && requested != fixed => {
                Err(RegistryError::ModeAlreadySet {
                    key: key.clone(),
                    current: fixed,
                    requested,
                })
            }
            Some(fixed) => Ok(fixed),
            None if requested.is_set() => Ok(requested),
            None => Ok(self.config.default_producer_mode),
        }
    }
}

impl fmt::Debug for ValueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueRegistry")
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .field("values", &self.values.len())
            .field("sealed", &self.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::ErrorKind;

    fn key(v: &str) -> ValueKey {
        ValueKey::new("prod", v)
    }

    #[test]
    fn get_then_declare_keeps_record() {
        let mut reg = ValueRegistry::serial();
        assert_eq!(*reg.get_value::<f64>(&key("x"), 1).unwrap(), 0.0);
        let h = reg.declare_value::<f64>(&key("x"), ProducerMode::Root).unwrap();
        reg.init().unwrap();
        *reg.value_mut(&h).unwrap() = 2.5;
        assert_eq!(*reg.value::<f64>(&key("x"), 0).unwrap(), 2.5);
        assert!(reg.value::<f64>(&key("x"), 1).is_ok());
        assert_eq!(reg.producer_mode(&key("x")), Some(ProducerMode::Root));
    }

    #[test]
    fn unset_mode_takes_configured_default() {
        let mut reg = ValueRegistry::serial();
        reg.declare_value::<i32>(&key("x"), ProducerMode::Unset).unwrap();
        assert_eq!(reg.producer_mode(&key("x")), Some(ProducerMode::Replicated));
        assert_eq!(reg.policy_name(&key("x")), Some("general"));
    }

    #[test]
    fn duplicate_declaration_fails() {
        let mut reg = ValueRegistry::serial();
        reg.declare_value::<i32>(&key("x"), ProducerMode::Root).unwrap();
        match reg.declare_value::<i32>(&key("x"), ProducerMode::Root) {
            Err(RegistryError::DuplicateDeclaration { .. }) => {}
            other => panic!("expected DuplicateDeclaration, got {other:?}"),
        }
    }

    #[test]
    fn second_producer_is_a_duplicate_even_with_conflicting_mode() {
        let mut reg = ValueRegistry::serial();
        reg.declare_broadcast::<i32>(&key("x")).unwrap();
        match reg.declare_with_policy::<i32, _>(
            &key("x"),
            ProducerMode::Root,
            BroadcastPolicy,
            None,
        ) {
            Err(RegistryError::DuplicateDeclaration { .. }) => {}
            other => panic!("expected DuplicateDeclaration, got {other:?}"),
        }
    }

    #[test]
    fn type_mismatch_between_get_and_declare() {
        let mut reg = ValueRegistry::serial();
        reg.get_value::<i32>(&key("x"), 0).unwrap();
        let err = reg
            .declare_value::<f64>(&key("x"), ProducerMode::Root)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Programming);
        match err {
            RegistryError::TypeMismatch {
                requested, actual, ..
            } => {
                assert_eq!(requested, "f64");
                assert_eq!(actual, "i32");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
        // The requested record survives the failed declaration.
        assert!(reg.has_state::<i32>(&key("x")));
    }

    #[test]
    fn fixed_policy_mode_conflict() {
        let mut reg = ValueRegistry::serial();
        let err = reg
            .declare_with_policy::<i32, _>(
                &key("x"),
                ProducerMode::Root,
                BroadcastPolicy,
                None,
            )
            .unwrap_err();
        match err {
            RegistryError::ModeAlreadySet {
                current: ProducerMode::Replicated,
                requested: ProducerMode::Root,
                ..
            } => {}
            other => panic!("expected ModeAlreadySet, got {other:?}"),
        }
        assert!(!reg.has_any_state(&key("x")));

        reg.declare_with_policy::<i32, _>(
            &key("x"),
            ProducerMode::Replicated,
            BroadcastPolicy,
            None,
        )
        .unwrap();
    }

    #[test]
    fn access_after_seal_fails_for_known_and_unknown_keys() {
        let mut reg = ValueRegistry::serial();
        reg.declare_value::<i32>(&key("known"), ProducerMode::Root)
            .unwrap();
        reg.init().unwrap();
        for k in [key("known"), key("unknown")] {
            match reg.declare_value::<i32>(&k, ProducerMode::Root) {
                Err(RegistryError::Sealed {
                    operation: "declare",
                    ..
                }) => {}
                other => panic!("expected Sealed, got {other:?}"),
            }
            match reg.get_value::<i32>(&k, 0) {
                Err(RegistryError::Sealed {
                    operation: "get", ..
                }) => {}
                other => panic!("expected Sealed, got {other:?}"),
            }
        }
    }

    #[test]
    fn second_init_fails() {
        let mut reg = ValueRegistry::serial();
        reg.init().unwrap();
        assert!(matches!(reg.init(), Err(RegistryError::AlreadySealed)));
    }

    #[test]
    fn history_depth_is_bounded_by_config() {
        let mut reg = ValueRegistry::new(
            Arc::new(SerialComm::new()),
            RegistryConfig {
                max_history_depth: 2,
                ..RegistryConfig::default()
            },
        )
        .unwrap();
        assert!(reg.get_value::<i32>(&key("x"), 2).is_ok());
        match reg.get_value::<i32>(&key("x"), 3) {
            Err(RegistryError::HistoryDepthExceeded {
                requested: 3,
                max: 2,
                ..
            }) => {}
            other => panic!("expected HistoryDepthExceeded, got {other:?}"),
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = RegistryConfig {
            default_producer_mode: ProducerMode::Unset,
            ..RegistryConfig::default()
        };
        assert!(ValueRegistry::new(Arc::new(SerialComm::new()), cfg).is_err());
    }

    #[test]
    fn check_lists_values_without_producer() {
        let mut reg = ValueRegistry::serial();
        reg.get_value::<i32>(&ValueKey::new("b", "y"), 0).unwrap();
        reg.get_value::<i32>(&ValueKey::new("a", "x"), 0).unwrap();
        reg.declare_value::<i32>(&ValueKey::new("c", "z"), ProducerMode::Root)
            .unwrap();
        match reg.check() {
            Err(RegistryError::MissingProducers { keys }) => {
                assert_eq!(keys, vec![ValueKey::new("a", "x"), ValueKey::new("b", "y")]);
            }
            other => panic!("expected MissingProducers, got {other:?}"),
        }
    }

    #[test]
    fn init_enforces_producers_when_configured() {
        let mut reg = ValueRegistry::new(
            Arc::new(SerialComm::new()),
            RegistryConfig {
                require_producers: true,
                ..RegistryConfig::default()
            },
        )
        .unwrap();
        reg.get_value::<i32>(&key("orphan"), 0).unwrap();
        assert!(matches!(
            reg.init(),
            Err(RegistryError::MissingProducers { .. })
        ));
        assert!(!reg.is_sealed());
    }

    #[test]
    fn set_value_past_configured_depth_fails_before_seal() {
        let mut reg = ValueRegistry::new(
            Arc::new(SerialComm::new()),
            RegistryConfig {
                max_history_depth: 2,
                ..RegistryConfig::default()
            },
        )
        .unwrap();
        reg.declare_value::<i32>(&key("x"), ProducerMode::Root)
            .unwrap();
        reg.set_value(&key("x"), 5, 2).unwrap();
        for depth in [3, 50, usize::MAX] {
            match reg.set_value(&key("x"), 5, depth) {
                Err(RegistryError::HistoryDepthExceeded {
                    requested, max: 2, ..
                }) => assert_eq!(requested, depth),
                other => panic!("expected HistoryDepthExceeded, got {other:?}"),
            }
        }
        reg.init().unwrap();
        assert_eq!(reg.describe(&key("x")).unwrap().capacity, Some(3));
    }

    #[test]
    fn need_time_index_requires_declaration() {
        let mut reg = ValueRegistry::serial();
        reg.get_value::<i32>(&key("x"), 0).unwrap();
        assert!(matches!(
            reg.need_time_index::<i32>(&key("x"), 1),
            Err(RegistryError::NotDeclared { .. })
        ));
        reg.declare_value::<i32>(&key("x"), ProducerMode::Root)
            .unwrap();
        assert!(matches!(
            reg.need_time_index::<f64>(&key("x"), 2),
            Err(RegistryError::TypeMismatch { .. })
        ));
        reg.need_time_index::<i32>(&key("x"), 2).unwrap();
        reg.init().unwrap();
        assert_eq!(reg.describe(&key("x")).unwrap().capacity, Some(3));
    }

    #[test]
    fn illegal_pair_fails_before_communicating() {
        let mut reg = ValueRegistry::serial();
        let h = reg
            .declare_value::<f64>(&key("x"), ProducerMode::Distributed)
            .unwrap();
        reg.request_value::<f64>(&key("x"), "reader", ConsumerMode::Root, 0)
            .unwrap();
        reg.init().unwrap();
        *reg.value_mut(&h).unwrap() = 1.0;
        let msg = reg.finalize_producer("prod").unwrap_err().to_string();
        assert!(msg.contains("Distributed"));
        assert!(msg.contains("Root"));
        assert!(msg.contains("reader"));
    }

    #[test]
    fn finalize_of_unknown_producer_is_noop() {
        let mut reg = ValueRegistry::serial();
        reg.init().unwrap();
        reg.finalize_producer("nobody").unwrap();
    }

    #[test]
    fn has_value_with_mode_checks_producer_values() {
        let mut reg = ValueRegistry::serial();
        reg.declare_value::<i32>(&key("a"), ProducerMode::Root)
            .unwrap();
        reg.declare_value::<i32>(&key("b"), ProducerMode::Distributed)
            .unwrap();
        assert!(reg.has_value_with_mode("prod", ProducerMode::Distributed));
        assert!(!reg.has_value_with_mode("prod", ProducerMode::Replicated));
        assert!(!reg.has_value_with_mode("other", ProducerMode::Root));
        let keys: Vec<_> = reg.producer_keys("prod").cloned().collect();
        assert_eq!(keys, vec![key("a"), key("b")]);
    }

    #[test]
    fn real_values_are_flattened_with_names() {
        let mut reg = ValueRegistry::serial();
        reg.declare_value_with(&ValueKey::new("a", "s"), ProducerMode::Root, 1.5f64)
            .unwrap();
        reg.declare_value_with(
            &ValueKey::new("b", "v"),
            ProducerMode::Root,
            vec![2.0f64, 3.0],
        )
        .unwrap();
        reg.declare_value_with(&ValueKey::new("c", "t"), ProducerMode::Root, String::from("x"))
            .unwrap();
        reg.get_value::<f64>(&ValueKey::new("d", "req"), 0).unwrap();
        assert_eq!(reg.all_real_values(), vec![1.5, 2.0, 3.0]);
        assert_eq!(reg.all_real_full_names(), vec!["a/s", "b/v/0", "b/v/1"]);
    }

    #[test]
    fn queries_distinguish_state_and_value() {
        let mut reg = ValueRegistry::serial();
        reg.get_value::<i32>(&key("req"), 0).unwrap();
        reg.declare_value::<i32>(&key("dec"), ProducerMode::Root)
            .unwrap();
        assert!(reg.has_state::<i32>(&key("req")));
        assert!(!reg.has_any_value(&key("req")));
        assert!(reg.has_value::<i32>(&key("dec")));
        assert!(!reg.has_value::<f64>(&key("dec")));
        assert_eq!(
            reg.declared_type(&key("dec")),
            Some(TypeDescriptor::of::<i32>())
        );
        assert_eq!(reg.value_keys().count(), 2);
        assert!(reg.describe_all().contains("prod/req"));
        assert!(matches!(
            reg.describe(&key("missing")),
            Err(RegistryError::UnknownValue { .. })
        ));
    }
}
