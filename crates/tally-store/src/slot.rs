//! Type-erased registry slots.
//!
//! A slot is either a bare record created by a consumer's get (no
//! producer yet) or a declared value: record and policy built together
//! by the producer's declare. Declaring moves an existing record out of
//! its `Requested` slot into a new [`DeclaredValue`], so a declared value
//! always has a policy and a policy never outlives its record.

use std::any::Any;
use std::io::{Read, Write};

use tally_comm::{broadcast, Communicator};
use tally_core::{
    CodecError, ConsumerMode, ProducerMode, RealValues, RegistryError, ReportValue, TypeDescriptor,
    ValueKey,
};

use crate::compat::plan_finalize;
use crate::policy::CommPolicy;
use crate::record::{ConsumerEntry, ValueRecord};

/// Operations on a [`ValueRecord`] that do not need its type.
pub(crate) trait ErasedRecord: Send {
    fn key(&self) -> &ValueKey;
    fn type_desc(&self) -> TypeDescriptor;
    fn producer_mode(&self) -> ProducerMode;
    fn consumers(&self) -> &[ConsumerEntry];
    fn add_consumer(&mut self, mode: ConsumerMode, consumer: &str);
    fn len(&self) -> usize;
    fn capacity(&self) -> Option<usize>;
    fn need_time_index(&mut self, time_index: usize) -> Result<(), RegistryError>;
    fn copy_values_back(&mut self);
    fn seal(&mut self);
    fn store(&self, w: &mut dyn Write) -> Result<(), CodecError>;
    fn load(&mut self, r: &mut dyn Read) -> Result<(), CodecError>;
    fn real_values(&self) -> Option<RealValues>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: ReportValue> ErasedRecord for ValueRecord<T> {
    fn key(&self) -> &ValueKey {
        ValueRecord::key(self)
    }

    fn type_desc(&self) -> TypeDescriptor {
        TypeDescriptor::of::<T>()
    }

    fn producer_mode(&self) -> ProducerMode {
        ValueRecord::producer_mode(self)
    }

    fn consumers(&self) -> &[ConsumerEntry] {
        ValueRecord::consumers(self)
    }

    fn add_consumer(&mut self, mode: ConsumerMode, consumer: &str) {
        ValueRecord::add_consumer(self, mode, consumer);
    }

    fn len(&self) -> usize {
        ValueRecord::len(self)
    }

    fn capacity(&self) -> Option<usize> {
        ValueRecord::capacity(self)
    }

    fn need_time_index(&mut self, time_index: usize) -> Result<(), RegistryError> {
        self.value_mut(time_index).map(|_| ())
    }

    fn copy_values_back(&mut self) {
        ValueRecord::copy_values_back(self);
    }

    fn seal(&mut self) {
        ValueRecord::seal(self);
    }

    fn store(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        ValueRecord::store(self, w)
    }

    fn load(&mut self, r: &mut dyn Read) -> Result<(), CodecError> {
        ValueRecord::load(self, r)
    }

    fn real_values(&self) -> Option<RealValues> {
        self.value(0).ok().and_then(ReportValue::real_values)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A record together with the policy its producer declared it with.
pub(crate) struct DeclaredValue<T: ReportValue> {
    pub(crate) record: ValueRecord<T>,
    pub(crate) policy: Box<dyn CommPolicy<T>>,
}

/// Operations on a [`DeclaredValue`] that do not need its type.
pub(crate) trait ErasedValue: Send {
    fn record(&self) -> &dyn ErasedRecord;
    fn record_mut(&mut self) -> &mut dyn ErasedRecord;
    fn policy_name(&self) -> &'static str;
    fn supports_clone(&self) -> bool;
    fn finalize(&mut self, comm: &dyn Communicator) -> Result<(), RegistryError>;
}

impl<T: ReportValue> ErasedValue for DeclaredValue<T> {
    fn record(&self) -> &dyn ErasedRecord {
        &self.record
    }

    fn record_mut(&mut self) -> &mut dyn ErasedRecord {
        &mut self.record
    }

    fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    fn supports_clone(&self) -> bool {
        self.policy.supports_clone()
    }

    fn finalize(&mut self, comm: &dyn Communicator) -> Result<(), RegistryError> {
        let plan = plan_finalize(
            self.record.key(),
            self.record.producer_mode(),
            self.record.consumers(),
        )?;
        self.policy.finalize(&mut self.record, comm)?;
        if plan.broadcast_current {
            broadcast(comm, self.record.value_mut(0)?)?;
        }
        Ok(())
    }
}

/// One entry of the registry map.
pub(crate) enum Slot {
    /// Requested by a consumer, no producer yet.
    Requested(Box<dyn ErasedRecord>),
    /// Declared by a producer.
    Declared(Box<dyn ErasedValue>),
}

impl Slot {
    pub(crate) fn record(&self) -> &dyn ErasedRecord {
        match self {
            Self::Requested(r) => r.as_ref(),
            Self::Declared(v) => v.record(),
        }
    }

    pub(crate) fn record_mut(&mut self) -> &mut dyn ErasedRecord {
        match self {
            Self::Requested(r) => r.as_mut(),
            Self::Declared(v) => v.record_mut(),
        }
    }

    pub(crate) fn is_declared(&self) -> bool {
        matches!(self, Self::Declared(_))
    }

    pub(crate) fn policy_name(&self) -> Option<&'static str> {
        match self {
            Self::Requested(_) => None,
            Self::Declared(v) => Some(v.policy_name()),
        }
    }

    pub(crate) fn supports_clone(&self) -> bool {
        match self {
            Self::Requested(_) => false,
            Self::Declared(v) => v.supports_clone(),
        }
    }

    pub(crate) fn typed<T: ReportValue>(&self) -> Result<&ValueRecord<T>, RegistryError> {
        self.record()
            .as_any()
            .downcast_ref::<ValueRecord<T>>()
            .ok_or_else(|| self.type_mismatch::<T>())
    }

    pub(crate) fn typed_mut<T: ReportValue>(
        &mut self,
    ) -> Result<&mut ValueRecord<T>, RegistryError> {
        if !self.record().type_desc().is::<T>() {
            return Err(self.type_mismatch::<T>());
        }
        Ok(self
            .record_mut()
            .as_any_mut()
            .downcast_mut::<ValueRecord<T>>()
            .expect("record type checked"))
    }

    pub(crate) fn type_mismatch<T: 'static>(&self) -> RegistryError {
        let record = self.record();
        RegistryError::TypeMismatch {
            key: record.key().clone(),
            requested: std::any::type_name::<T>(),
            actual: record.type_desc().name(),
        }
    }
}
