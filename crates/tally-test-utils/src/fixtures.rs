//! Reusable producer and consumer fixtures.
//!
//! - [`ScriptedProducer`]: declares one value and writes a scripted
//!   sequence, one entry per step.
//! - [`RecordingConsumer`]: requests one value and records what it reads
//!   each step.

use tally_core::{ConsumerMode, ProducerMode, RegistryError, ReportValue, ValueKey};
use tally_store::{ValueHandle, ValueRef, ValueRegistry};

/// Writes `script[step]` each step, repeating the last entry once the
/// script runs out.
pub struct ScriptedProducer<T> {
    pub handle: ValueHandle<T>,
    pub script: Vec<T>,
    step: usize,
}

impl<T: ReportValue> ScriptedProducer<T> {
    pub fn declare(
        registry: &mut ValueRegistry,
        key: &ValueKey,
        mode: ProducerMode,
        script: Vec<T>,
    ) -> Result<Self, RegistryError> {
        let handle = registry.declare_value::<T>(key, mode)?;
        Ok(Self {
            handle,
            script,
            step: 0,
        })
    }

    /// Write this step's entry and advance.
    pub fn produce(&mut self, registry: &mut ValueRegistry) -> Result<(), RegistryError> {
        let idx = self.step.min(self.script.len().saturating_sub(1));
        if let Some(v) = self.script.get(idx) {
            *registry.value_mut(&self.handle)? = v.clone();
        }
        self.step += 1;
        Ok(())
    }

    /// Finalize every value of this producer.
    pub fn finalize(&self, registry: &mut ValueRegistry) -> Result<(), RegistryError> {
        registry.finalize_producer(self.handle.key().producer_name())
    }

    pub fn steps(&self) -> usize {
        self.step
    }
}

/// Requests a value at a fixed time index and records every read.
pub struct RecordingConsumer<T> {
    pub name: String,
    pub value: ValueRef<T>,
    pub seen: Vec<T>,
}

impl<T: ReportValue> RecordingConsumer<T> {
    pub fn request(
        registry: &mut ValueRegistry,
        key: &ValueKey,
        name: &str,
        mode: ConsumerMode,
        time_index: usize,
    ) -> Result<Self, RegistryError> {
        let value = registry.request_value::<T>(key, name, mode, time_index)?;
        Ok(Self {
            name: name.to_string(),
            value,
            seen: Vec::new(),
        })
    }

    /// Read the value and append it to `seen`.
    pub fn record(&mut self, registry: &ValueRegistry) -> Result<(), RegistryError> {
        let v = registry.read(&self.value)?.clone();
        self.seen.push(v);
        Ok(())
    }
}
