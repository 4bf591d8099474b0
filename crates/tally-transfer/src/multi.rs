//! Transfer drivers: keyed value pairs between two registries, and fan-in
//! from many source registries into one vector value.
//!
//! Each driver has two phases. `initial_setup` runs once before the
//! source registries finalize for the first time: it registers the
//! driver as a consumer of every source key and, when configured,
//! declares the destination values. `execute` runs every step after the
//! sources have finalized.

use tally_core::{ConsumerMode, ProducerMode, RegistryError, ValueKey};
use tally_store::ValueRegistry;
use tracing::debug;

use crate::factory::ValueFactories;
use crate::transfer::{
    declare_clone, declare_vector_clone, register_consumer_mode, transfer_to_vector_element,
    transfer_value,
};

// ── ValueTransfer ───────────────────────────────────────────────

/// Copies a fixed list of `(from, to)` keys between two registries.
///
/// # Examples
///
/// ```
/// use tally_core::{ProducerMode, ValueKey};
/// use tally_store::ValueRegistry;
/// use tally_transfer::ValueTransfer;
///
/// let from_key = ValueKey::new("sub", "flux");
/// let to_key = ValueKey::new("main", "flux");
/// let mut sub = ValueRegistry::serial();
/// let mut main = ValueRegistry::serial();
/// sub.declare_value_with(&from_key, ProducerMode::Replicated, 2.5f64).unwrap();
///
/// let xfer = ValueTransfer::new("to_main")
///     .pair(from_key, to_key.clone())
///     .clone_into(ProducerMode::Replicated);
/// xfer.initial_setup(&mut sub, &mut main).unwrap();
/// sub.init().unwrap();
/// main.init().unwrap();
///
/// xfer.execute(&sub, &mut main).unwrap();
/// assert_eq!(*main.value::<f64>(&to_key, 0).unwrap(), 2.5);
/// ```
pub struct ValueTransfer {
    name: String,
    pairs: Vec<(ValueKey, ValueKey)>,
    factories: ValueFactories,
    consumer_mode: ConsumerMode,
    clone_mode: Option<ProducerMode>,
    time_index: usize,
}

impl ValueTransfer {
    /// An empty transfer named `name`. Sources are read as
    /// [`ConsumerMode::Replicated`] and written into slot 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pairs: Vec::new(),
            factories: ValueFactories::with_builtin_types(),
            consumer_mode: ConsumerMode::Replicated,
            clone_mode: None,
            time_index: 0,
        }
    }

    /// Add a `(from, to)` key pair.
    pub fn pair(mut self, from: ValueKey, to: ValueKey) -> Self {
        self.pairs.push((from, to));
        self
    }

    /// Use a custom factory table.
    pub fn with_factories(mut self, factories: ValueFactories) -> Self {
        self.factories = factories;
        self
    }

    /// Mode the source values are read in.
    pub fn consumer_mode(mut self, mode: ConsumerMode) -> Self {
        self.consumer_mode = mode;
        self
    }

    /// Declare every destination during setup, with the source's type and
    /// this producer mode.
    pub fn clone_into(mut self, mode: ProducerMode) -> Self {
        self.clone_mode = Some(mode);
        self
    }

    /// Destination slot written by [`execute`](Self::execute).
    pub fn time_index(mut self, time_index: usize) -> Self {
        self.time_index = time_index;
        self
    }

    /// Name registered as the consumer on every source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `(from, to)` key pairs.
    pub fn pairs(&self) -> &[(ValueKey, ValueKey)] {
        &self.pairs
    }

    /// Register as a consumer of every source key and, if configured,
    /// declare the destinations.
    ///
    /// Must run before `from` finalizes any producer named in the pairs.
    pub fn initial_setup(
        &self,
        from: &mut ValueRegistry,
        to: &mut ValueRegistry,
    ) -> Result<(), RegistryError> {
        for (from_key, to_key) in &self.pairs {
            register_consumer_mode(from_key, self.consumer_mode, from, &self.name)?;
            if let Some(mode) = self.clone_mode {
                declare_clone(&self.factories, from_key, to_key, from, to, mode)?;
            }
        }
        debug!(
            transfer = %self.name,
            pairs = self.pairs.len(),
            cloned = self.clone_mode.is_some(),
            "transfer set up"
        );
        Ok(())
    }

    /// Copy every source's current value into its destination.
    pub fn execute(
        &self,
        from: &ValueRegistry,
        to: &mut ValueRegistry,
    ) -> Result<(), RegistryError> {
        for (from_key, to_key) in &self.pairs {
            transfer_value(&self.factories, from_key, to_key, from, to, self.time_index)?;
        }
        debug!(transfer = %self.name, pairs = self.pairs.len(), "transfer executed");
        Ok(())
    }
}

// ── FanInTransfer ───────────────────────────────────────────────

/// Collects one key from many source registries into a vector value,
/// element `i` coming from source `i`.
pub struct FanInTransfer {
    name: String,
    from_key: ValueKey,
    to_key: ValueKey,
    factories: ValueFactories,
    consumer_mode: ConsumerMode,
    producer_mode: ProducerMode,
    time_index: usize,
}

impl FanInTransfer {
    /// Fan `from_key` of every source into the vector `to_key`. The vector
    /// is declared with [`ProducerMode::Root`] and written at slot 0.
    pub fn new(name: impl Into<String>, from_key: ValueKey, to_key: ValueKey) -> Self {
        Self {
            name: name.into(),
            from_key,
            to_key,
            factories: ValueFactories::with_builtin_types(),
            consumer_mode: ConsumerMode::Replicated,
            producer_mode: ProducerMode::Root,
            time_index: 0,
        }
    }

    /// Use a custom factory table.
    pub fn with_factories(mut self, factories: ValueFactories) -> Self {
        self.factories = factories;
        self
    }

    /// Mode the source values are read in.
    pub fn consumer_mode(mut self, mode: ConsumerMode) -> Self {
        self.consumer_mode = mode;
        self
    }

    /// Producer mode of the declared vector.
    pub fn producer_mode(mut self, mode: ProducerMode) -> Self {
        self.producer_mode = mode;
        self
    }

    /// Destination slot written by [`execute`](Self::execute).
    pub fn time_index(mut self, time_index: usize) -> Self {
        self.time_index = time_index;
        self
    }

    /// Register as a consumer on every source and declare the vector with
    /// one element per source. The first source supplies the element type.
    /// With no sources nothing is declared.
    pub fn initial_setup(
        &self,
        sources: &mut [ValueRegistry],
        to: &mut ValueRegistry,
    ) -> Result<(), RegistryError> {
        for source in sources.iter_mut() {
            register_consumer_mode(&self.from_key, self.consumer_mode, source, &self.name)?;
        }
        let Some(first) = sources.first() else {
            debug!(transfer = %self.name, "fan-in has no sources");
            return Ok(());
        };
        declare_vector_clone(
            &self.factories,
            &self.from_key,
            &self.to_key,
            first,
            to,
            self.producer_mode,
            sources.len(),
        )?;
        debug!(transfer = %self.name, sources = sources.len(), "fan-in set up");
        Ok(())
    }

    /// Write each source's current value into its element.
    pub fn execute(
        &self,
        sources: &[ValueRegistry],
        to: &mut ValueRegistry,
    ) -> Result<(), RegistryError> {
        for (index, source) in sources.iter().enumerate() {
            transfer_to_vector_element(
                &self.factories,
                &self.from_key,
                &self.to_key,
                source,
                to,
                index,
                self.time_index,
            )?;
        }
        debug!(transfer = %self.name, sources = sources.len(), "fan-in executed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ValueKey {
        ValueKey::parse(s).unwrap()
    }

    #[test]
    fn setup_without_clone_requires_existing_destination() {
        let mut from = ValueRegistry::serial();
        let mut to = ValueRegistry::serial();
        from.declare_value_with(&key("a/x"), ProducerMode::Root, 4i32)
            .unwrap();
        let xfer = ValueTransfer::new("t").pair(key("a/x"), key("b/x"));
        xfer.initial_setup(&mut from, &mut to).unwrap();
        assert!(!to.has_any_value(&key("b/x")));
        assert_eq!(xfer.pairs().len(), 1);
        assert_eq!(xfer.name(), "t");

        from.init().unwrap();
        match xfer.execute(&from, &mut to) {
            Err(RegistryError::UnknownValue { key: k }) => assert_eq!(k, key("b/x")),
            other => panic!("expected UnknownValue, got {other:?}"),
        }
    }

    #[test]
    fn time_index_selects_destination_slot() {
        let mut from = ValueRegistry::serial();
        let mut to = ValueRegistry::serial();
        from.declare_value_with(&key("a/x"), ProducerMode::Root, 9u64)
            .unwrap();
        let xfer = ValueTransfer::new("t")
            .pair(key("a/x"), key("b/x"))
            .clone_into(ProducerMode::Root)
            .time_index(1);
        xfer.initial_setup(&mut from, &mut to).unwrap();
        from.init().unwrap();
        to.get_value::<u64>(&key("b/x"), 1).unwrap();
        to.init().unwrap();
        xfer.execute(&from, &mut to).unwrap();
        assert_eq!(*to.value::<u64>(&key("b/x"), 1).unwrap(), 9);
        assert_eq!(*to.value::<u64>(&key("b/x"), 0).unwrap(), 0);
    }

    #[test]
    fn fan_in_with_no_sources_is_a_no_op() {
        let mut to = ValueRegistry::serial();
        let fan = FanInTransfer::new("f", key("a/x"), key("b/all"));
        fan.initial_setup(&mut [], &mut to).unwrap();
        fan.execute(&[], &mut to).unwrap();
        assert!(to.value_keys().next().is_none());
    }
}
