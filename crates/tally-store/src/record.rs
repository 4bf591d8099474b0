//! Rolling history of one typed value.
//!
//! [`ValueRecord`] keeps slot 0 as the current value and slot `i` as the
//! value `i` steps in the past. Storage grows lazily while the registry
//! is open; [`seal`](ValueRecord::seal) fixes the capacity and pre-sizes
//! the storage so that no later operation reallocates.

use std::io::{Read, Write};

use smallvec::SmallVec;
use tally_core::codec::{read_count, write_count};
use tally_core::{CodecError, ConsumerMode, ProducerMode, RegistryError, ReportValue, ValueKey};
use tracing::warn;

/// A consumer's registration: the layout it needs and who it is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerEntry {
    /// The layout the consumer requires.
    pub mode: ConsumerMode,
    /// Identity of the consumer, used in error messages.
    pub consumer: String,
}

/// Bounded rolling history of a value plus its mode metadata.
///
/// # Growth by repetition
///
/// Touching a time index beyond the stored history through
/// [`value_mut`](Self::value_mut) extends the history by repeating the
/// last stored entry. A value with no past yet therefore reads the same
/// at every depth as it does now. Read-only access through
/// [`value`](Self::value) never grows.
#[derive(Clone, Debug)]
pub struct ValueRecord<T> {
    key: ValueKey,
    history: SmallVec<[T; 3]>,
    /// `None` until sealed.
    capacity: Option<usize>,
    max_time_index: usize,
    producer_mode: ProducerMode,
    consumers: SmallVec<[ConsumerEntry; 2]>,
}

impl<T: ReportValue> ValueRecord<T> {
    /// An empty, unsealed record with no producer.
    pub fn new(key: ValueKey) -> Self {
        Self {
            key,
            history: SmallVec::new(),
            capacity: None,
            max_time_index: 0,
            producer_mode: ProducerMode::Unset,
            consumers: SmallVec::new(),
        }
    }

    /// The value's key.
    pub fn key(&self) -> &ValueKey {
        &self.key
    }

    /// Number of stored history entries.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// History capacity, fixed at seal time.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Whether [`seal`](Self::seal) has run.
    pub fn is_sealed(&self) -> bool {
        self.capacity.is_some()
    }

    /// Highest time index requested so far.
    pub fn max_time_index(&self) -> usize {
        self.max_time_index
    }

    /// The producer's mode, `Unset` until declared.
    pub fn producer_mode(&self) -> ProducerMode {
        self.producer_mode
    }

    /// Registered consumers, in registration order.
    pub fn consumers(&self) -> &[ConsumerEntry] {
        &self.consumers
    }

    /// Commit the producer mode.
    pub fn set_producer_mode(&mut self, mode: ProducerMode) -> Result<(), RegistryError> {
        if self.producer_mode.is_set() {
            return Err(RegistryError::ModeAlreadySet {
                key: self.key.clone(),
                current: self.producer_mode,
                requested: mode,
            });
        }
        self.producer_mode = mode;
        Ok(())
    }

    /// Register a consumer. Registering the same pair twice is a no-op.
    pub fn add_consumer(&mut self, mode: ConsumerMode, consumer: &str) {
        let present = self
            .consumers
            .iter()
            .any(|c| c.mode == mode && c.consumer == consumer);
        if !present {
            self.consumers.push(ConsumerEntry {
                mode,
                consumer: consumer.to_string(),
            });
        }
    }

    /// Mutable access to slot `time_index`, growing the history by
    /// repetition when needed.
    ///
    /// Fails with [`RegistryError::TimeIndexUnavailable`] once sealed if
    /// `time_index` is not below the capacity.
    pub fn value_mut(&mut self, time_index: usize) -> Result<&mut T, RegistryError> {
        if let Some(capacity) = self.capacity {
            if time_index >= capacity {
                return Err(RegistryError::TimeIndexUnavailable {
                    key: self.key.clone(),
                    requested: time_index,
                    available: capacity,
                });
            }
        }
        let len = time_index
            .checked_add(1)
            .ok_or_else(|| RegistryError::TimeIndexUnavailable {
                key: self.key.clone(),
                requested: time_index,
                available: self.history.len(),
            })?;
        self.max_time_index = self.max_time_index.max(time_index);
        self.grow_to(len);
        Ok(&mut self.history[time_index])
    }

    /// Read-only access to slot `time_index`. Never grows.
    pub fn value(&self, time_index: usize) -> Result<&T, RegistryError> {
        self.history
            .get(time_index)
            .ok_or_else(|| RegistryError::TimeIndexUnavailable {
                key: self.key.clone(),
                requested: time_index,
                available: self.history.len(),
            })
    }

    /// Overwrite the current value, seeding the history if empty.
    pub fn set_current(&mut self, value: T) {
        self.grow_to(1);
        self.history[0] = value;
    }

    /// Shift every entry one step into the past. Slot 0 keeps its value
    /// until the next production phase overwrites it.
    pub fn copy_values_back(&mut self) {
        for i in (1..self.history.len()).rev() {
            let (newer, older) = self.history.split_at_mut(i);
            older[0].clone_from(&newer[i - 1]);
        }
    }

    /// Fix the capacity to the deepest index requested (never below the
    /// entries already stored) and pre-size the storage to it.
    ///
    /// Sealing twice keeps the first capacity.
    pub fn seal(&mut self) {
        if self.capacity.is_some() {
            return;
        }
        let capacity = (self.max_time_index + 1).max(self.history.len());
        self.history.reserve_exact(capacity - self.history.len());
        self.grow_to(capacity);
        self.capacity = Some(capacity);
    }

    /// Write `[count: u64][slot_0]..[slot_{count-1}]`, current first.
    pub fn store(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        write_count(w, self.history.len())?;
        for slot in &self.history {
            slot.persist(w)?;
        }
        Ok(())
    }

    /// Read what [`store`](Self::store) wrote.
    ///
    /// Overwrites the first `count` slots. Slots beyond `count` keep their
    /// contents; storage never shrinks. A sealed record rejects a count
    /// above its capacity.
    pub fn load(&mut self, r: &mut dyn Read) -> Result<(), CodecError> {
        let count = read_count(r)?;
        if let Some(capacity) = self.capacity {
            if count > capacity {
                return Err(CodecError::Malformed {
                    detail: format!(
                        "'{}' holds {count} history entries, capacity is {capacity}",
                        self.key
                    ),
                });
            }
        }
        if count < self.history.len() {
            warn!(
                key = %self.key,
                count,
                stored = self.history.len(),
                "restoring fewer history entries than stored"
            );
        }
        for i in 0..count {
            let value = T::restore(r)?;
            match self.history.get_mut(i) {
                Some(slot) => *slot = value,
                None => self.history.push(value),
            }
        }
        Ok(())
    }

    fn grow_to(&mut self, len: usize) {
        while self.history.len() < len {
            let last = self.history.last().cloned().unwrap_or_default();
            self.history.push(last);
        }
    }
}
