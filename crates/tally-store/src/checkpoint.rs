//! Registry-level checkpoint container.
//!
//! ```text
//! [MAGIC "TALY"] [VERSION u8] [count u32]
//! [entry 1] ... [entry count]
//!
//! entry: [key str] [type name str] [producer mode u8] [record bytes]
//! ```
//!
//! Strings and the record bytes are `u32`-length prefixed. The record
//! bytes are [`ValueRecord::store`](crate::ValueRecord::store) output.
//! Restoring requires a registry with the same declarations: every
//! entry must name a known value of the same type and producer mode.

use std::io::{Read, Write};

use tally_core::codec::{
    read_length_prefixed_bytes, read_length_prefixed_str, read_u32_le, read_u8,
    write_length_prefixed_bytes, write_length_prefixed_str, write_u32_le, write_u8,
};
use tally_core::{CodecError, ProducerMode, RegistryError, ValueKey};
use tracing::debug;

use crate::registry::ValueRegistry;

/// Magic bytes at the start of every checkpoint.
pub const MAGIC: [u8; 4] = *b"TALY";

/// Current container format version.
pub const FORMAT_VERSION: u8 = 1;

fn malformed(detail: String) -> RegistryError {
    RegistryError::Codec(CodecError::Malformed { detail })
}

impl ValueRegistry {
    /// Write every value's history.
    pub fn write_checkpoint<W: Write>(&self, mut writer: W) -> Result<(), RegistryError> {
        let slots = self.slots();
        let count = u32::try_from(slots.len())
            .map_err(|_| malformed(format!("{} values exceed the entry limit", slots.len())))?;
        writer.write_all(&MAGIC).map_err(CodecError::from)?;
        write_u8(&mut writer, FORMAT_VERSION)?;
        write_u32_le(&mut writer, count)?;

        let mut bytes = Vec::new();
        for (key, slot) in slots {
            let record = slot.record();
            bytes.clear();
            record.store(&mut bytes)?;
            write_length_prefixed_str(&mut writer, key.combined())?;
            write_length_prefixed_str(&mut writer, record.type_desc().name())?;
            write_u8(&mut writer, record.producer_mode().tag())?;
            write_length_prefixed_bytes(&mut writer, &bytes)?;
        }
        debug!(values = count, "wrote checkpoint");
        Ok(())
    }

    /// Restore histories written by [`write_checkpoint`](Self::write_checkpoint).
    ///
    /// Values in the registry but absent from the checkpoint are left
    /// alone. Entries are applied in order, so on error the entries
    /// before the failing one have already been restored.
    pub fn read_checkpoint<R: Read>(&mut self, mut reader: R) -> Result<(), RegistryError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(CodecError::from)?;
        if magic != MAGIC {
            return Err(CodecError::InvalidMagic.into());
        }
        let version = read_u8(&mut reader)?;
        if version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion { found: version }.into());
        }
        let count = read_u32_le(&mut reader)?;

        for _ in 0..count {
            let key_str = read_length_prefixed_str(&mut reader)?;
            let type_name = read_length_prefixed_str(&mut reader)?;
            let tag = read_u8(&mut reader)?;
            let bytes = read_length_prefixed_bytes(&mut reader)?;

            let key = ValueKey::parse(&key_str).map_err(|e| malformed(e.to_string()))?;
            let mode = ProducerMode::from_tag(tag)
                .ok_or_else(|| malformed(format!("invalid producer mode tag {tag} for '{key}'")))?;
            let record = self
                .slots_mut()
                .get_mut(&key)
                .ok_or_else(|| malformed(format!("checkpoint value '{key}' is not registered")))?
                .record_mut();
            if record.type_desc().name() != type_name {
                return Err(malformed(format!(
                    "'{key}' was checkpointed as {type_name}, registered as {}",
                    record.type_desc().name()
                )));
            }
            if record.producer_mode() != mode {
                return Err(malformed(format!(
                    "'{key}' was checkpointed in {mode} mode, registered in {}",
                    record.producer_mode()
                )));
            }
            let mut slice = bytes.as_slice();
            record.load(&mut slice)?;
            if !slice.is_empty() {
                return Err(malformed(format!(
                    "{} trailing bytes after '{key}'",
                    slice.len()
                )));
            }
        }
        debug!(values = count, "read checkpoint");
        Ok(())
    }
}
