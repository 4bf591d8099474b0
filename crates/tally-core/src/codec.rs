//! Binary slot codec for checkpointing reported values.
//!
//! All integers are little-endian. Strings and byte arrays are
//! length-prefixed with a `u32` length; sequences with a `u64` count.
//! The format is intentionally simple: no compression, no alignment
//! padding, no self-describing schema. A value's type is known from its
//! declaration, never from the bytes.

use std::io::{Read, Write};

use crate::error::CodecError;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), CodecError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), CodecError> {
    write_length_prefixed_bytes(w, s.as_bytes())
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn write_length_prefixed_bytes(w: &mut dyn Write, b: &[u8]) -> Result<(), CodecError> {
    let len = u32::try_from(b.len()).map_err(|_| CodecError::Malformed {
        detail: format!("byte array of {} bytes exceeds u32 length prefix", b.len()),
    })?;
    write_u32_le(w, len)?;
    w.write_all(b)?;
    Ok(())
}

/// Write a sequence count as a little-endian u64.
pub fn write_count(w: &mut dyn Write, count: usize) -> Result<(), CodecError> {
    write_u64_le(w, count as u64)
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, CodecError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, CodecError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, CodecError> {
    let buf = read_length_prefixed_bytes(r)?;
    String::from_utf8(buf).map_err(|e| CodecError::Malformed {
        detail: format!("invalid UTF-8 string: {e}"),
    })
}

/// Read a length-prefixed byte array.
pub fn read_length_prefixed_bytes(r: &mut dyn Read) -> Result<Vec<u8>, CodecError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read a u64 sequence count and check it fits in `usize`.
pub fn read_count(r: &mut dyn Read) -> Result<usize, CodecError> {
    let count = read_u64_le(r)?;
    usize::try_from(count).map_err(|_| CodecError::Malformed {
        detail: format!("sequence count {count} does not fit in usize"),
    })
}

// ── Persist ─────────────────────────────────────────────────────

/// Type-specific (de)serializer for one history slot.
///
/// Implemented for the scalar types, `String`, `bool`, tuples of two
/// persistable values, and `Vec<T>` of any persistable `T`. Value types
/// defined outside this crate implement it to become checkpointable.
pub trait Persist: Sized {
    /// Append the encoded value to `w`.
    fn persist(&self, w: &mut dyn Write) -> Result<(), CodecError>;

    /// Decode one value from `r`.
    fn restore(r: &mut dyn Read) -> Result<Self, CodecError>;
}

macro_rules! persist_le_bytes {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Persist for $ty {
                fn persist(&self, w: &mut dyn Write) -> Result<(), CodecError> {
                    w.write_all(&self.to_le_bytes())?;
                    Ok(())
                }

                fn restore(r: &mut dyn Read) -> Result<Self, CodecError> {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    r.read_exact(&mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )*
    };
}

persist_le_bytes!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

// usize/isize are widened so checkpoints do not depend on pointer width.
impl Persist for usize {
    fn persist(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        write_u64_le(w, *self as u64)
    }

    fn restore(r: &mut dyn Read) -> Result<Self, CodecError> {
        let v = read_u64_le(r)?;
        usize::try_from(v).map_err(|_| CodecError::Malformed {
            detail: format!("usize value {v} does not fit on this target"),
        })
    }
}

impl Persist for isize {
    fn persist(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        (*self as i64).persist(w)
    }

    fn restore(r: &mut dyn Read) -> Result<Self, CodecError> {
        let v = i64::restore(r)?;
        isize::try_from(v).map_err(|_| CodecError::Malformed {
            detail: format!("isize value {v} does not fit on this target"),
        })
    }
}

impl Persist for bool {
    fn persist(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        write_u8(w, u8::from(*self))
    }

    fn restore(r: &mut dyn Read) -> Result<Self, CodecError> {
        match read_u8(r)? {
            0 => Ok(false),
            1 => Ok(true),
            flag => Err(CodecError::Malformed {
                detail: format!("invalid bool byte: {flag}"),
            }),
        }
    }
}

impl Persist for String {
    fn persist(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        write_length_prefixed_str(w, self)
    }

    fn restore(r: &mut dyn Read) -> Result<Self, CodecError> {
        read_length_prefixed_str(r)
    }
}

impl<T: Persist> Persist for Vec<T> {
    fn persist(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        write_count(w, self.len())?;
        for item in self {
            item.persist(w)?;
        }
        Ok(())
    }

    fn restore(r: &mut dyn Read) -> Result<Self, CodecError> {
        let count = read_count(r)?;
        // Cap the pre-allocation so a corrupt count cannot exhaust memory
        // before the reader runs dry.
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            out.push(T::restore(r)?);
        }
        Ok(out)
    }
}

impl<A: Persist, B: Persist> Persist for (A, B) {
    fn persist(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        self.0.persist(w)?;
        self.1.persist(w)
    }

    fn restore(r: &mut dyn Read) -> Result<Self, CodecError> {
        let a = A::restore(r)?;
        let b = B::restore(r)?;
        Ok((a, b))
    }
}
