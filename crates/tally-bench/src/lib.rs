//! Registry profiles for benchmarking the Tally value store.
//!
//! - [`reference_profile`]: 16 producers × 8 `f64` values, history depth 2,
//!   one Replicated consumer per value.
//! - [`vector_profile`]: 4 producers × 4 `Vec<f64>` values of 1024 reals.
//! - [`write_step`]: write every declared value of a profile once.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tally_core::{ConsumerMode, ProducerMode, RegistryError, ReportValue, ValueKey};
use tally_store::{ValueHandle, ValueRegistry};

/// A sealed serial registry plus the handles of its declared values.
pub struct Profile<T> {
    /// The registry, already sealed.
    pub registry: ValueRegistry,
    /// One handle per declared value, producer-major.
    pub handles: Vec<ValueHandle<T>>,
    /// Distinct producer names.
    pub producers: Vec<String>,
}

fn build<T: ReportValue>(
    producers: usize,
    values: usize,
    depth: usize,
    initial: impl Fn(usize) -> T,
) -> Result<Profile<T>, RegistryError> {
    let mut registry = ValueRegistry::serial();
    let mut handles = Vec::with_capacity(producers * values);
    let names: Vec<String> = (0..producers).map(|p| format!("prod{p}")).collect();
    for name in &names {
        for v in 0..values {
            let key = ValueKey::new(name.as_str(), format!("v{v}"));
            let h = registry.declare_value_with(
                &key,
                ProducerMode::Replicated,
                initial(handles.len()),
            )?;
            registry.request_value::<T>(&key, "sink", ConsumerMode::Replicated, depth)?;
            handles.push(h);
        }
    }
    registry.init()?;
    Ok(Profile {
        registry,
        handles,
        producers: names,
    })
}

/// Build the scalar reference profile.
pub fn reference_profile() -> Result<Profile<f64>, RegistryError> {
    build(16, 8, 2, |i| i as f64)
}

/// Build the vector profile.
pub fn vector_profile() -> Result<Profile<Vec<f64>>, RegistryError> {
    build(4, 4, 1, |i| vec![i as f64; 1024])
}

/// Write `value(i)` into the current slot of the `i`-th handle.
pub fn write_step<T: ReportValue>(
    profile: &mut Profile<T>,
    value: impl Fn(usize) -> T,
) -> Result<(), RegistryError> {
    for (i, h) in profile.handles.iter().enumerate() {
        *profile.registry.value_mut(h)? = value(i);
    }
    Ok(())
}
