//! Key-level transfer operations between two registries.
//!
//! None of these functions knows the value type statically; each looks
//! up the source value's factory in a [`ValueFactories`] table.
//!
//! # Consumer registration
//!
//! A transfer reads its source like any consumer, so it must register
//! its required mode with [`register_consumer_mode`] before the source
//! producer's first finalize. A registration made later is not seen by
//! finalizes that already ran; the registry cannot detect this.

use tally_core::{ConsumerMode, ProducerMode, RegistryError, ValueKey};
use tally_store::ValueRegistry;

use crate::factory::ValueFactories;

/// Copy the current value of `from_key` in `from` into slot `time_index`
/// of `to_key` in `to`. Both values must have the same type.
pub fn transfer_value(
    factories: &ValueFactories,
    from_key: &ValueKey,
    to_key: &ValueKey,
    from: &ValueRegistry,
    to: &mut ValueRegistry,
    time_index: usize,
) -> Result<(), RegistryError> {
    factories
        .for_value(from_key, from)?
        .transfer(from_key, to_key, from, to, time_index)
}

/// Copy the current value of `from_key` into element `index` of the
/// vector value `to_key`, slot `time_index`.
pub fn transfer_to_vector_element(
    factories: &ValueFactories,
    from_key: &ValueKey,
    to_key: &ValueKey,
    from: &ValueRegistry,
    to: &mut ValueRegistry,
    index: usize,
    time_index: usize,
) -> Result<(), RegistryError> {
    factories
        .for_value(from_key, from)?
        .transfer_to_element(from_key, to_key, from, to, index, time_index)
}

/// Declare `to_key` in `to` with the runtime type of `from_key` in `from`.
pub fn declare_clone(
    factories: &ValueFactories,
    from_key: &ValueKey,
    to_key: &ValueKey,
    from: &ValueRegistry,
    to: &mut ValueRegistry,
    mode: ProducerMode,
) -> Result<(), RegistryError> {
    check_clonable(from_key, from)?;
    factories
        .for_value(from_key, from)?
        .declare_clone(to_key, to, mode)
}

/// Declare `to_key` in `to` as a vector of `len` elements of the runtime
/// type of `from_key` in `from`.
pub fn declare_vector_clone(
    factories: &ValueFactories,
    from_key: &ValueKey,
    to_key: &ValueKey,
    from: &ValueRegistry,
    to: &mut ValueRegistry,
    mode: ProducerMode,
    len: usize,
) -> Result<(), RegistryError> {
    check_clonable(from_key, from)?;
    factories
        .for_value(from_key, from)?
        .declare_vector_clone(to_key, to, mode, len)
}

/// Register `consumer` as reading `key` from `registry` in `mode`.
pub fn register_consumer_mode(
    key: &ValueKey,
    mode: ConsumerMode,
    registry: &mut ValueRegistry,
    consumer: &str,
) -> Result<(), RegistryError> {
    registry.add_consumer_mode(key, mode, consumer)
}

fn check_clonable(key: &ValueKey, registry: &ValueRegistry) -> Result<(), RegistryError> {
    match registry.policy_name(key) {
        Some(policy) if !registry.supports_clone(key) => Err(RegistryError::CloneUnsupported {
            key: key.clone(),
            policy,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::ErrorKind;

    fn key(s: &str) -> ValueKey {
        ValueKey::parse(s).unwrap()
    }

    #[test]
    fn clone_and_transfer_without_static_type() {
        let f = ValueFactories::with_builtin_types();
        let mut from = ValueRegistry::serial();
        let mut to = ValueRegistry::serial();
        from.declare_value_with(&key("sub/flux"), ProducerMode::Replicated, vec![1.0, 2.0])
            .unwrap();
        declare_clone(&f, &key("sub/flux"), &key("main/flux"), &from, &mut to, ProducerMode::Root)
            .unwrap();
        assert!(to.has_value::<Vec<f64>>(&key("main/flux")));
        assert_eq!(to.producer_mode(&key("main/flux")), Some(ProducerMode::Root));

        from.init().unwrap();
        to.init().unwrap();
        transfer_value(&f, &key("sub/flux"), &key("main/flux"), &from, &mut to, 0).unwrap();
        assert_eq!(
            to.value::<Vec<f64>>(&key("main/flux"), 0).unwrap(),
            &vec![1.0, 2.0]
        );
    }

    #[test]
    fn transfer_into_different_type_is_mismatch() {
        let f = ValueFactories::with_builtin_types();
        let mut from = ValueRegistry::serial();
        let mut to = ValueRegistry::serial();
        from.declare_value_with(&key("a/x"), ProducerMode::Root, 1i32)
            .unwrap();
        to.declare_value::<f64>(&key("b/x"), ProducerMode::Root)
            .unwrap();
        let err = transfer_value(&f, &key("a/x"), &key("b/x"), &from, &mut to, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Programming);
    }

    #[test]
    fn vector_clone_cannot_be_cloned_again() {
        let f = ValueFactories::with_builtin_types();
        let mut from = ValueRegistry::serial();
        let mut mid = ValueRegistry::serial();
        let mut to = ValueRegistry::serial();
        from.declare_value::<f64>(&key("a/x"), ProducerMode::Root)
            .unwrap();
        declare_vector_clone(&f, &key("a/x"), &key("m/all"), &from, &mut mid, ProducerMode::Root, 3)
            .unwrap();
        assert_eq!(
            mid.value::<Vec<f64>>(&key("m/all"), 0).unwrap(),
            &vec![0.0; 3]
        );
        match declare_clone(&f, &key("m/all"), &key("t/all"), &mid, &mut to, ProducerMode::Root) {
            Err(RegistryError::CloneUnsupported {
                policy: "vector", ..
            }) => {}
            other => panic!("expected CloneUnsupported, got {other:?}"),
        }
    }

    #[test]
    fn missing_source_is_unknown_value() {
        let f = ValueFactories::with_builtin_types();
        let from = ValueRegistry::serial();
        let mut to = ValueRegistry::serial();
        match transfer_value(&f, &key("a/x"), &key("b/x"), &from, &mut to, 0) {
            Err(RegistryError::UnknownValue { .. }) => {}
            other => panic!("expected UnknownValue, got {other:?}"),
        }
    }

    #[test]
    fn registered_consumer_shows_up_on_source() {
        let mut reg = ValueRegistry::serial();
        reg.declare_value::<f64>(&key("a/x"), ProducerMode::Root)
            .unwrap();
        register_consumer_mode(&key("a/x"), ConsumerMode::Replicated, &mut reg, "xfer").unwrap();
        let consumers = reg.consumers(&key("a/x")).unwrap();
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].consumer, "xfer");
    }
}
