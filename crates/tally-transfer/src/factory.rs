//! Factory table: type-erased operations keyed by a value's runtime type.
//!
//! A transfer between two registries knows only keys. The table maps the
//! source value's [`TypeDescriptor`] to a [`TypedFactory`] that closes
//! over the concrete type and performs the typed registry calls.

use std::marker::PhantomData;

use indexmap::IndexMap;
use tally_core::{ProducerMode, RegistryError, ReportValue, TypeDescriptor, ValueKey};
use tally_store::{ValueRegistry, VectorPolicy};

/// Operations the transfer layer needs on a value of one concrete type.
pub trait ValueFactory: Send + Sync {
    /// The type this factory handles.
    fn type_desc(&self) -> TypeDescriptor;

    /// Copy the current value of `from_key` into slot `time_index` of
    /// `to_key`.
    fn transfer(
        &self,
        from_key: &ValueKey,
        to_key: &ValueKey,
        from: &ValueRegistry,
        to: &mut ValueRegistry,
        time_index: usize,
    ) -> Result<(), RegistryError>;

    /// Copy the current value of `from_key` into element `index` of the
    /// vector `to_key` at slot `time_index`.
    fn transfer_to_element(
        &self,
        from_key: &ValueKey,
        to_key: &ValueKey,
        from: &ValueRegistry,
        to: &mut ValueRegistry,
        index: usize,
        time_index: usize,
    ) -> Result<(), RegistryError>;

    /// Declare `to_key` with this type under the general policy.
    fn declare_clone(
        &self,
        to_key: &ValueKey,
        to: &mut ValueRegistry,
        mode: ProducerMode,
    ) -> Result<(), RegistryError>;

    /// Declare `to_key` as a vector of this type, `len` default elements,
    /// under the vector policy.
    fn declare_vector_clone(
        &self,
        to_key: &ValueKey,
        to: &mut ValueRegistry,
        mode: ProducerMode,
        len: usize,
    ) -> Result<(), RegistryError>;
}

/// [`ValueFactory`] for values of type `T`.
pub struct TypedFactory<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedFactory<T> {
    /// The factory for `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ReportValue> ValueFactory for TypedFactory<T> {
    fn type_desc(&self) -> TypeDescriptor {
        TypeDescriptor::of::<T>()
    }

    fn transfer(
        &self,
        from_key: &ValueKey,
        to_key: &ValueKey,
        from: &ValueRegistry,
        to: &mut ValueRegistry,
        time_index: usize,
    ) -> Result<(), RegistryError> {
        let value = from.value::<T>(from_key, 0)?.clone();
        to.set_value(to_key, value, time_index)
    }

    fn transfer_to_element(
        &self,
        from_key: &ValueKey,
        to_key: &ValueKey,
        from: &ValueRegistry,
        to: &mut ValueRegistry,
        index: usize,
        time_index: usize,
    ) -> Result<(), RegistryError> {
        let value = from.value::<T>(from_key, 0)?.clone();
        let target = to.value_mut_at::<Vec<T>>(to_key, time_index)?;
        let len = target.len();
        let slot = target
            .get_mut(index)
            .ok_or_else(|| RegistryError::ElementOutOfRange {
                key: to_key.clone(),
                index,
                len,
            })?;
        *slot = value;
        Ok(())
    }

    fn declare_clone(
        &self,
        to_key: &ValueKey,
        to: &mut ValueRegistry,
        mode: ProducerMode,
    ) -> Result<(), RegistryError> {
        to.declare_value::<T>(to_key, mode).map(|_| ())
    }

    fn declare_vector_clone(
        &self,
        to_key: &ValueKey,
        to: &mut ValueRegistry,
        mode: ProducerMode,
        len: usize,
    ) -> Result<(), RegistryError> {
        let elements = vec![T::default(); len];
        to.declare_with_policy::<Vec<T>, _>(to_key, mode, VectorPolicy, Some(elements))
            .map(|_| ())
    }
}

/// Lookup table from runtime type to [`ValueFactory`].
pub struct ValueFactories {
    table: IndexMap<TypeDescriptor, Box<dyn ValueFactory>>,
}

impl ValueFactories {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            table: IndexMap::new(),
        }
    }

    /// A table with the common built-in types: the numeric scalars,
    /// `bool`, `String`, `Vec<f64>` and `Vec<i32>`.
    pub fn with_builtin_types() -> Self {
        let mut factories = Self::new();
        factories.register::<f64>();
        factories.register::<f32>();
        factories.register::<i32>();
        factories.register::<u32>();
        factories.register::<i64>();
        factories.register::<u64>();
        factories.register::<usize>();
        factories.register::<bool>();
        factories.register::<String>();
        factories.register::<Vec<f64>>();
        factories.register::<Vec<i32>>();
        factories
    }

    /// Add the factory for `T`. Registering a type twice keeps one entry.
    pub fn register<T: ReportValue>(&mut self) -> &mut Self {
        self.table
            .insert(TypeDescriptor::of::<T>(), Box::new(TypedFactory::<T>::new()));
        self
    }

    /// Whether `T` has a factory.
    pub fn contains<T: 'static>(&self) -> bool {
        self.table.contains_key(&TypeDescriptor::of::<T>())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The factory for a runtime type.
    pub fn get(&self, desc: &TypeDescriptor) -> Option<&dyn ValueFactory> {
        self.table.get(desc).map(|f| &**f)
    }

    /// The factory for the type of `key` in `registry`.
    pub fn for_value(
        &self,
        key: &ValueKey,
        registry: &ValueRegistry,
    ) -> Result<&dyn ValueFactory, RegistryError> {
        let desc = registry
            .declared_type(key)
            .ok_or_else(|| RegistryError::UnknownValue { key: key.clone() })?;
        self.get(&desc).ok_or_else(|| RegistryError::UnknownType {
            key: key.clone(),
            type_name: desc.name(),
        })
    }
}

impl Default for ValueFactories {
    fn default() -> Self {
        Self::with_builtin_types()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_scalars_and_vectors() {
        let f = ValueFactories::with_builtin_types();
        assert!(f.contains::<f64>());
        assert!(f.contains::<String>());
        assert!(f.contains::<Vec<f64>>());
        assert!(!f.contains::<(i32, i32)>());
        assert_eq!(f.len(), 11);
    }

    #[test]
    fn register_is_idempotent() {
        let mut f = ValueFactories::new();
        assert!(f.is_empty());
        f.register::<i32>().register::<i32>();
        assert_eq!(f.len(), 1);
        let desc = TypeDescriptor::of::<i32>();
        assert_eq!(f.get(&desc).map(|x| x.type_desc()), Some(desc));
    }

    #[test]
    fn unknown_type_is_reported() {
        let mut reg = ValueRegistry::serial();
        let key = ValueKey::new("p", "pair");
        reg.declare_value::<(i32, i32)>(&key, ProducerMode::Root)
            .unwrap();
        match ValueFactories::with_builtin_types().for_value(&key, &reg) {
            Err(RegistryError::UnknownType { type_name, .. }) => {
                assert!(type_name.contains("i32"));
            }
            Err(other) => panic!("expected UnknownType, got {other:?}"),
            Ok(_) => panic!("expected UnknownType, got a factory"),
        }
    }

    #[test]
    fn element_out_of_range() {
        let mut from = ValueRegistry::serial();
        let mut to = ValueRegistry::serial();
        let src = ValueKey::new("a", "x");
        let dst = ValueKey::new("b", "all");
        from.declare_value_with(&src, ProducerMode::Root, 1.0f64)
            .unwrap();
        TypedFactory::<f64>::new()
            .declare_vector_clone(&dst, &mut to, ProducerMode::Root, 2)
            .unwrap();
        let err = TypedFactory::<f64>::new()
            .transfer_to_element(&src, &dst, &from, &mut to, 2, 0)
            .unwrap_err();
        match err {
            RegistryError::ElementOutOfRange { index: 2, len: 2, .. } => {}
            other => panic!("expected ElementOutOfRange, got {other:?}"),
        }
    }
}
