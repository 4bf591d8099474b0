//! Runtime descriptors for value types.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Names a concrete value type at runtime.
///
/// Registries store values type-erased; the descriptor is what lets a
/// caller that does not know `T` statically (the transfer layer, the
/// checkpoint reader) find the right typed code path. Identity is the
/// [`TypeId`]; the name is for messages and the checkpoint container.
#[derive(Clone, Copy, Debug)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    /// Descriptor for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The type's [`TypeId`].
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type's name as reported by [`std::any::type_name`].
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this descriptor names `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_compare_by_type() {
        assert_eq!(TypeDescriptor::of::<f64>(), TypeDescriptor::of::<f64>());
        assert_ne!(TypeDescriptor::of::<f64>(), TypeDescriptor::of::<f32>());
        assert!(TypeDescriptor::of::<Vec<i32>>().is::<Vec<i32>>());
    }

    #[test]
    fn name_is_type_name() {
        assert_eq!(TypeDescriptor::of::<u64>().name(), "u64");
    }
}
