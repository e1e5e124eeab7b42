//! Type identification keys.
//!
//! [`TypeKey`] identifies a requested type within the container. It is the
//! registration-table key and the identity carried through every error.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use quickwire_support::rendering::shorten_type_name;

/// Uniquely identifies a type in the container.
///
/// Works for concrete types and for abstract capabilities expressed as
/// trait objects.
///
/// # Examples
/// ```
/// use quickwire_container::key::TypeKey;
///
/// let key = TypeKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
///
/// trait Transport {}
/// let abstract_key = TypeKey::of::<dyn Transport>();
/// assert_ne!(key, abstract_key);
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without module paths, for compact messages.
    pub fn short_name(&self) -> String {
        shorten_type_name(self.type_name)
    }
}

// The name is informational: two keys are equal iff their TypeIds are.
impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.type_name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer;

    #[test]
    fn key_of_type() {
        let key = TypeKey::of::<Mailer>();
        assert!(key.type_name().ends_with("Mailer"));
        assert_eq!(key.short_name(), "Mailer");
    }

    #[test]
    fn key_equality_same_type() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
    }

    #[test]
    fn key_inequality_different_types() {
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<i32>());
    }

    #[test]
    fn key_in_hashmap() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(TypeKey::of::<String>(), "string");
        map.insert(TypeKey::of::<i32>(), "i32");
        assert_eq!(map.get(&TypeKey::of::<String>()), Some(&"string"));
        assert_eq!(map.get(&TypeKey::of::<bool>()), None);
    }

    #[test]
    fn trait_object_key() {
        trait Transport {}
        let key = TypeKey::of::<dyn Transport>();
        assert!(key.short_name().contains("dyn Transport"));
    }
}
