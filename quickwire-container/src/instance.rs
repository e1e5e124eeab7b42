//! Type-erased resolved values.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

/// A resolved value with its concrete type erased.
///
/// An `Instance` wraps an `Arc<T>`, so `T` may be a trait object. Cloning an
/// `Instance` shares the same `T`; [`Instance::downcast`] hands out clones
/// of the wrapped `Arc<T>`, which makes identity observable through
/// [`Arc::ptr_eq`].
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use quickwire_container::instance::Instance;
///
/// let value = Arc::new(42u32);
/// let instance = Instance::new(Arc::clone(&value));
///
/// let back: Arc<u32> = instance.downcast().unwrap();
/// assert!(Arc::ptr_eq(&value, &back));
/// assert!(instance.downcast::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    /// Wraps a shared value.
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Wraps an owned value.
    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Recovers the shared value if it was created from an `Arc<T>`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Name of the wrapped type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn downcast_sized_value() {
        let instance = Instance::from_value(String::from("db"));
        let value: Arc<String> = instance.downcast().unwrap();
        assert_eq!(value.as_str(), "db");
        assert!(instance.type_name().contains("String"));
    }

    #[test]
    fn downcast_trait_object_keeps_identity() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = Instance::new(Arc::clone(&greeter));

        let back = instance.downcast::<dyn Greeter>().unwrap();
        assert_eq!(back.greet(), "hello");
        assert!(Arc::ptr_eq(&greeter, &back));
    }

    #[test]
    fn trait_object_is_not_its_concrete_type() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = Instance::new(greeter);

        assert!(instance.downcast::<dyn Greeter>().is_some());
        assert!(instance.downcast::<English>().is_none());
    }

    #[test]
    fn clones_share_the_value() {
        let instance = Instance::from_value(7u8);
        let copy = instance.clone();

        let a: Arc<u8> = instance.downcast().unwrap();
        let b: Arc<u8> = copy.downcast().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn debug_shows_type_name() {
        let instance = Instance::from_value(1i64);
        assert_eq!(format!("{instance:?}"), "Instance(i64)");
    }
}
