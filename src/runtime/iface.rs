//! Interface values: a dynamic type tag plus a shared payload.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use super::error::RuntimeError;
use super::panic::runtime_panic;
use super::string::GoString;

#[derive(Clone)]
struct Boxed {
    tag: Arc<str>,
    data: Arc<dyn Any + Send + Sync>,
}

/// A Go interface value. The zero value is the nil interface.
///
/// Equality is identity of the boxed payload, so two interfaces compare
/// equal only when one was copied from the other (or both are nil).
#[derive(Clone, Default)]
pub struct Iface {
    boxed: Option<Boxed>,
}

/// `interface{}` / `any`.
pub type GoAny = Iface;

impl Iface {
    pub fn nil() -> Self {
        Self::default()
    }

    /// Boxes `value` under the Go type name `tag`.
    pub fn new<T: Any + Send + Sync>(tag: &str, value: T) -> Self {
        Self {
            boxed: Some(Boxed {
                tag: Arc::from(tag),
                data: Arc::new(value),
            }),
        }
    }

    pub fn is_nil(&self) -> bool {
        self.boxed.is_none()
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.boxed.as_ref().map(|b| &*b.tag)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.boxed.as_ref()?.data.downcast_ref::<T>()
    }

    /// `x.(T)` for a concrete `T`; panics on mismatch.
    pub fn assert<T: Any + Clone>(&self) -> T {
        match self.downcast_ref::<T>() {
            Some(value) => value.clone(),
            None => runtime_panic(RuntimeError::TypeAssertion {
                expected: type_name::<T>().to_string(),
                actual: self.type_tag().unwrap_or("nil").to_string(),
            }),
        }
    }

    /// `x.(T)` in comma-ok form.
    pub fn try_assert<T: Any + Clone + Default>(&self) -> (T, bool) {
        match self.downcast_ref::<T>() {
            Some(value) => (value.clone(), true),
            None => (T::default(), false),
        }
    }

    /// `x.(I)` for an interface `I`. Method sets are not tracked, so any
    /// non-nil value satisfies the assertion.
    pub fn assert_iface(&self) -> Iface {
        if self.is_nil() {
            runtime_panic(RuntimeError::TypeAssertion {
                expected: "interface".to_string(),
                actual: "nil".to_string(),
            });
        }
        self.clone()
    }

    pub fn try_assert_iface(&self) -> (Iface, bool) {
        (self.clone(), !self.is_nil())
    }

    /// Text used when the value is printed or asked for `Error()`.
    pub fn error_string(&self) -> GoString {
        let Some(boxed) = &self.boxed else {
            return GoString::from_static("<nil>");
        };
        if let Some(s) = boxed.data.downcast_ref::<GoString>() {
            return s.clone();
        }
        if let Some(err) = boxed.data.downcast_ref::<RuntimeError>() {
            return GoString::from(err.to_string());
        }
        GoString::from(format!("({}) value", boxed.tag))
    }
}

impl PartialEq for Iface {
    fn eq(&self, other: &Self) -> bool {
        match (&self.boxed, &other.boxed) {
            (None, None) => true,
            (Some(a), Some(b)) => a.tag == b.tag && Arc::ptr_eq(&a.data, &b.data),
            _ => false,
        }
    }
}

impl fmt::Debug for Iface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_tag() {
            Some(tag) => write!(f, "Iface({tag})"),
            None => write!(f, "Iface(nil)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertions_follow_dynamic_type() {
        let value = Iface::new("int", 7isize);

        assert_eq!(value.assert::<isize>(), 7);
        assert_eq!(value.try_assert::<GoString>(), (GoString::default(), false));
        assert_eq!(value.type_tag(), Some("int"));
        assert_eq!(Iface::nil().try_assert_iface().1, false);
    }

    #[test]
    fn failed_assertion_panics() {
        let value = Iface::new("string", GoString::from("x"));
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| value.assert::<isize>()));
        assert!(outcome.is_err());
    }
}
