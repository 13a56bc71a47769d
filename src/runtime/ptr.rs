//! Pointers as shared places.
//!
//! A [`Ptr`] names a storage location: a heap cell, a field of another
//! place, or an element of a slice or array. Reads clone the pointee and
//! writes replace it; the location's lock is only held for that access.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use super::error::{RuntimeError, address_of};
use super::panic::runtime_panic;
use super::sync::lock_unpoisoned;
use super::value::{GoArray, GoInt, Nilable};

/// A storage location for values of type `T`.
pub trait Place<T>: Send + Sync {
    fn with(&self, f: &mut dyn FnMut(&mut T));
}

struct Cell<T>(Mutex<T>);

impl<T: Send> Place<T> for Cell<T> {
    fn with(&self, f: &mut dyn FnMut(&mut T)) {
        f(&mut lock_unpoisoned(&self.0));
    }
}

struct Field<S, T> {
    parent: Ptr<S>,
    project: fn(&mut S) -> &mut T,
}

impl<S: 'static, T: 'static> Place<T> for Field<S, T> {
    fn with(&self, f: &mut dyn FnMut(&mut T)) {
        self.parent.with_mut(|s| f((self.project)(s)));
    }
}

struct ArrayElem<T, const N: usize> {
    parent: Ptr<GoArray<T, N>>,
    index: usize,
}

impl<T: Clone + Default + 'static, const N: usize> Place<T> for ArrayElem<T, N> {
    fn with(&self, f: &mut dyn FnMut(&mut T)) {
        self.parent.with_mut(|array| f(array.slot(self.index)));
    }
}

/// A Go pointer `*T`. The zero value is nil; dereferencing nil panics.
pub struct Ptr<T> {
    place: Option<Arc<dyn Place<T>>>,
}

impl<T> Clone for Ptr<T> {
    fn clone(&self) -> Self {
        Self {
            place: self.place.clone(),
        }
    }
}

impl<T> Default for Ptr<T> {
    fn default() -> Self {
        Self { place: None }
    }
}

impl<T: 'static> Ptr<T> {
    /// `new(T)` / `&T{...}`: a fresh heap cell.
    pub fn new(value: T) -> Self
    where
        T: Send,
    {
        Self::from_place(Cell(Mutex::new(value)))
    }

    pub fn from_place(place: impl Place<T> + 'static) -> Self {
        Self {
            place: Some(Arc::new(place)),
        }
    }

    pub fn nil() -> Self {
        Self::default()
    }

    pub fn is_nil(&self) -> bool {
        self.place.is_none()
    }

    /// Runs `f` on the pointee. Panics on nil.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let Some(place) = &self.place else {
            runtime_panic(RuntimeError::NilDereference);
        };
        let mut f = Some(f);
        let mut out = None;
        place.with(&mut |value| {
            if let Some(f) = f.take() {
                out = Some(f(value));
            }
        });
        match out {
            Some(out) => out,
            None => runtime_panic(RuntimeError::NilDereference),
        }
    }

    /// `*p`.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with_mut(|value| value.clone())
    }

    /// `*p = value`.
    pub fn set(&self, value: T) {
        self.with_mut(|slot| *slot = value);
    }

    /// `&p.field`, given the projection onto that field.
    pub fn field<F: 'static>(&self, project: fn(&mut T) -> &mut F) -> Ptr<F> {
        if self.is_nil() {
            runtime_panic(RuntimeError::NilDereference);
        }
        Ptr::from_place(Field {
            parent: self.clone(),
            project,
        })
    }
}

impl<T: Clone + Default + Send + Sync + 'static, const N: usize> Ptr<GoArray<T, N>> {
    /// `&p[i]` for a pointer to an array.
    pub fn elem_ptr(&self, index: impl GoInt) -> Ptr<T> {
        let index = index.to_i64();
        if index < 0 || index >= N as i64 {
            runtime_panic(RuntimeError::Index(super::error::IndexError { index, len: N }));
        }
        Ptr::from_place(ArrayElem {
            parent: self.clone(),
            index: index as usize,
        })
    }
}

impl<T> Nilable for Ptr<T> {
    fn is_nil(&self) -> bool {
        self.place.is_none()
    }
}

/// Pointers are equal when they name the same location object.
impl<T> PartialEq for Ptr<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.place, &other.place) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.place {
            Some(place) => write!(f, "Ptr({:#x})", address_of(place)),
            None => write!(f, "Ptr(nil)"),
        }
    }
}

/// A package-level variable, lazily initialised on first access.
pub struct Global<T> {
    cell: OnceLock<Ptr<T>>,
    init: fn() -> T,
}

impl<T: Send + 'static> Global<T> {
    pub const fn new(init: fn() -> T) -> Self {
        Self {
            cell: OnceLock::new(),
            init,
        }
    }

    /// The variable's address.
    pub fn ptr(&self) -> Ptr<T> {
        self.cell.get_or_init(|| Ptr::new((self.init)())).clone()
    }
}
