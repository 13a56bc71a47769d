//! Small value types: function values, fixed arrays, complex numbers and
//! the traits generated code leans on for indices and nil checks.

use std::fmt;
use std::ops::{Add, Deref, Mul, Neg, Sub};
use std::sync::Arc;

use super::error::{IndexError, RuntimeError};
use super::panic::runtime_panic;

/// Go's `uintptr`, kept apart from `uint` in generated signatures.
pub type GoUintptr = usize;

/// Integer types usable as an index, length or bound.
pub trait GoInt: Copy {
    fn to_i64(self) -> i64;
}

macro_rules! impl_go_int {
    ($($t:ty),*) => {
        $(
            impl GoInt for $t {
                fn to_i64(self) -> i64 {
                    self as i64
                }
            }
        )*
    };
}

impl_go_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Values with a nil state.
pub trait Nilable {
    fn is_nil(&self) -> bool;
}

/// A Go function value. `F` is a `dyn Fn(..) -> R + Send + Sync`.
pub struct GoFunc<F: ?Sized>(Option<Arc<F>>);

impl<F: ?Sized> GoFunc<F> {
    pub fn from_arc(f: Arc<F>) -> Self {
        Self(Some(f))
    }

    pub fn nil() -> Self {
        Self(None)
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }
}

impl<F: ?Sized> Clone for GoFunc<F> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<F: ?Sized> Default for GoFunc<F> {
    fn default() -> Self {
        Self(None)
    }
}

/// Calling a nil function value panics.
impl<F: ?Sized> Deref for GoFunc<F> {
    type Target = F;

    fn deref(&self) -> &F {
        match &self.0 {
            Some(f) => f,
            None => runtime_panic(RuntimeError::NilFuncCall),
        }
    }
}

impl<F: ?Sized> Nilable for GoFunc<F> {
    fn is_nil(&self) -> bool {
        self.0.is_none()
    }
}

impl<F: ?Sized> fmt::Debug for GoFunc<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "GoFunc(nil)")
        } else {
            write!(f, "GoFunc(..)")
        }
    }
}

/// A Go array `[N]T`. Arrays are values; cloning copies the elements.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct GoArray<T, const N: usize>(Vec<T>);

impl<T: Clone + Default, const N: usize> Default for GoArray<T, N> {
    fn default() -> Self {
        Self(vec![T::default(); N])
    }
}

impl<T: Clone + Default, const N: usize> GoArray<T, N> {
    /// Builds an array from the given prefix, padding with zero values.
    pub fn from_vec(mut items: Vec<T>) -> Self {
        items.resize(N, T::default());
        Self(items)
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn get(&self, index: i64) -> Result<T, IndexError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.0.get(i).cloned())
            .ok_or(IndexError { index, len: N })
    }

    pub fn set(&mut self, index: i64, value: T) -> Result<(), IndexError> {
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| self.0.get_mut(i))
            .ok_or(IndexError { index, len: N })?;
        *slot = value;
        Ok(())
    }

    pub fn at(&self, index: impl GoInt) -> T {
        self.get(index.to_i64())
            .unwrap_or_else(|err| runtime_panic(err.into()))
    }

    pub(super) fn slot(&mut self, index: usize) -> &mut T {
        let len = self.0.len();
        match self.0.get_mut(index) {
            Some(slot) => slot,
            None => runtime_panic(
                IndexError {
                    index: index as i64,
                    len,
                }
                .into(),
            ),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

macro_rules! complex_type {
    ($name:ident, $f:ty) => {
        #[derive(Clone, Copy, Default, PartialEq, Debug)]
        pub struct $name {
            pub re: $f,
            pub im: $f,
        }

        impl $name {
            pub const fn new(re: $f, im: $f) -> Self {
                Self { re, im }
            }
        }

        impl Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self::new(self.re + rhs.re, self.im + rhs.im)
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self::new(self.re - rhs.re, self.im - rhs.im)
            }
        }

        impl Mul for $name {
            type Output = Self;

            fn mul(self, rhs: Self) -> Self {
                Self::new(
                    self.re * rhs.re - self.im * rhs.im,
                    self.re * rhs.im + self.im * rhs.re,
                )
            }
        }

        impl Neg for $name {
            type Output = Self;

            fn neg(self) -> Self {
                Self::new(-self.re, -self.im)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "({:+e}{:+e}i)", self.re, self.im)
            }
        }
    };
}

complex_type!(Complex64, f32);
complex_type!(Complex128, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_are_zero_filled_values() {
        let mut a: GoArray<isize, 3> = GoArray::default();
        let b = a.clone();

        a.set(1, 9).unwrap();
        assert_eq!(a.as_slice(), &[0, 9, 0]);
        assert_eq!(b.as_slice(), &[0, 0, 0]);
        assert_eq!(a.get(3), Err(IndexError { index: 3, len: 3 }));
        assert_eq!(GoArray::<u8, 2>::from_vec(vec![7]).as_slice(), &[7, 0]);
    }

    #[test]
    fn function_values_call_through() {
        let double: GoFunc<dyn Fn(isize) -> isize + Send + Sync> =
            GoFunc::from_arc(Arc::new(|x: isize| x * 2) as Arc<dyn Fn(isize) -> isize + Send + Sync>);

        assert_eq!(double(21), 42);
        assert!(GoFunc::<dyn Fn() + Send + Sync>::default().is_nil());
    }

    #[test]
    fn complex_multiplication() {
        let i = Complex128::new(0.0, 1.0);
        assert_eq!(i * i, Complex128::new(-1.0, 0.0));
    }
}
