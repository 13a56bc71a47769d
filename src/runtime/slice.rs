//! Slices: windows onto a shared, growable backing array.

use std::fmt;
use std::sync::{Arc, Mutex};

use super::error::{IndexError, RuntimeError, address_of};
use super::panic::runtime_panic;
use super::ptr::{Place, Ptr};
use super::sync::lock_unpoisoned;
use super::value::{GoInt, Nilable};

type Backing<T> = Arc<Mutex<Vec<T>>>;

/// A Go slice `[]T`.
///
/// The backing vector's length is the slice capacity measured from offset
/// zero; slots past `len` hold zero values. Cloning copies the header, so
/// clones observe each other's element writes.
pub struct GoSlice<T> {
    backing: Option<Backing<T>>,
    offset: usize,
    len: usize,
    cap: usize,
}

impl<T> Clone for GoSlice<T> {
    fn clone(&self) -> Self {
        Self {
            backing: self.backing.clone(),
            offset: self.offset,
            len: self.len,
            cap: self.cap,
        }
    }
}

impl<T> Default for GoSlice<T> {
    fn default() -> Self {
        Self {
            backing: None,
            offset: 0,
            len: 0,
            cap: 0,
        }
    }
}

impl<T: Clone + Default> GoSlice<T> {
    pub fn nil() -> Self {
        Self::default()
    }

    /// `make([]T, len, cap)`.
    pub fn make(len: impl GoInt, cap: impl GoInt) -> Self {
        let (len, cap) = (len.to_i64(), cap.to_i64());
        if len < 0 || cap < len {
            runtime_panic(RuntimeError::MakeSlice { len, cap });
        }
        Self::with_backing(vec![T::default(); cap as usize], len as usize)
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        let len = items.len();
        Self::with_backing(items, len)
    }

    fn with_backing(items: Vec<T>, len: usize) -> Self {
        let cap = items.len();
        Self {
            backing: Some(Arc::new(Mutex::new(items))),
            offset: 0,
            len,
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_nil(&self) -> bool {
        self.backing.is_none()
    }

    fn checked(&self, index: i64) -> Result<(&Backing<T>, usize), IndexError> {
        let err = IndexError {
            index,
            len: self.len,
        };
        let i = usize::try_from(index).map_err(|_| err.clone())?;
        match &self.backing {
            Some(backing) if i < self.len => Ok((backing, self.offset + i)),
            _ => Err(err),
        }
    }

    pub fn get(&self, index: i64) -> Result<T, IndexError> {
        let (backing, i) = self.checked(index)?;
        Ok(lock_unpoisoned(backing)[i].clone())
    }

    pub fn set(&self, index: i64, value: T) -> Result<(), IndexError> {
        let (backing, i) = self.checked(index)?;
        lock_unpoisoned(backing)[i] = value;
        Ok(())
    }

    /// `s[i]`; panics when out of range.
    pub fn at(&self, index: impl GoInt) -> T {
        self.get(index.to_i64())
            .unwrap_or_else(|err| runtime_panic(err.into()))
    }

    /// `s[i] = value`; panics when out of range.
    pub fn put(&self, index: impl GoInt, value: T) {
        if let Err(err) = self.set(index.to_i64(), value) {
            runtime_panic(err.into());
        }
    }

    /// `append(s, value)`. Writes in place while there is spare capacity,
    /// otherwise copies into a new backing array of twice the capacity.
    pub fn append(&self, value: T) -> GoSlice<T> {
        if let Some(backing) = &self.backing
            && self.len < self.cap
        {
            lock_unpoisoned(backing)[self.offset + self.len] = value;
            return GoSlice {
                backing: Some(backing.clone()),
                offset: self.offset,
                len: self.len + 1,
                cap: self.cap,
            };
        }

        let new_cap = (self.cap * 2).max(1);
        let mut items = Vec::with_capacity(new_cap);
        items.extend(self.to_vec());
        items.push(value);
        items.resize(new_cap, T::default());
        Self::with_backing(items, self.len + 1)
    }

    /// `append(s, other...)`.
    pub fn append_slice(&self, other: &GoSlice<T>) -> GoSlice<T> {
        other
            .to_vec()
            .into_iter()
            .fold(self.clone(), |acc, value| acc.append(value))
    }

    /// `s[low:high:max]`. The result shares the backing array.
    pub fn reslice(
        &self,
        low: Option<i64>,
        high: Option<i64>,
        max: Option<i64>,
    ) -> Result<GoSlice<T>, RuntimeError> {
        let low = low.unwrap_or(0);
        let high = high.unwrap_or(self.len as i64);
        let max = max.unwrap_or(self.cap as i64);
        if low < 0 || high < low || max < high || max > self.cap as i64 {
            return Err(RuntimeError::SliceBounds {
                low,
                high,
                cap: self.cap,
            });
        }
        Ok(GoSlice {
            backing: self.backing.clone(),
            offset: self.offset + low as usize,
            len: (high - low) as usize,
            cap: (max - low) as usize,
        })
    }

    pub fn slice(&self, low: Option<i64>, high: Option<i64>) -> GoSlice<T> {
        self.reslice(low, high, None)
            .unwrap_or_else(|err| runtime_panic(err))
    }

    pub fn slice_cap(&self, low: Option<i64>, high: Option<i64>, max: Option<i64>) -> GoSlice<T> {
        self.reslice(low, high, max)
            .unwrap_or_else(|err| runtime_panic(err))
    }

    /// `copy(dst, src)`; returns the number of elements copied.
    pub fn copy_from(&self, src: &GoSlice<T>) -> usize {
        let items = src.to_vec();
        let n = items.len().min(self.len);
        if let Some(backing) = &self.backing {
            let mut dst = lock_unpoisoned(backing);
            for (i, value) in items.into_iter().take(n).enumerate() {
                dst[self.offset + i] = value;
            }
        }
        n
    }

    pub fn to_vec(&self) -> Vec<T> {
        match &self.backing {
            Some(backing) => {
                lock_unpoisoned(backing)[self.offset..self.offset + self.len].to_vec()
            }
            None => Vec::new(),
        }
    }
}

struct SliceElem<T> {
    backing: Backing<T>,
    index: usize,
}

impl<T: Send> Place<T> for SliceElem<T> {
    fn with(&self, f: &mut dyn FnMut(&mut T)) {
        f(&mut lock_unpoisoned(&self.backing)[self.index]);
    }
}

impl<T: Clone + Default + Send + 'static> GoSlice<T> {
    /// `&s[i]`.
    pub fn elem_ptr(&self, index: impl GoInt) -> Ptr<T> {
        match self.checked(index.to_i64()) {
            Ok((backing, i)) => Ptr::from_place(SliceElem {
                backing: backing.clone(),
                index: i,
            }),
            Err(err) => runtime_panic(err.into()),
        }
    }
}

impl<T> Nilable for GoSlice<T> {
    fn is_nil(&self) -> bool {
        self.backing.is_none()
    }
}

impl<T: Clone + Default + fmt::Debug> fmt::Debug for GoSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backing {
            Some(backing) => write!(f, "GoSlice@{:#x}{:?}", address_of(backing), self.to_vec()),
            None => write!(f, "GoSlice(nil)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::super::panic::{install_panic_hook, payload_message};
    use super::*;

    #[test]
    fn append_doubles_capacity() {
        let mut s: GoSlice<isize> = GoSlice::nil();
        let mut caps = Vec::new();
        for i in 0..5 {
            s = s.append(i);
            caps.push(s.cap());
        }

        assert_eq!(caps, vec![1, 2, 4, 4, 8]);
        assert_eq!(s.to_vec(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn append_within_capacity_is_visible_through_aliases() {
        let base: GoSlice<u8> = GoSlice::make(2usize, 4usize);
        let head = base.slice(None, Some(1));
        let grown = head.append(7);

        assert_eq!(base.at(1usize), 7);
        assert_eq!(grown.len(), 2);
        assert_eq!(grown.cap(), 4);
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let s = GoSlice::from_vec(vec![1, 2, 3]);

        assert_eq!(s.get(3), Err(IndexError { index: 3, len: 3 }));
        assert_eq!(s.get(-1), Err(IndexError { index: -1, len: 3 }));
        assert!(s.reslice(Some(2), Some(1), None).is_err());
    }

    #[test]
    fn element_pointers_write_through() {
        let s = GoSlice::from_vec(vec![1, 2, 3]);
        let p = s.elem_ptr(1usize);

        p.set(20);
        assert_eq!(s.to_vec(), vec![1, 20, 3]);
    }

    #[test]
    fn make_rejects_capacity_below_length() {
        install_panic_hook();
        let outcome = panic::catch_unwind(|| GoSlice::<u8>::make(3usize, 2usize));

        let payload = outcome.map(|s| s.len()).unwrap_err();
        assert_eq!(
            payload_message(&*payload),
            "runtime error: makeslice: len 3 cap 2 out of range"
        );
    }

    #[test]
    fn copy_stops_at_shorter_length() {
        let dst: GoSlice<i32> = GoSlice::make(2usize, 2usize);
        let src = GoSlice::from_vec(vec![9, 8, 7]);

        assert_eq!(dst.copy_from(&src), 2);
        assert_eq!(dst.to_vec(), vec![9, 8]);
    }
}
