//! Maps and the iterator behind `range`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use super::error::RuntimeError;
use super::panic::runtime_panic;
use super::string::GoString;
use super::sync::lock_unpoisoned;
use super::value::Nilable;

/// A Go map `map[K]V`. The zero value is the nil map: it reads as empty
/// and panics on insertion.
pub struct GoMap<K, V> {
    table: Option<Arc<Mutex<HashMap<K, V>>>>,
}

impl<K, V> Clone for GoMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K, V> Default for GoMap<K, V> {
    fn default() -> Self {
        Self { table: None }
    }
}

impl<K: Eq + Hash + Clone, V: Clone + Default> GoMap<K, V> {
    pub fn nil() -> Self {
        Self::default()
    }

    /// `make(map[K]V)`.
    pub fn make() -> Self {
        Self {
            table: Some(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Some(Arc::new(Mutex::new(HashMap::with_capacity(capacity)))),
        }
    }

    pub fn is_nil(&self) -> bool {
        self.table.is_none()
    }

    pub fn len(&self) -> usize {
        self.table
            .as_ref()
            .map_or(0, |table| lock_unpoisoned(table).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `m[k]`: the zero value when absent.
    pub fn get(&self, key: &K) -> V {
        self.lookup(key).0
    }

    /// `v, ok := m[k]`.
    pub fn lookup(&self, key: &K) -> (V, bool) {
        let found = self
            .table
            .as_ref()
            .and_then(|table| lock_unpoisoned(table).get(key).cloned());
        match found {
            Some(value) => (value, true),
            None => (V::default(), false),
        }
    }

    pub fn try_insert(&self, key: K, value: V) -> Result<(), RuntimeError> {
        let table = self.table.as_ref().ok_or(RuntimeError::NilMapWrite)?;
        lock_unpoisoned(table).insert(key, value);
        Ok(())
    }

    /// `m[k] = v`.
    pub fn insert(&self, key: K, value: V) {
        if let Err(err) = self.try_insert(key, value) {
            runtime_panic(err);
        }
    }

    /// `delete(m, k)`; a no-op on nil maps.
    pub fn delete(&self, key: &K) {
        if let Some(table) = &self.table {
            lock_unpoisoned(table).remove(key);
        }
    }

    /// Entries at the time of the call, in unspecified order.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.table.as_ref().map_or_else(Vec::new, |table| {
            lock_unpoisoned(table)
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }
}

impl<K, V> Nilable for GoMap<K, V> {
    fn is_nil(&self) -> bool {
        self.table.is_none()
    }
}

impl<K: Eq + Hash + Clone + fmt::Debug, V: Clone + Default + fmt::Debug> fmt::Debug for GoMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            return write!(f, "GoMap(nil)");
        }
        f.debug_map().entries(self.snapshot()).finish()
    }
}

/// State of a `range` loop over a map or string.
pub struct GoIter<K, V> {
    items: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Default for GoIter<K, V> {
    fn default() -> Self {
        Self {
            items: Vec::new().into_iter(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone + Default> GoIter<K, V> {
    pub fn over_map(map: &GoMap<K, V>) -> Self {
        Self {
            items: map.snapshot().into_iter(),
        }
    }
}

impl GoIter<isize, i32> {
    /// Byte offsets and runes of `s`.
    pub fn over_string(s: &GoString) -> Self {
        let items: Vec<_> = s
            .runes()
            .into_iter()
            .map(|(i, r)| (i as isize, r))
            .collect();
        Self {
            items: items.into_iter(),
        }
    }
}

impl<K: Default, V: Default> GoIter<K, V> {
    /// `ok, k, v := next it`.
    pub fn next_entry(&mut self) -> (bool, K, V) {
        match self.items.next() {
            Some((k, v)) => (true, k, v),
            None => (false, K::default(), V::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_read_as_zero() {
        let m: GoMap<GoString, isize> = GoMap::make();
        m.insert(GoString::from("a"), 1);

        assert_eq!(m.get(&GoString::from("a")), 1);
        assert_eq!(m.lookup(&GoString::from("b")), (0, false));
        m.delete(&GoString::from("a"));
        assert!(m.is_empty());
    }

    #[test]
    fn nil_map_reads_but_rejects_writes() {
        let m: GoMap<isize, isize> = GoMap::nil();

        assert_eq!(m.get(&1), 0);
        assert_eq!(m.len(), 0);
        assert_eq!(m.try_insert(1, 1), Err(RuntimeError::NilMapWrite));
        m.delete(&1);
    }

    #[test]
    fn clones_share_entries() {
        let m: GoMap<isize, bool> = GoMap::make();
        let alias = m.clone();
        alias.insert(3, true);

        assert!(m.get(&3));
    }

    #[test]
    fn range_over_map_and_string() {
        let m: GoMap<isize, isize> = GoMap::make();
        m.insert(1, 10);
        m.insert(2, 20);
        let mut it = GoIter::over_map(&m);
        let mut total = 0;
        loop {
            let (ok, k, v) = it.next_entry();
            if !ok {
                break;
            }
            total += k * v;
        }
        assert_eq!(total, 50);

        let mut it = GoIter::over_string(&GoString::from("hé"));
        assert_eq!(it.next_entry(), (true, 0, 'h' as i32));
        assert_eq!(it.next_entry(), (true, 1, 'é' as i32));
        assert_eq!(it.next_entry(), (false, 0, 0));
    }
}
