//! Immutable byte strings with cheap clones and sharing substrings.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;
use std::sync::Arc;

use super::error::{IndexError, RuntimeError};
use super::panic::runtime_panic;
use super::value::GoInt;

#[derive(Clone)]
enum Repr {
    Static(&'static [u8]),
    Shared {
        data: Arc<[u8]>,
        start: usize,
        end: usize,
    },
}

/// A Go `string`: an immutable sequence of bytes, usually UTF-8.
#[derive(Clone)]
pub struct GoString {
    repr: Repr,
}

impl GoString {
    pub const fn from_static(s: &'static str) -> Self {
        Self {
            repr: Repr::Static(s.as_bytes()),
        }
    }

    pub const fn from_static_bytes(bytes: &'static [u8]) -> Self {
        Self {
            repr: Repr::Static(bytes),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            repr: Repr::Shared {
                data: Arc::from(bytes),
                start: 0,
                end: bytes.len(),
            },
        }
    }

    /// `string(r)` for a rune; invalid code points become U+FFFD.
    pub fn from_rune(rune: i32) -> Self {
        let c = u32::try_from(rune)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Self::from(c.to_string())
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.repr {
            Repr::Static(bytes) => bytes,
            Repr::Shared { data, start, end } => &data[*start..*end],
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn concat(&self, other: &GoString) -> GoString {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut bytes = Vec::with_capacity(self.len() + other.len());
        bytes.extend_from_slice(self.as_bytes());
        bytes.extend_from_slice(other.as_bytes());
        GoString::from(bytes)
    }

    pub fn byte_at(&self, index: i64) -> Result<u8, IndexError> {
        let bytes = self.as_bytes();
        usize::try_from(index)
            .ok()
            .and_then(|i| bytes.get(i).copied())
            .ok_or(IndexError {
                index,
                len: bytes.len(),
            })
    }

    /// `s[i]`; panics when out of range.
    pub fn at(&self, index: impl GoInt) -> u8 {
        self.byte_at(index.to_i64())
            .unwrap_or_else(|err| runtime_panic(err.into()))
    }

    /// `s[low:high]`. The result shares the backing bytes.
    pub fn substr(&self, low: Option<i64>, high: Option<i64>) -> Result<GoString, RuntimeError> {
        let len = self.len();
        let low_i = low.unwrap_or(0);
        let high_i = high.unwrap_or(len as i64);
        if low_i < 0 || high_i < low_i || high_i > len as i64 {
            return Err(RuntimeError::SliceBounds {
                low: low_i,
                high: high_i,
                cap: len,
            });
        }
        let (low, high) = (low_i as usize, high_i as usize);
        let repr = match &self.repr {
            Repr::Static(bytes) => Repr::Static(&bytes[low..high]),
            Repr::Shared { data, start, .. } => Repr::Shared {
                data: data.clone(),
                start: start + low,
                end: start + high,
            },
        };
        Ok(GoString { repr })
    }

    pub fn slice(&self, low: Option<i64>, high: Option<i64>) -> GoString {
        self.substr(low, high)
            .unwrap_or_else(|err| runtime_panic(err))
    }

    /// Decodes runes the way `for i, r := range s` does: every invalid byte
    /// yields U+FFFD with width one.
    pub fn runes(&self) -> Vec<(usize, i32)> {
        let mut out = Vec::new();
        let mut offset = 0;
        for chunk in self.as_bytes().utf8_chunks() {
            for (i, c) in chunk.valid().char_indices() {
                out.push((offset + i, c as i32));
            }
            offset += chunk.valid().len();
            for _ in chunk.invalid() {
                out.push((offset, char::REPLACEMENT_CHARACTER as i32));
                offset += 1;
            }
        }
        out
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl Default for GoString {
    fn default() -> Self {
        Self::from_static("")
    }
}

impl From<&str> for GoString {
    fn from(value: &str) -> Self {
        Self::from_bytes(value.as_bytes())
    }
}

impl From<String> for GoString {
    fn from(value: String) -> Self {
        Self::from(value.into_bytes())
    }
}

impl From<Vec<u8>> for GoString {
    fn from(value: Vec<u8>) -> Self {
        let end = value.len();
        Self {
            repr: Repr::Shared {
                data: Arc::from(value),
                start: 0,
                end,
            },
        }
    }
}

impl Add for GoString {
    type Output = GoString;

    fn add(self, rhs: GoString) -> GoString {
        self.concat(&rhs)
    }
}

impl Add<&GoString> for &GoString {
    type Output = GoString;

    fn add(self, rhs: &GoString) -> GoString {
        self.concat(rhs)
    }
}

impl PartialEq for GoString {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for GoString {}

impl PartialOrd for GoString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GoString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for GoString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Display for GoString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for GoString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_and_compare() {
        const HELLO: GoString = GoString::from_static("hello, ");
        let world = GoString::from("world");

        let joined = &HELLO + &world;
        assert_eq!(joined, GoString::from("hello, world"));
        assert_eq!(joined.len(), 12);
        assert!(HELLO < world);
    }

    #[test]
    fn substrings_share_bytes_and_check_bounds() {
        let s = GoString::from(String::from("gopher"));

        let sub = s.slice(Some(1), Some(4));
        assert_eq!(sub.to_string(), "oph");
        assert_eq!(sub.slice(Some(1), None).to_string(), "ph");
        assert_eq!(s.at(0usize), b'g');
        assert!(s.substr(Some(4), Some(2)).is_err());
        assert_eq!(s.byte_at(6), Err(IndexError { index: 6, len: 6 }));
    }

    #[test]
    fn runes_replace_invalid_bytes() {
        let s = GoString::from(vec![b'a', 0xff, 0xc3, 0xa9]);

        assert_eq!(s.runes(), vec![(0, 'a' as i32), (1, 0xfffd), (2, 0xe9)]);
        assert_eq!(GoString::from_rune(-1).to_string(), "\u{fffd}");
    }
}
