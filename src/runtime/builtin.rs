//! Go builtins that are generic over their operand: `len`, `cap`, `copy`,
//! conversions, `print`/`println`, `min` and `max`.

use std::io::Write;

use super::chan::Chan;
use super::error::GoError;
use super::iface::Iface;
use super::map::GoMap;
use super::ptr::Ptr;
use super::slice::GoSlice;
use super::string::GoString;
use super::value::{Complex64, Complex128, GoArray};

pub trait GoLen {
    fn go_len(&self) -> isize;
}

pub trait GoCap {
    fn go_cap(&self) -> isize;
}

impl GoLen for GoString {
    fn go_len(&self) -> isize {
        self.len() as isize
    }
}

impl<T: Clone + Default> GoLen for GoSlice<T> {
    fn go_len(&self) -> isize {
        self.len() as isize
    }
}

impl<T: Clone + Default> GoCap for GoSlice<T> {
    fn go_cap(&self) -> isize {
        self.cap() as isize
    }
}

impl<K: Eq + std::hash::Hash + Clone, V: Clone + Default> GoLen for GoMap<K, V> {
    fn go_len(&self) -> isize {
        self.len() as isize
    }
}

impl<T: Default> GoLen for Chan<T> {
    fn go_len(&self) -> isize {
        self.len() as isize
    }
}

impl<T: Default> GoCap for Chan<T> {
    fn go_cap(&self) -> isize {
        self.cap() as isize
    }
}

impl<T, const N: usize> GoLen for GoArray<T, N> {
    fn go_len(&self) -> isize {
        N as isize
    }
}

impl<T, const N: usize> GoCap for GoArray<T, N> {
    fn go_cap(&self) -> isize {
        N as isize
    }
}

/// `len(p)` for a pointer to an array does not dereference `p`.
impl<T, const N: usize> GoLen for Ptr<GoArray<T, N>> {
    fn go_len(&self) -> isize {
        N as isize
    }
}

pub fn go_len<T: GoLen + ?Sized>(value: &T) -> isize {
    value.go_len()
}

pub fn go_cap<T: GoCap + ?Sized>(value: &T) -> isize {
    value.go_cap()
}

/// `copy(dst, src)`.
pub fn go_copy<T: Clone + Default>(dst: &GoSlice<T>, src: &GoSlice<T>) -> isize {
    dst.copy_from(src) as isize
}

/// `copy(dst, s)` from a string into a byte slice.
pub fn go_copy_str(dst: &GoSlice<u8>, src: &GoString) -> isize {
    dst.copy_from(&GoSlice::from_vec(src.as_bytes().to_vec())) as isize
}

/// `append(b, s...)` for a string operand.
pub fn go_append_str(dst: &GoSlice<u8>, src: &GoString) -> GoSlice<u8> {
    dst.append_slice(&GoSlice::from_vec(src.as_bytes().to_vec()))
}

/// Go's explicit conversion `T(x)`.
pub trait GoConvert<T> {
    fn go_convert(self) -> T;
}

pub fn go_convert<T, U: GoConvert<T>>(value: U) -> T {
    value.go_convert()
}

macro_rules! convert_numeric {
    (@from $from:ty => $($to:ty),*) => {
        $(
            impl GoConvert<$to> for $from {
                fn go_convert(self) -> $to {
                    self as $to
                }
            }
        )*
    };
    ($($from:ty),*) => {
        $(
            convert_numeric!(@from $from => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
        )*
    };
}

convert_numeric!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl GoConvert<GoString> for GoString {
    fn go_convert(self) -> GoString {
        self
    }
}

impl GoConvert<GoString> for GoSlice<u8> {
    fn go_convert(self) -> GoString {
        GoString::from(self.to_vec())
    }
}

impl GoConvert<GoSlice<u8>> for GoString {
    fn go_convert(self) -> GoSlice<u8> {
        GoSlice::from_vec(self.as_bytes().to_vec())
    }
}

impl GoConvert<GoString> for GoSlice<i32> {
    fn go_convert(self) -> GoString {
        let text: String = self
            .to_vec()
            .into_iter()
            .map(|r| GoString::from_rune(r).to_string())
            .collect();
        GoString::from(text)
    }
}

impl GoConvert<GoSlice<i32>> for GoString {
    fn go_convert(self) -> GoSlice<i32> {
        GoSlice::from_vec(self.runes().into_iter().map(|(_, r)| r).collect())
    }
}

macro_rules! convert_rune_to_string {
    ($($from:ty),*) => {
        $(
            impl GoConvert<GoString> for $from {
                fn go_convert(self) -> GoString {
                    GoString::from_rune(self as i32)
                }
            }
        )*
    };
}

convert_rune_to_string!(i32, u8, isize, i64);

/// How `print` and `println` render a value.
pub trait GoFormat {
    fn go_format(&self) -> String;
}

macro_rules! format_display {
    ($($t:ty),*) => {
        $(
            impl GoFormat for $t {
                fn go_format(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

format_display!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, GoString, GoError, Complex64,
    Complex128
);

impl GoFormat for f64 {
    fn go_format(&self) -> String {
        format!("{self:+e}")
    }
}

impl GoFormat for f32 {
    fn go_format(&self) -> String {
        format!("{self:+e}")
    }
}

impl GoFormat for Iface {
    fn go_format(&self) -> String {
        match self.type_tag() {
            Some(tag) => format!("({tag}) {}", self.error_string()),
            None => "(0x0,0x0)".to_string(),
        }
    }
}

impl<T: 'static> GoFormat for Ptr<T> {
    fn go_format(&self) -> String {
        if self.is_nil() {
            "0x0".to_string()
        } else {
            format!("{self:?}")
        }
    }
}

impl<T: Clone + Default> GoFormat for GoSlice<T> {
    fn go_format(&self) -> String {
        format!("[{}/{}]", self.len(), self.cap())
    }
}

impl GoFormat for () {
    fn go_format(&self) -> String {
        String::new()
    }
}

fn write_stderr(text: &str) {
    let _ = std::io::stderr().lock().write_all(text.as_bytes());
}

/// `print(args...)`; writes to standard error like Go.
pub fn go_print(args: &[&dyn GoFormat]) {
    let text: String = args.iter().map(|arg| arg.go_format()).collect();
    write_stderr(&text);
}

/// `println(args...)`.
pub fn go_println(args: &[&dyn GoFormat]) {
    let text = args
        .iter()
        .map(|arg| arg.go_format())
        .collect::<Vec<_>>()
        .join(" ");
    write_stderr(&format!("{text}\n"));
}

pub fn go_min<T: PartialOrd>(a: T, b: T) -> T {
    if b < a { b } else { a }
}

pub fn go_max<T: PartialOrd>(a: T, b: T) -> T {
    if b > a { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_and_cap_dispatch_on_type() {
        let s: GoSlice<u8> = GoSlice::make(2usize, 5usize);
        let a: GoArray<i32, 4> = GoArray::default();

        assert_eq!(go_len(&s), 2);
        assert_eq!(go_cap(&s), 5);
        assert_eq!(go_len(&a), 4);
        assert_eq!(go_len(&GoString::from("héllo")), 6);
        assert_eq!(go_len(&GoMap::<isize, isize>::nil()), 0);
    }

    #[test]
    fn numeric_conversions_truncate_like_go() {
        let x: u8 = go_convert(300i32);
        let y: isize = go_convert(-2.9f64);

        assert_eq!(x, 44);
        assert_eq!(y, -2);
    }

    #[test]
    fn string_conversions() {
        let bytes: GoSlice<u8> = go_convert(GoString::from("go"));
        let back: GoString = go_convert(bytes.clone());
        let rune: GoString = go_convert(0x4e16i32);

        assert_eq!(bytes.to_vec(), b"go".to_vec());
        assert_eq!(back, GoString::from("go"));
        assert_eq!(rune.to_string(), "世");
    }

    #[test]
    fn min_max() {
        assert_eq!(go_min(3, 1), 1);
        assert_eq!(go_max(GoString::from("a"), GoString::from("b")), GoString::from("b"));
        assert_eq!(1i32.go_format(), "1");
        assert_eq!(true.go_format(), "true");
    }
}
