//! Rust expressions for SSA operands that are not instruction results:
//! constant literals and the text forms Go uses for them.

use std::fmt::Write;

use crate::middle::{
    primitive::PrimitiveKind,
    ty::{GoType, TypeEnv},
};

use super::types::render_type;

/// A rendered operand.
#[derive(Debug, Clone)]
pub struct Operand {
    pub expr: String,
    pub ty: GoType,
    /// The Go spelling of `ty`, used as the dynamic type tag.
    pub descriptor: String,
    /// Reads of places (named values) clone unless the type is `Copy`;
    /// temporaries are moved.
    pub is_place: bool,
}

impl Operand {
    pub fn place(expr: impl Into<String>, descriptor: &str) -> Self {
        Self {
            expr: expr.into(),
            ty: GoType::parse(descriptor),
            descriptor: descriptor.to_string(),
            is_place: true,
        }
    }

    pub fn temporary(expr: impl Into<String>, descriptor: &str) -> Self {
        Self {
            is_place: false,
            ..Self::place(expr, descriptor)
        }
    }

    /// The operand as an owned value.
    pub fn owned(&self, env: &TypeEnv, package: &str) -> String {
        if self.is_place && !env.is_copy(&self.ty, package) {
            format!("{}.clone()", self.expr)
        } else {
            self.expr.clone()
        }
    }

    /// The operand as something that can be borrowed or have methods
    /// called on it.
    pub fn borrowed(&self) -> String {
        if self.is_place || is_simple(&self.expr) {
            self.expr.clone()
        } else {
            format!("({})", self.expr)
        }
    }

    pub fn is_nil_constant(&self) -> bool {
        !self.is_place && self.expr.ends_with(">::default()")
    }
}

/// Paths, calls and method chains; byte string contents are not inspected.
fn is_simple(expr: &str) -> bool {
    if expr.starts_with(['(', '-']) {
        return false;
    }
    let mut in_string = false;
    let mut escaped = false;
    for c in expr.chars() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c.is_alphanumeric() => {}
            '_' | '.' | '(' | ')' | ':' | '<' | '>' | ',' => {}
            _ => return false,
        }
    }
    true
}

/// Splits `literal:type`. The type never contains `:`, the literal may.
pub fn split_constant(name: &str) -> Option<(&str, &str)> {
    let (literal, ty) = name.rsplit_once(':')?;
    (!literal.is_empty() && !ty.is_empty()).then_some((literal, ty))
}

/// Why a constant could not be rendered faithfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantIssue {
    /// The value is not valid Go constant syntax for its type.
    Malformed,
    /// The SSA printer shortens long strings to 17 bytes and `...`.
    PossiblyTruncated,
}

/// A Go constant as a Rust expression of the mapped type.
pub fn render_constant(
    literal: &str,
    ty: &GoType,
    env: &TypeEnv,
    package: &str,
) -> (String, Option<ConstantIssue>) {
    let rust_ty = render_type(ty);
    if literal == "nil" {
        return (format!("<{rust_ty}>::default()"), None);
    }

    let Some(kind) = env.primitive_of(ty, package) else {
        return (
            format!("<{rust_ty}>::default()"),
            Some(ConstantIssue::Malformed),
        );
    };

    match kind {
        PrimitiveKind::Bool => match literal {
            "true" | "false" => (literal.to_string(), None),
            _ => ("false".to_string(), Some(ConstantIssue::Malformed)),
        },
        PrimitiveKind::String => match unquote(literal) {
            Some(bytes) => {
                let issue = (bytes.len() == 20 && bytes.ends_with(b"..."))
                    .then_some(ConstantIssue::PossiblyTruncated);
                (string_literal(&bytes), issue)
            }
            None => (string_literal(&[]), Some(ConstantIssue::Malformed)),
        },
        PrimitiveKind::Complex64 | PrimitiveKind::Complex128 => match parse_complex(literal) {
            Some((re, im)) => {
                let part = if kind == PrimitiveKind::Complex64 { "f32" } else { "f64" };
                (
                    format!(
                        "{kind}::new({}, {})",
                        float_literal(&re, part),
                        float_literal(&im, part)
                    ),
                    None,
                )
            }
            None => (format!("{kind}::default()"), Some(ConstantIssue::Malformed)),
        },
        kind if kind.is_float() => {
            let suffix = kind.literal_suffix().unwrap_or_default();
            if literal.parse::<f64>().is_ok() {
                (float_literal(literal, &suffix), None)
            } else {
                (format!("0{suffix}"), Some(ConstantIssue::Malformed))
            }
        }
        kind => {
            let suffix = kind.literal_suffix().unwrap_or_default();
            let valid = literal
                .strip_prefix('-')
                .unwrap_or(literal)
                .chars()
                .all(|c| c.is_ascii_digit())
                && !literal.is_empty();
            if !valid {
                return (format!("0{suffix}"), Some(ConstantIssue::Malformed));
            }
            match literal.strip_prefix('-') {
                Some(_) => (format!("({literal}{suffix})"), None),
                None => (format!("{literal}{suffix}"), None),
            }
        }
    }
}

/// `1e+06` and `3` both become valid Rust float literals.
fn float_literal(literal: &str, suffix: &str) -> String {
    let literal = literal.trim();
    let body = literal.strip_prefix('-').unwrap_or(literal);
    let body = if body.contains(['.', 'e', 'E']) {
        body.to_string()
    } else {
        format!("{body}.0")
    };
    let body = body.replace("e+", "e");
    if literal.starts_with('-') {
        format!("(-{body}{suffix})")
    } else {
        format!("{body}{suffix}")
    }
}

/// `(1 + 2i)`
fn parse_complex(literal: &str) -> Option<(String, String)> {
    let inner = literal.trim().strip_prefix('(')?.strip_suffix(')')?;
    let inner = inner.strip_suffix('i')?;
    // The separator is the last sign that does not belong to an exponent.
    let bytes = inner.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'))?;
    let re = inner[..split].trim().to_string();
    let im = inner[split..].replace(' ', "");
    let im = im.strip_prefix('+').unwrap_or(&im).to_string();
    (re.parse::<f64>().is_ok() && im.parse::<f64>().is_ok()).then_some((re, im))
}

/// `GoString::from_static_bytes(b"...")`
pub fn string_literal(bytes: &[u8]) -> String {
    let mut out = String::from("GoString::from_static_bytes(b\"");
    for &byte in bytes {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push_str("\")");
    out
}

/// The bytes of a Go string literal, interpreted or raw.
pub fn unquote(literal: &str) -> Option<Vec<u8>> {
    if let Some(raw) = literal.strip_prefix('`').and_then(|l| l.strip_suffix('`')) {
        return Some(raw.replace('\r', "").into_bytes());
    }
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;

    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next()? {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            'x' => out.push(hex_digits(&mut chars, 2)? as u8),
            'u' => push_char(&mut out, hex_digits(&mut chars, 4)?)?,
            'U' => push_char(&mut out, hex_digits(&mut chars, 8)?)?,
            first @ '0'..='7' => {
                let mut value = first.to_digit(8)?;
                for _ in 0..2 {
                    value = value * 8 + chars.next()?.to_digit(8)?;
                }
                out.push(u8::try_from(value).ok()?);
            }
            _ => return None,
        }
    }
    Some(out)
}

fn hex_digits(chars: &mut std::str::Chars<'_>, count: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

fn push_char(out: &mut Vec<u8>, code: u32) -> Option<()> {
    let c = char::from_u32(code)?;
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(literal: &str, ty: &str) -> (String, Option<ConstantIssue>) {
        render_constant(literal, &GoType::parse(ty), &TypeEnv::default(), "main")
    }

    #[test]
    fn split_at_last_colon() {
        assert_eq!(split_constant("1:int"), Some(("1", "int")));
        assert_eq!(split_constant("\"a:b\":string"), Some(("\"a:b\"", "string")));
        assert_eq!(split_constant("t0"), None);
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(constant("42", "int").0, "42isize");
        assert_eq!(constant("-1", "int64").0, "(-1i64)");
        assert_eq!(constant("255", "byte").0, "255u8");
        assert_eq!(constant("8", "uintptr").0, "8usize");
        assert_eq!(constant("1e+06", "float64").0, "1e06f64");
        assert_eq!(constant("3", "float32").0, "3.0f32");
        assert_eq!(constant("(1 + 2i)", "complex128").0, "Complex128::new(1.0f64, 2.0f64)");
        assert_eq!(constant("true", "bool").0, "true");
    }

    #[test]
    fn nil_is_the_zero_value() {
        assert_eq!(constant("nil", "*main.Node").0, "<Ptr<main_Node>>::default()");
        assert_eq!(constant("nil", "error").0, "<GoError>::default()");
    }

    #[test]
    fn strings() {
        assert_eq!(
            constant("\"hi\\n\"", "string").0,
            "GoString::from_static_bytes(b\"hi\\n\")"
        );
        assert_eq!(
            constant("\"é\"", "string").0,
            "GoString::from_static_bytes(b\"\\xc3\\xa9\")"
        );
        assert_eq!(
            constant("\"0123456789abcdef0...\"", "string").1,
            Some(ConstantIssue::PossiblyTruncated)
        );
        assert_eq!(constant("oops", "string").1, Some(ConstantIssue::Malformed));
    }

    #[test]
    fn go_escapes() {
        assert_eq!(unquote(r#""\x41\101é""#), Some(b"AA\xc3\xa9".to_vec()));
        assert_eq!(unquote("`a\\n`"), Some(b"a\\n".to_vec()));
        assert_eq!(unquote(r#""\q""#), None);
    }

    #[test]
    fn operands_clone_only_non_copy_places() {
        let env = TypeEnv::default();

        assert_eq!(Operand::place("t0", "string").owned(&env, "main"), "t0.clone()");
        assert_eq!(Operand::place("t1", "int").owned(&env, "main"), "t1");
        assert_eq!(
            Operand::temporary("x.get()", "string").owned(&env, "main"),
            "x.get()"
        );
    }
}
