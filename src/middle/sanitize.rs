//! Turning Go names and type spellings into Rust identifiers.

use hashbrown::HashSet;
use once_cell::sync::Lazy;
use unicode_ident::{is_xid_continue, is_xid_start};

/// Strict, reserved and weak keywords, plus the bare underscore.
static RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "_", "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
        "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
        "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
        "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do",
        "final", "gen", "macro", "override", "priv", "try", "typeof", "unsized", "virtual",
        "yield", "macro_rules", "raw", "safe", "union",
    ]
    .into_iter()
    .collect()
});

pub const BLANK: &str = "_blank";

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(name)
}

/// Maps any Go name or type spelling to a valid Rust identifier.
///
/// `sanitize(sanitize(x)) == sanitize(x)` for every input.
pub fn sanitize(name: &str) -> String {
    if name.is_empty() {
        return BLANK.to_string();
    }

    let name = name.replace("[]", "_").replace("()", "_");
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '*' => out.push_str("ptr_"),
            c if is_xid_continue(c) => out.push(c),
            _ => out.push('_'),
        }
    }

    if out.starts_with(|c: char| !is_xid_start(c) && c != '_') {
        out.insert(0, '_');
    }
    if is_reserved(&out) {
        out.push('_');
    }
    out
}

/// `RLock` -> `r_lock`, `Do` -> `do_`; for calling methods of runtime types.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let after_lower = i > 0 && !chars[i - 1].is_uppercase() && chars[i - 1] != '_';
            let acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if after_lower || acronym_end {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    sanitize(&out)
}
