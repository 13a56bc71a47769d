//! Go type descriptors as written by `types.TypeString`.
//!
//! Parsing never fails: shapes that are not understood are kept as
//! [`GoType::Unknown`] and rendered as a sanitized identifier.

use std::str::FromStr;

use hashbrown::HashMap;

use crate::{
    frontend::ir::{HybridIr, TypeKind},
    middle::primitive::PrimitiveKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Recv,
    Send,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    pub params: Vec<GoType>,
    pub results: Vec<GoType>,
}

/// A defined type, `path.Name` or, when written relative to its own
/// package, just `Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedType {
    pub package: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GoType {
    Primitive(PrimitiveKind),
    /// The predeclared `error` interface.
    Error,
    /// `interface{}` and `any`.
    Any,
    /// An anonymous interface with methods.
    Interface,
    /// `struct{}`.
    EmptyStruct,
    Pointer(Box<GoType>),
    Slice(Box<GoType>),
    Array(usize, Box<GoType>),
    Map(Box<GoType>, Box<GoType>),
    Chan(ChanDir, Box<GoType>),
    Func(FuncType),
    Tuple(Vec<GoType>),
    Named(NamedType),
    /// The iterator a `range` instruction produces over a map or string.
    Iter(Box<GoType>, Box<GoType>),
    Unknown(String),
}

impl GoType {
    pub fn parse(descriptor: &str) -> GoType {
        let s = descriptor.trim();

        if let Some(elem) = s.strip_prefix('*') {
            return GoType::Pointer(Box::new(GoType::parse(elem)));
        }
        if let Some(elem) = s.strip_prefix("[]") {
            return GoType::Slice(Box::new(GoType::parse(elem)));
        }
        if let Some(rest) = s.strip_prefix('[') {
            if let Some((len, elem)) = rest.split_once(']') {
                if let Ok(len) = len.parse::<usize>() {
                    return GoType::Array(len, Box::new(GoType::parse(elem)));
                }
            }
            return GoType::Unknown(s.to_string());
        }
        if let Some(rest) = s.strip_prefix("map[") {
            return match closing(rest, 1) {
                Some(end) => GoType::Map(
                    Box::new(GoType::parse(&rest[..end])),
                    Box::new(GoType::parse(&rest[end + 1..])),
                ),
                None => GoType::Unknown(s.to_string()),
            };
        }
        if let Some(elem) = s.strip_prefix("<-chan ") {
            return GoType::Chan(ChanDir::Recv, Box::new(GoType::parse(unparen(elem))));
        }
        if let Some(elem) = s.strip_prefix("chan<- ") {
            return GoType::Chan(ChanDir::Send, Box::new(GoType::parse(unparen(elem))));
        }
        if let Some(elem) = s.strip_prefix("chan ") {
            return GoType::Chan(ChanDir::Both, Box::new(GoType::parse(unparen(elem))));
        }
        if let Some(rest) = s.strip_prefix("func(") {
            return parse_func(rest).unwrap_or_else(|| GoType::Unknown(s.to_string()));
        }
        if s == "interface{}" || s == "any" {
            return GoType::Any;
        }
        if s.starts_with("interface{") {
            return GoType::Interface;
        }
        if s == "struct{}" {
            return GoType::EmptyStruct;
        }
        if let Some(rest) = s.strip_prefix('(') {
            if !rest.is_empty() && closing(rest, 1) == Some(rest.len() - 1) {
                let items = parse_list(&rest[..rest.len() - 1]);
                return match <[GoType; 1]>::try_from(items) {
                    Ok([single]) => single,
                    Err(items) => GoType::Tuple(items),
                };
            }
        }
        if s == "error" {
            return GoType::Error;
        }
        if let Ok(kind) = PrimitiveKind::from_str(s) {
            return GoType::Primitive(kind);
        }
        if s == "untyped nil" {
            return GoType::Any;
        }

        parse_named(s).unwrap_or_else(|| GoType::Unknown(s.to_string()))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            GoType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, GoType::Primitive(PrimitiveKind::String))
    }

    /// Element type of pointers, slices, arrays and channels.
    pub fn elem(&self) -> Option<&GoType> {
        match self {
            GoType::Pointer(elem)
            | GoType::Slice(elem)
            | GoType::Array(_, elem)
            | GoType::Chan(_, elem) => Some(elem),
            _ => None,
        }
    }

    pub fn tuple_items(&self) -> &[GoType] {
        match self {
            GoType::Tuple(items) => items,
            _ => std::slice::from_ref(self),
        }
    }
}

/// Index of the bracket closing one already opened, scanning from the start
/// of `s` with the given nesting `depth`.
fn closing(s: &str, mut depth: usize) -> Option<usize> {
    for (i, c) in s.char_indices() {
        match c {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits at commas that are not nested in brackets.
pub fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = s[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

fn unparen(s: &str) -> &str {
    let s = s.trim();
    match s.strip_prefix('(') {
        Some(inner) if !inner.is_empty() && closing(inner, 1) == Some(inner.len() - 1) => {
            &inner[..inner.len() - 1]
        }
        _ => s,
    }
}

/// A parameter or tuple item, optionally preceded by a name.
fn strip_param_name(item: &str) -> &str {
    const TYPE_KEYWORDS: &[&str] = &["chan", "func", "map", "struct", "interface"];

    match item.split_once(' ') {
        Some((name, rest))
            if !TYPE_KEYWORDS.contains(&name)
                && !name.is_empty()
                && name.chars().all(|c| c.is_alphanumeric() || c == '_')
                && !rest.trim().is_empty() =>
        {
            rest.trim()
        }
        _ => item,
    }
}

fn parse_param(item: &str) -> GoType {
    let ty = strip_param_name(item);
    match ty.strip_prefix("...") {
        Some(elem) => GoType::Slice(Box::new(GoType::parse(elem))),
        None => GoType::parse(ty),
    }
}

fn parse_list(s: &str) -> Vec<GoType> {
    split_top_level(s).into_iter().map(parse_param).collect()
}

/// `rest` follows `func(`.
fn parse_func(rest: &str) -> Option<GoType> {
    let end = closing(rest, 1)?;
    let params = parse_list(&rest[..end]);
    let results = rest[end + 1..].trim();
    let results = if results.is_empty() {
        Vec::new()
    } else {
        match GoType::parse(results) {
            GoType::Tuple(items) => items,
            single => vec![single],
        }
    };
    Some(GoType::Func(FuncType { params, results }))
}

fn parse_named(s: &str) -> Option<GoType> {
    let is_ident = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '[' | ']' | ',' | '.'))
    };

    let tail_start = s.rfind('/').map_or(0, |slash| slash + 1);
    let tail = &s[tail_start..];
    let head_end = tail.find('[').unwrap_or(tail.len());
    match tail[..head_end].rfind('.') {
        Some(dot) => {
            let (package, name) = s.split_at(tail_start + dot);
            let name = &name[1..];
            (is_ident(name) && !package.contains(' ')).then(|| {
                GoType::Named(NamedType {
                    package: Some(package.to_string()),
                    name: name.to_string(),
                })
            })
        }
        None => is_ident(s).then(|| {
            GoType::Named(NamedType {
                package: None,
                name: s.to_string(),
            })
        }),
    }
}

/// What the program declares about one named type.
#[derive(Debug, Clone)]
pub struct NamedInfo {
    pub kind: TypeKind,
    pub underlying: Option<GoType>,
    pub fields: Vec<(String, GoType)>,
}

/// The named types declared by every package of a program.
#[derive(Debug, Default)]
pub struct TypeEnv {
    named: HashMap<(String, String), NamedInfo>,
}

impl TypeEnv {
    pub fn from_program(program: &HybridIr) -> Self {
        let mut named = HashMap::new();
        for package in &program.packages {
            for def in &package.types {
                let info = NamedInfo {
                    kind: def.kind,
                    underlying: def
                        .underlying
                        .as_deref()
                        .filter(|u| !u.is_empty())
                        .map(GoType::parse),
                    fields: def
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), GoType::parse(&f.typ)))
                        .collect(),
                };
                named.insert((package.path.clone(), def.name.clone()), info);
            }
        }
        TypeEnv { named }
    }

    /// Looks `ty` up, resolving unqualified names against `package`.
    pub fn lookup(&self, ty: &NamedType, package: &str) -> Option<&NamedInfo> {
        let path = ty.package.as_deref().unwrap_or(package);
        self.named.get(&(path.to_string(), ty.name.clone()))
    }

    pub fn is_declared(&self, ty: &NamedType, package: &str) -> bool {
        self.lookup(ty, package).is_some()
    }

    /// Follows declared aliases to the first non-alias type.
    pub fn resolve<'a>(&'a self, ty: &'a GoType, package: &str) -> &'a GoType {
        let mut current = ty;
        for _ in 0..16 {
            let GoType::Named(named) = current else { break };
            match self.lookup(named, package) {
                Some(NamedInfo {
                    kind: TypeKind::Alias,
                    underlying: Some(underlying),
                    ..
                }) => current = underlying,
                _ => break,
            }
        }
        current
    }

    pub fn primitive_of(&self, ty: &GoType, package: &str) -> Option<PrimitiveKind> {
        self.resolve(ty, package).as_primitive()
    }

    pub fn is_interface(&self, ty: &GoType, package: &str) -> bool {
        match self.resolve(ty, package) {
            GoType::Any | GoType::Interface | GoType::Error => true,
            GoType::Named(named) => self
                .lookup(named, package)
                .is_some_and(|info| info.kind == TypeKind::Interface),
            _ => false,
        }
    }

    /// Values of this type can be read without `.clone()`.
    pub fn is_copy(&self, ty: &GoType, package: &str) -> bool {
        match self.resolve(ty, package) {
            GoType::Primitive(kind) => kind.is_copy(),
            GoType::EmptyStruct => true,
            GoType::Tuple(items) => items.iter().all(|item| self.is_copy(item, package)),
            _ => false,
        }
    }

    /// Whether the Rust rendering implements `PartialEq`.
    pub fn is_comparable(&self, ty: &GoType, package: &str) -> bool {
        self.comparable_at(ty, package, 0)
    }

    fn comparable_at(&self, ty: &GoType, package: &str, depth: usize) -> bool {
        if depth > 16 {
            return false;
        }
        match self.resolve(ty, package) {
            GoType::Primitive(_)
            | GoType::Error
            | GoType::Any
            | GoType::Interface
            | GoType::EmptyStruct
            | GoType::Pointer(_)
            | GoType::Chan(..) => true,
            GoType::Array(_, elem) => self.comparable_at(elem, package, depth + 1),
            GoType::Tuple(items) => items
                .iter()
                .all(|item| self.comparable_at(item, package, depth + 1)),
            GoType::Named(named) => match self.lookup(named, package) {
                Some(info) if info.kind == TypeKind::Struct => {
                    let package = named.package.as_deref().unwrap_or(package);
                    info.fields
                        .iter()
                        .all(|(_, field)| self.comparable_at(field, package, depth + 1))
                }
                Some(info) => info.kind == TypeKind::Interface,
                None => false,
            },
            GoType::Slice(_)
            | GoType::Map(..)
            | GoType::Func(_)
            | GoType::Iter(..)
            | GoType::Unknown(_) => false,
        }
    }
}
