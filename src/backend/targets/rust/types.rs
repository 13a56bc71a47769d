//! Rust spellings of Go types and of the items generated for them.

use itertools::Itertools;

use crate::middle::{
    sanitize::sanitize,
    ty::{ChanDir, FuncType, GoType, NamedType},
};

/// The Rust type for a Go type descriptor.
pub fn map_type(descriptor: &str) -> String {
    render_type(&GoType::parse(descriptor))
}

pub fn render_type(ty: &GoType) -> String {
    match ty {
        GoType::Primitive(kind) => kind.to_string(),
        GoType::Error => "GoError".to_string(),
        GoType::Any => "GoAny".to_string(),
        GoType::Interface => "Iface".to_string(),
        GoType::EmptyStruct => "()".to_string(),
        GoType::Pointer(elem) => format!("Ptr<{}>", render_type(elem)),
        GoType::Slice(elem) => format!("GoSlice<{}>", render_type(elem)),
        GoType::Array(len, elem) => format!("GoArray<{}, {len}>", render_type(elem)),
        GoType::Map(key, value) => {
            format!("GoMap<{}, {}>", render_type(key), render_type(value))
        }
        GoType::Chan(ChanDir::Both, elem) => format!("Chan<{}>", render_type(elem)),
        GoType::Chan(ChanDir::Recv, elem) => format!("RecvChan<{}>", render_type(elem)),
        GoType::Chan(ChanDir::Send, elem) => format!("SendChan<{}>", render_type(elem)),
        GoType::Func(func) => format!("GoFunc<{}>", dyn_fn(func)),
        GoType::Tuple(items) => render_tuple(items),
        GoType::Named(named) => named_ident(named),
        GoType::Iter(key, value) => {
            format!("GoIter<{}, {}>", render_type(key), render_type(value))
        }
        GoType::Unknown(descriptor) => sanitize(descriptor),
    }
}

fn render_tuple(items: &[GoType]) -> String {
    match items {
        [single] => format!("({},)", render_type(single)),
        _ => format!("({})", items.iter().map(render_type).join(", ")),
    }
}

/// `dyn Fn(A, B) -> R + Send + Sync`
pub fn dyn_fn(func: &FuncType) -> String {
    let params = func.params.iter().map(render_type).join(", ");
    match results_type(&func.results) {
        Some(results) => format!("dyn Fn({params}) -> {results} + Send + Sync"),
        None => format!("dyn Fn({params}) + Send + Sync"),
    }
}

/// The return type for a result list: nothing, the single type, or a tuple.
pub fn results_type(results: &[GoType]) -> Option<String> {
    match results {
        [] => None,
        [single] => Some(render_type(single)),
        _ => Some(render_tuple(results)),
    }
}

/// `path_Name`; unqualified names are left bare.
pub fn named_ident(named: &NamedType) -> String {
    match &named.package {
        Some(package) => qualified_ident(package, &named.name),
        None => sanitize(&named.name),
    }
}

/// Every package-level item is flattened to `path_Name`.
pub fn qualified_ident(package: &str, name: &str) -> String {
    format!("{}_{}", sanitize(package), sanitize(name))
}

/// Methods are free functions named after the receiver's base type.
pub fn method_ident(receiver: &str, method: &str) -> String {
    let base = receiver.trim_start_matches('*');
    format!("{}_{}", map_type(base), sanitize(method))
}

/// Qualifies package-relative names against `package`, so `Point` read
/// from an SSA comment in `main` renders like `main.Point`.
pub fn qualify(ty: &GoType, package: &str) -> GoType {
    let qualify_box = |inner: &GoType| Box::new(qualify(inner, package));
    match ty {
        GoType::Named(NamedType {
            package: None,
            name,
        }) => GoType::Named(NamedType {
            package: Some(package.to_string()),
            name: name.clone(),
        }),
        GoType::Pointer(elem) => GoType::Pointer(qualify_box(elem)),
        GoType::Slice(elem) => GoType::Slice(qualify_box(elem)),
        GoType::Array(len, elem) => GoType::Array(*len, qualify_box(elem)),
        GoType::Map(key, value) => GoType::Map(qualify_box(key), qualify_box(value)),
        GoType::Chan(dir, elem) => GoType::Chan(*dir, qualify_box(elem)),
        GoType::Func(func) => GoType::Func(FuncType {
            params: func.params.iter().map(|p| qualify(p, package)).collect(),
            results: func.results.iter().map(|r| qualify(r, package)).collect(),
        }),
        GoType::Tuple(items) => GoType::Tuple(items.iter().map(|i| qualify(i, package)).collect()),
        GoType::Iter(key, value) => GoType::Iter(qualify_box(key), qualify_box(value)),
        other => other.clone(),
    }
}
