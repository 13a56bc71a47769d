//! The hybrid IR: a whole-program SSA view serialized by the Go frontend.
//!
//! Field names follow the frontend's JSON encoding. Slices the frontend
//! never omits may still arrive as `null`, which reads as empty.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use strum::{EnumString, IntoStaticStr};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HybridIr {
    #[serde(deserialize_with = "null_as_default")]
    pub packages: Vec<PackageIr>,
    pub main_package: String,
}

impl HybridIr {
    pub fn package(&self, path: &str) -> Option<&PackageIr> {
        self.packages.iter().find(|p| p.path == path)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageIr {
    pub path: String,
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub types: Vec<TypeDef>,
    #[serde(deserialize_with = "null_as_default")]
    pub functions: Vec<FunctionIr>,
    #[serde(deserialize_with = "null_as_default")]
    pub globals: Vec<GlobalVar>,
    #[serde(deserialize_with = "null_as_default")]
    pub constants: Vec<ConstDef>,
    #[serde(deserialize_with = "null_as_default")]
    pub imports: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub cgo_imports: Vec<CgoImport>,
}

impl PackageIr {
    pub fn function(&self, name: &str) -> Option<&FunctionIr> {
        self.functions.iter().find(|f| f.name == name && !f.is_method)
    }
}

/// A `#cgo` directive found in the package sources.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CgoImport {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cflags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ldflags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: Vec<String>,
    #[serde(default)]
    pub pkg_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TypeKind {
    Struct,
    Interface,
    Alias,
    Func,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    /// Record fields, or interface methods with their signatures.
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<FieldDef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: Vec<String>,
    #[serde(default)]
    pub underlying: Option<String>,
    #[serde(default)]
    pub signature: Option<FuncSignature>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub typ: String,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionIr {
    pub name: String,
    #[serde(default)]
    pub receiver: Option<ReceiverInfo>,
    pub signature: FuncSignature,
    #[serde(default)]
    pub body: Option<BodyIr>,
    pub is_method: bool,
    pub package: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiverInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub pointer: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FuncSignature {
    #[serde(deserialize_with = "null_as_default")]
    pub params: Vec<Param>,
    #[serde(deserialize_with = "null_as_default")]
    pub results: Vec<Param>,
    pub variadic: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BodyIr {
    #[serde(deserialize_with = "null_as_default")]
    pub blocks: Vec<BlockIr>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locals: Vec<LocalVar>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub free_vars: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub struct_hints: BTreeMap<String, HintIr>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub defers: Vec<DeferInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum HintKind {
    If,
    For,
    Switch,
    Select,
    Defer,
}

/// Structural hint recovered from the source syntax. Advisory only.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HintIr {
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lines: Vec<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
}

impl HintIr {
    pub fn hint_kind(&self) -> Option<HintKind> {
        HintKind::from_str(&self.kind).ok()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeferInfo {
    pub block_id: i64,
    pub call: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockIr {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub instructions: Vec<Instruction>,
    #[serde(deserialize_with = "null_as_default")]
    pub successors: Vec<i64>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Instruction {
    pub op: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Vec<String>,
    #[serde(rename = "type", default)]
    pub ty: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    /// Operator symbol of a `UnOp`/`BinOp`, when the frontend records it.
    #[serde(default)]
    pub operator: Option<String>,
}

impl Instruction {
    pub fn kind(&self) -> OpKind {
        OpKind::from_str(&self.op).unwrap_or_else(|_| OpKind::Unknown(self.op.clone()))
    }

    pub fn comment(&self) -> &str {
        self.comment.as_deref().unwrap_or_default()
    }

    /// The result name, treating the empty string as absent.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref().filter(|r| !r.is_empty())
    }

    pub fn ty(&self) -> Option<&str> {
        self.ty.as_deref().filter(|t| !t.is_empty())
    }
}

/// The Go SSA instruction type names the backend understands.
#[derive(Debug, Clone, PartialEq, Eq, EnumString, IntoStaticStr)]
pub enum OpKind {
    Alloc,
    Store,
    UnOp,
    BinOp,
    Call,
    Go,
    Defer,
    Return,
    If,
    Jump,
    Phi,
    Extract,
    Panic,
    RunDefers,
    MakeChan,
    Send,
    Recv,
    MakeSlice,
    MakeMap,
    MapUpdate,
    Lookup,
    IndexAddr,
    Index,
    FieldAddr,
    Field,
    Slice,
    Convert,
    ChangeType,
    ChangeInterface,
    MakeInterface,
    TypeAssert,
    MakeClosure,
    Range,
    Next,
    Select,
    DebugRef,
    #[strum(default)]
    Unknown(String),
}

impl OpKind {
    /// Instructions that end a block.
    pub fn is_terminator(&self) -> bool {
        matches!(self, OpKind::Return | OpKind::If | OpKind::Jump | OpKind::Panic)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalVar {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalVar {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConstDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_slices_read_as_empty() {
        let ir: HybridIr = serde_json::from_str(
            r#"{"packages": [{"path": "main", "name": "main", "types": null, "functions": [],
                "globals": null, "constants": [], "imports": null, "cgo_imports": null}],
                "main_package": "main"}"#,
        )
        .unwrap();

        assert!(ir.packages[0].types.is_empty());
        assert!(ir.package("main").is_some());
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = serde_json::from_str::<HybridIr>(r#"{"packages": []}"#).unwrap_err();
        assert!(err.to_string().contains("main_package"));
    }

    #[test]
    fn unknown_ops_are_kept() {
        let instr = Instruction {
            op: "Frobnicate".into(),
            ..Default::default()
        };
        assert_eq!(instr.kind(), OpKind::Unknown("Frobnicate".into()));
        assert_eq!(
            Instruction {
                op: "MakeChan".into(),
                ..Default::default()
            }
            .kind(),
            OpKind::MakeChan
        );
    }
}
