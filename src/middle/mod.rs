//! Target-independent analysis of the IR: Go types, operators, name
//! sanitizing and control-flow structure.

pub mod cfg;
pub mod op;
pub mod primitive;
pub mod sanitize;
pub mod ty;
