//! Runtime primitives for translated programs.
//!
//! Each submodule only refers to its siblings through `super::`, which lets
//! the generator emit the same sources as a standalone `go_runtime.rs`
//! (see [`crate::backend::runtime_source`]).

pub mod builtin;
pub mod chan;
pub mod error;
pub mod iface;
pub mod map;
pub mod panic;
pub mod prelude;
pub mod ptr;
pub mod slice;
pub mod string;
pub mod sync;
pub mod task;
pub mod value;

pub use prelude::*;
