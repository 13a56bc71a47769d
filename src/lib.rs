//! hybridc translates the hybrid IR written by the Go SSA frontend into a
//! Rust program plus the runtime module it depends on.
//!
//! The pipeline is [`frontend::load`] (parse and validate), a
//! [`backend::targets::CodeGenerator`] and the [`driver`] that writes the
//! result.

pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod frontend;
pub mod index;
pub mod middle;
pub mod runtime;
