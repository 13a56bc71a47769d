//! Everything generated code refers to by bare name.

pub use std::sync::Arc;

pub use super::builtin::{
    GoCap, GoConvert, GoFormat, GoLen, go_append_str, go_cap, go_convert, go_copy, go_copy_str,
    go_len, go_max, go_min, go_print, go_println,
};
pub use super::chan::{Chan, RecvChan, Select, SendChan, Slot, TrySendError};
pub use super::error::{ChanError, GoError, IndexError, RuntimeError};
pub use super::iface::{GoAny, Iface};
pub use super::map::{GoIter, GoMap};
pub use super::panic::{DeferStack, GoPanic, RecoverScope, arm_recover, go_panic, runtime_panic};
pub use super::ptr::{Global, Place, Ptr};
pub use super::slice::GoSlice;
pub use super::string::GoString;
pub use super::sync::{
    Cond, Mutex, Once, Pool, RwMutex, WaitGroup, sync_Cond, sync_Mutex, sync_Once, sync_Pool,
    sync_RWMutex, sync_WaitGroup,
};
pub use super::task::{Scheduler, TaskId, TaskStats, go_spawn};
pub use super::value::{Complex64, Complex128, GoArray, GoFunc, GoInt, GoUintptr, Nilable};
