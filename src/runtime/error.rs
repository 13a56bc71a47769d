//! Failure taxonomy shared by the runtime primitives.
//!
//! The checked API of every primitive returns these as `Err` values. The
//! unchecked API used by generated code raises them as Go panics through
//! [`runtime_panic`](super::panic::runtime_panic).

use std::fmt;
use std::sync::Arc;

use super::iface::Iface;
use super::string::GoString;

/// Index outside of `0..len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexError {
    pub index: i64,
    pub len: usize,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index out of range [{}] with length {}",
            self.index, self.len
        )
    }
}

impl std::error::Error for IndexError {}

/// Misuse of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanError {
    SendOnClosed,
    CloseOfClosed,
    CloseOfNil,
}

impl fmt::Display for ChanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChanError::SendOnClosed => write!(f, "send on closed channel"),
            ChanError::CloseOfClosed => write!(f, "close of closed channel"),
            ChanError::CloseOfNil => write!(f, "close of nil channel"),
        }
    }
}

impl std::error::Error for ChanError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    Index(IndexError),
    SliceBounds { low: i64, high: i64, cap: usize },
    MakeSlice { len: i64, cap: i64 },
    Chan(ChanError),
    NilMapWrite,
    NilDereference,
    NilFuncCall,
    TypeAssertion { expected: String, actual: String },
    LockMisuse(&'static str),
    NegativeWaitGroup,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Index(err) => write!(f, "runtime error: {err}"),
            RuntimeError::SliceBounds { low, high, cap } => write!(
                f,
                "runtime error: slice bounds out of range [{low}:{high}] with capacity {cap}"
            ),
            RuntimeError::MakeSlice { len, cap } => {
                write!(f, "runtime error: makeslice: len {len} cap {cap} out of range")
            }
            RuntimeError::Chan(err) => write!(f, "{err}"),
            RuntimeError::NilMapWrite => write!(f, "assignment to entry in nil map"),
            RuntimeError::NilDereference => write!(
                f,
                "runtime error: invalid memory address or nil pointer dereference"
            ),
            RuntimeError::NilFuncCall => write!(f, "runtime error: call of nil function"),
            RuntimeError::TypeAssertion { expected, actual } => {
                write!(f, "interface conversion: interface {{}} is {actual}, not {expected}")
            }
            RuntimeError::LockMisuse(what) => write!(f, "sync: {what}"),
            RuntimeError::NegativeWaitGroup => write!(f, "sync: negative WaitGroup counter"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<IndexError> for RuntimeError {
    fn from(value: IndexError) -> Self {
        RuntimeError::Index(value)
    }
}

impl From<ChanError> for RuntimeError {
    fn from(value: ChanError) -> Self {
        RuntimeError::Chan(value)
    }
}

/// Payload of `errors.New`-style values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ErrorString(GoString);

/// Value of the Go `error` interface.
///
/// Two errors are equal when they are both nil or share the same payload,
/// which matches Go's pointer identity for `errors.New` values.
#[derive(Clone, Default)]
pub struct GoError {
    value: Iface,
}

impl GoError {
    pub fn nil() -> Self {
        Self::default()
    }

    pub fn new(message: impl Into<GoString>) -> Self {
        Self {
            value: Iface::new("*errors.errorString", ErrorString(message.into())),
        }
    }

    pub fn from_iface(value: Iface) -> Self {
        Self { value }
    }

    pub fn is_nil(&self) -> bool {
        self.value.is_nil()
    }

    pub fn as_iface(&self) -> &Iface {
        &self.value
    }

    /// The `Error()` method of the interface.
    pub fn error_string(&self) -> GoString {
        if let Some(ErrorString(message)) = self.value.downcast_ref::<ErrorString>() {
            return message.clone();
        }
        if let Some(err) = self.value.downcast_ref::<RuntimeError>() {
            return GoString::from(err.to_string());
        }
        self.value.error_string()
    }
}

impl From<Iface> for GoError {
    fn from(value: Iface) -> Self {
        Self::from_iface(value)
    }
}

impl From<RuntimeError> for GoError {
    fn from(value: RuntimeError) -> Self {
        Self {
            value: Iface::new("runtime.Error", value),
        }
    }
}

impl PartialEq for GoError {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for GoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            return write!(f, "<nil>");
        }
        write!(f, "{}", self.error_string())
    }
}

impl fmt::Debug for GoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GoError({self})")
    }
}

impl std::error::Error for GoError {}

/// Shared message type used when a panic payload is a plain Rust string.
pub(super) fn message_value(message: impl Into<String>) -> Iface {
    Iface::new("string", GoString::from(message.into()))
}

/// Lets [`Arc`] backed handles report identity in `Debug` output.
pub(super) fn address_of<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}
