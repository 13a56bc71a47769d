//! Go panics, deferred calls and `recover`.
//!
//! A Go panic is a Rust unwind whose payload is [`GoPanic`]. Functions with
//! deferred calls run their body under [`DeferStack::guard`] and finish with
//! [`DeferStack::unwind`], which runs the deferred calls in LIFO order and
//! either resumes the panic or returns normally if one of them recovered.
//! `recover` only works in a function called directly by a deferred call,
//! see [`RecoverScope`].

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::thread;

use super::error::{RuntimeError, message_value};
use super::iface::{GoAny, Iface};

/// Unwind payload carrying the value passed to `panic`.
pub struct GoPanic {
    value: GoAny,
}

impl GoPanic {
    pub fn value(&self) -> &GoAny {
        &self.value
    }
}

impl fmt::Debug for GoPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GoPanic({})", self.value.error_string())
    }
}

/// `panic(v)`.
pub fn go_panic(value: GoAny) -> ! {
    panic::panic_any(GoPanic { value })
}

/// Raises a runtime failure as a Go panic.
pub fn runtime_panic(err: RuntimeError) -> ! {
    go_panic(Iface::new("runtime.Error", err))
}

/// Converts any unwind payload into the value `recover` hands back.
pub fn payload_value(payload: Box<dyn Any + Send>) -> GoAny {
    match payload.downcast::<GoPanic>() {
        Ok(go) => go.value,
        Err(payload) => message_value(payload_message(&*payload)),
    }
}

/// Best-effort text of an unwind payload.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(go) = payload.downcast_ref::<GoPanic>() {
        go.value.error_string().to_string()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Silences the default hook for Go panics; they are reported by whoever
/// finally catches them.
pub fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<GoPanic>().is_none() {
                previous(info);
            }
        }));
    });
}

struct PanicFrame {
    payload: Option<Box<dyn Any + Send>>,
}

thread_local! {
    static FRAMES: RefCell<Vec<PanicFrame>> = const { RefCell::new(Vec::new()) };
    /// Frame depth handed to the next [`RecoverScope::enter`], set by a
    /// deferred call just before it calls its function.
    static ARMED: Cell<Option<usize>> = const { Cell::new(None) };
}

fn depth() -> usize {
    FRAMES.with(|frames| frames.borrow().len())
}

/// Marks the function about to be called as run directly by a deferred
/// call, letting its `recover` stop the panic of the unwinding frame.
pub fn arm_recover() {
    ARMED.with(|armed| armed.set(Some(depth())));
}

/// Entered by every function that calls `recover`.
///
/// Only the invocation entered right after [`arm_recover`] may take the
/// pending panic, and only while the frame it was armed for is the one
/// unwinding. Functions it calls in turn see nil.
#[derive(Debug, Clone, Copy)]
pub struct RecoverScope {
    level: Option<usize>,
}

impl RecoverScope {
    pub fn enter() -> Self {
        Self {
            level: ARMED.with(Cell::take),
        }
    }

    /// `recover()`.
    pub fn recover(&self) -> GoAny {
        let payload = FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            if self.level != Some(frames.len()) {
                return None;
            }
            frames.last_mut().and_then(|frame| frame.payload.take())
        });
        match payload {
            Some(payload) => payload_value(payload),
            None => GoAny::nil(),
        }
    }
}

/// Deferred calls registered by one function invocation.
#[derive(Default)]
pub struct DeferStack<'a> {
    calls: RefCell<Vec<Box<dyn FnOnce() + 'a>>>,
}

impl<'a> DeferStack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `defer f(args)`. Arguments must already be evaluated by the caller.
    pub fn push(&self, call: impl FnOnce() + 'a) {
        self.calls.borrow_mut().push(Box::new(call));
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the function body, capturing a panic instead of propagating it.
    pub fn guard<R>(&self, body: impl FnOnce() -> R) -> thread::Result<R> {
        panic::catch_unwind(AssertUnwindSafe(body))
    }

    /// Runs the deferred calls newest first.
    ///
    /// A panic raised by a deferred call replaces the pending one. If a panic
    /// is still pending afterwards it is resumed; if it was recovered the
    /// function returns the zero value of its results.
    pub fn unwind<R: Default>(&self, outcome: thread::Result<R>) -> R {
        let (value, payload) = match outcome {
            Ok(value) => (Some(value), None),
            Err(payload) => (None, Some(payload)),
        };
        FRAMES.with(|frames| frames.borrow_mut().push(PanicFrame { payload }));

        loop {
            let next = self.calls.borrow_mut().pop();
            let Some(call) = next else { break };
            let result = panic::catch_unwind(AssertUnwindSafe(call));
            ARMED.with(|armed| armed.set(None));
            if let Err(payload) = result {
                FRAMES.with(|frames| {
                    if let Some(frame) = frames.borrow_mut().last_mut() {
                        frame.payload = Some(payload);
                    }
                });
            }
        }

        let pending = FRAMES
            .with(|frames| frames.borrow_mut().pop())
            .and_then(|frame| frame.payload);
        if let Some(payload) = pending {
            panic::resume_unwind(payload);
        }
        value.unwrap_or_default()
    }
}
