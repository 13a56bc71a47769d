//! Goroutines on OS threads.
//!
//! Every task belongs to a [`Scheduler`]. A scheduler is installed on the
//! thread that calls [`Scheduler::run`] and inherited by the tasks it
//! spawns, so `go f()` deep inside a program still reaches it.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::panic::{install_panic_hook, payload_message};
use super::sync::{lock_unpoisoned, wait_unpoisoned};

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub spawned: u64,
    pub active: u64,
    pub panicked: u64,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    spawned: AtomicU64,
    panicked: AtomicU64,
    active: Mutex<u64>,
    idle: Condvar,
}

impl Registry {
    fn finish(&self) {
        let mut active = lock_unpoisoned(&self.active);
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.idle.notify_all();
        }
    }
}

#[derive(Clone, Default)]
pub struct Scheduler {
    registry: Arc<Registry>,
}

thread_local! {
    static CURRENT: RefCell<Option<Scheduler>> = const { RefCell::new(None) };
}

impl Scheduler {
    pub fn new() -> Self {
        install_panic_hook();
        Self::default()
    }

    /// The scheduler installed on this thread, or a fresh one.
    pub fn current() -> Self {
        CURRENT
            .with(|current| current.borrow().clone())
            .unwrap_or_else(Scheduler::new)
    }

    /// Runs `entry` with this scheduler installed on the calling thread.
    pub fn run<R>(&self, entry: impl FnOnce() -> R) -> R {
        let previous = CURRENT.with(|current| current.replace(Some(self.clone())));
        let outcome = panic::catch_unwind(AssertUnwindSafe(entry));
        CURRENT.with(|current| *current.borrow_mut() = previous);
        match outcome {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// `go f()`. A panic inside the task is logged and ends only that task.
    pub fn spawn(&self, task: impl FnOnce() + Send + 'static) -> TaskId {
        let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.registry.spawned.fetch_add(1, Ordering::SeqCst);
        *lock_unpoisoned(&self.registry.active) += 1;

        let scheduler = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("goroutine-{id}"))
            .spawn(move || {
                CURRENT.with(|current| *current.borrow_mut() = Some(scheduler.clone()));
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    scheduler.registry.panicked.fetch_add(1, Ordering::SeqCst);
                    eprintln!("goroutine {id} panicked: {}", payload_message(&*payload));
                }
                scheduler.registry.finish();
            });
        if let Err(err) = spawned {
            eprintln!("goroutine {id} could not start: {err}");
            self.registry.finish();
        }
        id
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats {
            spawned: self.registry.spawned.load(Ordering::SeqCst),
            active: *lock_unpoisoned(&self.registry.active),
            panicked: self.registry.panicked.load(Ordering::SeqCst),
        }
    }

    /// Blocks until no task of this scheduler is running.
    pub fn wait_idle(&self) {
        let mut active = lock_unpoisoned(&self.registry.active);
        while *active > 0 {
            active = wait_unpoisoned(&self.registry.idle, active);
        }
    }

    /// Like [`Scheduler::wait_idle`] but gives up after `timeout`.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut active = lock_unpoisoned(&self.registry.active);
        while *active > 0 {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            active = match self.registry.idle.wait_timeout(active, left) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

/// `go f()` on the current scheduler.
pub fn go_spawn(task: impl FnOnce() + Send + 'static) -> TaskId {
    Scheduler::current().spawn(task)
}

#[cfg(test)]
mod tests {
    use super::super::chan::Chan;
    use super::super::error::RuntimeError;
    use super::super::panic::runtime_panic;
    use super::*;

    #[test]
    fn tasks_inherit_the_scheduler() {
        let scheduler = Scheduler::new();
        let done: Chan<u64> = Chan::new(0);

        scheduler.run(|| {
            let done = done.clone();
            go_spawn(move || {
                let inner = done.clone();
                go_spawn(move || inner.send(2));
                done.send(1);
            });
        });

        let mut got = vec![done.recv(), done.recv()];
        got.sort();
        assert_eq!(got, vec![1, 2]);
        assert!(scheduler.wait_idle_timeout(Duration::from_secs(5)));
        assert_eq!(scheduler.stats().spawned, 2);
    }

    #[test]
    fn a_panicking_task_does_not_take_down_the_others() {
        let scheduler = Scheduler::new();

        scheduler.spawn(|| runtime_panic(RuntimeError::NilDereference));
        scheduler.wait_idle();

        let stats = scheduler.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.active, 0);
    }
}
