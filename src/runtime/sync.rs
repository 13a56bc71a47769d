//! Go's `sync` package types.
//!
//! Each type is a handle over shared state so that its zero value (the
//! `Default`) is ready to use and `Lock`/`Unlock` need not be paired
//! lexically. Copying a struct that holds one of these shares the state.

use std::sync::{Arc, Condvar, Mutex as StdMutex, MutexGuard};

use super::error::RuntimeError;
use super::iface::GoAny;
use super::panic::runtime_panic;
use super::value::{GoFunc, GoInt};

pub(super) fn lock_unpoisoned<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(super) fn wait_unpoisoned<'a, T>(cond: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cond.wait(guard)
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct MutexState {
    locked: StdMutex<bool>,
    cond: Condvar,
}

/// `sync.Mutex`.
#[derive(Clone, Default)]
pub struct Mutex {
    state: Arc<MutexState>,
}

impl Mutex {
    pub fn lock(&self) {
        let mut locked = lock_unpoisoned(&self.state.locked);
        while *locked {
            locked = wait_unpoisoned(&self.state.cond, locked);
        }
        *locked = true;
    }

    pub fn try_lock(&self) -> bool {
        let mut locked = lock_unpoisoned(&self.state.locked);
        if *locked {
            return false;
        }
        *locked = true;
        true
    }

    pub fn unlock(&self) {
        let mut locked = lock_unpoisoned(&self.state.locked);
        if !*locked {
            drop(locked);
            runtime_panic(RuntimeError::LockMisuse("unlock of unlocked mutex"));
        }
        *locked = false;
        self.state.cond.notify_one();
    }
}

#[derive(Default)]
struct RwCounts {
    readers: usize,
    writer: bool,
    writers_waiting: usize,
}

#[derive(Default)]
struct RwState {
    counts: StdMutex<RwCounts>,
    cond: Condvar,
}

/// `sync.RWMutex`. Waiting writers hold off new readers.
#[derive(Clone, Default)]
pub struct RwMutex {
    state: Arc<RwState>,
}

impl RwMutex {
    pub fn lock(&self) {
        let mut counts = lock_unpoisoned(&self.state.counts);
        counts.writers_waiting += 1;
        while counts.writer || counts.readers > 0 {
            counts = wait_unpoisoned(&self.state.cond, counts);
        }
        counts.writers_waiting -= 1;
        counts.writer = true;
    }

    pub fn unlock(&self) {
        let mut counts = lock_unpoisoned(&self.state.counts);
        if !counts.writer {
            drop(counts);
            runtime_panic(RuntimeError::LockMisuse("Unlock of unlocked RWMutex"));
        }
        counts.writer = false;
        self.state.cond.notify_all();
    }

    pub fn r_lock(&self) {
        let mut counts = lock_unpoisoned(&self.state.counts);
        while counts.writer || counts.writers_waiting > 0 {
            counts = wait_unpoisoned(&self.state.cond, counts);
        }
        counts.readers += 1;
    }

    pub fn r_unlock(&self) {
        let mut counts = lock_unpoisoned(&self.state.counts);
        if counts.readers == 0 {
            drop(counts);
            runtime_panic(RuntimeError::LockMisuse("RUnlock of unlocked RWMutex"));
        }
        counts.readers -= 1;
        if counts.readers == 0 {
            self.state.cond.notify_all();
        }
    }
}

#[derive(Default)]
struct WaitState {
    count: StdMutex<i64>,
    cond: Condvar,
}

/// `sync.WaitGroup`.
#[derive(Clone, Default)]
pub struct WaitGroup {
    state: Arc<WaitState>,
}

impl WaitGroup {
    pub fn add(&self, delta: impl GoInt) {
        let mut count = lock_unpoisoned(&self.state.count);
        *count += delta.to_i64();
        if *count < 0 {
            drop(count);
            runtime_panic(RuntimeError::NegativeWaitGroup);
        }
        if *count == 0 {
            self.state.cond.notify_all();
        }
    }

    pub fn done(&self) {
        self.add(-1i64);
    }

    pub fn wait(&self) {
        let mut count = lock_unpoisoned(&self.state.count);
        while *count > 0 {
            count = wait_unpoisoned(&self.state.cond, count);
        }
    }
}

/// `sync.Once`. Concurrent callers block until the first call finishes.
#[derive(Clone, Default)]
pub struct Once {
    done: Arc<StdMutex<bool>>,
}

impl Once {
    pub fn call_once(&self, f: impl FnOnce()) {
        let mut done = lock_unpoisoned(&self.done);
        if !*done {
            *done = true;
            f();
        }
    }

    /// `once.Do(f)`.
    pub fn do_(&self, f: GoFunc<dyn Fn() + Send + Sync>) {
        self.call_once(|| (*f)());
    }
}

/// `sync.Pool` of interface values.
#[allow(non_snake_case)]
#[derive(Clone, Default)]
pub struct Pool {
    items: Arc<StdMutex<Vec<GoAny>>>,
    pub New: GoFunc<dyn Fn() -> GoAny + Send + Sync>,
}

impl Pool {
    pub fn get(&self) -> GoAny {
        let item = lock_unpoisoned(&self.items).pop();
        match item {
            Some(item) => item,
            None if !self.New.is_nil() => (*self.New)(),
            None => GoAny::nil(),
        }
    }

    pub fn put(&self, item: GoAny) {
        if !item.is_nil() {
            lock_unpoisoned(&self.items).push(item);
        }
    }
}

#[derive(Default)]
struct CondCounts {
    waiters: usize,
    permits: usize,
}

#[derive(Default)]
struct CondState {
    counts: StdMutex<CondCounts>,
    cond: Condvar,
}

/// `sync.Cond` bound to a [`Mutex`].
#[allow(non_snake_case)]
#[derive(Clone, Default)]
pub struct Cond {
    pub L: Mutex,
    state: Arc<CondState>,
}

impl Cond {
    pub fn new(l: Mutex) -> Self {
        Self {
            L: l,
            state: Arc::default(),
        }
    }

    /// Unlocks `L`, waits for a signal, then locks `L` again.
    pub fn wait(&self) {
        let mut counts = lock_unpoisoned(&self.state.counts);
        counts.waiters += 1;
        self.L.unlock();
        while counts.permits == 0 {
            counts = wait_unpoisoned(&self.state.cond, counts);
        }
        counts.permits -= 1;
        counts.waiters -= 1;
        drop(counts);
        self.L.lock();
    }

    pub fn signal(&self) {
        let mut counts = lock_unpoisoned(&self.state.counts);
        if counts.waiters > counts.permits {
            counts.permits += 1;
            self.state.cond.notify_one();
        }
    }

    pub fn broadcast(&self) {
        let mut counts = lock_unpoisoned(&self.state.counts);
        counts.permits = counts.waiters;
        self.state.cond.notify_all();
    }
}

#[allow(non_camel_case_types)]
pub type sync_Mutex = Mutex;
#[allow(non_camel_case_types)]
pub type sync_RWMutex = RwMutex;
#[allow(non_camel_case_types)]
pub type sync_WaitGroup = WaitGroup;
#[allow(non_camel_case_types)]
pub type sync_Once = Once;
#[allow(non_camel_case_types)]
pub type sync_Pool = Pool;
#[allow(non_camel_case_types)]
pub type sync_Cond = Cond;

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn mutex_serialises_increments() {
        let mu = Mutex::default();
        let total = Arc::new(StdMutex::new(0));
        let wg = WaitGroup::default();

        for _ in 0..8 {
            wg.add(1);
            let (mu, total, wg) = (mu.clone(), total.clone(), wg.clone());
            thread::spawn(move || {
                for _ in 0..100 {
                    mu.lock();
                    *total.lock().unwrap() += 1;
                    mu.unlock();
                }
                wg.done();
            });
        }

        wg.wait();
        assert_eq!(*total.lock().unwrap(), 800);
    }

    #[test]
    fn unlock_of_unlocked_mutex_panics() {
        let mu = Mutex::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| mu.unlock()));
        assert!(outcome.is_err());
        assert!(mu.try_lock());
    }

    #[test]
    fn once_runs_a_single_time() {
        let once = Once::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            once.call_once(|| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn readers_share_the_lock() {
        let rw = RwMutex::default();
        rw.r_lock();
        rw.r_lock();
        rw.r_unlock();
        rw.r_unlock();
        rw.lock();
        rw.unlock();
    }

    #[test]
    fn cond_wakes_a_waiter() {
        let cond = Cond::new(Mutex::default());
        let ready = Arc::new(StdMutex::new(false));

        let waiter = {
            let (cond, ready) = (cond.clone(), ready.clone());
            thread::spawn(move || {
                cond.L.lock();
                while !*ready.lock().unwrap() {
                    cond.wait();
                }
                cond.L.unlock();
            })
        };

        cond.L.lock();
        *ready.lock().unwrap() = true;
        cond.broadcast();
        cond.L.unlock();
        waiter.join().unwrap();
    }
}
