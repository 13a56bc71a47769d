//! Channels and `select`.
//!
//! An unbuffered send completes only once a receiver has taken the value.
//! A buffered send blocks while the buffer is full. Receives block until a
//! value arrives or the channel is closed and drained.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use super::error::{ChanError, address_of};
use super::panic::runtime_panic;
use super::sync::{lock_unpoisoned, wait_unpoisoned};
use super::value::{GoInt, Nilable};

/// A `select` statement's choice, shared with the channels it has made
/// offers on. The first party to claim it decides which case fired.
#[derive(Clone, Default)]
struct Decision(Arc<Mutex<Option<usize>>>);

impl Decision {
    fn get(&self) -> Option<usize> {
        *lock_unpoisoned(&self.0)
    }

    fn try_claim(&self, case: usize) -> bool {
        let mut chosen = lock_unpoisoned(&self.0);
        if chosen.is_some() {
            return false;
        }
        *chosen = Some(case);
        true
    }

    fn is(&self, other: &Decision) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Outcome of claiming two decisions at once.
enum Pair {
    Both,
    /// The receiving select was already decided elsewhere.
    MineTaken,
    /// The offering select was already decided elsewhere.
    TheirsTaken,
}

/// Claims `mine` and `theirs` together or not at all. Locks are taken in
/// address order.
fn claim_pair(mine: &Decision, my_case: usize, theirs: &Decision, their_case: usize) -> Pair {
    let mine_first = Arc::as_ptr(&mine.0) < Arc::as_ptr(&theirs.0);
    let (first, second) = match mine_first {
        true => (&mine.0, &theirs.0),
        false => (&theirs.0, &mine.0),
    };
    let mut first = lock_unpoisoned(first);
    let mut second = lock_unpoisoned(second);
    let (mine_slot, theirs_slot) = match mine_first {
        true => (&mut *first, &mut *second),
        false => (&mut *second, &mut *first),
    };
    if mine_slot.is_some() {
        return Pair::MineTaken;
    }
    if theirs_slot.is_some() {
        return Pair::TheirsTaken;
    }
    *mine_slot = Some(my_case);
    *theirs_slot = Some(their_case);
    Pair::Both
}

/// A select's case offered to receivers.
struct Claim {
    decision: Decision,
    case: usize,
}

struct Entry<T> {
    ticket: u64,
    value: T,
    /// Set for the send case of a blocked `select`; taking the value
    /// also decides that select.
    claim: Option<Claim>,
}

enum Take<T> {
    Value(T),
    Empty,
    /// The receiving select was decided by another party meanwhile.
    Decided,
}

struct State<T> {
    queue: VecDeque<Entry<T>>,
    closed: bool,
    /// Last ticket handed out; an unbuffered sender waits until its ticket
    /// has left the queue.
    sent: u64,
    /// Tickets of unbuffered sends discarded by `close`.
    dropped: Vec<u64>,
    receivers_waiting: usize,
}

impl<T> State<T> {
    fn push(&mut self, value: T, claim: Option<Claim>) -> u64 {
        self.sent += 1;
        self.queue.push_back(Entry {
            ticket: self.sent,
            value,
            claim,
        });
        self.sent
    }

    fn holds(&self, ticket: u64) -> bool {
        self.queue.iter().any(|entry| entry.ticket == ticket)
    }

    /// Takes the oldest value that can be taken. Offers of selects decided
    /// elsewhere are stale and dropped; a select never receives its own
    /// offer.
    fn take(&mut self, own: Option<(&Decision, usize)>) -> Take<T> {
        let mut i = 0;
        while i < self.queue.len() {
            let entry = &self.queue[i];
            let taken = match (&entry.claim, own) {
                (None, None) => true,
                (None, Some((mine, case))) => {
                    if !mine.try_claim(case) {
                        return Take::Decided;
                    }
                    true
                }
                (Some(theirs), None) => theirs.decision.try_claim(theirs.case),
                (Some(theirs), Some((mine, case))) => {
                    if theirs.decision.is(mine) {
                        i += 1;
                        continue;
                    }
                    match claim_pair(mine, case, &theirs.decision, theirs.case) {
                        Pair::Both => true,
                        Pair::MineTaken => return Take::Decided,
                        Pair::TheirsTaken => false,
                    }
                }
            };
            let entry = self.queue.remove(i);
            if let (true, Some(entry)) = (taken, entry) {
                return Take::Value(entry.value);
            }
        }
        Take::Empty
    }
}

struct Inner<T> {
    cap: usize,
    state: Mutex<State<T>>,
    cond: Condvar,
}

/// A Go channel `chan T`. The zero value is the nil channel, on which
/// sends and receives block forever.
pub struct Chan<T> {
    inner: Option<Arc<Inner<T>>>,
}

/// `<-chan T`.
pub type RecvChan<T> = Chan<T>;
/// `chan<- T`.
pub type SendChan<T> = Chan<T>;

/// Outcome of a send that would have blocked.
#[derive(Debug, PartialEq, Eq)]
pub enum TrySendError<T> {
    Full(T),
    Closed(T),
}

impl<T> Clone for Chan<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Chan<T> {
    fn default() -> Self {
        Self { inner: None }
    }
}

fn block_forever() -> ! {
    loop {
        thread::park();
    }
}

impl<T: Default> Chan<T> {
    /// `make(chan T, cap)`.
    pub fn new(cap: impl GoInt) -> Self {
        let cap = cap.to_i64().max(0) as usize;
        Self {
            inner: Some(Arc::new(Inner {
                cap,
                state: Mutex::new(State {
                    queue: VecDeque::with_capacity(cap),
                    closed: false,
                    sent: 0,
                    dropped: Vec::new(),
                    receivers_waiting: 0,
                }),
                cond: Condvar::new(),
            })),
        }
    }

    pub fn nil() -> Self {
        Self::default()
    }

    pub fn is_nil(&self) -> bool {
        self.inner.is_none()
    }

    pub fn cap(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.cap)
    }

    /// Values buffered and not yet received.
    pub fn len(&self) -> usize {
        match &self.inner {
            Some(inner) if inner.cap > 0 => lock_unpoisoned(&inner.state).queue.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocking send reporting misuse instead of panicking.
    pub fn send_checked(&self, value: T) -> Result<(), ChanError> {
        let Some(inner) = &self.inner else {
            block_forever();
        };
        let mut state = lock_unpoisoned(&inner.state);
        if state.closed {
            return Err(ChanError::SendOnClosed);
        }

        if inner.cap > 0 {
            while state.queue.len() >= inner.cap && !state.closed {
                state = wait_unpoisoned(&inner.cond, state);
            }
            if state.closed {
                return Err(ChanError::SendOnClosed);
            }
            state.push(value, None);
            inner.cond.notify_all();
            return Ok(());
        }

        let ticket = state.push(value, None);
        inner.cond.notify_all();
        while state.holds(ticket) {
            state = wait_unpoisoned(&inner.cond, state);
        }
        match state.dropped.contains(&ticket) {
            true => Err(ChanError::SendOnClosed),
            false => Ok(()),
        }
    }

    /// `ch <- value`.
    pub fn send(&self, value: T) {
        if let Err(err) = self.send_checked(value) {
            runtime_panic(err.into());
        }
    }

    /// `v, ok := <-ch`.
    pub fn recv_ok(&self) -> (T, bool) {
        let Some(inner) = &self.inner else {
            block_forever();
        };
        let mut state = lock_unpoisoned(&inner.state);
        loop {
            if let Take::Value(value) = state.take(None) {
                inner.cond.notify_all();
                return (value, true);
            }
            if state.closed {
                return (T::default(), false);
            }
            state.receivers_waiting += 1;
            state = wait_unpoisoned(&inner.cond, state);
            state.receivers_waiting -= 1;
        }
    }

    /// `<-ch`.
    pub fn recv(&self) -> T {
        self.recv_ok().0
    }

    pub fn close_checked(&self) -> Result<(), ChanError> {
        let inner = self.inner.as_ref().ok_or(ChanError::CloseOfNil)?;
        let mut state = lock_unpoisoned(&inner.state);
        if state.closed {
            return Err(ChanError::CloseOfClosed);
        }
        state.closed = true;
        if inner.cap == 0 {
            // Pending unbuffered sends fail rather than hand off.
            let tickets: Vec<u64> = state.queue.drain(..).map(|entry| entry.ticket).collect();
            state.dropped.extend(tickets);
        }
        inner.cond.notify_all();
        Ok(())
    }

    /// `close(ch)`.
    pub fn close(&self) {
        if let Err(err) = self.close_checked() {
            runtime_panic(err.into());
        }
    }

    /// Sends only if that cannot block. On an unbuffered channel this needs
    /// a receiver already waiting.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let Some(inner) = &self.inner else {
            return Err(TrySendError::Full(value));
        };
        let mut state = lock_unpoisoned(&inner.state);
        if state.closed {
            return Err(TrySendError::Closed(value));
        }
        if !has_room(inner, &state) {
            return Err(TrySendError::Full(value));
        }
        state.push(value, None);
        inner.cond.notify_all();
        Ok(())
    }

    /// Receives only if that cannot block; `None` means nothing is ready.
    pub fn try_recv(&self) -> Option<(T, bool)> {
        let inner = self.inner.as_ref()?;
        let mut state = lock_unpoisoned(&inner.state);
        if let Take::Value(value) = state.take(None) {
            inner.cond.notify_all();
            return Some((value, true));
        }
        state.closed.then(|| (T::default(), false))
    }
}

/// Whether a send would complete without waiting: buffer space, or a
/// blocked receiver for every value already handed over.
fn has_room<T>(inner: &Inner<T>, state: &State<T>) -> bool {
    match inner.cap {
        0 => state.receivers_waiting > state.queue.len(),
        cap => state.queue.len() < cap,
    }
}

impl<T> Nilable for Chan<T> {
    fn is_nil(&self) -> bool {
        self.inner.is_none()
    }
}

/// Channels compare by identity.
impl<T> PartialEq for Chan<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> fmt::Debug for Chan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => write!(f, "Chan({:#x})", address_of(inner)),
            None => write!(f, "Chan(nil)"),
        }
    }
}

/// The select being waited on, as seen by one of its cases.
struct Own<'a> {
    decision: &'a Decision,
    case: usize,
    blocking: bool,
}

trait SelectCase {
    /// `Some(ok)` once the case has fired.
    fn poll(&mut self, own: &Own<'_>) -> Option<bool>;

    /// Takes back anything still offered once the select is over.
    fn withdraw(&mut self) {}
}

struct RecvCase<T> {
    chan: Chan<T>,
    slot: Slot<T>,
}

impl<T: Default> SelectCase for RecvCase<T> {
    fn poll(&mut self, own: &Own<'_>) -> Option<bool> {
        let inner = self.chan.inner.as_ref()?;
        let mut state = lock_unpoisoned(&inner.state);
        let (value, ok) = match state.take(Some((own.decision, own.case))) {
            Take::Value(value) => (value, true),
            Take::Decided => return None,
            Take::Empty if state.closed && own.decision.try_claim(own.case) => {
                (T::default(), false)
            }
            Take::Empty => return None,
        };
        inner.cond.notify_all();
        drop(state);
        *self.slot.0.borrow_mut() = Some(value);
        Some(ok)
    }
}

struct SendCase<T> {
    chan: Chan<T>,
    value: Option<T>,
    /// Ticket of the value offered to receivers while the select blocks.
    offered: Option<u64>,
}

impl<T: Default> SelectCase for SendCase<T> {
    fn poll(&mut self, own: &Own<'_>) -> Option<bool> {
        let inner = self.chan.inner.as_ref()?;
        let mut state = lock_unpoisoned(&inner.state);
        if state.closed {
            if own.decision.try_claim(own.case) {
                drop(state);
                runtime_panic(ChanError::SendOnClosed.into());
            }
            return None;
        }
        if self.offered.is_some() {
            // A receiver taking the offer decides the select.
            return None;
        }

        if has_room(inner, &state) {
            if !own.decision.try_claim(own.case) {
                return None;
            }
            let value = self.value.take()?;
            state.push(value, None);
            inner.cond.notify_all();
            return Some(true);
        }

        if inner.cap == 0 && own.blocking {
            let value = self.value.take()?;
            let claim = Claim {
                decision: own.decision.clone(),
                case: own.case,
            };
            self.offered = Some(state.push(value, Some(claim)));
            inner.cond.notify_all();
        }
        None
    }

    fn withdraw(&mut self) {
        let (Some(ticket), Some(inner)) = (self.offered.take(), self.chan.inner.as_ref()) else {
            return;
        };
        lock_unpoisoned(&inner.state)
            .queue
            .retain(|entry| entry.ticket != ticket);
    }
}

/// Where a receive case of a [`Select`] leaves its value.
pub struct Slot<T>(Rc<RefCell<Option<T>>>);

impl<T: Default> Slot<T> {
    /// The received value, or the zero value if this case did not fire.
    pub fn take(&self) -> T {
        self.0.borrow_mut().take().unwrap_or_default()
    }
}

/// A `select` statement. Cases are polled in a rotating order until one
/// fires; blocking selects back off between rounds. While it blocks, each
/// unbuffered send case stays offered to receivers, and the first receiver
/// to take an offer decides the select.
#[derive(Default)]
pub struct Select {
    cases: Vec<Box<dyn SelectCase>>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recv<T: Default + 'static>(&mut self, chan: &Chan<T>) -> Slot<T> {
        let slot = Rc::new(RefCell::new(None));
        self.cases.push(Box::new(RecvCase {
            chan: chan.clone(),
            slot: Slot(slot.clone()),
        }));
        Slot(slot)
    }

    pub fn send<T: Default + 'static>(&mut self, chan: &Chan<T>, value: T) {
        self.cases.push(Box::new(SendCase {
            chan: chan.clone(),
            value: Some(value),
            offered: None,
        }));
    }

    /// Returns the index of the chosen case and, for a receive, whether the
    /// value came from a send. A non-blocking select with nothing ready
    /// returns `(-1, false)`.
    pub fn wait(&mut self, blocking: bool) -> (isize, bool) {
        if self.cases.is_empty() && blocking {
            block_forever();
        }
        let decision = Decision::default();
        let chosen = self.search(&decision, blocking);
        for case in &mut self.cases {
            case.withdraw();
        }
        match chosen {
            Some((index, ok)) => (index as isize, ok),
            None => (-1, false),
        }
    }

    fn search(&mut self, decision: &Decision, blocking: bool) -> Option<(usize, bool)> {
        let mut round: u32 = 0;
        loop {
            let n = self.cases.len();
            for k in 0..n {
                let case = (k + round as usize) % n;
                let own = Own {
                    decision,
                    case,
                    blocking,
                };
                if let Some(ok) = self.cases[case].poll(&own) {
                    return Some((case, ok));
                }
                // Decided by a receiver that took one of our offers.
                if let Some(chosen) = decision.get() {
                    return Some((chosen, true));
                }
            }
            if !blocking {
                return None;
            }
            round = round.wrapping_add(1);
            if round < 64 {
                thread::yield_now();
            } else {
                thread::sleep(Duration::from_micros(200));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn unbuffered_send_waits_for_receiver() {
        let ch: Chan<isize> = Chan::new(0);
        let delivered = Arc::new(AtomicBool::new(false));

        let sender = {
            let (ch, delivered) = (ch.clone(), delivered.clone());
            thread::spawn(move || {
                ch.send(5);
                delivered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!delivered.load(Ordering::SeqCst));
        assert_eq!(ch.recv(), 5);
        sender.join().unwrap();
        assert!(delivered.load(Ordering::SeqCst));
    }

    #[test]
    fn buffered_channel_drains_after_close() {
        let ch: Chan<i32> = Chan::new(2usize);
        ch.send(1);
        ch.send(2);
        assert_eq!(ch.len(), 2);
        assert_eq!(ch.try_send(3), Err(TrySendError::Full(3)));

        ch.close();
        assert_eq!(ch.recv_ok(), (1, true));
        assert_eq!(ch.recv_ok(), (2, true));
        assert_eq!(ch.recv_ok(), (0, false));
    }

    #[test]
    fn misuse_is_reported() {
        let ch: Chan<u8> = Chan::new(1);
        ch.close();

        assert_eq!(ch.send_checked(1), Err(ChanError::SendOnClosed));
        assert_eq!(ch.close_checked(), Err(ChanError::CloseOfClosed));
        assert_eq!(Chan::<u8>::nil().close_checked(), Err(ChanError::CloseOfNil));
    }

    #[test]
    fn select_picks_the_ready_case() {
        let idle: Chan<i32> = Chan::new(0);
        let ready: Chan<i32> = Chan::new(1);
        ready.send(7);

        let mut select = Select::new();
        let a = select.recv(&idle);
        let b = select.recv(&ready);
        let (index, ok) = select.wait(true);

        assert_eq!((index, ok), (1, true));
        assert_eq!(a.take(), 0);
        assert_eq!(b.take(), 7);
    }

    #[test]
    fn select_send_pairs_with_select_recv() {
        let ch: Chan<i32> = Chan::new(0);
        let (done, finished) = std::sync::mpsc::channel();

        let sender = {
            let ch = ch.clone();
            thread::spawn(move || {
                let idle: Chan<i32> = Chan::new(0);
                let mut select = Select::new();
                select.send(&ch, 7);
                let _ = select.recv(&idle);
                select.wait(true)
            })
        };
        let receiver = {
            let ch = ch.clone();
            thread::spawn(move || {
                let idle: Chan<i32> = Chan::new(0);
                let mut select = Select::new();
                let value = select.recv(&ch);
                let _ = select.recv(&idle);
                let chosen = select.wait(true);
                let _ = done.send((chosen, value.take()));
            })
        };

        let received = finished.recv_timeout(Duration::from_secs(5));
        assert_eq!(received, Ok(((0, true), 7)));
        assert_eq!(sender.join().unwrap(), (0, true));
        receiver.join().unwrap();
    }

    #[test]
    fn plain_receive_takes_a_select_offer() {
        let ch: Chan<&str> = Chan::new(0);

        let receiver = {
            let ch = ch.clone();
            thread::spawn(move || ch.recv())
        };
        let mut select = Select::new();
        select.send(&ch, "hi");

        assert_eq!(select.wait(true), (0, true));
        assert_eq!(receiver.join().unwrap(), "hi");
    }

    #[test]
    fn offers_are_withdrawn_when_another_case_fires() {
        let ch: Chan<i32> = Chan::new(0);
        let ready: Chan<i32> = Chan::new(1);
        ready.send(1);

        let mut select = Select::new();
        select.send(&ch, 9);
        let _ = select.recv(&ready);
        let (index, _) = select.wait(true);

        assert_eq!(index, 1);
        assert_eq!(ch.try_recv(), None);
    }

    #[test]
    fn non_blocking_select_falls_through() {
        let ch: Chan<i32> = Chan::new(0);
        let mut select = Select::new();
        select.send(&ch, 1);

        assert_eq!(select.wait(false), (-1, false));
    }
}
