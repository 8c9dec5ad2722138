//! Timers and deferred work
//!
//! The runtime is single-threaded and never sleeps. Anything that must happen
//! "later" is recorded here and handed back to the collaborator, which drives
//! it from its own event loop:
//!
//! - [`TimerQueue`] holds cancellable deadlines (typeahead clear, delayed
//!   machine transitions, delayed confirmations). The collaborator polls it
//!   with the current time.
//! - [`TickQueue`] holds work for the next scheduling tick or the next paint
//!   (deferred blur, focusing an element once its render has committed).
//!
//! Time itself comes from a [`Clock`], so tests can step it manually.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to an armed timer
    pub struct TimerId;
    /// Handle to deferred tick work
    pub struct TickId;
}

/// Source of the current time
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Shared clock handle passed to machines and controllers
pub type SharedClock = Rc<dyn Clock>;

/// Wall clock backed by [`Instant::now`]
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
        }
    }

    /// Create a manual clock already wrapped for sharing
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Convenience for `advance(Duration::from_millis(ms))`
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

struct Timer<T> {
    deadline: Instant,
    /// Arm order, breaks ties between equal deadlines
    seq: u64,
    payload: T,
}

/// Cancellable deadlines keyed by [`TimerId`]
pub struct TimerQueue<T> {
    timers: SlotMap<TimerId, Timer<T>>,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            timers: SlotMap::with_key(),
            next_seq: 0,
        }
    }

    /// Arm a timer that becomes due at `deadline`
    pub fn arm(&mut self, deadline: Instant, payload: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert(Timer {
            deadline,
            seq,
            payload,
        })
    }

    /// Cancel a timer
    ///
    /// Cancelling a timer that already fired or was already cancelled is a
    /// no-op and returns `None`.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        self.timers.remove(id).map(|t| t.payload)
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.timers.contains_key(id)
    }

    /// Deadline of an armed timer
    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.timers.get(id).map(|t| t.deadline)
    }

    /// Earliest deadline among armed timers
    ///
    /// The collaborator uses this to schedule its next wakeup.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn take_due(&mut self, now: Instant) -> Vec<(TimerId, T)> {
        let mut due: Vec<(TimerId, Instant, u64)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .map(|(id, t)| (id, t.deadline, t.seq))
            .collect();
        due.sort_by_key(|&(_, deadline, seq)| (deadline, seq));

        due.into_iter()
            .filter_map(|(id, _, _)| self.timers.remove(id).map(|t| (id, t.payload)))
            .collect()
    }

    /// Cancel everything
    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Work deferred to the next tick or the next paint
///
/// Entries drain in the order they were deferred. An entry cancelled before
/// the drain never runs.
pub struct TickQueue<T> {
    pending: SlotMap<TickId, (u64, T)>,
    next_seq: u64,
}

impl<T> TickQueue<T> {
    pub fn new() -> Self {
        Self {
            pending: SlotMap::with_key(),
            next_seq: 0,
        }
    }

    pub fn defer(&mut self, payload: T) -> TickId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((seq, payload))
    }

    /// Cancel deferred work, returns `None` if it already ran or was cancelled
    pub fn cancel(&mut self, id: TickId) -> Option<T> {
        self.pending.remove(id).map(|(_, payload)| payload)
    }

    pub fn is_pending(&self, id: TickId) -> bool {
        self.pending.contains_key(id)
    }

    /// Take every pending entry in deferral order
    pub fn drain(&mut self) -> Vec<T> {
        let mut entries: Vec<(u64, T)> = self.pending.drain().map(|(_, entry)| entry).collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, payload)| payload).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for TickQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
