//! Timer scheduling for render loops
//!
//! The engine never spawns threads. A render loop hands a repeating task to a
//! [`Scheduler`] and keeps the returned [`TimerId`] so it can cancel it again.
//! [`TimerQueue`] is the stock scheduler: a host either drives it from its own
//! frame loop with [`TimerQueue::advance`], or lets it sleep between ticks with
//! [`TimerQueue::run_for`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::collections::{SlotMap, TimerId};

/// Task run on every tick of a repeating timer
pub type RepeatingTask = Box<dyn FnMut()>;

/// Source of repeating, cancellable ticks
pub trait Scheduler {
    /// Current time on this scheduler's clock, measured from its creation
    fn now(&self) -> Duration;

    /// Run `task` every `interval`, first tick one interval from now
    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TimerId;

    /// Cancel a timer; returns false if it was not scheduled
    fn cancel(&self, timer: TimerId) -> bool;

    /// Whether the timer is still scheduled
    fn is_scheduled(&self, timer: TimerId) -> bool;
}

struct ScheduledTask {
    interval: Duration,
    next_due: Duration,
    seq: u64,
    task: Rc<RefCell<RepeatingTask>>,
}

/// Virtual-clock timer queue
///
/// Time only moves when the owner advances it, so tick order is fully
/// deterministic and [`Scheduler::now`] reports virtual time. Ticks due at the same instant run in scheduling order.
pub struct TimerQueue {
    now: Cell<Duration>,
    next_seq: Cell<u64>,
    tasks: RefCell<SlotMap<TimerId, ScheduledTask>>,
}

impl TimerQueue {
    /// Create an empty queue at time zero
    pub fn new() -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            next_seq: Cell::new(0),
            tasks: RefCell::new(SlotMap::with_key()),
        }
    }

    /// Number of scheduled timers
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Whether no timers are scheduled
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Time of the earliest pending tick
    pub fn next_deadline(&self) -> Option<Duration> {
        self.tasks.borrow().values().map(|t| t.next_due).min()
    }

    /// Move the clock forward, running every tick that falls due
    ///
    /// Returns the number of ticks run. A task may cancel itself or any other
    /// timer; cancelled timers never tick again.
    pub fn advance(&self, elapsed: Duration) -> usize {
        let target = self.now.get() + elapsed;
        let mut fired = 0;
        while let Some(task) = self.pop_due(target) {
            // A task that re-enters `advance` must not run itself again.
            if let Ok(mut task) = task.try_borrow_mut() {
                (task)();
                fired += 1;
            }
        }
        self.now.set(target);
        fired
    }

    /// Run in real time for `duration`, sleeping between ticks
    ///
    /// Returns early once no timers remain.
    pub fn run_for(&self, duration: Duration) -> usize {
        let started = Instant::now();
        let begin = self.now.get();
        let end = begin + duration;
        let mut fired = 0;

        while let Some(deadline) = self.next_deadline() {
            if deadline > end {
                break;
            }
            let wall = started.elapsed();
            let offset = deadline - begin;
            if offset > wall {
                std::thread::sleep(offset - wall);
            }
            fired += self.advance(deadline.saturating_sub(self.now.get()));
        }

        if !self.is_empty() {
            self.advance(end.saturating_sub(self.now.get()));
        }
        fired
    }

    fn pop_due(&self, target: Duration) -> Option<Rc<RefCell<RepeatingTask>>> {
        let mut tasks = self.tasks.borrow_mut();
        let entry = tasks
            .values_mut()
            .filter(|t| t.next_due <= target)
            .min_by_key(|t| (t.next_due, t.seq))?;

        self.now.set(entry.next_due);
        entry.next_due += entry.interval;
        Some(Rc::clone(&entry.task))
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TimerQueue {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TimerId {
        let interval = interval.max(Duration::from_nanos(1));
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.tasks.borrow_mut().insert(ScheduledTask {
            interval,
            next_due: self.now.get() + interval,
            seq,
            task: Rc::new(RefCell::new(task)),
        })
    }

    fn cancel(&self, timer: TimerId) -> bool {
        self.tasks.borrow_mut().remove(timer).is_some()
    }

    fn is_scheduled(&self, timer: TimerId) -> bool {
        self.tasks.borrow().contains_key(timer)
    }
}
