//! Timer Wheel
//!
//! A circular array of slots, one per tick. A cursor steps through the slots
//! at a fixed interval and fires whatever is due in the slot it lands on.
//!
//! ```text
//!               cursor
//!                 │
//!                 ▼
//!   ┌─────┬─────┬─────┬─────┬─────┬─────┬─────┐
//!   │  0  │  1  │  2  │  3  │ ... │ n-2 │ n-1 │   one slot per tick
//!   └─────┴─────┴──┬──┴─────┴─────┴─────┴─────┘
//!                  │
//!                  ├── task(circle = 0)  -> fires now
//!                  └── task(circle = 2)  -> two more laps
//! ```
//!
//! A task `d` ahead of now lands `ceil(d / interval)` slots past the cursor.
//! Delays longer than one lap keep a `circle` count that is decremented each
//! time the cursor passes, and the task fires when the count reaches zero.
//!
//! ## Concurrency
//!
//! The slots, the cursor and the key index belong to a single Tokio task (the
//! control loop). [`TimerWheel`] only holds the sending half of a channel:
//! `add`, `cancel` and `stop` are messages, so callers never contend on the
//! wheel's state and never wait for a tick. Commands take priority over ticks,
//! which means a cancel sent before a task's tick always wins.
//!
//! Due callbacks run on the blocking pool under `catch_unwind`. A slow or
//! panicking callback never delays the next tick or takes the loop down.

use crate::config::{DEFAULT_TIMER_INTERVAL, DEFAULT_TIMER_SLOTS};
use crate::error::{EngineError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// A one-shot timer callback.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Messages handled by the control loop.
enum Command {
    Add {
        delay: Duration,
        key: Option<Bytes>,
        callback: Callback,
    },
    Cancel(Bytes),
    Contains(Bytes, oneshot::Sender<bool>),
    Stop,
}

/// A scheduled callback.
struct Task {
    key: Option<Bytes>,
    /// Full laps left before the task is due
    circle: usize,
    callback: Callback,
}

/// Handle to a timer wheel.
///
/// Commands sent before [`start`](Self::start) are queued and applied once the
/// control loop runs. Dropping the handle stops the loop; tasks still pending
/// at that point never fire.
pub struct TimerWheel {
    interval: Duration,
    slot_count: usize,
    commands: mpsc::UnboundedSender<Command>,
    /// Receiving half, moved into the control loop by `start`
    pending: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
}

impl std::fmt::Debug for TimerWheel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerWheel")
            .field("interval", &self.interval)
            .field("slot_count", &self.slot_count)
            .field("started", &self.pending.lock().is_none())
            .finish()
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new(DEFAULT_TIMER_INTERVAL, DEFAULT_TIMER_SLOTS)
    }
}

impl TimerWheel {
    /// Creates a stopped wheel with `slot_count` slots advancing every
    /// `interval`.
    ///
    /// The interval is raised to at least 1ms and the slot count to at least 1.
    pub fn new(interval: Duration, slot_count: usize) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        Self {
            interval: interval.max(Duration::from_millis(1)),
            slot_count: slot_count.max(1),
            commands,
            pending: Mutex::new(Some(receiver)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Spawns the control loop on the current Tokio runtime.
    ///
    /// Fails with [`EngineError::NoRuntime`] outside a runtime and with
    /// [`EngineError::TimerAlreadyStarted`] on a second call.
    pub fn start(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let receiver = self
            .pending
            .lock()
            .take()
            .ok_or(EngineError::TimerAlreadyStarted)?;

        let state = WheelState::new(self.interval, self.slot_count);
        handle.spawn(control_loop(state, receiver));

        info!(
            interval_ms = self.interval.as_millis() as u64,
            slots = self.slot_count,
            "Timer wheel started"
        );
        Ok(())
    }

    /// Schedules `callback` to run once after `delay`.
    ///
    /// With a `key`, any task already scheduled under that key is cancelled
    /// first, so only the newest callback for a key ever fires.
    pub fn add<F>(&self, delay: Duration, key: Option<Bytes>, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Command::Add {
            delay,
            key,
            callback: Box::new(callback),
        });
    }

    /// Cancels the task scheduled under `key`, if any.
    ///
    /// A task whose callback has already been dispatched is not affected.
    pub fn cancel(&self, key: &[u8]) {
        self.send(Command::Cancel(Bytes::copy_from_slice(key)));
    }

    /// Whether a task is scheduled under `key`.
    ///
    /// Answered by the control loop after every command sent before it, so a
    /// wheel that was never started keeps this pending.
    pub async fn is_scheduled(&self, key: &[u8]) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Contains(Bytes::copy_from_slice(key), reply_tx));
        reply_rx.await.unwrap_or(false)
    }

    /// Stops the control loop. Pending tasks are discarded.
    pub fn stop(&self) {
        if self.commands.send(Command::Stop).is_ok() {
            info!("Timer wheel stopped");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            trace!("timer wheel is stopped, command dropped");
        }
    }

    /// Commands waiting for a wheel that has not been started.
    #[cfg(test)]
    pub(crate) fn queued(&self) -> usize {
        self.pending.lock().as_ref().map_or(0, |receiver| receiver.len())
    }
}

impl Drop for TimerWheel {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Stop);
    }
}

/// Wheel state owned by the control loop.
struct WheelState {
    interval: Duration,
    slots: Vec<BTreeMap<u64, Task>>,
    /// key -> (slot, sequence number) of its live task
    index: HashMap<Bytes, (usize, u64)>,
    cursor: usize,
    next_seq: u64,
}

impl WheelState {
    fn new(interval: Duration, slot_count: usize) -> Self {
        Self {
            interval,
            slots: (0..slot_count).map(|_| BTreeMap::new()).collect(),
            index: HashMap::new(),
            cursor: 0,
            next_seq: 0,
        }
    }

    /// Slot index and lap count for a task `delay` from now.
    fn position(&self, delay: Duration) -> (usize, usize) {
        let slot_count = self.slots.len();
        let ticks = delay.as_nanos().div_ceil(self.interval.as_nanos());
        let ticks = usize::try_from(ticks).unwrap_or(usize::MAX);
        ((self.cursor + ticks % slot_count) % slot_count, ticks / slot_count)
    }

    fn add(&mut self, delay: Duration, key: Option<Bytes>, callback: Callback) {
        if let Some(key) = &key {
            self.remove(key);
        }

        let (slot, circle) = self.position(delay);
        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(key) = &key {
            self.index.insert(key.clone(), (slot, seq));
        }
        trace!(?key, slot, circle, "timer task scheduled");
        self.slots[slot].insert(
            seq,
            Task {
                key,
                circle,
                callback,
            },
        );
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        match self.index.remove(key) {
            Some((slot, seq)) => self.slots[slot].remove(&seq).is_some(),
            None => false,
        }
    }

    fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    fn pending(&self) -> usize {
        self.slots.iter().map(BTreeMap::len).sum()
    }

    /// Advances one slot, returning the tasks that became due.
    fn tick(&mut self) -> Vec<Task> {
        let slot = &mut self.slots[self.cursor];

        let mut due = Vec::new();
        for (seq, task) in slot.iter_mut() {
            if task.circle > 0 {
                task.circle -= 1;
            } else {
                due.push(*seq);
            }
        }

        let mut fired = Vec::with_capacity(due.len());
        for seq in due {
            if let Some(task) = slot.remove(&seq) {
                if let Some(key) = &task.key {
                    self.index.remove(key);
                }
                fired.push(task);
            }
        }

        self.cursor = (self.cursor + 1) % self.slots.len();
        fired
    }
}

async fn control_loop(mut state: WheelState, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut ticker = tokio::time::interval(state.interval);
    // A stalled loop must not catch up with a burst of ticks: the cursor would
    // run ahead of the clock and fire tasks early
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::Add { delay, key, callback }) => state.add(delay, key, callback),
                Some(Command::Cancel(key)) => {
                    if state.remove(&key) {
                        trace!(?key, "timer task cancelled");
                    }
                }
                Some(Command::Contains(key, reply)) => {
                    let _ = reply.send(state.contains(&key));
                }
                Some(Command::Stop) | None => {
                    debug!(discarded = state.pending(), "Timer wheel received shutdown signal");
                    return;
                }
            },
            _ = ticker.tick() => {
                for task in state.tick() {
                    dispatch(task);
                }
            }
        }
    }
}

/// Runs a due callback on the blocking pool, containing any panic.
fn dispatch(task: Task) {
    let Task { key, callback, .. } = task;
    tokio::task::spawn_blocking(move || {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(callback)) {
            error!(?key, reason = panic_message(&*panic), "timer callback panicked");
        }
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
