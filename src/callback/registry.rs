//! Per-mode callback lifecycle state
//!
//! Each mode owns an independent slot behind its own lock, so the native
//! callback thread of one mode never contends with control calls for
//! another. Start/stop completions are engine-wide and live in separate
//! queues. No method blocks beyond a short critical section.

use parking_lot::Mutex;
use std::collections::VecDeque;

use super::types::Mode;

/// One-shot action run when a waited-for native event arrives
pub type Completion = Box<dyn FnOnce() + Send>;

struct CallbackState<H> {
    handle: Option<H>,
    /// No buffer events are expected until the next STARTING
    ended: bool,
    pending_unregisters: VecDeque<Completion>,
    /// Handles the engine disowned while the stream was live, freed on the
    /// next ENDING
    retired: Vec<H>,
}

impl<H> Default for CallbackState<H> {
    fn default() -> Self {
        Self {
            handle: None,
            ended: true,
            pending_unregisters: VecDeque::new(),
            retired: Vec::new(),
        }
    }
}

/// FIFO of engine-wide waiters, each tagged so a failed request can withdraw
/// its own entry
#[derive(Default)]
struct WaiterQueue {
    next_ticket: u64,
    waiters: VecDeque<(u64, Completion)>,
}

impl WaiterQueue {
    fn push(&mut self, waiter: Completion) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.waiters.push_back((ticket, waiter));
        ticket
    }

    fn cancel(&mut self, ticket: u64) -> bool {
        let before = self.waiters.len();
        self.waiters.retain(|(queued, _)| *queued != ticket);
        self.waiters.len() != before
    }

    fn drain(&mut self) -> Vec<Completion> {
        self.waiters.drain(..).map(|(_, waiter)| waiter).collect()
    }
}

/// Result of asking to release a mode's handle
pub enum Release<H> {
    /// The stream had ended; the handle (if any) is handed back for dropping
    Released(Option<H>),
    /// The stream is still live; the waiter was queued until ENDING
    Deferred,
}

/// Result of releasing a handle the engine no longer knows about
pub enum Disown<H> {
    /// The stream had ended; the handle (if any) is handed back for dropping
    Released(Option<H>),
    /// The stream is live; the handle was parked until the next ENDING
    Retired,
    /// An earlier unregister is still waiting; the waiter joined its queue
    Deferred,
}

/// What an ENDING hands back for dropping once the trampoline lets go
pub struct Ending<H> {
    pub released: Vec<H>,
    pub waiters: Vec<Completion>,
}

/// Lifecycle state for the three modes, generic over the handle type
pub struct CallbackRegistry<H> {
    slots: [Mutex<CallbackState<H>>; 3],
    start_waiters: Mutex<WaiterQueue>,
    stop_waiters: Mutex<WaiterQueue>,
}

impl<H> CallbackRegistry<H> {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            start_waiters: Mutex::new(WaiterQueue::default()),
            stop_waiters: Mutex::new(WaiterQueue::default()),
        }
    }

    fn slot(&self, mode: Mode) -> &Mutex<CallbackState<H>> {
        &self.slots[mode.index()]
    }

    pub fn is_registered(&self, mode: Mode) -> bool {
        self.slot(mode).lock().handle.is_some()
    }

    /// Set by [`finish_ending`](Self::finish_ending), which runs after the
    /// ENDING handler has returned, so the handler itself still sees `false`.
    pub fn has_ended(&self, mode: Mode) -> bool {
        self.slot(mode).lock().ended
    }

    pub fn mark_started(&self, mode: Mode) {
        self.slot(mode).lock().ended = false;
    }

    pub fn mark_ended(&self, mode: Mode) {
        self.slot(mode).lock().ended = true;
    }

    /// Install a handle. Fails, giving the handle back, if one is present.
    pub fn set_handle(&self, mode: Mode, handle: H) -> Result<(), H> {
        let mut slot = self.slot(mode).lock();
        if slot.handle.is_some() {
            return Err(handle);
        }
        slot.handle = Some(handle);
        Ok(())
    }

    pub fn clear_handle(&self, mode: Mode) -> Option<H> {
        self.slot(mode).lock().handle.take()
    }

    pub fn enqueue_unregister_waiter(&self, mode: Mode, waiter: Completion) {
        self.slot(mode).lock().pending_unregisters.push_back(waiter);
    }

    /// Take every queued unregister waiter, oldest first
    pub fn drain_unregister_waiters(&self, mode: Mode) -> Vec<Completion> {
        self.slot(mode).lock().pending_unregisters.drain(..).collect()
    }

    pub fn pending_unregisters(&self, mode: Mode) -> usize {
        self.slot(mode).lock().pending_unregisters.len()
    }

    /// Release the handle now if the stream has ended, otherwise queue
    /// `waiter` behind the next ENDING. The check and the enqueue happen
    /// under one lock so an ENDING cannot slip between them.
    pub fn release_or_defer(&self, mode: Mode, waiter: Completion) -> Release<H> {
        let mut slot = self.slot(mode).lock();
        if slot.ended {
            Release::Released(slot.handle.take())
        } else {
            slot.pending_unregisters.push_back(waiter);
            Release::Deferred
        }
    }

    /// Drop the handle for a callback the engine reports as not registered,
    /// without waiting for an ENDING that may never come. A live handle is
    /// parked in the retired list rather than freed. Callers arriving while
    /// an earlier unregister is still queued join that queue.
    pub fn disown_or_defer(&self, mode: Mode, waiter: Completion) -> Disown<H> {
        let mut slot = self.slot(mode).lock();
        if !slot.pending_unregisters.is_empty() {
            slot.pending_unregisters.push_back(waiter);
            return Disown::Deferred;
        }
        if slot.ended {
            return Disown::Released(slot.handle.take());
        }
        if let Some(handle) = slot.handle.take() {
            slot.retired.push(handle);
        }
        Disown::Retired
    }

    /// Publish ENDING for `mode`. Retired handles are always handed back. If
    /// unregisters are waiting and a handle is installed, the handle is taken
    /// out too, together with the waiters (FIFO).
    pub fn finish_ending(&self, mode: Mode) -> Ending<H> {
        let mut slot = self.slot(mode).lock();
        slot.ended = true;
        let mut released = std::mem::take(&mut slot.retired);
        if slot.pending_unregisters.is_empty() || slot.handle.is_none() {
            return Ending {
                released,
                waiters: Vec::new(),
            };
        }
        released.extend(slot.handle.take());
        Ending {
            released,
            waiters: slot.pending_unregisters.drain(..).collect(),
        }
    }

    /// Take the installed handle and any retired ones, for teardown
    pub fn take_all_handles(&self, mode: Mode) -> Vec<H> {
        let mut slot = self.slot(mode).lock();
        let mut handles = std::mem::take(&mut slot.retired);
        handles.extend(slot.handle.take());
        handles
    }

    pub fn retired_count(&self, mode: Mode) -> usize {
        self.slot(mode).lock().retired.len()
    }

    /// Queue a start waiter; the ticket withdraws it with
    /// [`cancel_start_waiter`](Self::cancel_start_waiter)
    pub fn enqueue_start_waiter(&self, waiter: Completion) -> u64 {
        self.start_waiters.lock().push(waiter)
    }

    pub fn enqueue_stop_waiter(&self, waiter: Completion) -> u64 {
        self.stop_waiters.lock().push(waiter)
    }

    /// False when the waiter was already drained by an event
    pub fn cancel_start_waiter(&self, ticket: u64) -> bool {
        self.start_waiters.lock().cancel(ticket)
    }

    pub fn cancel_stop_waiter(&self, ticket: u64) -> bool {
        self.stop_waiters.lock().cancel(ticket)
    }

    pub fn queued_start_waiters(&self) -> usize {
        self.start_waiters.lock().waiters.len()
    }

    pub fn queued_stop_waiters(&self) -> usize {
        self.stop_waiters.lock().waiters.len()
    }

    pub fn drain_start_waiters(&self) -> Vec<Completion> {
        self.start_waiters.lock().drain()
    }

    pub fn drain_stop_waiters(&self) -> Vec<Completion> {
        self.stop_waiters.lock().drain()
    }

    /// Modes currently holding a handle
    pub fn registered_modes(&self) -> Vec<Mode> {
        Mode::ALL
            .into_iter()
            .filter(|&mode| self.is_registered(mode))
            .collect()
    }
}

impl<H> Default for CallbackRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run completions in order
pub fn resolve_all(waiters: Vec<Completion>) {
    for waiter in waiters {
        waiter();
    }
}
