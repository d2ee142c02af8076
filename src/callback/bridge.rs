//! Native callback trampoline
//!
//! The engine calls [`trampoline`] on its own audio thread for every event of
//! a registered mode. The user pointer it passes back is the
//! [`BridgeContext`] installed at registration, which carries the mode, the
//! application handler and a weak link to the shared lifecycle core.
//!
//! # Safety
//!
//! Panics never cross back into the engine: decoding and the handler run
//! under `catch_unwind`, and faults are re-delivered to the same handler as
//! errors. The context is freed only when its [`CallbackHandle`] is dropped,
//! which the registry allows only once the stream has ended.

use parking_lot::Mutex;
use std::any::Any;
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::{Arc, Weak};
use std::thread;

use super::coordinator::CallbackCore;
use super::decode::{decode_buffer, decode_info};
use super::registry::resolve_all;
use super::types::{AudioEvent, AudioInfo, BufferKind, CallbackOptions, Command, EventKind, Mode};
use crate::error::CallbackError;
use crate::remote::AudioCallbackFn;

/// Status returned to the engine for every invocation
pub const CALLBACK_HANDLED: i32 = 0;

/// Application handler: `(error, event)`. `error` is set exactly when
/// something failed at the native boundary or inside a previous invocation.
pub type AudioHandler =
    Box<dyn FnMut(Option<CallbackError>, Option<&mut AudioEvent<'_>>) + Send + 'static>;

/// Everything the trampoline needs for one registration
pub(crate) struct BridgeContext {
    mode: Mode,
    options: CallbackOptions,
    handler: Arc<Mutex<AudioHandler>>,
    core: Weak<CallbackCore>,
}

impl BridgeContext {
    pub(crate) fn new(
        mode: Mode,
        options: CallbackOptions,
        handler: AudioHandler,
        core: Weak<CallbackCore>,
    ) -> Self {
        Self {
            mode,
            options,
            handler: Arc::new(Mutex::new(handler)),
            core,
        }
    }

    /// Handle one native event. Returns the registration handles this ENDING
    /// released; the caller drops them after this borrow ends.
    fn dispatch(
        &self,
        core: &Arc<CallbackCore>,
        mode_bits: i32,
        command: i32,
        data: *mut c_void,
        nnn: i32,
    ) -> Vec<CallbackHandle> {
        if mode_bits != self.mode.as_raw() {
            tracing::warn!(mode = %self.mode, mode_bits, "Callback context bound to another mode");
            return Vec::new();
        }
        let Some(command) = Command::from_raw(command) else {
            tracing::trace!(mode = %self.mode, command, "Ignoring unknown callback command");
            return Vec::new();
        };

        match command {
            Command::Starting => {
                core.registry.mark_started(self.mode);
                resolve_all(core.registry.drain_start_waiters());
                self.deliver_info(command, data, nnn);
                Vec::new()
            }
            Command::Ending => {
                resolve_all(core.registry.drain_stop_waiters());
                self.deliver_info(command, data, nnn);
                // Ended is published only now, after the handler returned, so a
                // concurrent unregister cannot free this context mid-call.
                let ending = core.registry.finish_ending(self.mode);
                if !ending.released.is_empty() {
                    tracing::debug!(
                        mode = %self.mode,
                        released = ending.released.len(),
                        waiters = ending.waiters.len(),
                        "Audio callback released after ENDING"
                    );
                }
                resolve_all(ending.waiters);
                ending.released
            }
            Command::Change => {
                let info = self.deliver_info(command, data, nnn);
                if self.options.restart_on_changed_stream {
                    self.schedule_restart(core, info, nnn);
                }
                Vec::new()
            }
            Command::BufferIn | Command::BufferOut | Command::BufferMain => {
                let kind = match command {
                    Command::BufferIn => BufferKind::In,
                    Command::BufferOut => BufferKind::Out,
                    _ => BufferKind::Main,
                };
                self.invoke(nnn, || {
                    // SAFETY: the engine passes a buffer record valid for this call.
                    let buffer = unsafe { decode_buffer(data) }?;
                    Ok(EventKind::Buffer { kind, buffer })
                });
                Vec::new()
            }
        }
    }

    fn deliver_info(&self, command: Command, data: *mut c_void, nnn: i32) -> Option<AudioInfo> {
        // SAFETY: the engine passes an info record for STARTING/ENDING/CHANGE.
        match unsafe { decode_info(data) } {
            Ok(info) => {
                self.invoke(nnn, || {
                    Ok(match command {
                        Command::Starting => EventKind::Starting(info),
                        Command::Ending => EventKind::Ending(info),
                        _ => EventKind::Change(info),
                    })
                });
                Some(info)
            }
            Err(error) => {
                self.report(error);
                None
            }
        }
    }

    /// Build the event and run the handler; any failure is re-delivered to
    /// the handler without an event.
    fn invoke<'a>(&self, nnn: i32, build: impl FnOnce() -> Result<EventKind<'a>, CallbackError>) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut event = AudioEvent {
                user_context: self.options.user_context,
                sequence: nnn,
                kind: build()?,
            };
            let mut handler = self.handler.lock();
            (*handler)(None, Some(&mut event));
            Ok(())
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => self.report(error),
            Err(payload) => self.report(CallbackError::HandlerFault(panic_message(&*payload))),
        }
    }

    fn report(&self, error: CallbackError) {
        tracing::warn!(mode = %self.mode, "Audio callback fault: {error}");
        let handler = &self.handler;
        let redelivered = catch_unwind(AssertUnwindSafe(|| {
            let mut handler = handler.lock();
            (*handler)(Some(error), None);
        }));
        if redelivered.is_err() {
            tracing::error!(mode = %self.mode, "Audio handler panicked while handling a fault");
        }
    }

    /// One restart attempt after the engine settles. The thread only holds
    /// the handler and a weak core link, never this context.
    fn schedule_restart(&self, core: &Arc<CallbackCore>, info: Option<AudioInfo>, nnn: i32) {
        let mode = self.mode;
        let user_context = self.options.user_context;
        let delay = core.restart_delay;
        let handler = self.handler.clone();
        let core = Arc::downgrade(core);

        let spawned = thread::Builder::new()
            .name(format!("vmr-restart-{mode}"))
            .spawn(move || {
                thread::sleep(delay);
                let Some(core) = core.upgrade() else {
                    return;
                };
                let cause = match core.request_start() {
                    Ok(_started) => {
                        tracing::debug!(%mode, "Restarted audio callback after stream change");
                        return;
                    }
                    Err(cause) => cause,
                };

                let error = CallbackError::RestartAfterChangeFailed(Box::new(cause));
                tracing::error!(%mode, "{error}");
                let mut event = info.map(|info| AudioEvent {
                    user_context,
                    sequence: nnn,
                    kind: EventKind::Change(info),
                });
                let delivered = catch_unwind(AssertUnwindSafe(|| {
                    let mut handler = handler.lock();
                    (*handler)(Some(error), event.as_mut());
                }));
                if delivered.is_err() {
                    tracing::error!(%mode, "Audio handler panicked while handling a restart failure");
                }
            });

        if let Err(e) = spawned {
            tracing::error!(%mode, "Failed to spawn restart thread: {e}");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Let go of the trampoline's strong link. When it is the last one, the
/// application has dropped every [`AudioCallbacks`](super::AudioCallbacks),
/// and the core's teardown (which calls back into the engine to unregister)
/// is moved off the engine's audio thread.
fn release_core(core: Arc<CallbackCore>) {
    let Ok(core) = Arc::try_unwrap(core) else {
        return;
    };
    // A failed spawn drops the closure, and the core with it, right here
    let spawned = thread::Builder::new()
        .name("vmr-teardown".to_string())
        .spawn(move || drop(core));
    if let Err(e) = spawned {
        tracing::error!("Failed to spawn teardown thread, tore down inline: {e}");
    }
}

/// Entry point handed to the engine. `MODE` gives each mode its own
/// function address, which is how the engine identifies it on unregister.
///
/// # Safety
///
/// `lp_user` must be null or the context pointer of a live
/// [`CallbackHandle`] registered for `MODE`.
pub unsafe extern "system" fn trampoline<const MODE: i32>(
    lp_user: *mut c_void,
    command: i32,
    data: *mut c_void,
    nnn: i32,
) -> i32 {
    if lp_user.is_null() {
        return CALLBACK_HANDLED;
    }

    let contained = catch_unwind(AssertUnwindSafe(|| {
        // Both may free the context, so they are dropped after its borrow ends
        let (core, released) = {
            // SAFETY: lp_user was produced by CallbackHandle::new and the
            // handle is alive until `released` or `core` is dropped below.
            let context = unsafe { &*lp_user.cast::<BridgeContext>() };
            let Some(core) = context.core.upgrade() else {
                return;
            };
            let released = context.dispatch(&core, MODE, command, data, nnn);
            (core, released)
        };
        drop(released);
        release_core(core);
    }));
    if contained.is_err() {
        tracing::error!(mode_bits = MODE, command, "Panic contained at audio callback boundary");
    }

    CALLBACK_HANDLED
}

/// Trampoline instance for `mode`
pub fn trampoline_for(mode: Mode) -> AudioCallbackFn {
    match mode {
        Mode::Input => trampoline::<1>,
        Mode::Output => trampoline::<2>,
        Mode::Main => trampoline::<4>,
    }
}

/// Owned registration: the heap context the engine sees as its user
/// pointer, plus the trampoline bound to it. Dropping frees the context.
pub struct CallbackHandle {
    context: NonNull<BridgeContext>,
    mode: Mode,
}

// SAFETY: BridgeContext is Send + Sync (its handler sits behind a mutex), and
// the handle is the sole owner of the allocation.
unsafe impl Send for CallbackHandle {}
unsafe impl Sync for CallbackHandle {}

impl CallbackHandle {
    pub(crate) fn new(context: BridgeContext) -> Self {
        let mode = context.mode;
        let context = NonNull::from(Box::leak(Box::new(context)));
        Self { context, mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn callback(&self) -> AudioCallbackFn {
        trampoline_for(self.mode)
    }

    pub fn user_ptr(&self) -> *mut c_void {
        self.context.as_ptr().cast()
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        // SAFETY: allocated by Box in `new` and released exactly once here.
        drop(unsafe { Box::from_raw(self.context.as_ptr()) });
    }
}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("mode", &self.mode)
            .field("context", &self.context)
            .finish()
    }
}
