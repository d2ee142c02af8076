//! Audio callback lifecycle
//!
//! [`AudioCallbacks`] is the control-side API: register a handler per mode,
//! start and stop the engine's callback processing, and unregister. Each
//! asynchronous operation completes on the native event that confirms it
//! (STARTING for start, ENDING for stop and for unregistering a live stream),
//! delivered on the engine's thread through the bridge.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::bridge::{trampoline_for, AudioHandler, BridgeContext, CallbackHandle};
use super::registry::{CallbackRegistry, Completion, Disown, Release};
use super::types::{AudioEvent, CallbackOptions, Mode};
use crate::config::ConnectorConfig;
use crate::constants::DEFAULT_RESTART_DELAY_MS;
use crate::error::CallbackError;
use crate::remote::{c_buffer_to_string, AudioCallbackApi, CLIENT_NAME_LEN};

/// State shared between the control side, the bridge and restart threads
pub(crate) struct CallbackCore {
    pub(crate) remote: Arc<dyn AudioCallbackApi>,
    pub(crate) registry: CallbackRegistry<CallbackHandle>,
    pub(crate) restart_delay: Duration,
}

fn completion(tx: oneshot::Sender<()>) -> Completion {
    Box::new(move || {
        // The caller may have stopped waiting; nothing to report then
        let _ = tx.send(());
    })
}

impl CallbackCore {
    /// Ask the engine to start. The receiver resolves on the next STARTING.
    pub(crate) fn request_start(&self) -> Result<oneshot::Receiver<()>, CallbackError> {
        let (tx, rx) = oneshot::channel();
        // Queued before the call so a STARTING raised during it is not missed
        let ticket = self.registry.enqueue_start_waiter(completion(tx));
        let error = match self.remote.audio_callback_start() {
            0 => return Ok(rx),
            -2 => CallbackError::NoCallbackRegistered,
            code => CallbackError::StartFailed { code },
        };
        self.registry.cancel_start_waiter(ticket);
        Err(error)
    }

    /// Ask the engine to stop. The receiver resolves on the next ENDING.
    pub(crate) fn request_stop(&self) -> Result<oneshot::Receiver<()>, CallbackError> {
        let (tx, rx) = oneshot::channel();
        let ticket = self.registry.enqueue_stop_waiter(completion(tx));
        let error = match self.remote.audio_callback_stop() {
            0 => return Ok(rx),
            -2 => CallbackError::NoCallbackRegistered,
            code => CallbackError::StopFailed { code },
        };
        self.registry.cancel_stop_waiter(ticket);
        Err(error)
    }
}

impl Drop for CallbackCore {
    fn drop(&mut self) {
        for mode in Mode::ALL {
            let registered = self.registry.is_registered(mode);
            let handles = self.registry.take_all_handles(mode);
            if handles.is_empty() {
                continue;
            }
            let code = if registered {
                self.remote.audio_callback_unregister(trampoline_for(mode))
            } else {
                -2
            };
            if self.registry.has_ended(mode) && (code == 0 || code == -2) {
                drop(handles);
            } else {
                // The engine may still call into these contexts
                tracing::warn!(%mode, code, "Leaking audio callback context of a live stream");
                std::mem::forget(handles);
            }
        }
    }
}

/// Registers audio handlers with the engine and drives their lifecycle.
///
/// Cloning is cheap; clones share the same registrations.
#[derive(Clone)]
pub struct AudioCallbacks {
    core: Arc<CallbackCore>,
    defaults: CallbackOptions,
}

impl AudioCallbacks {
    pub fn new(remote: Arc<dyn AudioCallbackApi>) -> Self {
        Self::with_restart_delay(remote, Duration::from_millis(DEFAULT_RESTART_DELAY_MS))
    }

    /// Use `delay` between a CHANGE event and the automatic restart
    pub fn with_restart_delay(remote: Arc<dyn AudioCallbackApi>, delay: Duration) -> Self {
        Self {
            core: Arc::new(CallbackCore {
                remote,
                registry: CallbackRegistry::new(),
                restart_delay: delay,
            }),
            defaults: CallbackOptions::default(),
        }
    }

    /// Take restart delay and the default restart option from `config`
    pub fn with_config(remote: Arc<dyn AudioCallbackApi>, config: &ConnectorConfig) -> Self {
        let mut callbacks = Self::with_restart_delay(remote, config.restart_delay());
        callbacks.defaults.restart_on_changed_stream = config.restart_on_changed_stream;
        callbacks
    }

    /// Register `handler` for `mode` with the default options.
    ///
    /// `client_name` is truncated to 63 bytes.
    pub fn register_audio_callback<F>(
        &self,
        mode: Mode,
        client_name: &str,
        handler: F,
    ) -> Result<(), CallbackError>
    where
        F: FnMut(Option<CallbackError>, Option<&mut AudioEvent<'_>>) + Send + 'static,
    {
        self.register_audio_callback_with_options(mode, client_name, handler, self.defaults)
    }

    pub fn register_audio_callback_with_options<F>(
        &self,
        mode: Mode,
        client_name: &str,
        handler: F,
        options: CallbackOptions,
    ) -> Result<(), CallbackError>
    where
        F: FnMut(Option<CallbackError>, Option<&mut AudioEvent<'_>>) + Send + 'static,
    {
        let handler: AudioHandler = Box::new(handler);
        let handle = CallbackHandle::new(BridgeContext::new(
            mode,
            options,
            handler,
            Arc::downgrade(&self.core),
        ));
        let callback = handle.callback();
        let user = handle.user_ptr();

        // The handle is installed before the engine can call it
        if self.core.registry.set_handle(mode, handle).is_err() {
            return Err(CallbackError::AlreadyRegistered(mode));
        }

        let mut name = [0u8; CLIENT_NAME_LEN];
        let len = client_name.len().min(CLIENT_NAME_LEN - 1);
        name[..len].copy_from_slice(&client_name.as_bytes()[..len]);

        let code = self
            .core
            .remote
            .audio_callback_register(mode.as_raw(), callback, user, &mut name);
        if code == 0 {
            tracing::debug!(%mode, client_name, "Registered audio callback");
            return Ok(());
        }

        // Rejected registrations are never called, so the context can go
        drop(self.core.registry.clear_handle(mode));
        Err(match code {
            // The header documents 1; engines in the wild answer -2
            1 | -2 => CallbackError::AlreadyRegisteredByOther {
                client_name: c_buffer_to_string(&name),
            },
            code => CallbackError::RegistrationFailed { code },
        })
    }

    /// Start callback processing; resolves once the engine reports STARTING
    pub async fn start_audio_callback(&self) -> Result<(), CallbackError> {
        let started = self.core.request_start()?;
        started.await.map_err(|_| CallbackError::Abandoned)
    }

    /// Stop callback processing; resolves once the engine reports ENDING
    pub async fn stop_audio_callback(&self) -> Result<(), CallbackError> {
        let stopped = self.core.request_stop()?;
        stopped.await.map_err(|_| CallbackError::Abandoned)
    }

    /// Unregister the handler for `mode`.
    ///
    /// If the stream is still running, this resolves after the ENDING that
    /// follows, once the handler can no longer be called. When the engine
    /// answers that the callback is not registered, it resolves at once; a
    /// still-live context is then kept until the next ENDING or teardown.
    pub async fn unregister_audio_callback(&self, mode: Mode) -> Result<(), CallbackError> {
        if !self.core.registry.is_registered(mode) {
            return Err(CallbackError::NotRegistered(mode));
        }

        let (tx, rx) = oneshot::channel();
        match self.core.remote.audio_callback_unregister(trampoline_for(mode)) {
            0 => {}
            -2 => {
                tracing::debug!(%mode, "Engine reports callback already unregistered");
                return match self.core.registry.disown_or_defer(mode, completion(tx)) {
                    Disown::Released(handle) => {
                        drop(handle);
                        Ok(())
                    }
                    Disown::Retired => {
                        tracing::debug!(%mode, "Retired live audio callback context");
                        Ok(())
                    }
                    Disown::Deferred => rx.await.map_err(|_| CallbackError::Abandoned),
                };
            }
            code => return Err(CallbackError::UnregisterFailed { code }),
        }

        match self.core.registry.release_or_defer(mode, completion(tx)) {
            Release::Released(handle) => {
                drop(handle);
                tracing::debug!(%mode, "Unregistered audio callback");
                Ok(())
            }
            Release::Deferred => {
                tracing::debug!(%mode, "Unregister waiting for ENDING");
                rx.await.map_err(|_| CallbackError::Abandoned)
            }
        }
    }

    /// Unregister every registered mode concurrently
    pub async fn unregister_all_audio_callbacks(&self) -> Result<(), CallbackError> {
        let modes = self.core.registry.registered_modes();
        let results = join_all(modes.iter().map(|&mode| self.unregister_audio_callback(mode))).await;

        let failures: Vec<(Mode, CallbackError)> = modes
            .into_iter()
            .zip(results)
            .filter_map(|(mode, result)| result.err().map(|e| (mode, e)))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CallbackError::UnregisterAllFailed { failures })
        }
    }

    pub fn is_registered(&self, mode: Mode) -> bool {
        self.core.registry.is_registered(mode)
    }

    /// True until the first STARTING and again after each ENDING.
    ///
    /// The flag is raised once the ENDING handler has returned, so a handler
    /// that queries it while handling ENDING still sees `false`.
    pub fn has_ended(&self, mode: Mode) -> bool {
        self.core.registry.has_ended(mode)
    }

    pub fn registered_modes(&self) -> Vec<Mode> {
        self.core.registry.registered_modes()
    }

    pub fn pending_unregisters(&self, mode: Mode) -> usize {
        self.core.registry.pending_unregisters(mode)
    }
}
