//! Change notification
//!
//! A dedicated thread polls the engine's dirty flags and wakes subscribers
//! when parameters or macro buttons change.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::ConnectorError;
use crate::remote::RemoteApi;

/// Subscribers of change notifications; a full channel already has a
/// pending notification, so sends coalesce.
#[derive(Clone, Default)]
pub struct ChangeSubscribers {
    senders: Arc<Mutex<Vec<Sender<()>>>>,
}

impl ChangeSubscribers {
    pub fn subscribe(&self) -> Receiver<()> {
        let (tx, rx) = bounded(1);
        self.senders.lock().push(tx);
        rx
    }

    /// Wake every subscriber, dropping those whose receiver is gone
    pub fn notify(&self) {
        self.senders.lock().retain(|tx| match tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        });
    }

    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background poller of `is_parameters_dirty` / `macro_button_is_dirty`
pub struct ChangeWatcher {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    pub fn start(
        remote: Arc<dyn RemoteApi>,
        subscribers: ChangeSubscribers,
        poll_interval: Duration,
    ) -> Result<Self, ConnectorError> {
        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("vmr-change-watcher".into())
            .spawn(move || {
                while running_for_loop.load(Ordering::Relaxed) {
                    // Both flags are read every tick; each read clears its flag
                    let parameters = remote.is_parameters_dirty() == 1;
                    let buttons = remote.macro_button_is_dirty() == 1;
                    if parameters || buttons {
                        subscribers.notify();
                    }
                    thread::sleep(poll_interval);
                }
            })
            .map_err(|e| ConnectorError::Spawn(e.to_string()))?;

        Ok(Self {
            running,
            thread_handle: Some(handle),
        })
    }

    /// Stop polling and join the thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
