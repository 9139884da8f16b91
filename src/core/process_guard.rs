use crate::models::error::SError;
use crate::utils::process::ProcessChecker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::System;
use tracing::{debug, info, warn};

/// Reports whether the game currently owns its files.
///
/// Implementations must answer immediately from cached state. Callers read it
/// once per user action; the answer may be a few seconds stale.
pub trait GameLock: Send + Sync {
    fn is_locked(&self) -> bool;
}

/// Fails with `GameRunning` when the lock is held.
pub fn ensure_unlocked(lock: &dyn GameLock) -> Result<(), SError> {
    if lock.is_locked() {
        warn!("refusing mutation: game is running");
        return Err(SError::GameRunning);
    }
    Ok(())
}

/// A lock whose state is set by hand. Used when the surrounding application
/// tracks the game itself, and in tests.
#[derive(Debug, Default)]
pub struct FixedLock(AtomicBool);

impl FixedLock {
    pub fn new(locked: bool) -> Self {
        Self(AtomicBool::new(locked))
    }

    pub fn set(&self, locked: bool) {
        self.0.store(locked, Ordering::SeqCst);
    }
}

impl GameLock for FixedLock {
    fn is_locked(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Polls the process list on a background thread and caches whether the
/// shipping executable is running. The thread stops when the watcher drops.
pub struct ProcessWatcher {
    state: Arc<AtomicBool>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProcessWatcher {
    pub fn spawn(process_name: impl Into<String>, interval: Duration) -> Result<Self, SError> {
        let process_name = process_name.into();
        let mut sys = System::new();

        // Polled once up front so the first read is already accurate.
        let state = Arc::new(AtomicBool::new(ProcessChecker::is_running(
            &mut sys,
            &process_name,
        )));
        info!(
            "watching for '{process_name}' every {:?}, running={}",
            interval,
            state.load(Ordering::SeqCst)
        );

        let (stop, stop_rx) = mpsc::channel::<()>();
        let thread_state = state.clone();

        let handle = thread::Builder::new()
            .name("process-watcher".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let running = ProcessChecker::is_running(&mut sys, &process_name);
                        let previous = thread_state.swap(running, Ordering::SeqCst);
                        if previous != running {
                            info!("game process '{process_name}' running={running}");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("process watcher stopping");
                        break;
                    }
                }
            })?;

        Ok(Self {
            state,
            stop: Some(stop),
            handle: Some(handle),
        })
    }
}

impl GameLock for ProcessWatcher {
    fn is_locked(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }
}

impl Drop for ProcessWatcher {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
