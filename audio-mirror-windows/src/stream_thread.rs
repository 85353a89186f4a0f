//! Dedicated audio thread shared by the loopback and render streams.
//!
//! The thread joins the MTA, asks MMCSS for "Pro Audio" scheduling, runs the
//! stream's setup, reports the setup outcome back to `start()`, and then runs
//! the poll loop until the running flag is cleared or the stream fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Threading::{
    AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW,
};

use audio_mirror_core::models::error::RouterError;
use audio_mirror_core::traits::backend::StoppedCallback;

use crate::com::ComScope;

/// Poll loop produced by a successful setup. Runs on the audio thread and
/// returns when `running` goes false (`Ok`) or the stream fails (`Err`).
pub(crate) type PollLoop = Box<dyn FnOnce(&AtomicBool) -> Result<(), RouterError>>;

pub(crate) struct StreamThread {
    name: &'static str,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl StreamThread {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Spawns the thread and waits until `setup` has either produced the
    /// poll loop or failed. On failure the thread is joined, `on_stopped` is
    /// dropped uncalled, and the setup error is returned.
    pub(crate) fn start<S>(&self, setup: S, on_stopped: StoppedCallback) -> Result<(), RouterError>
    where
        S: FnOnce() -> Result<PollLoop, RouterError> + Send + 'static,
    {
        let mut handle_slot = self.handle.lock();
        if handle_slot.is_some() {
            return Err(RouterError::InvalidState(format!("{} already started", self.name)));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), RouterError>>(1);
        let name = self.name;

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let _com = match ComScope::enter() {
                    Ok(scope) => scope,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _priority = ProAudioPriority::register();

                let poll = match setup() {
                    Ok(poll) => poll,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let outcome = poll(&running);
                running.store(false, Ordering::SeqCst);

                match outcome {
                    Ok(()) => {
                        log::debug!("{} stopped", name);
                        on_stopped(None);
                    }
                    Err(e) => {
                        log::error!("{} failed: {}", name, e);
                        on_stopped(Some(e));
                    }
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                RouterError::Platform(format!("failed to spawn {} thread: {}", name, e))
            })?;

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(RouterError::Platform(format!(
                "{} thread exited during setup",
                name
            )))
        });

        match ready {
            Ok(()) => {
                *handle_slot = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
        }
    }

    /// Clears the running flag and joins the thread. No-op when not started.
    pub(crate) fn stop(&self) -> Result<(), RouterError> {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| RouterError::Platform(format!("{} thread panicked", self.name)))?;
        }
        Ok(())
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// MMCSS registration for the current thread, reverted on drop.
struct ProAudioPriority(Option<HANDLE>);

impl ProAudioPriority {
    fn register() -> Self {
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let registered = unsafe {
            AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index)
        };
        match registered {
            Ok(handle) => Self(Some(handle)),
            Err(e) => {
                log::warn!("MMCSS registration failed: {}", e);
                Self(None)
            }
        }
    }
}

impl Drop for ProAudioPriority {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            unsafe {
                let _ = AvRevertMmThreadCharacteristics(handle);
            }
        }
    }
}
