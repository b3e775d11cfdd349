// SPDX-License-Identifier: GPL-3.0-only

//! Paced producer threads for backend frame delivery
//!
//! Backends that deliver frames from their own thread (the analysis output
//! of the virtual backend, for example) run a [`FrameLoop`]: a named OS
//! thread that calls a tick closure at a fixed interval until told to stop
//! or the closure returns [`LoopAction::Stop`]. Dropping the loop stops it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Returned by each tick to control the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Handle to a running frame loop thread
pub struct FrameLoop {
    worker: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    name: String,
}

impl FrameLoop {
    /// Spawn a loop that calls `tick` once per `interval`
    ///
    /// The interval is measured from the start of one tick to the start of
    /// the next; a tick that overruns is followed immediately by the next.
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop_flag);
        let thread_name = name.to_string();

        info!(name = %name, interval_ms = interval.as_millis() as u64, "Starting frame loop");

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut ticks: u64 = 0;
                while !flag.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    ticks += 1;
                    if tick() == LoopAction::Stop {
                        debug!(name = %thread_name, ticks, "Tick requested stop");
                        break;
                    }
                    if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                        sleep_unless_stopped(&flag, remaining);
                    }
                }
                info!(name = %thread_name, ticks, "Frame loop exiting");
            })?;

        Ok(Self {
            worker: Some(worker),
            stop_flag,
            name: name.to_string(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop and wait for its thread
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!(name = %self.name, "Frame loop thread panicked");
            }
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!(name = %self.name, "FrameLoop dropped, stopping");
            self.stop();
        }
    }
}

// Sleep in short slices so stop() does not wait out a long frame interval.
fn sleep_unless_stopped(stop: &AtomicBool, duration: Duration) {
    const SLICE: Duration = Duration::from_millis(5);
    let deadline = Instant::now() + duration;
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SLICE.min(deadline - now));
    }
}
