/// Background thread driving the render loop of every window

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::{engine_bail, engine_error, engine_info};
use super::frame_limiter::FrameLimiter;

/// Handle of the render thread
///
/// The thread holds the engine lock for a whole cycle over every window,
/// so two cycles of one window never overlap, and sleeps the frame budget
/// with the lock released.
#[derive(Debug)]
pub struct RenderWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl RenderWorker {
    /// Start rendering every window of `engine` at its configured frame rate
    pub fn spawn(engine: Arc<Mutex<Engine>>) -> Result<Self> {
        let frame_rate = match engine.lock() {
            Ok(engine) => engine.config().frame_rate,
            Err(_) => engine_bail!("glw::Worker", error = Error::BackendError("Engine lock poisoned".to_string())),
        };
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = thread::Builder::new()
            .name("glw-render".to_string())
            .spawn(move || {
                let mut limiter = FrameLimiter::new(frame_rate);
                let mut cycles = 0u64;
                while flag.load(Ordering::Acquire) {
                    match engine.lock() {
                        Ok(mut engine) => {
                            engine.render_windows();
                        }
                        Err(_) => {
                            engine_error!("glw::Worker", "Engine lock poisoned, render thread stops");
                            break;
                        }
                    }
                    cycles += 1;
                    limiter.wait();
                }
                cycles
            })
            .map_err(|err| Error::InitializationFailed(format!("render thread: {}", err)));
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => engine_bail!("glw::Worker", error = err),
        };

        engine_info!("glw::Worker", "Render thread started ({} fps)", frame_rate);
        Ok(Self { running, handle: Some(handle) })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop after the current cycle and join; returns the number of cycles run
    pub fn stop(&mut self) -> u64 {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        match handle.join() {
            Ok(cycles) => {
                engine_info!("glw::Worker", "Render thread stopped after {} cycles", cycles);
                cycles
            }
            Err(_) => {
                engine_error!("glw::Worker", "Render thread panicked");
                0
            }
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "render_worker_tests.rs"]
mod tests;
