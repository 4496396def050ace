/// GLW Engine - registry of window contexts and the process-wide logger
///
/// An `Engine` owns every window context of the application, drives their
/// render cycles and caps the frame rate. Logging stays process-wide: the
/// `engine_*` macros reach the logger installed with `Engine::set_logger`
/// from any thread, without an engine instance.

use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use crate::config::{EngineConfig, WindowConfig};
use crate::device::GraphicsDevice;
use crate::error::{Error, Result};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::window::{PickHit, WindowContext, WindowState};
use crate::worker::FrameLimiter;
use crate::{engine_bail, engine_err, engine_error, engine_info};

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

new_key_type! {
    /// Key of a window context in its engine
    pub struct WindowId;
}

/// Callback run on a window before each of its render cycles
pub type RenderCallback = Box<dyn FnMut(&mut WindowContext) + Send>;

/// Root object of the renderer
///
/// # Example
///
/// ```no_run
/// use glw_engine::glw::{Engine, EngineConfig, WindowConfig};
/// use glw_engine::glw::device::{CapabilityTier, HeadlessDevice};
///
/// let mut engine = Engine::new(EngineConfig::default());
/// let device = HeadlessDevice::new(CapabilityTier::Modern, 800, 600);
/// let window = engine.create_window(WindowConfig::default(), Box::new(device))?;
/// loop {
///     if engine.render_begin(window) {
///         engine.render(window)?;
///     }
///     engine.render_end();
/// #   break;
/// }
/// # Ok::<(), glw_engine::glw::Error>(())
/// ```
pub struct Engine {
    config: EngineConfig,
    windows: SlotMap<WindowId, WindowContext>,
    callbacks: FxHashMap<WindowId, RenderCallback>,
    limiter: FrameLimiter,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let limiter = FrameLimiter::new(config.frame_rate);
        engine_info!(
            "glw::Engine",
            "Engine created ({} windows max, {} fps)",
            config.max_windows,
            config.frame_rate
        );
        Self { config, windows: SlotMap::with_key(), callbacks: FxHashMap::default(), limiter }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ===== WINDOWS =====

    /// Register a window drawing through `device`
    ///
    /// The window opens at the start of its first render cycle.
    ///
    /// # Errors
    ///
    /// `Error::CapacityExceeded` when `max_windows` windows already exist.
    pub fn create_window(&mut self, config: WindowConfig, device: Box<dyn GraphicsDevice>) -> Result<WindowId> {
        if self.windows.len() >= self.config.max_windows {
            engine_bail!(
                "glw::Engine",
                error = Error::CapacityExceeded(format!("Too many windows ({})", self.windows.len()))
            );
        }
        let title = config.title.clone();
        let id = self.windows.insert(WindowContext::new(&self.config, config, device));
        engine_info!("glw::Engine", "Window '{}' created", title);
        Ok(id)
    }

    pub fn window(&self, id: WindowId) -> Result<&WindowContext> {
        self.windows.get(id).ok_or_else(|| unknown_window(id))
    }

    pub fn window_mut(&mut self, id: WindowId) -> Result<&mut WindowContext> {
        self.windows.get_mut(id).ok_or_else(|| unknown_window(id))
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().collect()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Ask a window to close at the start of its next render cycle
    pub fn close_window(&mut self, id: WindowId) -> Result<()> {
        self.window_mut(id)?.request_close();
        Ok(())
    }

    /// Remove a window now, releasing its GPU objects, and hand back its device
    pub fn destroy_window(&mut self, id: WindowId) -> Result<Box<dyn GraphicsDevice>> {
        self.callbacks.remove(&id);
        let window = self.windows.remove(id).ok_or_else(|| unknown_window(id))?;
        window
            .teardown()
            .ok_or_else(|| engine_err!("glw::Engine", error = Error::InvalidResource("window device already released".to_string())))
    }

    /// Run `callback` on the window before each of its render cycles
    pub fn on_render(&mut self, id: WindowId, callback: impl FnMut(&mut WindowContext) + Send + 'static) -> Result<()> {
        self.window(id)?;
        self.callbacks.insert(id, Box::new(callback));
        Ok(())
    }

    // ===== RENDER LOOP =====

    /// Open or close the window as requested; returns whether it renders this cycle
    ///
    /// A window that finished closing is removed from the engine.
    pub fn render_begin(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.get_mut(id) else {
            return false;
        };
        if window.begin() {
            return true;
        }
        if window.state() == WindowState::Closed {
            self.callbacks.remove(&id);
            self.windows.remove(id);
        }
        false
    }

    /// Run the window's render callback, then one render cycle
    pub fn render(&mut self, id: WindowId) -> Result<()> {
        let window = self.windows.get_mut(id).ok_or_else(|| unknown_window(id))?;
        if let Some(callback) = self.callbacks.get_mut(&id) {
            callback(window);
        }
        window.render()
    }

    /// Sleep the remainder of the frame budget
    pub fn render_end(&mut self) {
        self.limiter.wait();
    }

    /// One cycle over every window, without the frame-rate sleep
    ///
    /// Render failures are logged; returns the number of windows rendered.
    pub fn render_windows(&mut self) -> usize {
        let mut rendered = 0;
        for id in self.window_ids() {
            if !self.render_begin(id) {
                continue;
            }
            match self.render(id) {
                Ok(()) => rendered += 1,
                Err(err) => engine_error!("glw::Engine", "Render of window {:?} failed: {}", id, err),
            }
        }
        rendered
    }

    // ===== PICKING =====

    /// Mesh under a window pixel (origin top-left)
    pub fn picking(&mut self, id: WindowId, x: i32, y: i32) -> Option<PickHit> {
        self.windows.get_mut(id)?.picking(x, y)
    }

    /// Depths of an inclusive window rectangle
    pub fn picking_box(&mut self, id: WindowId, x0: i32, y0: i32, x1: i32, y1: i32) -> Result<Vec<f32>> {
        self.window_mut(id)?.picking_box(x0, y0, x1, y1)
    }

    // ===== LOGGING API =====

    /// Set a custom logger
    ///
    /// Replace the default logger with a custom implementation (file logger, network logger, etc.)
    ///
    /// # Example
    ///
    /// ```no_run
    /// use glw_engine::glw::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct FileLogger;
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::new())));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::new())));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(DefaultLogger::new());
        }
    }

    /// Internal logging method (for simple logs without file:line)
    ///
    /// Used by macros like engine_info!, engine_warn!, etc.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::new())));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Internal logging method with file:line information (for ERROR logs)
    ///
    /// Used by engine_error! macro to include source location.
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::new())));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

fn unknown_window(id: WindowId) -> Error {
    engine_err!("glw::Engine", error = Error::InvalidResource(format!("window {:?} does not exist", id)))
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("windows", &self.windows.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
