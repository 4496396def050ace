//! Error types for the GLW engine
//!
//! Every error is logged where it is created (see `engine_err!` and
//! `engine_bail!`), so callers may either propagate it or simply drop it
//! and rely on the log stream.

use std::fmt;

/// Result type for GLW engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// GLW engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Graphics backend reported a failure
    BackendError(String),

    /// Allocation of a GPU or CPU resource failed
    OutOfMemory,

    /// Stale key, wrong entity kind or missing resource
    InvalidResource(String),

    /// Window or device initialization failed
    InitializationFailed(String),

    /// Stream element access out of range
    IndexError { index: usize, length: usize },

    /// Operation not defined for the primitive type of an index stream
    UnsupportedPrimitive(String),

    /// Shader program could not be loaded, compiled or linked
    ShaderLoad { status: u32, files: String },

    /// A fixed-size table is full (windows, meshes, cameras, shader slots)
    CapacityExceeded(String),

    /// Graphics API error code observed after a state-changing call
    GraphicsApi { code: u32, operation: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::IndexError { index, length } => {
                write!(f, "Index {} out of range (length {})", index, length)
            }
            Error::UnsupportedPrimitive(msg) => write!(f, "Unsupported primitive: {}", msg),
            Error::ShaderLoad { status, files } => {
                write!(f, "Failed to load shader: {} (status {:#x})", files, status)
            }
            Error::CapacityExceeded(msg) => write!(f, "Capacity exceeded: {}", msg),
            Error::GraphicsApi { code, operation } => {
                write!(f, "Graphics API error {:#06x} after {}", code, operation)
            }
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR and build an `Error::BackendError` from the message
///
/// A second form takes an explicit error value, which is logged with the
/// given source and returned unchanged.
///
/// # Example
///
/// ```ignore
/// let mesh = meshes.get(key)
///     .ok_or_else(|| engine_err!("glw::Scene", "Mesh {:?} does not exist", key))?;
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, error = $err:expr) => {{
        let err: $crate::glw::Error = $err;
        $crate::engine_error!($source, "{}", err);
        err
    }};
    ($source:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::engine_error!($source, "{}", msg);
        $crate::glw::Error::BackendError(msg)
    }};
}

/// Log an ERROR and return early with the corresponding `Err`
///
/// # Example
///
/// ```ignore
/// if self.windows.len() >= self.config.max_windows {
///     engine_bail!("glw::Engine", "Too many windows ({})", self.windows.len());
/// }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, error = $err:expr) => {
        return Err($crate::engine_err!($source, error = $err))
    };
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
