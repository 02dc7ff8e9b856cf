//! Debug log sink used by the codec and the mipmap manager.

/// Receives free-text diagnostic lines.
///
/// Everything reported through this trait is debug-level detail; user-facing
/// progress and errors belong to the caller. Any `Fn(&str)` closure is a sink,
/// which is how tests capture output.
pub trait DebugLog {
    /// Report one diagnostic line.
    fn debug(&self, message: &str);
}

/// Forwards diagnostics to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl DebugLog for TracingLog {
    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }
}

impl<F: Fn(&str)> DebugLog for F {
    fn debug(&self, message: &str) {
        self(message)
    }
}
