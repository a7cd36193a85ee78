use std::time::Duration;

/// Context attached to a pool event.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogData {
    /// Index of the worker the event concerns, when the event has one.
    pub worker: Option<usize>,
    /// Age of the connection involved, when known.
    pub age: Option<Duration>,
}

/// Sink for the pool's internal events.
///
/// Implementations must be cheap and safe to call from any task at any
/// time; the pool never serializes calls to the sink.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, message: &str, data: LogData);
}

/// Discards every event. The default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopSink;

impl LogSink for NopSink {
    fn log(&self, _message: &str, _data: LogData) {}
}

/// Forwards every event to `tracing` at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str, data: LogData) {
        tracing::debug!(worker = data.worker, age = ?data.age, "{message}");
    }
}
