use core::fmt;

/// Error returned by [`Pool::get`](crate::Pool::get).
///
/// Generic over the factory's error type so driver failures pass through
/// untranslated.
#[derive(Debug, thiserror::Error)]
pub enum PoolError<E: fmt::Debug> {
    /// The pool has been closed.
    #[error("pool is closed")]
    Closed,

    /// No reusable connection became available within `connection_timeout`
    /// and the overflow fallback is disabled.
    #[error("timed out waiting for a connection")]
    Timeout,

    /// The connection factory failed to produce a connection.
    #[error("factory error: {0:?}")]
    Inner(E),

    /// Every checked-out connection failed the checkout probe within the
    /// retry cap.
    #[error("no valid connection after retries")]
    Invalid,
}
