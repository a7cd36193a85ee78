use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`Factory`] methods.
pub type FactoryFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The driver layer the pool draws physical connections from.
///
/// The pool never closes a connection explicitly; dropping the
/// `Connection` value is the close. Drivers that need an explicit
/// teardown should perform it in their `Drop` impl.
pub trait Factory: Send + Sync + 'static {
    type Connection: Send + 'static;
    type Error: Send + Debug + 'static;

    /// Dial the database and produce a fresh physical connection.
    fn connect(&self) -> FactoryFuture<'_, Result<Self::Connection, Self::Error>>;

    /// Ask the driver whether a connection is still usable.
    ///
    /// `timeout_secs` is the driver-facing bound in whole seconds. The
    /// pool additionally bounds the returned future with its configured
    /// validation timeout, so a driver that ignores the argument is still
    /// contained.
    fn is_valid<'a>(
        &'a self,
        conn: &'a mut Self::Connection,
        timeout_secs: u64,
    ) -> FactoryFuture<'a, Result<(), Self::Error>>;

    /// Cheap, non-blocking check that a connection is already dead.
    fn is_closed(&self, conn: &mut Self::Connection) -> bool;

    /// Hook run before the pool retries after handing back a dead
    /// connection. A place for a host reachability probe. No-op by
    /// default.
    fn pre_reconnect(&self) -> FactoryFuture<'_, ()> {
        Box::pin(async {})
    }
}
