use std::time::{Duration, Instant};

use crate::factory::Factory;

/// A reusable wrapper around at most one physical connection.
///
/// The physical connection is opened on the first [`connect`](Slot::connect)
/// call, not when the slot is constructed, so a pool with no workload keeps
/// zero connections open. The open timestamp is stamped at materialization
/// and drives the max-lifetime policy, so lifetime measures the real
/// resource and not the wrapper.
///
/// A slot is owned by exactly one party at a time. It moves by value from
/// its worker through the rendezvous to a caller and back, which is what
/// makes `&mut` access safe without a lock.
pub(crate) struct Slot<M: Factory> {
    conn: Option<M::Connection>,
    opened_at: Option<Instant>,
}

impl<M: Factory> Slot<M> {
    pub(crate) fn new() -> Self {
        Self {
            conn: None,
            opened_at: None,
        }
    }

    /// Wrap an already-open connection, stamping its age from now.
    pub(crate) fn from_conn(conn: M::Connection) -> Self {
        Self {
            conn: Some(conn),
            opened_at: Some(Instant::now()),
        }
    }

    pub(crate) fn is_opened(&self) -> bool {
        self.conn.is_some()
    }

    /// Time since the physical connection was opened. Zero while unopened.
    pub(crate) fn age(&self) -> Duration {
        self.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// The physical connection, materialized exactly once.
    pub(crate) async fn connect<'a>(
        &'a mut self,
        factory: &M,
    ) -> Result<&'a mut M::Connection, M::Error> {
        if self.conn.is_none() {
            let conn = factory.connect().await?;
            self.opened_at = Some(Instant::now());
            self.conn = Some(conn);
        }
        Ok(self.conn.as_mut().expect("connection was just materialized"))
    }

    /// Closed check. A slot that never opened reports not-closed.
    pub(crate) fn is_closed(&mut self, factory: &M) -> bool {
        match self.conn.as_mut() {
            Some(conn) => factory.is_closed(conn),
            None => false,
        }
    }

    /// Driver validity probe, bounded by `validation_timeout`. A slot that
    /// never opened is vacuously valid.
    pub(crate) async fn is_valid(&mut self, factory: &M, validation_timeout: Duration) -> bool {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return true,
        };
        let secs = driver_secs(validation_timeout);
        matches!(
            tokio::time::timeout(validation_timeout, factory.is_valid(conn, secs)).await,
            Ok(Ok(()))
        )
    }
}

// Drivers take the validity bound in whole seconds. Round a sub-second
// bound up to one second; 0 reads as "no timeout" to most drivers.
fn driver_secs(timeout: Duration) -> u64 {
    timeout.as_secs().max(1)
}
