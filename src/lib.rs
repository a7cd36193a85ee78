//! # A connection pool of rendezvousing workers.
//!
//! Instead of a shared idle queue behind a lock, this pool runs one
//! lightweight task per slot. Each worker owns at most one reusable
//! connection and meets callers through a direct, unbuffered handoff:
//! an offered connection either reaches a live caller within its window
//! or stays with its worker. Physical connections are opened lazily on
//! first real use, replaced once they outlive `max_lifetime`, and
//! re-validated after sitting idle past `idle_timeout`.
//!
//! The driver layer is abstracted behind the [`Factory`] trait; the pool
//! itself never dials, authenticates, or speaks SQL.
//!
//! # Example:
//!```ignore
//!use std::time::Duration;
//!
//!use relay_pool::{Builder, Factory, FactoryFuture};
//!
//!struct MyFactory { /* driver config */ }
//!
//!impl Factory for MyFactory {
//!    type Connection = my_driver::Client;
//!    type Error = my_driver::Error;
//!
//!    fn connect(&self) -> FactoryFuture<'_, Result<Self::Connection, Self::Error>> {
//!        Box::pin(async move { my_driver::connect("db://localhost").await })
//!    }
//!
//!    fn is_valid<'a>(
//!        &'a self,
//!        conn: &'a mut Self::Connection,
//!        timeout_secs: u64,
//!    ) -> FactoryFuture<'a, Result<(), Self::Error>> {
//!        Box::pin(async move { conn.ping(timeout_secs).await })
//!    }
//!
//!    fn is_closed(&self, conn: &mut Self::Connection) -> bool {
//!        conn.is_broken()
//!    }
//!}
//!
//!#[tokio::main]
//!async fn main() {
//!    let pool = Builder::new()
//!        .pool_size(10)
//!        .connection_timeout(Some(Duration::from_secs(5)))
//!        .max_lifetime(Duration::from_secs(30 * 60))
//!        .idle_timeout(Duration::from_secs(10 * 60))
//!        .build(MyFactory { /* .. */ });
//!
//!    let mut conn = pool.get().await.expect("can't check a connection out");
//!    let client = conn.conn().await.expect("can't reach the database");
//!    // use the client, then drop `conn` to hand it back
//!    drop(conn);
//!
//!    pool.close();
//!}
//!```

pub use builder::Builder;
pub use error::PoolError;
pub use factory::{Factory, FactoryFuture};
pub use log::{LogData, LogSink, NopSink, TracingSink};
pub use pool::{Pool, PoolRef};

mod builder;
mod error;
mod factory;
mod log;
mod pool;
mod rendezvous;
mod slot;
mod worker;
