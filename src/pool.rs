use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::builder::Builder;
use crate::error::PoolError;
use crate::factory::Factory;
use crate::log::LogData;
use crate::rendezvous::{self, TakeHalf};
use crate::slot::Slot;
use crate::worker::{Offer, Worker};

// A bad connection at checkout is the producer's problem to fix; the
// caller re-takes a bounded number of times while that happens.
const CHECKOUT_RETRY_CAP: u8 = 3;

pub(crate) struct SharedPool<M: Factory> {
    builder: Arc<Builder>,
    factory: Arc<M>,
    take: TakeHalf<Offer<M>>,
    workers: Vec<WorkerHandle>,
    closed: AtomicBool,
    cancel: CancellationToken,
}

// The pool's signalling surface for one worker. The worker itself runs
// detached; these are the only strings attached to it.
struct WorkerHandle {
    replenish: Arc<AtomicBool>,
}

/// A connection pool of rendezvousing workers.
///
/// One lightweight task per slot owns at most one lazily-opened physical
/// connection and hands it to callers through a direct, unbuffered
/// handoff. There is no shared idle queue and no lock around the
/// connections; a connection is always in exactly one pair of hands.
///
/// `Pool` is a cheap clone; all clones drive the same workers. Build one
/// with [`Builder::build`].
pub struct Pool<M: Factory>(Arc<SharedPool<M>>);

impl<M: Factory> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Pool(self.0.clone())
    }
}

impl<M: Factory> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_fmt(format_args!("Pool({:p})", self.0))
    }
}

impl<M: Factory> Pool<M> {
    pub(crate) fn new(builder: Builder, factory: M) -> Self {
        let builder = Arc::new(builder);
        let factory = Arc::new(factory);
        let cancel = CancellationToken::new();

        let (take, offers) = rendezvous::pair();
        // Workers are the only owners of the offer half: when the last
        // worker exits, producers are provably gone and `take` reports it.
        let offers = Arc::new(offers);

        let mut workers = Vec::with_capacity(builder.pool_size);
        for index in 0..builder.pool_size {
            let replenish = Arc::new(AtomicBool::new(false));
            let (return_tx, return_rx) = mpsc::channel(1);

            Worker {
                index,
                factory: factory.clone(),
                builder: builder.clone(),
                offers: offers.clone(),
                return_tx,
                return_rx,
                replenish: replenish.clone(),
                cancel: cancel.child_token(),
            }
            .spawn();

            workers.push(WorkerHandle { replenish });
        }

        Pool(Arc::new(SharedPool {
            builder,
            factory,
            take,
            workers,
            closed: AtomicBool::new(false),
            cancel,
        }))
    }

    /// Checks a connection out of the pool.
    ///
    /// Waits up to `connection_timeout` for a worker to hand one over. On
    /// timeout the call fails with [`PoolError::Timeout`] unless
    /// `overflow_on_timeout` is set, in which case a one-off, caller-owned
    /// connection is opened instead. A connection that fails the checkout
    /// probe is handed back to its producer for replacement and the wait
    /// restarts, a bounded number of times.
    ///
    /// The returned [`PoolRef`] releases the connection on drop.
    pub async fn get(&self) -> Result<PoolRef<'_, M>, PoolError<M::Error>> {
        let shared = &*self.0;
        let mut retry: u8 = 0;

        loop {
            if shared.closed.load(Ordering::Acquire) {
                return Err(PoolError::Closed);
            }

            let offer = match shared.take.take(shared.builder.connection_timeout).await {
                Ok(offer) => offer,
                Err(_) => {
                    // Waited out, or no worker can ever answer. Close
                    // beats overflow if both raced here.
                    if shared.closed.load(Ordering::Acquire) {
                        return Err(PoolError::Closed);
                    }
                    return self.overflow().await;
                }
            };

            let (mut slot, index, return_tx) = offer.into_parts();

            let usable = if shared.builder.always_check {
                slot.is_valid(&shared.factory, shared.builder.validation_timeout)
                    .await
            } else {
                !slot.is_closed(&shared.factory)
            };

            if usable {
                return Ok(PoolRef {
                    slot: Some(slot),
                    route: Route::Reusable { return_tx },
                    shared,
                });
            }

            shared.builder.log_sink.log(
                "Got a closed/invalid connection - retrying",
                LogData {
                    worker: Some(index),
                    age: Some(slot.age()),
                },
            );

            // Hand the bad slot back and tell its producer to replace it.
            // The producer closes it; this side never does.
            shared.workers[index].replenish.store(true, Ordering::Release);
            let _ = return_tx.try_send(slot);

            if retry == CHECKOUT_RETRY_CAP {
                return Err(PoolError::Invalid);
            }
            retry += 1;

            shared.factory.pre_reconnect().await;
        }
    }

    // The spike path: the pool could not serve in time, so the caller gets
    // a connection of its own, closed on release rather than pooled.
    async fn overflow(&self) -> Result<PoolRef<'_, M>, PoolError<M::Error>> {
        let shared = &*self.0;

        if !shared.builder.overflow_on_timeout {
            return Err(PoolError::Timeout);
        }

        shared.builder.log_sink.log(
            "Creating non-reusable connection (slow path)",
            LogData::default(),
        );
        let conn = shared
            .factory
            .connect()
            .await
            .map_err(PoolError::Inner)?;

        Ok(PoolRef {
            slot: Some(Slot::from_conn(conn)),
            route: Route::Overflow,
            shared,
        })
    }

    /// Shuts the pool down. Idempotent.
    ///
    /// Subsequent [`get`](Pool::get) calls fail with [`PoolError::Closed`].
    /// Callers already holding a connection finish normally; each worker
    /// closes its physical connection as soon as it has it back.
    pub fn close(&self) {
        if !self.0.closed.swap(true, Ordering::AcqRel) {
            self.0.cancel.cancel();
        }
    }

    /// Whether [`close`](Pool::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Acquire)
    }

    /// The factory this pool draws connections from.
    pub fn factory(&self) -> &M {
        &self.0.factory
    }
}

enum Route<M: Factory> {
    // The way back to the producer that owns the slot.
    Reusable { return_tx: mpsc::Sender<Slot<M>> },
    // Caller-owned; dies on release.
    Overflow,
}

/// A checked-out connection. Dropping it releases the connection: back to
/// its worker for reuse, or closed outright for an overflow connection.
pub struct PoolRef<'a, M: Factory> {
    slot: Option<Slot<M>>,
    route: Route<M>,
    shared: &'a SharedPool<M>,
}

impl<M: Factory> PoolRef<'_, M> {
    /// The physical connection, opened on first call.
    ///
    /// The pool hands out connections without opening them; the first
    /// caller that actually needs the wire pays for the dial, and a pool
    /// nobody uses holds no connections at all.
    pub async fn conn(&mut self) -> Result<&mut M::Connection, PoolError<M::Error>> {
        let slot = self.slot.as_mut().expect("slot present until drop");
        slot.connect(&*self.shared.factory)
            .await
            .map_err(PoolError::Inner)
    }

    /// Age of the underlying physical connection. Zero while unopened.
    pub fn age(&self) -> Duration {
        self.slot.as_ref().map(Slot::age).unwrap_or(Duration::ZERO)
    }

    /// False for an overflow connection, which is closed on release
    /// instead of returning to the pool.
    pub fn is_reusable(&self) -> bool {
        matches!(self.route, Route::Reusable { .. })
    }
}

impl<M: Factory> Drop for PoolRef<'_, M> {
    fn drop(&mut self) {
        let slot = match self.slot.take() {
            Some(slot) => slot,
            None => return,
        };
        match &self.route {
            Route::Reusable { return_tx } => {
                // Capacity one and at most one slot out per worker, so
                // this only fails when the worker is gone; then the slot
                // drops here and the connection closes with it.
                let _ = return_tx.try_send(slot);
            }
            Route::Overflow => {}
        }
    }
}
