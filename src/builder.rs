use std::sync::Arc;
use std::time::Duration;

use crate::factory::Factory;
use crate::log::{LogSink, NopSink};
use crate::pool::Pool;

// Zero would turn the worker loop into a busy spin; a millisecond keeps the
// "very small timeout" behavior without the spin.
const MIN_WINDOW: Duration = Duration::from_millis(1);

/// Pool configuration. Frozen once the pool is built.
pub struct Builder {
    pub(crate) pool_size: usize,
    pub(crate) connection_timeout: Option<Duration>,
    pub(crate) idle_timeout: Duration,
    pub(crate) max_lifetime: Duration,
    pub(crate) validation_timeout: Duration,
    pub(crate) overflow_on_timeout: bool,
    pub(crate) always_check: bool,
    pub(crate) log_sink: Arc<dyn LogSink>,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            pool_size: 10,
            connection_timeout: Some(Duration::from_secs(30)),
            idle_timeout: Duration::from_secs(10 * 60),
            max_lifetime: Duration::from_secs(30 * 60),
            validation_timeout: Duration::from_secs(5),
            overflow_on_timeout: false,
            always_check: true,
            log_sink: Arc::new(NopSink),
        }
    }
}

impl Builder {
    pub fn new() -> Builder {
        Default::default()
    }

    /// Sets the number of workers, which is the number of reusable
    /// connections the pool can hold. A size of zero leaves every call to
    /// the overflow policy.
    ///
    /// Defaults to 10.
    pub fn pool_size(mut self, pool_size: usize) -> Builder {
        self.pool_size = pool_size;
        self
    }

    /// Sets how long [`Pool::get`] waits for a reusable connection before
    /// the overflow policy applies. `None` waits indefinitely.
    ///
    /// Defaults to 30 seconds.
    pub fn connection_timeout(mut self, connection_timeout: Option<Duration>) -> Builder {
        self.connection_timeout = connection_timeout;
        self
    }

    /// Sets how long a worker keeps a connection on offer before taking it
    /// back for a validity check.
    ///
    /// Defaults to 10 minutes.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Builder {
        self.idle_timeout = idle_timeout.max(MIN_WINDOW);
        self
    }

    /// Sets the maximum lifetime of connections in the pool, measured from
    /// the moment the physical connection is opened. A connection past
    /// this age is closed and replaced by its worker, never handed out.
    ///
    /// Defaults to 30 minutes.
    pub fn max_lifetime(mut self, max_lifetime: Duration) -> Builder {
        self.max_lifetime = max_lifetime.max(MIN_WINDOW);
        self
    }

    /// Sets the bound on the driver validity probe. The driver sees the
    /// value in whole seconds, never less than one.
    ///
    /// Defaults to 5 seconds.
    pub fn validation_timeout(mut self, validation_timeout: Duration) -> Builder {
        self.validation_timeout = validation_timeout.max(MIN_WINDOW);
        self
    }

    /// If true, a timed-out wait opens a one-off connection owned by the
    /// caller instead of failing with [`PoolError::Timeout`]. The one-off
    /// connection is closed on release, never pooled.
    ///
    /// Defaults to false.
    ///
    /// [`PoolError::Timeout`]: crate::PoolError::Timeout
    pub fn overflow_on_timeout(mut self, overflow_on_timeout: bool) -> Builder {
        self.overflow_on_timeout = overflow_on_timeout;
        self
    }

    /// If true, the health of a connection will be verified when checkout.
    /// If false, checkout settles for the driver's cheap closed check.
    ///
    /// Defaults to true.
    pub fn always_check(mut self, always_check: bool) -> Builder {
        self.always_check = always_check;
        self
    }

    /// Sets the sink the pool reports its events to.
    ///
    /// Defaults to [`NopSink`].
    pub fn log_sink(mut self, log_sink: Arc<dyn LogSink>) -> Builder {
        self.log_sink = log_sink;
        self
    }

    /// Consumes the builder, returning a running `Pool`.
    ///
    /// No physical connection is opened here; workers open lazily on
    /// first real use.
    pub fn build<M: Factory>(self, factory: M) -> Pool<M> {
        Pool::new(self, factory)
    }
}
