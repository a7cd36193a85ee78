use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::builder::Builder;
use crate::factory::Factory;
use crate::log::LogData;
use crate::rendezvous::{OfferHalf, OfferOutcome};
use crate::slot::Slot;

/// A slot in flight from a worker to a caller, carrying the way home.
///
/// Dropping an offer nobody unpacked (a consumer that timed out in the
/// instant of the handoff, a ticket torn down with the pool) sends the
/// slot back so the worker is not left waiting on a connection nobody
/// holds.
pub(crate) struct Offer<M: Factory> {
    slot: Option<Slot<M>>,
    index: usize,
    return_tx: mpsc::Sender<Slot<M>>,
}

impl<M: Factory> Offer<M> {
    fn new(slot: Slot<M>, index: usize, return_tx: mpsc::Sender<Slot<M>>) -> Self {
        Self {
            slot: Some(slot),
            index,
            return_tx,
        }
    }

    pub(crate) fn into_parts(mut self) -> (Slot<M>, usize, mpsc::Sender<Slot<M>>) {
        let slot = self.slot.take().expect("offer already unpacked");
        (slot, self.index, self.return_tx.clone())
    }

    fn into_slot(mut self) -> Slot<M> {
        self.slot.take().expect("offer already unpacked")
    }
}

impl<M: Factory> Drop for Offer<M> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            // The worker may already be gone; then the slot, and the
            // physical connection inside it, is closed right here.
            let _ = self.return_tx.try_send(slot);
        }
    }
}

/// One pool slot's producer. Owns at most one [`Slot`] and loops:
/// replenish if asked, retire the slot at max lifetime, otherwise offer it
/// on the rendezvous and wait for a caller or a clock.
pub(crate) struct Worker<M: Factory> {
    pub(crate) index: usize,
    pub(crate) factory: Arc<M>,
    pub(crate) builder: Arc<Builder>,
    pub(crate) offers: Arc<OfferHalf<Offer<M>>>,
    pub(crate) return_tx: mpsc::Sender<Slot<M>>,
    pub(crate) return_rx: mpsc::Receiver<Slot<M>>,
    pub(crate) replenish: Arc<AtomicBool>,
    pub(crate) cancel: CancellationToken,
}

impl<M: Factory> Worker<M> {
    pub(crate) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        let mut slot: Slot<M> = Slot::new();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if self.replenish.swap(false, Ordering::AcqRel) {
                self.log("Replenishing connection", Some(slot.age()));
                // The old slot drops here, closing any physical connection.
                slot = Slot::new();
                continue;
            }

            let age = slot.age();
            if slot.is_opened() && age >= self.builder.max_lifetime {
                self.log("Max lifetime exceeded", Some(age));
                self.replenish.store(true, Ordering::Release);
                continue;
            }

            self.log("Offering reusable connection", None);
            let offer = Offer::new(slot, self.index, self.return_tx.clone());
            let outcome = self
                .offers
                .offer(
                    offer,
                    self.builder.idle_timeout,
                    self.builder.max_lifetime - age,
                    &self.cancel,
                )
                .await;

            match outcome {
                OfferOutcome::Transferred => {
                    // A caller holds the slot now. Park until it comes
                    // back; even a cancelled worker drains its caller
                    // before exiting.
                    match self.return_rx.recv().await {
                        Some(returned) => slot = returned,
                        None => break,
                    }
                }
                OfferOutcome::IdleTimeout(offer) => {
                    slot = offer.into_slot();
                    self.log("Idle timeout - checking validity", Some(slot.age()));
                    if !slot
                        .is_valid(&self.factory, self.builder.validation_timeout)
                        .await
                    {
                        self.replenish.store(true, Ordering::Release);
                    }
                }
                OfferOutcome::Expired(offer) => {
                    slot = offer.into_slot();
                    self.log("Max lifetime exceeded", Some(slot.age()));
                    self.replenish.store(true, Ordering::Release);
                }
                OfferOutcome::Cancelled(offer) => {
                    slot = offer.into_slot();
                    self.log("Interrupted while waiting to transfer", None);
                    // The next iteration sees the token and exits.
                }
                OfferOutcome::Disconnected(offer) => {
                    // Every pool handle is gone; nobody can take offers
                    // anymore.
                    slot = offer.into_slot();
                    break;
                }
            }
        }

        self.log("Breaking recursion", None);
        // `slot` drops here; an open physical connection closes with it.
    }

    fn log(&self, message: &str, age: Option<Duration>) {
        self.builder.log_sink.log(
            message,
            LogData {
                worker: Some(self.index),
                age,
            },
        );
    }
}
