use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

/// Outcome of a producer-side [`offer`](OfferHalf::offer). Every outcome
/// but `Transferred` hands the item back.
pub(crate) enum OfferOutcome<T> {
    /// A consumer took the item.
    Transferred,
    /// No consumer showed up within the idle window.
    IdleTimeout(T),
    /// The expiry clock ran out first.
    Expired(T),
    /// The producer was cancelled while waiting.
    Cancelled(T),
    /// The consumer side is gone for good.
    Disconnected(T),
}

/// Why a consumer-side [`take`](TakeHalf::take) came back empty.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TakeError {
    TimedOut,
    /// No producer can ever answer.
    Disconnected,
}

type Ticket<T> = oneshot::Sender<T>;

/// Builds the two halves of a direct handoff.
///
/// Consumers queue a one-shot ticket and wait on its other end; producers
/// pop tickets and complete exactly one. Nothing is buffered: an item
/// either reaches a live consumer within the offer window or stays with
/// its producer.
pub(crate) fn pair<T: Send>() -> (TakeHalf<T>, OfferHalf<T>) {
    let (tickets_tx, tickets_rx) = mpsc::unbounded_channel();
    (
        TakeHalf { tickets: tickets_tx },
        OfferHalf {
            tickets: Mutex::new(tickets_rx),
        },
    )
}

pub(crate) struct TakeHalf<T> {
    tickets: mpsc::UnboundedSender<Ticket<T>>,
}

impl<T> TakeHalf<T> {
    /// Wait up to `wait` (forever when `None`) for a producer to hand an
    /// item over.
    pub(crate) async fn take(&self, wait: Option<Duration>) -> Result<T, TakeError> {
        let (ticket, handed) = oneshot::channel();
        if self.tickets.send(ticket).is_err() {
            return Err(TakeError::Disconnected);
        }
        match wait {
            Some(wait) => match tokio::time::timeout(wait, handed).await {
                Ok(Ok(item)) => Ok(item),
                Ok(Err(_)) => Err(TakeError::Disconnected),
                Err(_) => Err(TakeError::TimedOut),
            },
            None => handed.await.map_err(|_| TakeError::Disconnected),
        }
    }
}

pub(crate) struct OfferHalf<T> {
    tickets: Mutex<mpsc::UnboundedReceiver<Ticket<T>>>,
}

impl<T: Send> OfferHalf<T> {
    /// Offer `item` until a consumer takes it, the idle window closes, the
    /// expiry clock fires, or `cancel` fires.
    pub(crate) async fn offer(
        &self,
        item: T,
        idle_window: Duration,
        expires_in: Duration,
        cancel: &CancellationToken,
    ) -> OfferOutcome<T> {
        enum Wakeup {
            Transferred,
            Disconnected,
            Cancelled,
            Expired,
            IdleTimeout,
        }

        let mut item = Some(item);

        let wakeup = {
            let transfer = self.transfer(&mut item);
            tokio::pin!(transfer);
            tokio::select! {
                // Poll the transfer first: a consumer that has already
                // taken the item must never lose to a clock.
                biased;
                done = &mut transfer => match done {
                    Ok(()) => Wakeup::Transferred,
                    Err(()) => Wakeup::Disconnected,
                },
                _ = cancel.cancelled() => Wakeup::Cancelled,
                _ = tokio::time::sleep(expires_in) => Wakeup::Expired,
                _ = tokio::time::sleep(idle_window) => Wakeup::IdleTimeout,
            }
        };

        // On every path but Transferred the transfer future was dropped
        // before its send could run, so the item is still here.
        let reclaim = |item: Option<T>| item.expect("item was not transferred");
        match wakeup {
            Wakeup::Transferred => OfferOutcome::Transferred,
            Wakeup::Disconnected => OfferOutcome::Disconnected(reclaim(item)),
            Wakeup::Cancelled => OfferOutcome::Cancelled(reclaim(item)),
            Wakeup::Expired => OfferOutcome::Expired(reclaim(item)),
            Wakeup::IdleTimeout => OfferOutcome::IdleTimeout(reclaim(item)),
        }
    }

    // Resolves Ok(()) once a consumer holds the item, Err(()) when no
    // consumer can ever arrive. Producers share the ticket queue behind a
    // mutex; a producer parked here is the one listening for consumers.
    async fn transfer(&self, item: &mut Option<T>) -> Result<(), ()> {
        let mut tickets = self.tickets.lock().await;
        loop {
            match tickets.recv().await {
                Some(ticket) => {
                    let offered = match item.take() {
                        Some(offered) => offered,
                        None => return Err(()),
                    };
                    match ticket.send(offered) {
                        Ok(()) => return Ok(()),
                        // That consumer gave up waiting. Keep the item and
                        // serve the next ticket.
                        Err(returned) => *item = Some(returned),
                    }
                }
                None => return Err(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(50);
    const LONG: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn offer_meets_take() {
        let (take, offer) = pair::<u32>();
        let offer = std::sync::Arc::new(offer);
        let cancel = CancellationToken::new();

        let producer = {
            let offer = offer.clone();
            tokio::spawn(async move { offer.offer(7, LONG, LONG, &cancel).await })
        };

        let got = take.take(Some(LONG)).await.unwrap();
        assert_eq!(got, 7);
        assert!(matches!(producer.await.unwrap(), OfferOutcome::Transferred));
    }

    #[tokio::test]
    async fn take_times_out_without_producer() {
        let (take, _offer) = pair::<u32>();
        assert_eq!(take.take(Some(SHORT)).await.unwrap_err(), TakeError::TimedOut);
    }

    #[tokio::test]
    async fn take_disconnects_without_offer_half() {
        let (take, offer) = pair::<u32>();
        drop(offer);
        assert_eq!(
            take.take(Some(LONG)).await.unwrap_err(),
            TakeError::Disconnected
        );
    }

    #[tokio::test]
    async fn offer_idle_times_out_and_returns_item() {
        let (_take, offer) = pair::<u32>();
        let cancel = CancellationToken::new();
        match offer.offer(7, SHORT, LONG, &cancel).await {
            OfferOutcome::IdleTimeout(item) => assert_eq!(item, 7),
            _ => panic!("expected idle timeout"),
        }
    }

    #[tokio::test]
    async fn offer_expires_before_idle_window() {
        let (_take, offer) = pair::<u32>();
        let cancel = CancellationToken::new();
        match offer.offer(7, LONG, SHORT, &cancel).await {
            OfferOutcome::Expired(item) => assert_eq!(item, 7),
            _ => panic!("expected expiry"),
        }
    }

    #[tokio::test]
    async fn offer_observes_cancellation() {
        let (_take, offer) = pair::<u32>();
        let cancel = CancellationToken::new();
        cancel.cancel();
        match offer.offer(7, LONG, LONG, &cancel).await {
            OfferOutcome::Cancelled(item) => assert_eq!(item, 7),
            _ => panic!("expected cancellation"),
        }
    }

    #[tokio::test]
    async fn offer_disconnects_without_take_half() {
        let (take, offer) = pair::<u32>();
        drop(take);
        let cancel = CancellationToken::new();
        match offer.offer(7, LONG, LONG, &cancel).await {
            OfferOutcome::Disconnected(item) => assert_eq!(item, 7),
            _ => panic!("expected disconnect"),
        }
    }

    #[tokio::test]
    async fn abandoned_ticket_does_not_swallow_the_item() {
        let (take, offer) = pair::<u32>();
        let offer = std::sync::Arc::new(offer);
        let cancel = CancellationToken::new();

        // First consumer gives up before any producer arrives.
        assert_eq!(take.take(Some(SHORT)).await.unwrap_err(), TakeError::TimedOut);

        // A live consumer queues behind the dead ticket.
        let consumer = tokio::spawn(async move { take.take(Some(LONG)).await });
        tokio::time::sleep(SHORT).await;

        // The producer skips the dead ticket and reaches the live one.
        match offer.offer(7, LONG, LONG, &cancel).await {
            OfferOutcome::Transferred => {}
            _ => panic!("expected transfer"),
        }
        assert_eq!(consumer.await.unwrap().unwrap(), 7);
    }
}
