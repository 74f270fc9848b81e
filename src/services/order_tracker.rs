use crate::{
    config::{AppConfig, PollingConfig},
    fulfillment_client::{FulfillmentApi, OrderStatus},
    polling::{PollFailure, PollOutcome, PollRequest, PollingEngine, SessionSlot},
};
use log::debug;
use std::sync::Arc;

/// Watches a single eSIM order until provisioning resolves.
///
/// Thin specialization of the polling engine: an order is done once the
/// backend attaches a `sim` profile, and failed once it reports an explicit
/// error. At most one session is active at a time; starting a different
/// order supersedes the running session, re-starting the same order is a
/// no-op.
pub struct OrderStatusTracker<C> {
    client: Arc<C>,
    config: PollingConfig,
    session: SessionSlot,
}

impl<C> OrderStatusTracker<C>
where
    C: FulfillmentApi + Send + Sync + 'static,
{
    pub fn new(client: Arc<C>) -> Self {
        Self::with_config(client, AppConfig::get().polling)
    }

    pub fn with_config(client: Arc<C>, config: PollingConfig) -> Self {
        Self {
            client,
            config,
            session: SessionSlot::new(),
        }
    }

    /// Begin tracking `order_id`. Must be called from within a tokio runtime.
    ///
    /// `on_status` fires for every in-progress snapshot, `on_provisioned`
    /// once the sim profile arrives, `on_error` on failure or timeout.
    /// Cancellation (via [`OrderStatusTracker::stop`] or supersession) fires
    /// no callback at all.
    pub fn start(
        &self,
        order_id: &str,
        on_status: impl Fn(OrderStatus) + Send + Sync + 'static,
        on_provisioned: impl FnOnce(OrderStatus) + Send + 'static,
        on_error: impl FnOnce(PollFailure) + Send + 'static,
    ) {
        let request = PollRequest::new(
            order_id,
            &self.config,
            |status: &OrderStatus| status.error.clone().filter(|reason| !reason.is_empty()),
            |status: &OrderStatus| status.sim.is_some(),
        );

        let client = Arc::clone(&self.client);
        let order = order_id.to_owned();

        self.session.start_session(order_id, move |cancel| {
            tokio::spawn(async move {
                let fetch = || {
                    let client = Arc::clone(&client);
                    let order = order.clone();
                    async move { client.order_status(&order).await }
                };

                let outcome = PollingEngine::default()
                    .run(request, cancel, fetch, |status| on_status(status.clone()))
                    .await;

                match outcome {
                    PollOutcome::Success(status) => on_provisioned(status),
                    PollOutcome::Failure(reason) => on_error(PollFailure::Failed(reason)),
                    PollOutcome::TimedOut => on_error(PollFailure::TimedOut),
                    PollOutcome::Cancelled => debug!("order poll cancelled"),
                }
            })
        });
    }

    /// Stop the active session, if any. Silent: no error callback fires.
    pub fn stop(&self) {
        self.session.stop();
    }

    pub fn is_tracking(&self, order_id: &str) -> bool {
        self.session.is_tracking(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment_client::{SimProfile, test_support::StubFulfillment};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::sync::mpsc;

    #[derive(Debug)]
    enum Event {
        Status(OrderStatus),
        Provisioned(OrderStatus),
        Error(PollFailure),
    }

    fn fast_config() -> PollingConfig {
        PollingConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(60),
        }
    }

    fn idle_config() -> PollingConfig {
        PollingConfig {
            interval: Duration::from_secs(3600),
            timeout: Duration::from_secs(7200),
        }
    }

    fn pending_status() -> OrderStatus {
        OrderStatus {
            state: Some("processing".to_string()),
            ..OrderStatus::default()
        }
    }

    fn provisioned_status() -> OrderStatus {
        OrderStatus {
            state: Some("completed".to_string()),
            sim: Some(SimProfile {
                iccid: "8988247000001234567".to_string(),
                smdp_address: "smdp.roamsim.app".to_string(),
                matching_id: "ABC-123".to_string(),
                activation_code: None,
            }),
            error: None,
        }
    }

    fn start_with_events(
        tracker: &OrderStatusTracker<StubFulfillment>,
        order_id: &str,
    ) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        let status_tx = tx.clone();
        let success_tx = tx.clone();
        tracker.start(
            order_id,
            move |status| {
                let _ = status_tx.send(Event::Status(status));
            },
            move |status| {
                let _ = success_tx.send(Event::Provisioned(status));
            },
            move |failure| {
                let _ = tx.send(Event::Error(failure));
            },
        );
        rx
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for tracker event")
            .expect("tracker event channel closed")
    }

    #[tokio::test]
    async fn test_reports_intermediate_then_provisioned() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);

        let client = StubFulfillment::orders(move |_| {
            if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(pending_status())
            } else {
                Ok(provisioned_status())
            }
        });

        let tracker = OrderStatusTracker::with_config(Arc::new(client), fast_config());
        let mut rx = start_with_events(&tracker, "ord_1");

        assert!(matches!(next_event(&mut rx).await, Event::Status(_)));
        match next_event(&mut rx).await {
            Event::Provisioned(status) => {
                let sim = status.sim.expect("sim profile expected");
                assert_eq!(sim.iccid, "8988247000001234567");
            }
            other => panic!("expected provisioned event, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_explicit_backend_error_reaches_error_callback() {
        let client = StubFulfillment::orders(|_| {
            Ok(OrderStatus {
                error: Some("payment expired".to_string()),
                ..OrderStatus::default()
            })
        });

        let tracker = OrderStatusTracker::with_config(Arc::new(client), fast_config());
        let mut rx = start_with_events(&tracker, "ord_1");

        match next_event(&mut rx).await {
            Event::Error(PollFailure::Failed(reason)) => assert_eq!(reason, "payment expired"),
            other => panic!("expected failure event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_is_idempotent_for_same_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);

        let client = StubFulfillment::orders(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(pending_status())
        });

        let tracker = OrderStatusTracker::with_config(Arc::new(client), idle_config());
        let _rx1 = start_with_events(&tracker, "ord_1");
        let _rx2 = start_with_events(&tracker, "ord_1");

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(tracker.is_tracking("ord_1"));

        tracker.stop();
    }

    #[tokio::test]
    async fn test_starting_other_order_supersedes_previous_session() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&first_calls);

        let client = StubFulfillment::orders(move |order_id| {
            if order_id == "ord_1" {
                counted.fetch_add(1, Ordering::SeqCst);
            }
            Ok(pending_status())
        });

        let tracker = OrderStatusTracker::with_config(Arc::new(client), idle_config());
        let _rx1 = start_with_events(&tracker, "ord_1");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let _rx2 = start_with_events(&tracker, "ord_2");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(tracker.is_tracking("ord_2"));
        assert!(!tracker.is_tracking("ord_1"));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);

        tracker.stop();
    }

    #[tokio::test]
    async fn test_stop_is_silent() {
        let client = StubFulfillment::orders(|_| Ok(pending_status()));

        let tracker = OrderStatusTracker::with_config(Arc::new(client), idle_config());
        let mut rx = start_with_events(&tracker, "ord_1");

        tokio::time::sleep(Duration::from_millis(20)).await;
        tracker.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!tracker.is_tracking("ord_1"));
        // the first pending snapshot may have been reported, but neither a
        // success nor an error follows a silent stop
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, Event::Status(_)), "unexpected {event:?}");
        }
    }
}
