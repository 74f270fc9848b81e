use crate::{
    config::{AppConfig, PollingConfig},
    fulfillment_client::{FulfillmentApi, TopUpStatus},
    polling::{PollFailure, PollOutcome, PollRequest, PollingEngine, SessionSlot},
};
use log::debug;
use std::sync::Arc;

/// Terminal status values of the top-up endpoint. Everything else in its
/// open-ended string domain is an in-progress snapshot.
const STATUS_PROVISIONED: &str = "esim_provisioned";
const STATUS_FAILED: &str = "FAILED";

/// Watches a data top-up transaction until fulfillment resolves.
///
/// Same session discipline as the order tracker: one active session,
/// superseded by a different transaction id, idempotent for the same one.
pub struct TopUpStatusTracker<C> {
    client: Arc<C>,
    config: PollingConfig,
    session: SessionSlot,
}

impl<C> TopUpStatusTracker<C>
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

    /// Begin tracking `transaction_id`. Must be called from within a tokio
    /// runtime.
    pub fn start(
        &self,
        transaction_id: &str,
        on_status: impl Fn(TopUpStatus) + Send + Sync + 'static,
        on_provisioned: impl FnOnce(TopUpStatus) + Send + 'static,
        on_error: impl FnOnce(PollFailure) + Send + 'static,
    ) {
        let request = PollRequest::new(
            transaction_id,
            &self.config,
            |status: &TopUpStatus| {
                (status.status == STATUS_FAILED).then(|| {
                    status
                        .message
                        .clone()
                        .unwrap_or_else(|| "top-up reported FAILED".to_string())
                })
            },
            |status: &TopUpStatus| status.status == STATUS_PROVISIONED,
        );

        let client = Arc::clone(&self.client);
        let transaction = transaction_id.to_owned();

        self.session.start_session(transaction_id, move |cancel| {
            tokio::spawn(async move {
                let fetch = || {
                    let client = Arc::clone(&client);
                    let transaction = transaction.clone();
                    async move { client.topup_status(&transaction).await }
                };

                let outcome = PollingEngine::default()
                    .run(request, cancel, fetch, |status| on_status(status.clone()))
                    .await;

                match outcome {
                    PollOutcome::Success(status) => on_provisioned(status),
                    PollOutcome::Failure(reason) => on_error(PollFailure::Failed(reason)),
                    PollOutcome::TimedOut => on_error(PollFailure::TimedOut),
                    PollOutcome::Cancelled => debug!("top-up poll cancelled"),
                }
            })
        });
    }

    /// Stop the active session, if any. Silent: no error callback fires.
    pub fn stop(&self) {
        self.session.stop();
    }

    pub fn is_tracking(&self, transaction_id: &str) -> bool {
        self.session.is_tracking(transaction_id)
    }
}
