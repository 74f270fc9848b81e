use crate::{
    config::PollingConfig,
    error_report::{ErrorReporter, LogReporter},
};
use anyhow::Result;
use log::{debug, warn};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, sleep},
};
use uuid::Uuid;

/// Cooperative cancellation cell shared between a poll loop and its owner.
///
/// The flag is the only state mutated from outside the loop's task. The loop
/// observes it at its suspension points; nothing in flight is forcibly
/// aborted.
#[derive(Clone)]
pub struct CancelFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is set.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // cannot fail: the sender lives at least as long as self
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal result of a polling session. Exactly one is produced per request.
///
/// A plain value: it holds no reference back to the engine that produced it.
#[derive(Debug)]
pub enum PollOutcome<T> {
    Success(T),
    Failure(String),
    TimedOut,
    Cancelled,
}

/// The failure surfaced to a tracker's error callback. Timeouts stay distinct
/// from domain failures so the UI can offer "try again" instead of "contact
/// support". Cancellation is silent and never reaches the callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollFailure {
    Failed(String),
    TimedOut,
}

type Classifier<T, R> = Box<dyn Fn(&T) -> R + Send + Sync>;

/// One polling attempt: what to poll, how often, for how long, and how to
/// classify fetched payloads. Created once per attempt and consumed by
/// [`PollingEngine::run`].
pub struct PollRequest<T> {
    pub subject_id: String,
    pub interval: Duration,
    pub timeout: Duration,
    is_failure: Classifier<T, Option<String>>,
    is_terminal: Classifier<T, bool>,
}

impl<T> PollRequest<T> {
    /// `is_failure` returns the failure reason when the payload reports an
    /// explicit domain failure; `is_terminal` recognizes success. Failure is
    /// checked first.
    pub fn new(
        subject_id: impl Into<String>,
        config: &PollingConfig,
        is_failure: impl Fn(&T) -> Option<String> + Send + Sync + 'static,
        is_terminal: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            interval: config.interval,
            timeout: config.timeout,
            is_failure: Box::new(is_failure),
            is_terminal: Box::new(is_terminal),
        }
    }
}

/// Repeatedly invokes a fetch operation at a fixed cadence until the payload
/// classifies as terminal, the wall-clock budget runs out, or the owner
/// cancels.
///
/// All retry policy lives here: the fetch operation must be idempotent and
/// must not retry internally. A transport error ends the session immediately
/// with `Failure` after reporting it to the error sink; transient errors are
/// not retried. Non-terminal payloads are surfaced through the intermediate
/// callback, in order, and the terminal outcome is produced exactly once.
pub struct PollingEngine<R> {
    reporter: R,
}

impl Default for PollingEngine<LogReporter> {
    fn default() -> Self {
        Self::new(LogReporter)
    }
}

impl<R> PollingEngine<R>
where
    R: ErrorReporter,
{
    pub fn new(reporter: R) -> Self {
        Self { reporter }
    }

    pub async fn run<T, F, Fut>(
        &self,
        request: PollRequest<T>,
        cancel: CancelFlag,
        mut fetch: F,
        mut on_intermediate: impl FnMut(&T),
    ) -> PollOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = Uuid::new_v4();
        let started_at = Instant::now();
        debug!("poll {session}: started for {}", request.subject_id);

        loop {
            if cancel.is_cancelled() {
                debug!("poll {session}: cancelled");
                return PollOutcome::Cancelled;
            }

            // the budget is checked before a fetch starts, never mid-fetch
            if started_at.elapsed() >= request.timeout {
                warn!(
                    "poll {session}: no terminal status for {} within {:?}",
                    request.subject_id, request.timeout
                );
                return PollOutcome::TimedOut;
            }

            // racing the fetch against cancellation means stop() never waits
            // for a slow request; the request itself is left to run out
            let fetched = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("poll {session}: cancelled during fetch");
                    return PollOutcome::Cancelled;
                }
                fetched = fetch() => fetched,
            };

            match fetched {
                Err(e) => {
                    self.reporter
                        .report(&format!("poll fetch for {}", request.subject_id), &e);
                    return PollOutcome::Failure(format!("{e:#}"));
                }
                Ok(payload) => {
                    if let Some(reason) = (request.is_failure)(&payload) {
                        debug!("poll {session}: failed: {reason}");
                        return PollOutcome::Failure(reason);
                    }
                    if (request.is_terminal)(&payload) {
                        debug!("poll {session}: resolved after {:?}", started_at.elapsed());
                        return PollOutcome::Success(payload);
                    }
                    on_intermediate(&payload);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("poll {session}: cancelled between fetches");
                    return PollOutcome::Cancelled;
                }
                _ = sleep(request.interval) => {}
            }
        }
    }
}

/// Handle to a running poll, owned by the tracker that started it.
///
/// Dropping the handle does not stop the loop; call [`PollingSession::cancel`].
pub struct PollingSession {
    subject_id: String,
    cancel: CancelFlag,
    task: JoinHandle<()>,
}

impl PollingSession {
    pub fn new(subject_id: impl Into<String>, cancel: CancelFlag, task: JoinHandle<()>) -> Self {
        Self {
            subject_id: subject_id.into(),
            cancel,
            task,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Bookkeeping for the single active session a tracker may own.
///
/// Starting a subject that is already actively tracked is a no-op; starting a
/// different subject cancels the running session first. Two sessions never
/// run concurrently for the same tracker.
pub struct SessionSlot {
    inner: std::sync::Mutex<Option<PollingSession>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Mutex::new(None),
        }
    }

    /// Claim the slot for `subject_id` and spawn its poll task.
    ///
    /// Returns false when `subject_id` is already actively tracked and the
    /// start is skipped.
    pub fn start_session(
        &self,
        subject_id: &str,
        spawn: impl FnOnce(CancelFlag) -> JoinHandle<()>,
    ) -> bool {
        let mut active = self.inner.lock().expect("session lock poisoned");

        if let Some(session) = active.as_ref() {
            if session.subject_id() == subject_id && session.is_active() {
                debug!("already polling {subject_id}");
                return false;
            }
            session.cancel();
        }

        let cancel = CancelFlag::new();
        let task = spawn(cancel.clone());
        *active = Some(PollingSession::new(subject_id, cancel, task));

        true
    }

    /// Cancel and release the active session, if any.
    pub fn stop(&self) {
        if let Some(session) = self.inner.lock().expect("session lock poisoned").take() {
            session.cancel();
        }
    }

    pub fn is_tracking(&self, subject_id: &str) -> bool {
        self.inner
            .lock()
            .expect("session lock poisoned")
            .as_ref()
            .is_some_and(|session| session.subject_id() == subject_id && session.is_active())
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}
