use anyhow::Error;
use log::error;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

/// Out-of-band sink for errors that must not interrupt control flow.
///
/// Implementations forward to an external reporting service. The sink is
/// fire-and-forget: callers never learn whether reporting itself failed.
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, error: &Error);
}

/// Default reporter writing through the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, context: &str, error: &Error) {
        error!("{context}: {error:#}");
    }
}
