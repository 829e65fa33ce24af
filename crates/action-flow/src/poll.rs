//! Cancellable waiting primitives.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Cooperative cancellation shared by a run and its controller.
#[derive(Clone, Debug, Default)]
pub struct RunSignal {
    token: CancellationToken,
}

impl RunSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// When a poll gives up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollBudget {
    /// Wall-clock budget measured from the first probe
    Deadline(Duration),
    /// Number of probes
    Attempts(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSpec {
    pub interval: Duration,
    pub budget: PollBudget,
}

impl PollSpec {
    pub fn deadline(interval: Duration, budget: Duration) -> Self {
        Self {
            interval,
            budget: PollBudget::Deadline(budget),
        }
    }

    pub fn attempts(interval: Duration, attempts: u32) -> Self {
        Self {
            interval,
            budget: PollBudget::Attempts(attempts),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    Exhausted,
    Cancelled,
}

/// Sleep for `duration` unless the signal fires first. Returns false when
/// cancelled.
pub async fn sleep_or_cancel(duration: Duration, signal: &RunSignal) -> bool {
    if signal.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        _ = signal.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

/// Run `probe` every `spec.interval` until it yields a value, the budget
/// runs out, or the signal is cancelled. Probe errors are returned as is.
pub async fn poll_until<T, E, F, Fut>(
    mut probe: F,
    spec: PollSpec,
    signal: &RunSignal,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        if signal.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }
        let exhausted = match spec.budget {
            PollBudget::Deadline(budget) => started.elapsed() >= budget,
            PollBudget::Attempts(limit) => attempts >= limit,
        };
        if exhausted {
            return Ok(PollOutcome::Exhausted);
        }

        attempts += 1;
        if let Some(value) = probe().await? {
            return Ok(PollOutcome::Ready(value));
        }

        if matches!(spec.budget, PollBudget::Attempts(limit) if attempts >= limit) {
            return Ok(PollOutcome::Exhausted);
        }
        if !sleep_or_cancel(spec.interval, signal).await {
            return Ok(PollOutcome::Cancelled);
        }
    }
}
