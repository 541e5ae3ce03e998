use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Terminal outcome of a [`poll_until`] call.
///
/// A tagged outcome keeps "the condition never held" distinguishable from
/// any value the probe itself could produce, including a legitimate
/// boolean `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The predicate accepted a probe result; carries that result.
    Satisfied(T),
    /// The deadline elapsed before any probe result was accepted.
    TimedOut,
}

impl<T> PollOutcome<T> {
    /// Returns the accepted probe result, or `None` on timeout.
    pub fn satisfied(self) -> Option<T> {
        match self {
            PollOutcome::Satisfied(value) => Some(value),
            PollOutcome::TimedOut => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, PollOutcome::TimedOut)
    }
}

/// Repeatedly invokes `probe` until `predicate` accepts its result or
/// `deadline` elapses.
///
/// Used to await externally mutated system state (a freshly restarted
/// service, a worker unit coming up) that is only exposed through a
/// synchronous query. Each cycle sleeps `interval` **before** probing, so
/// the minimum latency of a successful call is one interval even when the
/// condition already holds at call time. That ordering fits the dominant
/// use case here: the caller has just kicked an external service and an
/// immediate probe would only observe stale state.
///
/// Policy choices, deliberate rather than accidental:
/// - Probe errors propagate immediately; there is no retry-on-error.
/// - Timeout is a value ([`PollOutcome::TimedOut`]), not an error.
/// - A zero `interval` or `deadline` is rejected up front instead of
///   busy-looping or never terminating.
///
/// Bounded termination: the call returns within `deadline + interval`
/// wall-clock time (plus the duration of the final probe) regardless of
/// predicate outcome.
pub async fn poll_until<T, F, Fut, P>(
    mut probe: F,
    predicate: P,
    interval: Duration,
    deadline: Duration,
) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    if interval.is_zero() {
        return Err(anyhow::anyhow!("poll interval must be greater than zero"));
    }
    if deadline.is_zero() {
        return Err(anyhow::anyhow!("poll deadline must be greater than zero"));
    }

    let started = Instant::now();
    loop {
        tokio::time::sleep(interval).await;

        let value = probe().await?;
        if predicate(&value) {
            return Ok(PollOutcome::Satisfied(value));
        }

        if started.elapsed() >= deadline {
            return Ok(PollOutcome::TimedOut);
        }
    }
}
