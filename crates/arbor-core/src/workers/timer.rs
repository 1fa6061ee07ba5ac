use crate::worker::Worker;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Longest interval a timer schedules.  Longer ones wait this long.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A repeating timer that fires at a fixed interval.
///
/// Each tick emits the current [`Instant`].  The first tick fires one
/// interval after the worker starts.  Changing the interval restarts the
/// timer; re-requesting the same interval keeps it running.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use arbor_core::workers::Every;
///
/// ctx.run_worker(Every::new(Duration::from_secs(1)), "clock", |_| Action::Tick)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Every {
    /// The interval between ticks.
    pub interval: Duration,
}

impl Every {
    /// Create a new repeating timer with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Worker for Every {
    type Output = Instant;

    fn run(&self) -> BoxStream<'static, Instant> {
        // tokio rejects a zero period.
        let period = self.interval.clamp(Duration::from_millis(1), FAR_FUTURE);
        let now = tokio::time::Instant::now();
        let start = now.checked_add(period).unwrap_or_else(|| now + FAR_FUTURE);
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let stream = tokio_stream::wrappers::IntervalStream::new(interval).map(|tick| tick.into_std());
        Box::pin(stream)
    }

    fn is_equivalent(&self, other: &Self) -> bool {
        self.interval == other.interval
    }
}

/// A one-shot delay that fires once after the specified duration.
///
/// Emits a single [`Instant`] when the delay elapses, then completes.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use arbor_core::workers::After;
///
/// ctx.run_worker(After::new(Duration::from_millis(500)), "debounce", |_| Action::Settled)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct After {
    /// How long to wait before firing.
    pub duration: Duration,
}

impl After {
    /// Create a new one-shot delay for the given duration.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Worker for After {
    type Output = Instant;

    fn run(&self) -> BoxStream<'static, Instant> {
        let duration = self.duration;
        let stream = futures::stream::once(async move {
            tokio::time::sleep(duration).await;
            Instant::now()
        });
        Box::pin(stream)
    }

    fn is_equivalent(&self, other: &Self) -> bool {
        self.duration == other.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn after_fires_once() {
        let mut stream = After::new(Duration::from_millis(5)).run();
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn every_keeps_ticking() {
        let mut stream = Every::new(Duration::from_millis(2)).run();
        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert!(second >= first);
    }

    #[tokio::test]
    async fn huge_durations_never_fire() {
        let mut every = Every::new(Duration::MAX).run();
        let mut after = After::new(Duration::MAX).run();
        assert!(every.next().now_or_never().is_none());
        assert!(after.next().now_or_never().is_none());
    }

    #[test]
    fn equivalence_follows_configuration() {
        let a = Every::new(Duration::from_secs(1));
        assert!(a.is_equivalent(&Every::new(Duration::from_secs(1))));
        assert!(!a.is_equivalent(&Every::new(Duration::from_secs(2))));
        assert!(!After::new(Duration::from_secs(1)).is_equivalent(&After::new(Duration::ZERO)));
    }
}
