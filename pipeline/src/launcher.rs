use crate::poller::Poller;
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

/// Drives pollers on a fixed interval until the token is cancelled.
#[derive(Debug, Clone)]
pub struct PollerLauncher {
    interval: Duration,
    cancel: CancellationToken,
}

impl PollerLauncher {
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self { interval, cancel }
    }

    /// Spawns the polling task. The first sample is taken right away, the
    /// following ones on every tick.
    pub fn launch(&self, poller: Arc<Poller>) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        let interval = self.interval;

        tokio::task::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(source = poller.name(), "poller started");
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,

                    _ = ticker.tick() => {
                        let polls = poller.poll();
                        trace!(source = poller.name(), polls, "sampled");
                    }
                }
            }
            debug!(source = poller.name(), "poller stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{
        Counters,
        Gauges,
    };

    fn counting() -> Arc<Poller> {
        Arc::new(Poller::new("counting", |_: &mut Gauges, counters: &mut Counters| {
            *counters.entry("PollCount".to_string()).or_default() += 1;
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn samples_immediately_then_on_every_tick() {
        let cancel = CancellationToken::new();
        let poller = counting();
        let handle = PollerLauncher::new(Duration::from_secs(2), cancel.clone()).launch(poller.clone());

        let mut ready = poller.ready();
        ready.wait_for(|ready| *ready).await.unwrap();
        assert_eq!(poller.get().0, 1);

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(poller.get().0, 3);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_sampling_after_cancellation() {
        let cancel = CancellationToken::new();
        let poller = counting();
        let handle = PollerLauncher::new(Duration::from_secs(1), cancel.clone()).launch(poller.clone());

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        cancel.cancel();
        handle.await.unwrap();

        let (polls, _) = poller.get();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(poller.get().0, polls);
    }
}
