use crate::{
    poller::Poller,
    snapshot::Snapshot,
};
use flume::{
    Receiver,
    Sender,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{
        interval_at,
        Instant,
        MissedTickBehavior,
    },
};
use tokio_util::sync::CancellationToken;

/// Why the scheduling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Cancelled,
    /// Every receiver is gone, nobody is left to deliver to.
    Disconnected,
}

/// Fans the snapshots of all pollers into a single rendezvous channel.
///
/// Nothing is emitted before every poller has sampled once. After that each
/// poller contributes exactly one snapshot per tick, in registration order,
/// starting with one immediate round. Sends block until a reporter takes the
/// snapshot, so a saturated delivery layer holds back the rest of the round
/// instead of dropping data.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self { interval, cancel }
    }

    /// Spawns the scheduling task. The returned channel is closed exactly once,
    /// when the task ends.
    pub fn start(&self, pollers: Vec<Arc<Poller>>) -> (Receiver<Snapshot>, JoinHandle<()>) {
        let (sender, receiver) = flume::bounded(0);
        let interval = self.interval;
        let cancel = self.cancel.clone();

        let handle = tokio::task::spawn(async move {
            let stop = match schedule(&pollers, interval, &cancel, &sender).await {
                Ok(never) => match never {},
                Err(stop) => stop,
            };
            // Dropping the only sender closes the channel.
            drop(sender);
            debug!(?stop, "scheduler stopped");
        });

        (receiver, handle)
    }
}

async fn schedule(
    pollers: &[Arc<Poller>],
    interval: Duration,
    cancel: &CancellationToken,
    sender: &Sender<Snapshot>,
) -> Result<std::convert::Infallible, Stop> {
    for poller in pollers {
        let mut ready = poller.ready();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Stop::Cancelled),

            fired = async { ready.wait_for(|ready| *ready).await.map(|_| ()) } => {
                // The sender lives inside the poller we hold, so this cannot fail.
                fired.map_err(|_| Stop::Cancelled)?;
            }
        }
        debug!(source = poller.name(), "poller ready");
    }
    info!(pollers = pollers.len(), ?interval, "all pollers ready, scheduling reports");

    emit(pollers, cancel, sender).await?;

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Stop::Cancelled),
            _ = ticker.tick() => {}
        }
        emit(pollers, cancel, sender).await?;
    }
}

/// One round: a copy of every poller's snapshot, in registration order.
async fn emit(pollers: &[Arc<Poller>], cancel: &CancellationToken, sender: &Sender<Snapshot>) -> Result<(), Stop> {
    for poller in pollers {
        let (polls, snapshot) = poller.get();
        let metrics = snapshot.len();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Stop::Cancelled),

            sent = sender.send_async(snapshot) => {
                sent.map_err(|_| Stop::Disconnected)?;
            }
        }
        trace!(source = poller.name(), polls, metrics, "snapshot handed off");
    }
    Ok(())
}
