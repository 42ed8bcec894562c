use crate::{
    reporter::Reporter,
    snapshot::Snapshot,
};
use flume::Receiver;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A fixed set of reporters competing for snapshots on one channel.
///
/// With a rate limit of `N >= 1` exactly `N` reporters are started, so at most
/// `N` deliveries are in flight and snapshots may reach the endpoint out of
/// sampling order. With a rate limit of zero delivery is disabled: a single
/// flusher keeps receiving so the scheduler never blocks, and drops what it
/// gets.
#[derive(Debug, Clone)]
pub struct ReporterPool {
    rate_limit: usize,
    reporter: Reporter,
}

impl ReporterPool {
    pub fn new(rate_limit: usize, reporter: Reporter) -> Self {
        Self { rate_limit, reporter }
    }

    pub fn start(self, snapshots: Receiver<Snapshot>, cancel: CancellationToken) -> ReporterPoolHandle {
        if self.rate_limit < 1 {
            warn!("delivery is disabled, snapshots will be dropped");
            let flusher = tokio::task::spawn(flush(snapshots, cancel));
            return ReporterPoolHandle { workers: vec![flusher] };
        }

        info!(workers = self.rate_limit, endpoint = %self.reporter.endpoint(), "starting reporters");
        let workers = (0..self.rate_limit)
            .map(|worker| tokio::task::spawn(self.reporter.clone().run(worker, snapshots.clone(), cancel.clone())))
            .collect();

        ReporterPoolHandle { workers }
    }
}

/// Waits for every worker of a started pool.
#[derive(Debug)]
pub struct ReporterPoolHandle {
    workers: Vec<JoinHandle<()>>,
}

impl ReporterPoolHandle {
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub async fn join(self) {
        for result in join_all(self.workers).await {
            if let Err(err) = result {
                error!("reporter task failed: {err}");
            }
        }
    }
}

async fn flush(snapshots: Receiver<Snapshot>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,

            received = snapshots.recv_async() => match received {
                Ok(snapshot) => debug!(metrics = snapshot.len(), "delivery disabled, dropping snapshot"),
                Err(_) => break,
            },
        }
    }
    debug!("flusher stopped");
}
