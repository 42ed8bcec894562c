use crate::{
    launcher::PollerLauncher,
    poller::{
        Poller,
        Sampler,
    },
    pool::ReporterPool,
    reporter::{
        Reporter,
        SigningKey,
    },
    scheduler::Scheduler,
    transport::{
        http::HttpTransport,
        retry::RetryableTransport,
        Transport,
        TransportError,
    },
};
use futures::future::join_all;
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything the pipeline needs from the outside world.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub poll_interval: Duration,
    pub report_interval: Duration,
    /// Number of concurrent reporters, zero disables delivery.
    pub rate_limit: usize,
    pub endpoint: Url,
    pub key: Option<SigningKey>,
    pub request_timeout: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    #[default]
    Init,
    Running,
    Stopping,
    Stopped,
}

/// Owns the pollers and runs the whole pipeline for one cancellable lifetime.
pub struct Agent {
    settings: AgentSettings,
    transport: Arc<dyn Transport>,
    pollers: Vec<Arc<Poller>>,
    state: watch::Sender<AgentState>,
}

impl Agent {
    /// Delivers over HTTP with the bounded retry policy.
    pub fn new(settings: AgentSettings) -> Result<Self, TransportError> {
        let transport = RetryableTransport::new(HttpTransport::new(settings.request_timeout)?);
        Ok(Self::with_transport(settings, Arc::new(transport)))
    }

    pub fn with_transport(settings: AgentSettings, transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(AgentState::Init);
        Self {
            settings,
            transport,
            pollers: Vec::new(),
            state,
        }
    }

    /// Adds a source. Sources are scheduled in the order they are registered.
    pub fn register(&mut self, name: impl Into<String>, sampler: impl Sampler + 'static) -> Arc<Poller> {
        let poller = Arc::new(Poller::new(name, sampler));
        self.pollers.push(poller.clone());
        poller
    }

    pub fn pollers(&self) -> &[Arc<Poller>] {
        &self.pollers
    }

    pub fn state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    /// Runs until `cancel` fires and every task has wound down.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            settings,
            transport,
            pollers,
            state,
        } = self;

        let launcher = PollerLauncher::new(settings.poll_interval, cancel.clone());
        let polling: Vec<_> = pollers.iter().map(|poller| launcher.launch(poller.clone())).collect();

        let (snapshots, scheduling) = Scheduler::new(settings.report_interval, cancel.clone()).start(pollers);

        let reporter = Reporter::new(transport, settings.endpoint.clone(), settings.key.clone());
        let reporting = ReporterPool::new(settings.rate_limit, reporter).start(snapshots, cancel.clone());

        transition(&state, AgentState::Running);
        info!(
            sources = polling.len(),
            reporters = reporting.len(),
            poll_interval = ?settings.poll_interval,
            report_interval = ?settings.report_interval,
            endpoint = %settings.endpoint,
            signed = settings.key.is_some(),
            "agent running"
        );

        cancel.cancelled().await;
        transition(&state, AgentState::Stopping);

        for result in join_all(polling).await {
            if let Err(err) = result {
                error!("poller task failed: {err}");
            }
        }
        if let Err(err) = scheduling.await {
            error!("scheduler task failed: {err}");
        }
        reporting.join().await;

        transition(&state, AgentState::Stopped);
    }
}

fn transition(state: &watch::Sender<AgentState>, next: AgentState) {
    let previous = state.send_replace(next);
    info!(?previous, ?next, "agent state changed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        snapshot::{
            Counters,
            Gauges,
        },
        transport::{
            Reply,
            Request,
        },
    };
    use flate2::read::GzDecoder;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::{
        future::Future,
        io::Read as _,
        pin::Pin,
    };
    use tokio::sync::mpsc::{
        unbounded_channel,
        UnboundedSender,
    };

    /// Hands every request body to the test.
    struct Forward(UnboundedSender<bytes::Bytes>);

    impl Transport for Forward {
        fn round_trip<'a>(
            &'a self,
            request: &'a Request,
        ) -> Pin<Box<dyn Future<Output = Result<Reply, TransportError>> + Send + 'a>> {
            Box::pin(async move {
                let _ = self.0.send(request.body.clone());
                Ok(Reply::new(StatusCode::OK))
            })
        }
    }

    fn settings(rate_limit: usize) -> AgentSettings {
        AgentSettings {
            poll_interval: Duration::from_secs(3600),
            report_interval: Duration::from_secs(3600),
            rate_limit,
            endpoint: "http://localhost:8080/updates/".parse().unwrap(),
            key: None,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn foo_bar(gauges: &mut Gauges, counters: &mut Counters) {
        gauges.insert("foo".to_string(), 1.5);
        *counters.entry("bar".to_string()).or_default() += 10;
    }

    fn decode(body: &[u8]) -> serde_json::Value {
        let mut json = String::new();
        GzDecoder::new(body).read_to_string(&mut json).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[tokio::test]
    async fn polled_values_reach_the_endpoint() {
        let (bodies, mut captured) = unbounded_channel();
        let cancel = CancellationToken::new();
        let poller = Arc::new(Poller::new("foo-bar", foo_bar));
        poller.poll();
        poller.poll();

        let (snapshots, scheduling) = Scheduler::new(Duration::from_secs(3600), cancel.clone()).start(vec![poller]);
        let reporter = Reporter::new(
            Arc::new(Forward(bodies)),
            "http://localhost:8080/updates/".parse().unwrap(),
            None,
        );
        let reporting = ReporterPool::new(1, reporter).start(snapshots, cancel.clone());

        let body = captured.recv().await.unwrap();
        assert_eq!(
            decode(&body),
            json!([
                {"id": "foo", "type": "gauge", "value": 1.5},
                {"id": "bar", "type": "counter", "delta": 20},
            ])
        );

        cancel.cancel();
        scheduling.await.unwrap();
        reporting.join().await;
    }

    #[tokio::test]
    async fn runs_through_every_state() {
        let (bodies, mut captured) = unbounded_channel();
        let mut agent = Agent::with_transport(settings(2), Arc::new(Forward(bodies)));
        agent.register("foo-bar", foo_bar);
        let mut state = agent.state();
        assert_eq!(*state.borrow(), AgentState::Init);

        let cancel = CancellationToken::new();
        let running = tokio::spawn(agent.run(cancel.clone()));

        state.wait_for(|state| *state == AgentState::Running).await.unwrap();
        // The launcher samples right away, the scheduler then emits one round.
        let body = captured.recv().await.unwrap();
        assert_eq!(decode(&body)[0]["id"], "foo");

        cancel.cancel();
        running.await.unwrap();
        assert_eq!(*state.borrow(), AgentState::Stopped);
    }

    #[tokio::test]
    async fn disabled_delivery_still_shuts_down() {
        let (bodies, mut captured) = unbounded_channel();
        let mut agent = Agent::with_transport(settings(0), Arc::new(Forward(bodies)));
        let poller = agent.register("foo-bar", foo_bar);

        let cancel = CancellationToken::new();
        let running = tokio::spawn(agent.run(cancel.clone()));

        poller.ready().wait_for(|ready| *ready).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        running.await.unwrap();

        assert!(captured.try_recv().is_err());
    }
}
