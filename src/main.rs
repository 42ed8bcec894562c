#[macro_use]
extern crate tracing;

mod logging;
mod shutdown;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr as _;
use telemetry_agent_config::{
    Args,
    Config,
};
use telemetry_agent_pipeline::{
    Agent,
    AgentSettings,
    SigningKey,
    UPDATES_PATH,
};
use telemetry_agent_sources::{
    HostSampler,
    RuntimeSampler,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;

    let config = Config::new(Args::parse()).wrap_err("failed to load configuration")?;
    debug!(
        address = %config.address,
        poll_interval = ?config.poll_interval,
        report_interval = ?config.report_interval,
        rate_limit = config.rate_limit,
        "configuration loaded"
    );

    let endpoint = config
        .base_url()?
        .join(UPDATES_PATH)
        .wrap_err("failed to build the updates endpoint")?;

    let settings = AgentSettings {
        poll_interval: config.poll_interval,
        report_interval: config.report_interval,
        rate_limit: config.reporters(),
        endpoint,
        key: config.signing_key().and_then(SigningKey::new),
        request_timeout: config.request_timeout,
    };

    let mut agent = Agent::new(settings).wrap_err("failed to build the HTTP client")?;
    agent.register("runtime", RuntimeSampler::new());
    agent.register("host", HostSampler::new());

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown::on_signal(cancel.clone()));

    agent.run(cancel).await;
    info!("agent stopped");
    Ok(())
}
