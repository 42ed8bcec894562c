//! # Agent Configuration
//!
//! Layers the agent settings from, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. an optional JSON config file (`--config` / `CONFIG`)
//! 3. environment variables
//! 4. command line flags
//!
//! Environment variables and flags are both resolved by clap into [`Args`],
//! which is then handed to the `config` builder as the topmost source.

#[macro_use]
extern crate tracing;

mod args;
pub mod duration;

pub use args::Args;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub use config::ConfigError;

pub const DEFAULT_ADDRESS: &str = "localhost:8080";
const DEFAULT_POLL_INTERVAL: &str = "2s";
const DEFAULT_REPORT_INTERVAL: &str = "10s";
const DEFAULT_RATE_LIMIT: i64 = 1;
const DEFAULT_REQUEST_TIMEOUT: &str = "10s";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub address: String,
    #[serde(deserialize_with = "duration::deserialize")]
    pub poll_interval: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub report_interval: Duration,
    #[serde(default)]
    pub key: Option<String>,
    pub rate_limit: i64,
    #[serde(deserialize_with = "duration::deserialize")]
    pub request_timeout: Duration,
}

impl Config {
    pub fn new(args: Args) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("address", DEFAULT_ADDRESS)?
            .set_default("poll_interval", DEFAULT_POLL_INTERVAL)?
            .set_default("report_interval", DEFAULT_REPORT_INTERVAL)?
            .set_default("rate_limit", DEFAULT_RATE_LIMIT)?
            .set_default("request_timeout", DEFAULT_REQUEST_TIMEOUT)?;

        if let Some(path) = &args.config_file {
            debug!(?path, "loading config file");
            builder = builder.add_source(config::File::from(path.as_path()).format(config::FileFormat::Json));
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;

        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("poll_interval", self.poll_interval),
            ("report_interval", self.report_interval),
            ("request_timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Message(format!("{name} must be greater than zero")));
            }
        }
        self.base_url()?;
        Ok(())
    }

    /// The ingestion server's base URL. A bare `host:port` is taken as plain HTTP.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let address = self.address.trim();
        let url = if address.contains("://") {
            Url::parse(address)
        } else {
            Url::parse(&format!("http://{address}"))
        };
        let url = url.map_err(|err| ConfigError::Message(format!("invalid address {address:?}: {err}")))?;
        if url.host_str().is_none() {
            return Err(ConfigError::Message(format!("address {address:?} has no host")));
        }
        Ok(url)
    }

    /// The signing key, if a non-empty one is configured.
    pub fn signing_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|key| !key.is_empty())
    }

    /// Number of concurrent reporters, zero when delivery is disabled.
    pub fn reporters(&self) -> usize {
        usize::try_from(self.rate_limit).unwrap_or(0)
    }
}
