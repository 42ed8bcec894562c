use crate::duration;
use clap::Parser;
use std::{
    path::PathBuf,
    time::Duration,
};

/// Samples process and host metrics and ships them to an ingestion endpoint.
///
/// Every option can also be given through the environment or a JSON config
/// file. Flags win over the environment, which wins over the file.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address of the ingestion server, `host:port` or a full URL.
    #[arg(short = 'a', long, env = "ADDRESS", value_name = "ADDRESS")]
    pub address: Option<String>,

    /// How often every source is sampled, e.g. `2`, `2s` or `500ms`.
    #[arg(short = 'p', long, env = "POLL_INTERVAL", value_name = "DURATION", value_parser = duration::parse)]
    pub poll_interval: Option<Duration>,

    /// How often the sampled snapshots are handed to the reporters.
    #[arg(short = 'r', long, env = "REPORT_INTERVAL", value_name = "DURATION", value_parser = duration::parse)]
    pub report_interval: Option<Duration>,

    /// Key used to sign request bodies with HMAC-SHA256. Empty disables signing.
    #[arg(short = 'k', long, env = "KEY", value_name = "KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Number of concurrent reporters. Values below 1 disable delivery.
    #[arg(short = 'l', long, env = "RATE_LIMIT", value_name = "N", allow_negative_numbers = true)]
    pub rate_limit: Option<i64>,

    /// Timeout of a single delivery attempt.
    #[arg(long, env = "REQUEST_TIMEOUT", value_name = "DURATION", value_parser = duration::parse)]
    pub request_timeout: Option<Duration>,

    /// Optional JSON config file.
    #[arg(short = 'c', long = "config", env = "CONFIG", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(address) = &self.address {
                cache.insert("address".to_string(), address.clone().into());
            }
            if let Some(poll_interval) = self.poll_interval {
                cache.insert("poll_interval".to_string(), duration::format(poll_interval).into());
            }
            if let Some(report_interval) = self.report_interval {
                cache.insert("report_interval".to_string(), duration::format(report_interval).into());
            }
            if let Some(key) = &self.key {
                cache.insert("key".to_string(), key.clone().into());
            }
            if let Some(rate_limit) = self.rate_limit {
                cache.insert("rate_limit".to_string(), rate_limit.into());
            }
            if let Some(request_timeout) = self.request_timeout {
                cache.insert("request_timeout".to_string(), duration::format(request_timeout).into());
            }
            Ok(cache)
        }
    }
}
