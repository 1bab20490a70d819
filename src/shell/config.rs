// Process configuration read from the environment.
//
// Variables
// - TIME_LOG_DATA_PATH          data file of the JSON entry store (default time_log.json)
// - TIME_LOG_BIND_ADDR          HTTP listen address (default 0.0.0.0:8080)
// - TIME_LOG_UNDO_LIMIT         undo depth (default 10)
// - TIME_LOG_EVENT_CAPACITY     event buffer per subscriber (default 1024)
// - TIME_LOG_REQUEST_TIMEOUT_MS how long a read waits for its result (default 5000)

use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::modules::time_log::application::config::HistoryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    pub data_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub history: HistoryConfig,
    pub request_timeout: Duration,
}

impl ShellConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = HistoryConfig::default();
        let history = HistoryConfig::default()
            .undo_limit(parse(&lookup, "TIME_LOG_UNDO_LIMIT", defaults.undo_limit)?)
            .event_capacity(parse(
                &lookup,
                "TIME_LOG_EVENT_CAPACITY",
                defaults.event_capacity,
            )?);

        Ok(Self {
            data_path: lookup("TIME_LOG_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("time_log.json")),
            bind_addr: parse(
                &lookup,
                "TIME_LOG_BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 8080)),
            )?,
            history,
            request_timeout: Duration::from_millis(parse(
                &lookup,
                "TIME_LOG_REQUEST_TIMEOUT_MS",
                5_000u64,
            )?),
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
