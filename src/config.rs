//! Worker configuration
//!
//! Defaults suit a local run against the simulated fleet. Every field can be
//! overridden through an `RCWORKER_*` environment variable.

use crate::command::DispatchOptions;
use crate::fleet::DEFAULT_RETENTION;
use anyhow::{anyhow, Result};
use rcworker_shared::worker;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Address publishers connect to
    pub messaging_host: String,
    /// Block each dispatch until every instance reaches a terminal status
    pub wait_for_command_execution: bool,
    /// Delay between submission and the first status poll
    pub grace_delay: Duration,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// JSON seed for the simulated fleet (built-in sample when unset)
    pub fleet_seed: Option<PathBuf>,
    /// Polls a simulated invocation takes to finish
    pub simulated_steps: u32,
    /// How long a finished simulated invocation stays queryable
    pub simulated_retention: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            messaging_host: worker::DEFAULT_LISTEN_ADDR.into(),
            wait_for_command_execution: false,
            grace_delay: Duration::from_millis(worker::GRACE_DELAY_MS),
            poll_interval: Duration::from_millis(worker::POLL_INTERVAL_MS),
            fleet_seed: None,
            simulated_steps: 3,
            simulated_retention: DEFAULT_RETENTION,
        }
    }
}

impl WorkerConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    ///
    /// An unset key keeps its default; a value that does not parse is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            messaging_host: lookup("RCWORKER_MESSAGING_HOST").unwrap_or(defaults.messaging_host),
            wait_for_command_execution: parse_flag(&lookup, "RCWORKER_WAIT_FOR_COMMAND_EXECUTION")?
                .unwrap_or(defaults.wait_for_command_execution),
            grace_delay: parse(&lookup, "RCWORKER_GRACE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.grace_delay),
            poll_interval: parse(&lookup, "RCWORKER_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            fleet_seed: lookup("RCWORKER_FLEET_SEED").map(PathBuf::from),
            simulated_steps: parse(&lookup, "RCWORKER_SIMULATED_STEPS")?
                .unwrap_or(defaults.simulated_steps),
            simulated_retention: parse(&lookup, "RCWORKER_SIMULATED_RETENTION_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.simulated_retention),
        })
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            wait_for_completion: self.wait_for_command_execution,
            grace_delay: self.grace_delay,
            poll_interval: self.poll_interval,
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow!("invalid value {:?} for {}: {}", raw, key, e))
        })
        .transpose()
}

/// Booleans are matched without regard to case (`True`, `FALSE`)
fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    parse(&|k: &str| lookup(k).map(|raw| raw.to_ascii_lowercase()), key)
}
