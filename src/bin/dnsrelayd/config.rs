// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implements the proxy configuration file.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use serde::Deserialize;

use dnsrelay::io::BlockingIoConfig;

use crate::args::RunArgs;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the proxy configuration from the file given by `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config =
        fs::read_to_string(path.as_ref()).context("failed to read the configuration file")?;
    let config: Config =
        toml::from_str(&raw_config).context("failed to parse the configuration file")?;
    config.validate()?;
    log_config_summary(&config);
    Ok(config)
}

/// Loads the proxy configuration from the parsed command line arguments
/// given by `args`.
pub fn load_from_args(args: RunArgs) -> Result<Config> {
    let config = Config {
        bind: args.bind.unwrap_or_else(default_bind),
        upstream: args.upstream.unwrap_or_else(default_upstream),
        queue_capacity: args.queue_capacity.unwrap_or_else(default_queue_capacity),
        inflight_capacity: args
            .inflight_capacity
            .unwrap_or_else(default_inflight_capacity),
        request_timeout: args.request_timeout.unwrap_or_else(default_request_timeout),
    };
    config.validate()?;
    log_config_summary(&config);
    Ok(config)
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        // Don't compute the message if it will never be printed.
        return;
    }

    let request_timeout = match config.request_timeout() {
        Some(timeout) => format!("{} s", timeout.as_secs()),
        None => String::from("none"),
    };
    debug!(
        "Configuration loaded:\n         Bind address:      {}\n         Upstream resolver: {}\n         Queue capacity:    {}\n         In-flight limit:   {}\n         Request timeout:   {}",
        config.bind,
        config.upstream,
        config.queue_capacity,
        config.inflight_capacity,
        request_timeout,
    );
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The complete configuration file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_upstream")]
    pub upstream: SocketAddr,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_inflight_capacity")]
    pub inflight_capacity: usize,

    /// In seconds; zero disables the timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Config {
    /// Rejects settings with which the proxy could not do its job.
    fn validate(&self) -> Result<()> {
        if self.inflight_capacity == 0 {
            Err(anyhow!(
                "the in-flight capacity must be at least 1, or every query is dropped"
            ))
        } else {
            Ok(())
        }
    }

    /// Returns the request timeout, or `None` if pending queries never
    /// expire.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Returns the configuration for the I/O provider.
    pub fn io_config(&self) -> BlockingIoConfig {
        BlockingIoConfig {
            queue_capacity: self.queue_capacity,
            ..BlockingIoConfig::default()
        }
    }
}

const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
const DEFAULT_BIND_PORT: u16 = 53;
const DEFAULT_UPSTREAM_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 53));
const DEFAULT_UPSTREAM_PORT: u16 = 53;

fn default_bind() -> SocketAddr {
    SocketAddr::new(DEFAULT_BIND_IP, DEFAULT_BIND_PORT)
}

fn default_upstream() -> SocketAddr {
    SocketAddr::new(DEFAULT_UPSTREAM_IP, DEFAULT_UPSTREAM_PORT)
}

fn default_queue_capacity() -> usize {
    10
}

fn default_inflight_capacity() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bind, "0.0.0.0:53".parse().unwrap());
        assert_eq!(config.upstream, "127.0.0.53:53".parse().unwrap());
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.inflight_capacity, 10);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn parses_all_fields() {
        let config: Config = toml::from_str(
            r#"
            bind = "[::1]:5353"
            upstream = "9.9.9.9:53"
            queue_capacity = 64
            inflight_capacity = 128
            request_timeout = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "[::1]:5353".parse().unwrap());
        assert_eq!(config.upstream, "9.9.9.9:53".parse().unwrap());
        assert_eq!(config.io_config().queue_capacity, 64);
        assert_eq!(config.inflight_capacity, 128);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn rejects_zero_inflight_capacity() {
        let config: Config = toml::from_str("inflight_capacity = 0").unwrap();
        assert!(config.validate().is_err());
        let config: Config = toml::from_str("inflight_capacity = 1").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(toml::from_str::<Config>("zones = []").is_err());
    }
}
