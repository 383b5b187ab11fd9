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

//! Implements command-line argument parsing.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// A forwarding DNS proxy with a passive record cache
#[derive(Debug, Parser)]
#[command(author, version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the proxy
    Run(RunArgs),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Set the configuration file to use
    #[arg(
        long,
        conflicts_with_all = [
            "bind",
            "upstream",
            "queue_capacity",
            "inflight_capacity",
            "request_timeout",
        ],
        value_name = "FILE"
    )]
    pub config: Option<PathBuf>,

    /// Set the IP address and port to listen on
    #[arg(long, value_name = "IP:PORT")]
    pub bind: Option<SocketAddr>,

    /// Set the IP address and port of the upstream resolver
    #[arg(long, value_name = "IP:PORT")]
    pub upstream: Option<SocketAddr>,

    /// Set how many received datagrams may wait for dispatch
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// Set how many forwarded queries may await an answer
    #[arg(long, value_name = "N")]
    pub inflight_capacity: Option<usize>,

    /// Set how long a forwarded query may await an answer (0 to wait
    /// forever)
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_run_options() {
        let args = Args::try_parse_from([
            "dnsrelayd",
            "run",
            "--bind",
            "127.0.0.1:5353",
            "--upstream",
            "9.9.9.9:53",
            "--request-timeout",
            "3",
        ])
        .unwrap();
        let Command::Run(run_args) = args.command;
        assert_eq!(run_args.bind, Some("127.0.0.1:5353".parse().unwrap()));
        assert_eq!(run_args.upstream, Some("9.9.9.9:53".parse().unwrap()));
        assert_eq!(run_args.request_timeout, Some(3));
        assert_eq!(run_args.queue_capacity, None);
    }

    #[test]
    fn config_conflicts_with_other_options() {
        let result = Args::try_parse_from([
            "dnsrelayd",
            "run",
            "--config",
            "dnsrelay.toml",
            "--bind",
            "127.0.0.1:5353",
        ]);
        assert!(result.is_err());
    }
}
