use crate::error::Error;
use crate::models::{ChannelParams, DEFAULT_FUNDING_SAT, DEFAULT_PUSH_SAT};
use crate::retry::{Poll, RetryPolicy};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Well-known lnd control RPC port
pub const DEFAULT_RPC_PORT: u16 = 10009;

/// Lightning topology driver
#[derive(Parser, Debug, Clone)]
#[command(version, author, about)]
pub struct Config {
    /// Hosts of the lnd nodes to drive, in topology order
    #[clap(long = "host", default_value = "localhost", value_delimiter = ',')]
    pub hosts: Vec<String>,
    /// Control RPC port of every node
    #[clap(default_value_t = DEFAULT_RPC_PORT, long)]
    pub rpc_port: u16,

    /// Directory holding one `lnd-<host>.cert` per node
    #[clap(long)]
    pub cert_dir: Option<PathBuf>,
    /// Certificate shared by every node, defaults to ~/.lnd/tls.cert
    #[clap(long, conflicts_with = "cert_dir")]
    pub cert_file: Option<PathBuf>,
    /// Macaroon sent with every request, nodes running without macaroons need none
    #[clap(long)]
    pub macaroon: Option<PathBuf>,

    /// Seconds between polls of remote state
    #[clap(default_value_t = 1, long)]
    pub poll_interval: u64,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the channel graph of the first node as JSON
    Graph {
        #[clap(long)]
        include_unannounced: bool,
    },
    /// Print the status of every node
    Info,
    /// Print the wallet balance of every node
    Balance,
    /// Print a new receive address for every node
    Address {
        /// One of np2wkh, p2wkh, p2pkh
        #[clap(long = "type", default_value = "np2wkh")]
        address_type: String,
    },
    /// Wait until every node reports at least this block height
    WaitHeight {
        height: u32,
        /// Give up after this many seconds
        #[clap(long)]
        timeout: Option<u64>,
    },
    /// Peer each node with the next one, open channels between them and
    /// optionally pay along the chain
    Topology(TopologyArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TopologyArgs {
    #[clap(default_value_t = DEFAULT_FUNDING_SAT, long)]
    pub funding_sat: i64,
    #[clap(default_value_t = DEFAULT_PUSH_SAT, long)]
    pub push_sat: i64,
    /// Give up opening a channel after this many attempts
    #[clap(long)]
    pub open_attempts: Option<u32>,
    /// Amount each node pays its neighbour once channels are active
    #[clap(long)]
    pub pay: Option<i64>,
    #[clap(default_value = "lntopo", long)]
    pub memo: String,
}

impl TopologyArgs {
    pub fn channel_params(&self) -> ChannelParams {
        ChannelParams {
            funding_sat: self.funding_sat,
            push_sat: self.push_sat,
            private: false,
        }
    }

    pub fn open_policy(&self) -> RetryPolicy {
        match self.open_attempts {
            Some(attempts) => RetryPolicy::open_channel().with_max_attempts(attempts),
            None => RetryPolicy::open_channel(),
        }
    }
}

/// Where a node's TLS certificate is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertSource {
    /// `<dir>/lnd-<host>.cert`
    PerHost(PathBuf),
    File(PathBuf),
    /// `$HOME/.lnd/tls.cert`
    HomeDefault,
}

impl CertSource {
    pub fn cert_path(&self, host: &str) -> Result<PathBuf, Error> {
        match self {
            CertSource::PerHost(dir) => Ok(dir.join(format!("lnd-{host}.cert"))),
            CertSource::File(path) => Ok(path.clone()),
            CertSource::HomeDefault => home::home_dir()
                .map(|home| home.join(".lnd").join("tls.cert"))
                .ok_or_else(|| Error::Certificate {
                    path: PathBuf::from("~/.lnd/tls.cert"),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "could not determine home directory",
                    ),
                }),
        }
    }
}

/// Everything needed to reach a node besides its host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectSettings {
    pub rpc_port: u16,
    pub cert: CertSource,
    pub macaroon: Option<PathBuf>,
    pub retry: RetryPolicy,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            rpc_port: DEFAULT_RPC_PORT,
            cert: CertSource::HomeDefault,
            macaroon: None,
            retry: RetryPolicy::connect(),
        }
    }
}

impl Config {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Graph {
            include_unannounced: false,
        })
    }

    pub fn connect_settings(&self) -> ConnectSettings {
        let cert = match (&self.cert_dir, &self.cert_file) {
            (Some(dir), _) => CertSource::PerHost(dir.clone()),
            (None, Some(file)) => CertSource::File(file.clone()),
            (None, None) => CertSource::HomeDefault,
        };

        ConnectSettings {
            rpc_port: self.rpc_port,
            cert,
            macaroon: self.macaroon.clone(),
            retry: RetryPolicy::connect(),
        }
    }

    pub fn poll(&self) -> Poll {
        Poll::every(Duration::from_secs(self.poll_interval.max(1)))
    }
}
