use anyhow::anyhow;
use clap::Parser;
use lntopo::config::{Command, Config};
use lntopo::models::AddressType;
use lntopo::retry::Poll;
use lntopo::topology::Topology;
use lntopo::NodeClient;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::try_init()?;
    let config: Config = Config::parse();

    let cancel = CancellationToken::new();
    let poll = config.poll().with_cancel(cancel.clone());

    // Stop waiting on remote state when interrupted
    let token = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install INT signal handler: {e}");
            return;
        }
        log::info!("Received SIGINT");
        token.cancel();
    });

    log::info!("lntopo starting");

    tokio::select! {
        res = run(config, poll) => res?,
        _ = cancel.cancelled() => {
            return Err(anyhow!("interrupted"));
        }
    }

    log::info!("lntopo finished");
    Ok(())
}

async fn run(config: Config, poll: Poll) -> anyhow::Result<()> {
    let settings = config.connect_settings();

    match config.command() {
        Command::Graph {
            include_unannounced,
        } => {
            let host = config
                .hosts
                .first()
                .ok_or_else(|| anyhow!("at least one host is required"))?;
            let node = NodeClient::connect(host, &settings).await?;
            let graph = node.describe_graph(include_unannounced).await?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        Command::Info => {
            let topology = Topology::connect(&config.hosts, &settings).await?;
            for node in topology.nodes() {
                let status = node.get_info().await?;
                println!("{}", serde_json::to_string(&status)?);
            }
        }
        Command::Balance => {
            let topology = Topology::connect(&config.hosts, &settings).await?;
            for node in topology.nodes() {
                let balance = node.wallet_balance().await?;
                println!("{} {}", node.host(), serde_json::to_string(&balance)?);
            }
        }
        Command::Address { address_type } => {
            // reject unknown types before touching any node
            let address_type = AddressType::from_str(&address_type)?;
            let topology = Topology::connect(&config.hosts, &settings).await?;
            for node in topology.nodes() {
                let address = node.new_address(address_type).await?;
                println!("{} {address}", node.host());
            }
        }
        Command::WaitHeight { height, timeout } => {
            let poll = match timeout {
                Some(secs) => poll.with_deadline(Duration::from_secs(secs)),
                None => poll,
            };
            let topology = Topology::connect(&config.hosts, &settings).await?;
            for node in topology.nodes() {
                node.wait_for_block_height(height, &poll).await?;
                log::info!("{} reached block {height}", node.host());
            }
        }
        Command::Topology(args) => {
            let topology = Topology::connect(&config.hosts, &settings).await?;
            topology
                .build(&args.channel_params(), &args.open_policy(), &poll)
                .await?;

            if let Some(value) = args.pay {
                for receipt in topology.pay_chain(value, &args.memo).await? {
                    println!("{}", serde_json::to_string(&receipt)?);
                }
            }

            for report in topology.report().await? {
                println!("{}", serde_json::to_string(&report)?);
            }
        }
    }

    Ok(())
}
