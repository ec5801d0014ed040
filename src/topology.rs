use crate::config::ConnectSettings;
use crate::error::Error;
use crate::models::{ChannelParams, NodeStatus, PaymentReceipt, WalletBalance};
use crate::node::NodeClient;
use crate::retry::{Poll, RetryPolicy};
use serde::Serialize;

/// A line of nodes where each node is linked to the next one.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<NodeClient>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub host: String,
    pub status: NodeStatus,
    pub balance: WalletBalance,
}

impl Topology {
    /// Connects to every host in order.
    pub async fn connect(hosts: &[String], settings: &ConnectSettings) -> Result<Self, Error> {
        let mut nodes = Vec::with_capacity(hosts.len());
        for host in hosts {
            nodes.push(NodeClient::connect(host, settings).await?);
        }
        Ok(Self { nodes })
    }

    pub fn from_nodes(nodes: Vec<NodeClient>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeClient] {
        &self.nodes
    }

    fn links(&self) -> impl Iterator<Item = (&NodeClient, &NodeClient)> {
        self.nodes.iter().zip(self.nodes.iter().skip(1))
    }

    /// Peers neighbours, opens a channel from each node to the next and waits
    /// until every channel is active.
    pub async fn build(
        &self,
        params: &ChannelParams,
        open_policy: &RetryPolicy,
        poll: &Poll,
    ) -> Result<(), Error> {
        for (from, to) in self.links() {
            from.peer(to, poll).await?;
        }

        for (from, to) in self.links() {
            from.create_channel(to, params, open_policy).await?;
        }

        // channels only activate once the funding transactions confirm
        for (from, to) in self.links() {
            from.wait_for_channel(to, poll).await?;
        }

        log::info!("Topology of {} nodes is up", self.nodes.len());
        Ok(())
    }

    /// Each node pays its neighbour `value` sat.
    pub async fn pay_chain(&self, value: i64, memo: &str) -> Result<Vec<PaymentReceipt>, Error> {
        let mut receipts = Vec::new();
        for (from, to) in self.links() {
            receipts.push(from.send_payment(to, value, memo).await?);
        }
        Ok(receipts)
    }

    pub async fn report(&self) -> Result<Vec<NodeReport>, Error> {
        let mut reports = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let status = node.get_info().await?;
            let balance = node.wallet_balance().await?;
            log::info!(
                "{} {} height {} balance {} sat",
                node.host(),
                status.pubkey,
                status.block_height,
                balance.total
            );
            reports.push(NodeReport {
                host: node.host().to_string(),
                status,
                balance,
            });
        }
        Ok(reports)
    }
}
