use crate::config::ConnectSettings;
use crate::error::Error;
use crate::lnrpc::lightning_client::LightningClient;
use crate::lnrpc::{
    ChannelGraph, ChannelGraphRequest, ConnectPeerRequest, GetInfoRequest, Invoice,
    LightningAddress, ListChannelsRequest, ListPeersRequest, NewAddressRequest, NodeInfo,
    NodeInfoRequest, SendRequest, WalletBalanceRequest,
};
use crate::models::{
    channel_point_string, AddressType, ChannelParams, ChannelState, NodeStatus, PaymentReceipt,
    WalletBalance,
};
use crate::retry::{Poll, RetryPolicy};
use crate::tls::{self, LndClient, MacaroonInterceptor, PinnedCertVerifier};
use bitcoin::secp256k1::PublicKey;
use std::str::FromStr;
use std::sync::Arc;
use tokio_rustls::rustls::ClientConfig;
use tonic::{Code, Status};

/// What lnd answers GetNodeInfo with for a key missing from its graph
const NODE_NOT_FOUND: &str = "unable to find node";

/// Connection to one node's control RPC interface.
///
/// A `NodeClient` only exists once the node answered GetInfo, so its
/// `pubkey` is always the identity the node reported.
#[derive(Debug, Clone)]
pub struct NodeClient {
    host: String,
    pubkey: PublicKey,
    client: LndClient,
}

impl NodeClient {
    /// Connects to the node on `host`, retrying under `settings.retry` until
    /// it answers. Missing certificate or macaroon files fail right away.
    pub async fn connect(host: &str, settings: &ConnectSettings) -> Result<Self, Error> {
        let cert_path = settings.cert.cert_path(host)?;
        let tls = tls::client_config(PinnedCertVerifier::load(&cert_path).await?);

        let macaroon = match &settings.macaroon {
            Some(path) => Some(tls::load_macaroon(path).await?),
            None => None,
        };
        let interceptor = MacaroonInterceptor::new(macaroon);

        settings
            .retry
            .retry(&format!("connect to {host}"), || {
                log::info!("Connecting to lnd on {host}");
                Self::try_connect(host, settings.rpc_port, tls.clone(), interceptor.clone())
            })
            .await
    }

    async fn try_connect(
        host: &str,
        port: u16,
        tls: Arc<ClientConfig>,
        interceptor: MacaroonInterceptor,
    ) -> Result<Self, Error> {
        let channel = tls::connect_channel(host, port, tls).await?;
        let client = LightningClient::with_interceptor(channel, interceptor);
        Self::with_client(host, client).await
    }

    /// Wraps an already established client, capturing the node's identity.
    pub async fn with_client(host: &str, mut client: LndClient) -> Result<Self, Error> {
        let info = client.get_info(GetInfoRequest {}).await?.into_inner();
        let status = NodeStatus::try_from(info)?;
        log::info!("Connected to {host} as {}", status.pubkey);

        Ok(Self {
            host: host.to_string(),
            pubkey: status.pubkey,
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    // generated clients need `&mut self`, clones share the channel
    fn rpc(&self) -> LndClient {
        self.client.clone()
    }

    pub async fn get_info(&self) -> Result<NodeStatus, Error> {
        let info = self.rpc().get_info(GetInfoRequest {}).await?.into_inner();
        NodeStatus::try_from(info)
    }

    pub async fn describe_graph(&self, include_unannounced: bool) -> Result<ChannelGraph, Error> {
        let req = ChannelGraphRequest {
            include_unannounced,
        };
        Ok(self.rpc().describe_graph(req).await?.into_inner())
    }

    /// Whether `other` shows up in this node's peer list.
    pub async fn peered(&self, other: &NodeClient) -> Result<bool, Error> {
        let peers = self
            .rpc()
            .list_peers(ListPeersRequest::default())
            .await?
            .into_inner()
            .peers;

        Ok(peers
            .iter()
            .any(|p| PublicKey::from_str(&p.pub_key).is_ok_and(|pk| pk == other.pubkey)))
    }

    /// Connects this node to `other` and waits until `other` sees us too.
    pub async fn peer(&self, other: &NodeClient, poll: &Poll) -> Result<(), Error> {
        if self.peered(other).await? {
            log::info!("{} already peered with {}", self.host, other.host);
            return Ok(());
        }

        log::info!("Peering {} with {}", self.host, other.host);
        let req = ConnectPeerRequest {
            addr: Some(LightningAddress {
                pubkey: other.pubkey.to_string(),
                host: other.host.clone(),
            }),
            perm: false,
            timeout: 0,
        };
        self.rpc().connect_peer(req).await?;

        // only trust the peering once the other side reports it
        let label = format!("{} to list {} as a peer", other.host, self.host);
        poll.until(&label, || other.peered(self)).await?;

        log::info!("{} and {} are peered", self.host, other.host);
        Ok(())
    }

    pub async fn channel_state(&self, other: &NodeClient) -> Result<ChannelState, Error> {
        let channels = self
            .rpc()
            .list_channels(ListChannelsRequest::default())
            .await?
            .into_inner()
            .channels;

        Ok(ChannelState::of(&channels, &other.pubkey))
    }

    /// Whether a funded channel to `other` exists and is active.
    pub async fn has_channel(&self, other: &NodeClient) -> Result<bool, Error> {
        Ok(self.channel_state(other).await?.is_usable())
    }

    /// Opens a channel to `other` unless an active one already exists.
    pub async fn create_channel(
        &self,
        other: &NodeClient,
        params: &ChannelParams,
        policy: &RetryPolicy,
    ) -> Result<(), Error> {
        let label = format!("open channel {} -> {}", self.host, other.host);
        policy
            .retry(&label, || self.try_create_channel(other, params))
            .await
    }

    async fn try_create_channel(
        &self,
        other: &NodeClient,
        params: &ChannelParams,
    ) -> Result<(), Error> {
        if self.has_channel(other).await? {
            log::info!("{} already has a channel with {}", self.host, other.host);
            return Ok(());
        }

        log::info!(
            "Opening channel {} -> {}: {} sat, pushing {} sat",
            self.host,
            other.host,
            params.funding_sat,
            params.push_sat
        );
        let point = self
            .rpc()
            .open_channel_sync(params.to_request(&other.pubkey))
            .await?
            .into_inner();

        log::info!("Channel funding outpoint {}", channel_point_string(&point));
        Ok(())
    }

    pub async fn wait_for_channel(&self, other: &NodeClient, poll: &Poll) -> Result<(), Error> {
        let label = format!("channel {} -> {} to become active", self.host, other.host);
        poll.until(&label, || self.has_channel(other)).await
    }

    pub async fn nodeinfo(&self, other: &NodeClient) -> Result<Option<NodeInfo>, Error> {
        self.node_info(&other.pubkey).await
    }

    /// GetNodeInfo for `pubkey`, `None` when the node is not in the graph.
    pub async fn node_info(&self, pubkey: &PublicKey) -> Result<Option<NodeInfo>, Error> {
        let req = NodeInfoRequest {
            pub_key: pubkey.to_string(),
            include_channels: false,
        };

        match self.rpc().get_node_info(req).await {
            Ok(resp) => Ok(Some(resp.into_inner())),
            Err(status) if is_node_not_found(&status) => Ok(None),
            Err(status) => Err(status.into()),
        }
    }

    /// Has `dest` issue an invoice for `value` sat and pays it from this node.
    pub async fn send_payment(
        &self,
        dest: &NodeClient,
        value: i64,
        memo: &str,
    ) -> Result<PaymentReceipt, Error> {
        let invoice = Invoice {
            memo: memo.to_string(),
            value,
            ..Default::default()
        };
        let invoice = dest.rpc().add_invoice(invoice).await?.into_inner();
        log::debug!("{} issued invoice {}", dest.host, invoice.payment_request);

        let req = SendRequest {
            dest: dest.pubkey.serialize().to_vec(),
            amt: value,
            payment_hash: invoice.r_hash.clone(),
            payment_request: invoice.payment_request.clone(),
            ..Default::default()
        };
        let resp = self.rpc().send_payment_sync(req).await?.into_inner();
        let receipt = PaymentReceipt::from_response(&invoice, value, resp)?;

        log::info!(
            "{} paid {} {value} sat, preimage {}",
            self.host,
            dest.host,
            receipt.payment_preimage
        );
        Ok(receipt)
    }

    pub async fn new_address(&self, address_type: AddressType) -> Result<String, Error> {
        let req = NewAddressRequest {
            r#type: address_type.to_rpc() as i32,
            account: String::new(),
        };
        Ok(self.rpc().new_address(req).await?.into_inner().address)
    }

    pub async fn wallet_balance(&self) -> Result<WalletBalance, Error> {
        let resp = self
            .rpc()
            .wallet_balance(WalletBalanceRequest {})
            .await?
            .into_inner();
        Ok(resp.into())
    }

    /// Waits until the node's chain tip reaches `height`.
    pub async fn wait_for_block_height(&self, height: u32, poll: &Poll) -> Result<(), Error> {
        let label = format!("{} to reach block {height}", self.host);
        poll.until(&label, || async move {
            let status = self.get_info().await?;
            Ok(status.block_height >= height)
        })
        .await
    }
}

// Older lnd only reports the missing node in the message text.
fn is_node_not_found(status: &Status) -> bool {
    status.code() == Code::NotFound || status.message() == NODE_NOT_FOUND
}
