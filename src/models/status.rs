use crate::error::Error;
use crate::lnrpc::GetInfoResponse;
use bitcoin::secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub pubkey: PublicKey,
    pub alias: String,
    pub block_height: u32,
    pub block_hash: String,
    pub synced_to_chain: bool,
    pub num_peers: u32,
    pub num_active_channels: u32,
    pub num_pending_channels: u32,
    pub version: String,
}

impl TryFrom<GetInfoResponse> for NodeStatus {
    type Error = Error;

    fn try_from(info: GetInfoResponse) -> Result<Self, Self::Error> {
        let pubkey = PublicKey::from_str(&info.identity_pubkey)
            .map_err(|_| Error::InvalidPubkey(info.identity_pubkey.clone()))?;

        Ok(Self {
            pubkey,
            alias: info.alias,
            block_height: info.block_height,
            block_hash: info.block_hash,
            synced_to_chain: info.synced_to_chain,
            num_peers: info.num_peers,
            num_active_channels: info.num_active_channels,
            num_pending_channels: info.num_pending_channels,
            version: info.version,
        })
    }
}
