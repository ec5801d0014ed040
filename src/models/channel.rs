use crate::lnrpc;
use crate::lnrpc::channel_point::FundingTxid;
use bitcoin::secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_FUNDING_SAT: i64 = 1_000_000;
pub const DEFAULT_PUSH_SAT: i64 = 100_000;

/// How a node sees its channel with one remote node.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// No channel with a positive local balance
    Missing,
    /// Funded, but the node does not report it active yet
    Inactive,
    Active,
}

impl ChannelState {
    /// Classifies the channels a node listed against `remote`.
    ///
    /// A channel only counts once our side holds a positive balance; an
    /// active flag on an empty channel is ignored.
    pub fn of(channels: &[lnrpc::Channel], remote: &PublicKey) -> Self {
        let mut state = ChannelState::Missing;
        for channel in channels {
            let matches = PublicKey::from_str(&channel.remote_pubkey).is_ok_and(|pk| pk == *remote);
            if !matches || channel.local_balance <= 0 {
                continue;
            }

            if channel.active {
                return ChannelState::Active;
            }
            state = ChannelState::Inactive;
        }
        state
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, ChannelState::Active)
    }
}

/// Funding terms for channels opened between orchestrated nodes.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ChannelParams {
    pub funding_sat: i64,
    pub push_sat: i64,
    pub private: bool,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            funding_sat: DEFAULT_FUNDING_SAT,
            push_sat: DEFAULT_PUSH_SAT,
            private: false,
        }
    }
}

impl ChannelParams {
    pub fn to_request(&self, remote: &PublicKey) -> lnrpc::OpenChannelRequest {
        lnrpc::OpenChannelRequest {
            node_pubkey: remote.serialize().to_vec(),
            local_funding_amount: self.funding_sat,
            push_sat: self.push_sat,
            private: self.private,
            ..Default::default()
        }
    }
}

/// Renders a funding outpoint as `txid:index`.
pub fn channel_point_string(point: &lnrpc::ChannelPoint) -> String {
    let txid = match &point.funding_txid {
        Some(FundingTxid::FundingTxidStr(txid)) => txid.clone(),
        // raw bytes are in internal byte order
        Some(FundingTxid::FundingTxidBytes(bytes)) => {
            let mut bytes = bytes.clone();
            bytes.reverse();
            hex::encode(bytes)
        }
        None => return "unknown".to_string(),
    };
    format!("{txid}:{}", point.output_index)
}
