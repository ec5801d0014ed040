use crate::error::Error;
use crate::lnrpc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of on-chain receive address a node can hand out.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    /// Nested segwit, `np2wkh`
    #[default]
    NestedPubkeyHash,
    /// Native segwit, `p2wkh`
    WitnessPubkeyHash,
    /// Legacy, `p2pkh`
    PubkeyHash,
}

impl AddressType {
    pub const ALL: [AddressType; 3] = [
        AddressType::NestedPubkeyHash,
        AddressType::WitnessPubkeyHash,
        AddressType::PubkeyHash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::NestedPubkeyHash => "np2wkh",
            AddressType::WitnessPubkeyHash => "p2wkh",
            AddressType::PubkeyHash => "p2pkh",
        }
    }

    pub fn to_rpc(self) -> lnrpc::AddressType {
        match self {
            AddressType::NestedPubkeyHash => lnrpc::AddressType::NestedPubkeyHash,
            AddressType::WitnessPubkeyHash => lnrpc::AddressType::WitnessPubkeyHash,
            AddressType::PubkeyHash => lnrpc::AddressType::PubkeyHash,
        }
    }
}

impl FromStr for AddressType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AddressType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownAddressType(s.to_string()))
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
