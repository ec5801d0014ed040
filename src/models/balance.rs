use crate::lnrpc::WalletBalanceResponse;
use serde::{Deserialize, Serialize};

/// On-chain wallet balance in satoshis, as reported by the node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct WalletBalance {
    pub total: i64,
    pub confirmed: i64,
    pub unconfirmed: i64,
}

impl From<WalletBalanceResponse> for WalletBalance {
    fn from(resp: WalletBalanceResponse) -> Self {
        Self {
            total: resp.total_balance,
            confirmed: resp.confirmed_balance,
            unconfirmed: resp.unconfirmed_balance,
        }
    }
}
