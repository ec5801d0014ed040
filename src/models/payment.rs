use crate::error::Error;
use crate::lnrpc::{AddInvoiceResponse, SendResponse};
use serde::{Deserialize, Serialize};

/// A settled payment between two orchestrated nodes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_request: String,
    pub payment_hash: String,
    pub payment_preimage: String,
    pub amount_sat: i64,
}

impl PaymentReceipt {
    /// Builds a receipt from the payer's response.
    ///
    /// lnd reports routing failures inside a successful SendPaymentSync
    /// response, so a non-empty `payment_error` is the failure signal.
    pub fn from_response(
        invoice: &AddInvoiceResponse,
        amount_sat: i64,
        resp: SendResponse,
    ) -> Result<Self, Error> {
        if !resp.payment_error.is_empty() {
            return Err(Error::Payment(resp.payment_error));
        }

        let payment_hash = if resp.payment_hash.is_empty() {
            hex::encode(&invoice.r_hash)
        } else {
            hex::encode(&resp.payment_hash)
        };

        Ok(Self {
            payment_request: invoice.payment_request.clone(),
            payment_hash,
            payment_preimage: hex::encode(&resp.payment_preimage),
            amount_sat,
        })
    }
}
