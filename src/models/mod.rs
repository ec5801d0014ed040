mod address;
mod balance;
mod channel;
mod payment;
mod status;

pub use address::AddressType;
pub use balance::WalletBalance;
pub use channel::{
    channel_point_string, ChannelParams, ChannelState, DEFAULT_FUNDING_SAT, DEFAULT_PUSH_SAT,
};
pub use payment::PaymentReceipt;
pub use status::NodeStatus;
