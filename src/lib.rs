pub mod config;
pub mod error;
pub mod models;
pub mod node;
pub mod retry;
pub mod tls;
pub mod topology;

pub use error::Error;
pub use node::NodeClient;

pub mod lnrpc {
    tonic::include_proto!("lnrpc");
}
