pub mod clarity;
pub mod config;
pub mod contract;
pub mod error;
pub mod explorer;
pub mod flow;
pub mod header;
mod http;
pub mod merkle;
pub mod network;
pub mod node;
pub mod poller;
pub mod store;
pub mod tx;
pub mod types;

#[cfg(test)]
mod test_util;

pub use config::Config;
pub use error::CoreError;
pub use flow::AppContext;
pub use network::NetworkParams;
