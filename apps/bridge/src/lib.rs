//! Host process for the media session bridge: configuration and the
//! line-delimited method channel served over stdio.

pub mod config;
pub mod server;

pub use config::BridgeConfig;
pub use server::ChannelServer;
