//! Discord plumbing: a gateway session for presence and a REST client for messages.

pub mod gateway;
pub mod rest;

pub use gateway::{GUILD_MESSAGES, Gateway, GatewayConfig, GatewayHandle, MESSAGE_CONTENT};
pub use rest::RestClient;
