//! Transcode queue engine: transport, client event loop, and the HTTP pull client.
mod client;
mod pull;
mod settings;
mod transport;

pub use client::MirrorClient;
pub use pull::{PullClient, PullError, ServerStatus};
pub use settings::{ClientSettings, SettingsError, DEFAULT_SERVER_URL, WEBSOCKET_PATH};
pub use transport::{Connector, TransportError, TransportEvent, TransportLink, WsConnector};
