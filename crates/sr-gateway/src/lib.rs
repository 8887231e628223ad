//! SiteRouter Gateway Client
//!
//! Async client for the router's management API: login, fetching and
//! replacing the routing document, best-effort proxy-core reload, and the
//! polled running/connected status.
//!
//! The gateway speaks two envelope dialects depending on firmware age —
//! bare payloads (`{"routingA": "..."}`) and coded envelopes
//! (`{"code":"SUCCESS","data":{...}}`). The payload types here accept both.

pub mod error;
pub mod types;
pub mod client;

pub use client::GatewayClient;
pub use error::GatewayError;
pub use types::{ProxyState, ProxyStatus};
