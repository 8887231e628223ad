//! Error type for gateway calls

/// Everything that can go wrong talking to the gateway. All of it is
/// surfaced to the user as a message; none of it is fatal to the caller.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network-level failure: unreachable host, TLS, timeout.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered outside 2xx.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The gateway answered 2xx but the envelope carried a non-success code.
    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    /// A field the caller depends on was missing from the reply.
    #[error("gateway reply is missing '{0}'")]
    MissingField(&'static str),

    /// The call needs a bearer token and the client has none.
    #[error("not logged in")]
    NotAuthenticated,
}
