//! Wire types for the gateway API
//!
//! Every reply struct tolerates both envelope dialects: fields may sit at
//! the top level or under `data`, and older firmware omits `code` entirely
//! (2xx alone means success there).

use serde::Deserialize;

/// Envelope code the gateway uses for an accepted request.
pub const CODE_SUCCESS: &str = "SUCCESS";

/// Did an envelope accept the request? A missing code counts as acceptance;
/// only an explicit non-success code is a rejection.
pub(crate) fn code_accepts(code: &Option<String>) -> bool {
    match code {
        Some(code) => code == CODE_SUCCESS,
        None => true,
    }
}

/// Fallback message for rejections that carry no explanation.
pub(crate) fn rejection_message(message: Option<String>) -> String {
    message.unwrap_or_else(|| "unknown error".to_string())
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct LoginReply {
    pub code: Option<String>,
    pub message: Option<String>,
    pub token: Option<String>,
    pub data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub token: Option<String>,
}

impl LoginReply {
    /// The token, wherever this firmware put it.
    pub fn token(self) -> Option<String> {
        self.token.or(self.data.and_then(|d| d.token))
    }
}

// =============================================================================
// Routing document
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct RoutingReply {
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "routingA")]
    pub routing_a: Option<String>,
    pub data: Option<RoutingData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoutingData {
    #[serde(rename = "routingA")]
    pub routing_a: Option<String>,
}

impl RoutingReply {
    pub fn routing(self) -> Option<String> {
        self.routing_a.or(self.data.and_then(|d| d.routing_a))
    }
}

/// Bare acknowledgment envelope (PUT routingA, v2ray start/stop).
#[derive(Debug, Deserialize)]
pub(crate) struct AckReply {
    pub code: Option<String>,
    pub message: Option<String>,
}

// =============================================================================
// Touch (proxy status)
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct TouchReply {
    pub code: Option<String>,
    pub message: Option<String>,
    pub data: Option<TouchData>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TouchData {
    #[serde(default)]
    pub running: bool,
    pub touch: Option<TouchInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TouchInfo {
    #[serde(rename = "connectedServers")]
    pub connected_servers: Option<Vec<serde_json::Value>>,
    #[serde(rename = "connectedServer")]
    pub connected_server: Option<Vec<serde_json::Value>>,
}

impl TouchInfo {
    pub fn connected_count(&self) -> usize {
        self.connected_servers
            .as_ref()
            .or(self.connected_server.as_ref())
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Distilled proxy status for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyStatus {
    pub running: bool,
    pub connected_servers: usize,
}

impl ProxyStatus {
    pub fn state(&self) -> ProxyState {
        if self.running && self.connected_servers > 0 {
            ProxyState::Working
        } else {
            ProxyState::Ready
        }
    }
}

/// The two labels the UI shows for the proxy core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Running with at least one connected server.
    Working,
    /// Stopped, or running without a connection.
    Ready,
}

impl std::fmt::Display for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyState::Working => write!(f, "Working"),
            ProxyState::Ready => write!(f, "Ready"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_reply_both_shapes() {
        let bare: LoginReply = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(bare.token(), Some("abc".to_string()));

        let coded: LoginReply =
            serde_json::from_str(r#"{"code":"SUCCESS","data":{"token":"xyz"}}"#).unwrap();
        assert_eq!(coded.token(), Some("xyz".to_string()));

        let rejected: LoginReply =
            serde_json::from_str(r#"{"code":"FAIL","message":"bad credentials"}"#).unwrap();
        assert!(!code_accepts(&rejected.code));
        assert_eq!(rejection_message(rejected.message), "bad credentials");
    }

    #[test]
    fn test_routing_reply_both_shapes() {
        let bare: RoutingReply =
            serde_json::from_str(r#"{"routingA":"default: proxy"}"#).unwrap();
        assert_eq!(bare.routing(), Some("default: proxy".to_string()));

        let coded: RoutingReply =
            serde_json::from_str(r#"{"code":"SUCCESS","data":{"routingA":"default: direct"}}"#)
                .unwrap();
        assert_eq!(coded.routing(), Some("default: direct".to_string()));
    }

    #[test]
    fn test_touch_reply_variants() {
        let plural: TouchReply = serde_json::from_str(
            r#"{"code":"SUCCESS","data":{"running":true,"touch":{"connectedServers":[{},{}]}}}"#,
        )
        .unwrap();
        let data = plural.data.unwrap();
        assert!(data.running);
        assert_eq!(data.touch.unwrap().connected_count(), 2);

        let singular: TouchReply = serde_json::from_str(
            r#"{"code":"SUCCESS","data":{"running":true,"touch":{"connectedServer":[{}]}}}"#,
        )
        .unwrap();
        assert_eq!(singular.data.unwrap().touch.unwrap().connected_count(), 1);

        let stopped: TouchReply =
            serde_json::from_str(r#"{"code":"SUCCESS","data":{"running":false}}"#).unwrap();
        let data = stopped.data.unwrap();
        assert!(!data.running);
        assert!(data.touch.is_none());
    }

    #[test]
    fn test_proxy_state_mapping() {
        let working = ProxyStatus { running: true, connected_servers: 2 };
        assert_eq!(working.state(), ProxyState::Working);
        assert_eq!(working.state().to_string(), "Working");

        let idle = ProxyStatus { running: true, connected_servers: 0 };
        assert_eq!(idle.state(), ProxyState::Ready);

        let stopped = ProxyStatus { running: false, connected_servers: 3 };
        assert_eq!(stopped.state(), ProxyState::Ready);
    }

    #[test]
    fn test_missing_code_counts_as_accepted() {
        assert!(code_accepts(&None));
        assert!(code_accepts(&Some("SUCCESS".to_string())));
        assert!(!code_accepts(&Some("ERROR".to_string())));
    }
}
