//! The gateway HTTP client

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::GatewayError;
use crate::types::{
    code_accepts, rejection_message, AckReply, LoginReply, ProxyStatus, RoutingReply, TouchReply,
};

/// Client for one gateway. Cheap to clone the underlying `reqwest::Client`;
/// the token is per-instance state set by [`GatewayClient::login`] or
/// [`GatewayClient::with_token`].
pub struct GatewayClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl GatewayClient {
    /// Build a client for `server` (scheme://host:port, trailing slash
    /// tolerated).
    pub fn new(server: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: server.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Reuse a token from a stored session.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn server(&self) -> &str {
        &self.base
    }

    // =========================================================================
    // API calls
    // =========================================================================

    /// Authenticate and keep the bearer token for subsequent calls.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<String, GatewayError> {
        let reply: LoginReply = self
            .call(
                reqwest::Method::POST,
                "/api/login",
                Some(json!({ "username": username, "password": password })),
            )
            .await?;

        if !code_accepts(&reply.code) {
            return Err(GatewayError::Rejected(rejection_message(reply.message)));
        }
        let token = reply.token().ok_or(GatewayError::MissingField("token"))?;
        self.token = Some(token.clone());
        Ok(token)
    }

    /// Fetch the full routing document.
    pub async fn fetch_routing(&self) -> Result<String, GatewayError> {
        let reply: RoutingReply = self
            .call(reqwest::Method::GET, "/api/routingA", None)
            .await?;

        if !code_accepts(&reply.code) {
            return Err(GatewayError::Rejected(rejection_message(reply.message)));
        }
        reply.routing().ok_or(GatewayError::MissingField("routingA"))
    }

    /// Replace the full routing document.
    pub async fn put_routing(&self, text: &str) -> Result<(), GatewayError> {
        let reply: AckReply = self
            .call(
                reqwest::Method::PUT,
                "/api/routingA",
                Some(json!({ "routingA": text })),
            )
            .await?;

        if !code_accepts(&reply.code) {
            return Err(GatewayError::Rejected(rejection_message(reply.message)));
        }
        Ok(())
    }

    /// Replace the routing document and nudge the proxy core to pick it up.
    /// The reload is best-effort: its failure never fails the save.
    pub async fn apply_routing(&self, text: &str) -> Result<(), GatewayError> {
        self.put_routing(text).await?;
        if let Err(e) = self.reload_core().await {
            log::warn!("gateway: core reload after save failed: {e}");
        }
        Ok(())
    }

    /// Ask the gateway to (re)start the proxy core.
    pub async fn reload_core(&self) -> Result<(), GatewayError> {
        let reply: AckReply = self
            .call(reqwest::Method::POST, "/api/v2ray", Some(json!({})))
            .await?;
        if !code_accepts(&reply.code) {
            return Err(GatewayError::Rejected(rejection_message(reply.message)));
        }
        Ok(())
    }

    /// Ask the gateway to stop the proxy core.
    pub async fn stop_core(&self) -> Result<(), GatewayError> {
        let reply: AckReply = self
            .call(reqwest::Method::DELETE, "/api/v2ray", None)
            .await?;
        if !code_accepts(&reply.code) {
            return Err(GatewayError::Rejected(rejection_message(reply.message)));
        }
        Ok(())
    }

    /// Poll the proxy running/connected status.
    pub async fn touch(&self) -> Result<ProxyStatus, GatewayError> {
        let reply: TouchReply = self.call(reqwest::Method::GET, "/api/touch", None).await?;

        if !code_accepts(&reply.code) {
            return Err(GatewayError::Rejected(rejection_message(reply.message)));
        }
        let data = reply.data.ok_or(GatewayError::MissingField("data"))?;
        let connected = data.touch.as_ref().map(|t| t.connected_count()).unwrap_or(0);
        Ok(ProxyStatus {
            running: data.running,
            connected_servers: connected,
        })
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    async fn call<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base, path);
        log::debug!("gateway: {method} {url}");

        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}
