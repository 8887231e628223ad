//! Gateway connection settings
//!
//! Server address, auth token and username live in the same durable map as
//! everything else so every surface (popup, editor, background worker) sees
//! one session.

use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, StoragePort};

pub const KEY_SERVER_URL: &str = "serverUrl";
pub const KEY_TOKEN: &str = "token";
pub const KEY_USERNAME: &str = "username";

/// Address used before the user has configured anything: the common LAN
/// address of the router's web panel.
pub const DEFAULT_SERVER: &str = "http://192.168.1.1:2017";

/// The persisted gateway session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub server_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
}

impl SessionConfig {
    /// Read the session out of durable storage. Missing keys are simply
    /// absent fields; a corrupt value reads as absent.
    pub fn load<S: StoragePort>(store: &S) -> Result<Self, StorageError> {
        Ok(Self {
            server_url: read_string(store, KEY_SERVER_URL)?,
            token: read_string(store, KEY_TOKEN)?,
            username: read_string(store, KEY_USERNAME)?,
        })
    }

    /// Persist every present field. Absent fields are left untouched so a
    /// partial update (server only, before login) keeps the rest.
    pub fn store<S: StoragePort>(&self, store: &mut S) -> Result<(), StorageError> {
        for (key, value) in [
            (KEY_SERVER_URL, &self.server_url),
            (KEY_TOKEN, &self.token),
            (KEY_USERNAME, &self.username),
        ] {
            if let Some(value) = value {
                store.set(key, encode(value))?;
            }
        }
        Ok(())
    }

    /// Forget the auth parts of the session but keep the server address.
    pub fn clear_auth<S: StoragePort>(store: &mut S) -> Result<(), StorageError> {
        store.remove(KEY_TOKEN)?;
        store.remove(KEY_USERNAME)
    }

    /// The configured server, or the well-known default.
    pub fn server_or_default(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

fn encode(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn read_string<S: StoragePort>(store: &S, key: &str) -> Result<Option<String>, StorageError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    Ok(serde_json::from_str(&raw).ok())
}
