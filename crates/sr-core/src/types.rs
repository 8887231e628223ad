//! Per-tab tracking records
//!
//! These types are what the observer persists into the durable map, so their
//! serde shape is part of the storage format: a stat serializes as
//! `{"ok":2,"failed":0}` with `last` present only while failures remain.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Browser tab identifier. Negative ids mark browser-internal requests that
/// belong to no tab and are never tracked.
pub type TabId = i32;

// =============================================================================
// Failure Detail
// =============================================================================

/// Cause of the most recent failed request for one (tab, host) pair:
/// either an HTTP status code or a transport error identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FailureDetail {
    Status(u16),
    Error(String),
}

impl FailureDetail {
    /// Detail used when a failure event carries no error code at all.
    pub fn generic() -> Self {
        FailureDetail::Error("error".to_string())
    }
}

impl std::fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureDetail::Status(code) => write!(f, "{}", code),
            FailureDetail::Error(name) => write!(f, "{}", name),
        }
    }
}

// =============================================================================
// Host Stat
// =============================================================================

/// Health accumulator for one host within one tab.
///
/// Invariant: `failed == 0` exactly when `last` is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStat {
    #[serde(default)]
    pub ok: u32,
    #[serde(default)]
    pub failed: u32,
    /// Last recorded failure cause, present only while `failed > 0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<FailureDetail>,
}

impl HostStat {
    /// Record a successful completion. An earlier failure is paid off first,
    /// so a host that recovers stops looking broken instead of accumulating
    /// failures forever.
    pub fn record_ok(&mut self) {
        if self.failed > 0 {
            self.failed -= 1;
            if self.failed == 0 {
                self.last = None;
            }
        }
        self.ok += 1;
    }

    /// Record a failed request with its cause.
    pub fn record_failure(&mut self, detail: FailureDetail) {
        self.failed += 1;
        self.last = Some(detail);
    }

    /// True while unrecovered failures remain.
    pub fn is_failing(&self) -> bool {
        self.failed > 0
    }
}

// =============================================================================
// Tab View
// =============================================================================

/// Snapshot of everything tracked for one tab, assembled from the durable map
/// for consumption by UI surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabView {
    /// Hostname of the most recent request initiation, even if the page
    /// never finished loading.
    pub last_host: Option<String>,
    /// Every distinct host this tab has contacted, in first-seen order.
    pub domains: Vec<String>,
    /// Health counters per host.
    pub stats: HashMap<String, HostStat>,
}
