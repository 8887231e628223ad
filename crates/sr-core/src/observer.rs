//! Network request observer
//!
//! Watches the browser's request lifecycle and keeps three per-tab aggregates
//! in durable storage: the last attempted host, the ordered set of contacted
//! hosts, and per-host health counters. This is best-effort telemetry: every
//! handler swallows its own errors and must never disturb request handling.

use std::collections::HashSet;
use std::time::Duration;

use crate::storage::{keys, StorageError, StoragePort};
use crate::types::{FailureDetail, HostStat, TabId, TabView};
use crate::url::host_of;

/// How often stale per-tab records are swept. The host environment owns the
/// timer; it should also run one sweep at process start.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Completions at or above this HTTP status count as failures.
pub const FAILURE_STATUS_FLOOR: u16 = 403;

/// Requests cancelled by a local blocking extension. Self-inflicted, so they
/// say nothing about the host's health and are ignored outright.
pub const ERR_BLOCKED_BY_CLIENT: &str = "net::ERR_BLOCKED_BY_CLIENT";

type StatsMap = std::collections::HashMap<String, HostStat>;

/// The request observer. Generic over the storage port so the same engine
/// runs against extension storage or an in-memory fake.
pub struct Observer<S> {
    store: S,
}

impl<S: StoragePort> Observer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // =========================================================================
    // Event handlers
    // =========================================================================

    /// A request was initiated. Records the host as the tab's most recent
    /// attempt and adds it to the contacted set.
    pub fn on_request_start(&mut self, tab: TabId, url: &str) {
        if tab < 0 {
            return;
        }
        let Some(host) = host_of(url) else { return };
        if let Err(e) = self.record_start(tab, &host) {
            log::debug!("observer: dropping request-start for tab {tab}: {e}");
        }
    }

    /// A request finished with a response. Status >= 403 counts against the
    /// host; everything else, including a missing status, counts for it.
    pub fn on_request_completed(&mut self, tab: TabId, url: &str, status: Option<u16>) {
        if tab < 0 {
            return;
        }
        let Some(host) = host_of(url) else { return };
        let result = match status {
            Some(code) if code >= FAILURE_STATUS_FLOOR => {
                self.mark_failed(tab, &host, FailureDetail::Status(code))
            }
            _ => self.mark_ok(tab, &host),
        };
        if let Err(e) = result {
            log::debug!("observer: dropping completion for tab {tab}: {e}");
        }
    }

    /// A request failed at the transport layer before any response.
    pub fn on_request_failed(&mut self, tab: TabId, url: &str, error: Option<&str>) {
        if tab < 0 {
            return;
        }
        if error == Some(ERR_BLOCKED_BY_CLIENT) {
            return;
        }
        let Some(host) = host_of(url) else { return };
        let detail = match error {
            Some(name) if !name.is_empty() => FailureDetail::Error(name.to_string()),
            _ => FailureDetail::generic(),
        };
        if let Err(e) = self.mark_failed(tab, &host, detail) {
            log::debug!("observer: dropping failure for tab {tab}: {e}");
        }
    }

    /// The tab is gone; drop everything recorded for it.
    pub fn on_tab_closed(&mut self, tab: TabId) {
        for key in [
            keys::host_for_tab(tab),
            keys::domains_for_tab(tab),
            keys::stats_for_tab(tab),
        ] {
            if let Err(e) = self.store.remove(&key) {
                log::debug!("observer: failed to remove '{key}': {e}");
            }
        }
    }

    /// Delete per-tab records whose tab id is no longer open. Backstop for
    /// close events the process never saw (crash, missed listener).
    pub fn sweep(&mut self, open_tabs: &HashSet<TabId>) {
        let all_keys = match self.store.keys() {
            Ok(all_keys) => all_keys,
            Err(e) => {
                log::debug!("observer: sweep could not list keys: {e}");
                return;
            }
        };

        let mut removed = 0usize;
        for key in all_keys {
            let Some(tab) = keys::per_tab_id(&key) else { continue };
            if open_tabs.contains(&tab) {
                continue;
            }
            match self.store.remove(&key) {
                Ok(()) => removed += 1,
                Err(e) => log::debug!("observer: sweep failed to remove '{key}': {e}"),
            }
        }

        if removed > 0 {
            log::debug!("observer: sweep removed {removed} stale keys");
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Assemble the full view of one tab from durable storage. Missing or
    /// corrupt pieces come back empty rather than failing the whole view.
    pub fn tab_view(&self, tab: TabId) -> TabView {
        TabView {
            last_host: self.read_json(&keys::host_for_tab(tab)).unwrap_or_default(),
            domains: self
                .read_json::<Vec<String>>(&keys::domains_for_tab(tab))
                .unwrap_or_default()
                .unwrap_or_default(),
            stats: self
                .read_json::<StatsMap>(&keys::stats_for_tab(tab))
                .unwrap_or_default()
                .unwrap_or_default(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn record_start(&mut self, tab: TabId, host: &str) -> Result<(), StorageError> {
        self.write_json(&keys::host_for_tab(tab), &host)?;

        let domains_key = keys::domains_for_tab(tab);
        let mut domains: Vec<String> = self.read_json(&domains_key)?.unwrap_or_default();
        if !domains.iter().any(|d| d == host) {
            domains.push(host.to_string());
            self.write_json(&domains_key, &domains)?;
        }
        Ok(())
    }

    fn mark_ok(&mut self, tab: TabId, host: &str) -> Result<(), StorageError> {
        self.update_stat(tab, host, |stat| stat.record_ok())
    }

    fn mark_failed(&mut self, tab: TabId, host: &str, detail: FailureDetail) -> Result<(), StorageError> {
        self.update_stat(tab, host, |stat| stat.record_failure(detail))
    }

    fn update_stat(
        &mut self,
        tab: TabId,
        host: &str,
        apply: impl FnOnce(&mut HostStat),
    ) -> Result<(), StorageError> {
        let key = keys::stats_for_tab(tab);
        let mut stats: StatsMap = self.read_json(&key)?.unwrap_or_default();
        apply(stats.entry(host.to_string()).or_default());
        self.write_json(&key, &stats)
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::CorruptValue {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn write_json<T: serde::Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::CorruptValue {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(key, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::FailureDetail;

    fn observer() -> Observer<MemoryStore> {
        Observer::new(MemoryStore::new())
    }

    #[test]
    fn test_start_records_host_and_domains() {
        let mut obs = observer();
        obs.on_request_start(1, "https://example.com/index.html");
        obs.on_request_start(1, "https://cdn.example.com/app.js");
        obs.on_request_start(1, "https://example.com/style.css");

        let view = obs.tab_view(1);
        assert_eq!(view.last_host.as_deref(), Some("example.com"));
        assert_eq!(view.domains, vec!["example.com", "cdn.example.com"]);
    }

    #[test]
    fn test_negative_tab_and_bad_url_ignored() {
        let mut obs = observer();
        obs.on_request_start(-1, "https://example.com/");
        obs.on_request_start(3, "about:blank");
        obs.on_request_completed(-1, "https://example.com/", Some(200));
        obs.on_request_failed(-1, "https://example.com/", Some("net::ERR_FAILED"));

        assert!(obs.store().is_empty());
    }

    #[test]
    fn test_completion_classification() {
        let mut obs = observer();
        obs.on_request_completed(2, "https://a.com/x", Some(200));
        obs.on_request_completed(2, "https://a.com/x", None);
        obs.on_request_completed(2, "https://a.com/y", Some(403));
        obs.on_request_completed(2, "https://a.com/y", Some(502));

        let view = obs.tab_view(2);
        let stat = &view.stats["a.com"];
        assert_eq!(stat.ok, 2);
        assert_eq!(stat.failed, 2);
        assert_eq!(stat.last, Some(FailureDetail::Status(502)));
    }

    #[test]
    fn test_failure_then_recovery() {
        let mut obs = observer();
        obs.on_request_failed(4, "https://b.com/", Some("net::ERR_CONNECTION_REFUSED"));
        obs.on_request_completed(4, "https://b.com/", Some(200));
        obs.on_request_completed(4, "https://b.com/", Some(200));

        let stat = obs.tab_view(4).stats["b.com"].clone();
        assert_eq!(stat.failed, 0);
        assert_eq!(stat.ok, 2);
        assert_eq!(stat.last, None);
    }

    #[test]
    fn test_blocked_by_client_ignored() {
        let mut obs = observer();
        obs.on_request_failed(5, "https://ads.example.com/", Some(ERR_BLOCKED_BY_CLIENT));
        assert!(obs.tab_view(5).stats.is_empty());

        // Other transport errors still count, defaulting to a generic label.
        obs.on_request_failed(5, "https://ads.example.com/", None);
        let stat = obs.tab_view(5).stats["ads.example.com"].clone();
        assert_eq!(stat.failed, 1);
        assert_eq!(stat.last, Some(FailureDetail::Error("error".into())));
    }

    #[test]
    fn test_tab_close_removes_all_three_keys() {
        let mut obs = observer();
        obs.on_request_start(6, "https://example.com/");
        obs.on_request_completed(6, "https://example.com/", Some(200));
        assert_eq!(obs.store().len(), 3);

        obs.on_tab_closed(6);
        assert!(obs.store().is_empty());

        // Closing again is a harmless no-op.
        obs.on_tab_closed(6);
    }

    #[test]
    fn test_sweep_removes_stale_tabs_only() {
        let mut obs = observer();
        obs.on_request_start(1, "https://a.com/");
        obs.on_request_start(2, "https://b.com/");
        obs.on_request_completed(2, "https://b.com/", Some(404));

        // Unrelated keys must survive a sweep untouched.
        obs.store_mut().set("serverUrl", "\"http://gw:2017\"".into()).unwrap();
        obs.store_mut().set("draft_rules_a.com", "\"x\"".into()).unwrap();

        let open: HashSet<TabId> = [2].into_iter().collect();
        obs.sweep(&open);

        let remaining = {
            let mut ks = obs.store().keys().unwrap();
            ks.sort();
            ks
        };
        assert_eq!(
            remaining,
            vec![
                "domain_stats_for_tab_2",
                "domains_for_tab_2",
                "draft_rules_a.com",
                "host_for_tab_2",
                "serverUrl",
            ]
        );
    }

    #[test]
    fn test_corrupt_value_is_swallowed() {
        let mut obs = observer();
        obs.store_mut()
            .set("domains_for_tab_9", "not json".into())
            .unwrap();

        // The handler drops the update instead of propagating.
        obs.on_request_start(9, "https://example.com/");
        // The corrupt domains list stays as-is; the last-host key still lands.
        let view = obs.tab_view(9);
        assert_eq!(view.last_host.as_deref(), Some("example.com"));
        assert!(view.domains.is_empty());
    }
}
