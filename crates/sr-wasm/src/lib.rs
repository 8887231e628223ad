//! WebAssembly bindings for the SiteRouter extension
//!
//! The background worker owns the observer: it hydrates the engine from
//! `chrome.storage.local` at startup, forwards webRequest events in, and
//! drains the mutation journal back out to persist fire-and-forget. The
//! popup/editor pages call the pure reconciler functions directly.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;

use sr_core::observer::Observer;
use sr_core::rules;
use sr_core::rules::{EditScope, RuleEditor};
use sr_core::session::SessionConfig;
use sr_core::storage::{JournalStore, StorageOp};
use sr_core::types::TabId;

thread_local! {
    static OBSERVER: RefCell<Observer<JournalStore>> =
        RefCell::new(Observer::new(JournalStore::new()));
    static EDITOR: RefCell<Option<RuleEditor>> = RefCell::new(None);
}

// =============================================================================
// Observer lifecycle
// =============================================================================

/// Seed the engine from previously persisted entries: an array of
/// `[key, value]` pairs where each value is the JSON string stored under the
/// key. Call once when the background worker starts.
#[wasm_bindgen]
pub fn hydrate(entries: JsValue) {
    let pairs = js_sys::Array::from(&entries);
    let mut seed: Vec<(String, String)> = Vec::with_capacity(pairs.length() as usize);
    for entry in pairs.iter() {
        let pair = js_sys::Array::from(&entry);
        let (Some(key), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) else {
            continue;
        };
        seed.push((key, value));
    }
    OBSERVER.with(|obs| obs.borrow_mut().store_mut().hydrate(seed));
}

#[wasm_bindgen]
pub fn on_request_start(tab_id: i32, url: &str) {
    OBSERVER.with(|obs| obs.borrow_mut().on_request_start(tab_id as TabId, url));
}

#[wasm_bindgen]
pub fn on_request_completed(tab_id: i32, url: &str, status: Option<u16>) {
    OBSERVER.with(|obs| obs.borrow_mut().on_request_completed(tab_id as TabId, url, status));
}

#[wasm_bindgen]
pub fn on_request_failed(tab_id: i32, url: &str, error: Option<String>) {
    OBSERVER.with(|obs| {
        obs.borrow_mut()
            .on_request_failed(tab_id as TabId, url, error.as_deref())
    });
}

#[wasm_bindgen]
pub fn on_tab_closed(tab_id: i32) {
    OBSERVER.with(|obs| obs.borrow_mut().on_tab_closed(tab_id as TabId));
}

/// Sweep stale per-tab records. `open_tab_ids` is the full list of currently
/// open tab ids, from `chrome.tabs.query({})`.
#[wasm_bindgen]
pub fn sweep(open_tab_ids: Vec<i32>) {
    let open = open_tab_ids.into_iter().collect();
    OBSERVER.with(|obs| obs.borrow_mut().sweep(&open));
}

/// Milliseconds between sweeps, for the alarm the worker registers.
#[wasm_bindgen]
pub fn sweep_interval_ms() -> u32 {
    sr_core::observer::SWEEP_INTERVAL.as_millis() as u32
}

/// Take all storage mutations recorded since the last drain, as an array of
/// `{op: "set", key, value}` / `{op: "remove", key}` objects for the worker
/// to replay into `chrome.storage.local` without awaiting.
#[wasm_bindgen]
pub fn drain_storage_ops() -> JsValue {
    let ops = OBSERVER.with(|obs| obs.borrow_mut().store_mut().drain_ops());

    let array = js_sys::Array::new_with_length(ops.len() as u32);
    for (i, op) in ops.into_iter().enumerate() {
        let entry = js_sys::Object::new();
        match op {
            StorageOp::Set { key, value } => {
                let _ = js_sys::Reflect::set(&entry, &"op".into(), &"set".into());
                let _ = js_sys::Reflect::set(&entry, &"key".into(), &key.into());
                let _ = js_sys::Reflect::set(&entry, &"value".into(), &value.into());
            }
            StorageOp::Remove { key } => {
                let _ = js_sys::Reflect::set(&entry, &"op".into(), &"remove".into());
                let _ = js_sys::Reflect::set(&entry, &"key".into(), &key.into());
            }
        }
        array.set(i as u32, entry.into());
    }
    array.into()
}

/// Everything tracked for one tab, as `{lastHost, domains, stats}` where
/// stats maps hostname to `{ok, failed, last?}`.
#[wasm_bindgen]
pub fn tab_view(tab_id: i32) -> JsValue {
    let view = OBSERVER.with(|obs| obs.borrow().tab_view(tab_id as TabId));

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(
        &result,
        &"lastHost".into(),
        &view.last_host.map(JsValue::from).unwrap_or(JsValue::NULL),
    );

    let domains = js_sys::Array::new_with_length(view.domains.len() as u32);
    for (i, domain) in view.domains.iter().enumerate() {
        domains.set(i as u32, JsValue::from_str(domain));
    }
    let _ = js_sys::Reflect::set(&result, &"domains".into(), &domains);

    let stats = js_sys::Object::new();
    for (host, stat) in &view.stats {
        let entry = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&entry, &"ok".into(), &JsValue::from(stat.ok));
        let _ = js_sys::Reflect::set(&entry, &"failed".into(), &JsValue::from(stat.failed));
        if let Some(last) = &stat.last {
            let _ = js_sys::Reflect::set(&entry, &"last".into(), &JsValue::from_str(&last.to_string()));
        }
        let _ = js_sys::Reflect::set(&stats, &JsValue::from_str(host), &entry);
    }
    let _ = js_sys::Reflect::set(&result, &"stats".into(), &stats);

    result.into()
}

// =============================================================================
// Reconciler
// =============================================================================

/// Merge a host's block and legacy lines for display:
/// `{lines: string[], blockFound: bool}`.
#[wasm_bindgen]
pub fn load_host_view(full_text: &str, host: &str) -> JsValue {
    let view = rules::load_host_view(full_text, host);

    let result = js_sys::Object::new();
    let lines = js_sys::Array::new_with_length(view.lines.len() as u32);
    for (i, line) in view.lines.iter().enumerate() {
        lines.set(i as u32, JsValue::from_str(line));
    }
    let _ = js_sys::Reflect::set(&result, &"lines".into(), &lines);
    let _ = js_sys::Reflect::set(&result, &"blockFound".into(), &JsValue::from(view.block_found));
    result.into()
}

/// Rewrite the full document with `edited_text` as the host's contribution.
/// The edited text is normalized (trimmed, blanks and duplicates dropped)
/// exactly like the editing surface does before saving.
#[wasm_bindgen]
pub fn compute_save_text(full_text: &str, host: &str, edited_text: &str) -> String {
    let edited = rules::normalize_block(edited_text);
    rules::compute_save_text(full_text, host, &edited)
}

/// Structural validation: `{ok: bool, errors: string[]}` with 1-based line
/// numbers in each message.
#[wasm_bindgen]
pub fn validate_rules(text: &str) -> JsValue {
    let report = rules::validate(text);

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"ok".into(), &JsValue::from(report.is_ok()));
    let errors = js_sys::Array::new_with_length(report.issues.len() as u32);
    for (i, issue) in report.issues.iter().enumerate() {
        errors.set(i as u32, JsValue::from_str(&issue.to_string()));
    }
    let _ = js_sys::Reflect::set(&result, &"errors".into(), &errors);
    result.into()
}

#[wasm_bindgen]
pub fn matches_host(line: &str, host: &str) -> bool {
    rules::matches_host(line, host)
}

/// Insert `domain(<host>)->proxy` after the document's first line.
/// Returns null when the rule is already present.
#[wasm_bindgen]
pub fn append_rule(full_text: &str, host: &str) -> Option<String> {
    rules::append_rule(full_text, host).ok()
}

/// Drop every line that is exactly `domain(<host>)->proxy`.
#[wasm_bindgen]
pub fn remove_rule(full_text: &str, host: &str) -> String {
    rules::remove_rule(full_text, host)
}

/// Drop one line by zero-based index.
#[wasm_bindgen]
pub fn remove_line_at(full_text: &str, idx: u32) -> String {
    rules::remove_line_at(full_text, idx as usize)
}

/// Extract and normalize the hostname of a URL, for the popup's
/// current-tab display.
#[wasm_bindgen]
pub fn host_of(url: &str) -> Option<String> {
    sr_core::url::host_of(url)
}

// =============================================================================
// Editor session
// =============================================================================

/// Start an editing session over the freshly loaded text. `host` selects the
/// host-scoped view; pass null for the whole-document editor. Returns a
/// previously parked draft when one differs from the loaded text, so the UI
/// can offer to restore it.
#[wasm_bindgen]
pub fn editor_open(host: Option<String>, displayed: &str) -> Option<String> {
    let scope = match host {
        Some(host) => EditScope::Host(host),
        None => EditScope::Document,
    };

    let mut editor = RuleEditor::new(scope);
    editor.load(displayed);

    let draft = OBSERVER.with(|obs| editor.restore_draft(obs.borrow().store()));
    EDITOR.with(|ed| *ed.borrow_mut() = Some(editor));
    draft.unwrap_or(None)
}

/// The buffer changed: revalidate, re-derive dirtiness, and park the draft.
/// Returns `{ok: bool, errors: string[], canSave: bool}`.
#[wasm_bindgen]
pub fn editor_on_edit(current: &str) -> JsValue {
    let result = js_sys::Object::new();

    EDITOR.with(|ed| {
        let mut slot = ed.borrow_mut();
        let Some(editor) = slot.as_mut() else {
            let _ = js_sys::Reflect::set(&result, &"ok".into(), &JsValue::from(false));
            let _ = js_sys::Reflect::set(&result, &"errors".into(), &js_sys::Array::new());
            let _ = js_sys::Reflect::set(&result, &"canSave".into(), &JsValue::from(false));
            return;
        };

        let report = editor.on_edit(current);
        OBSERVER.with(|obs| {
            if let Err(e) = editor.store_draft(obs.borrow_mut().store_mut(), current) {
                web_sys::console::debug_1(&JsValue::from_str(&format!("draft not parked: {e}")));
            }
        });

        let errors = js_sys::Array::new_with_length(report.issues.len() as u32);
        for (i, issue) in report.issues.iter().enumerate() {
            errors.set(i as u32, JsValue::from_str(&issue.to_string()));
        }
        let _ = js_sys::Reflect::set(&result, &"ok".into(), &JsValue::from(report.is_ok()));
        let _ = js_sys::Reflect::set(&result, &"errors".into(), &errors);
        let _ = js_sys::Reflect::set(&result, &"canSave".into(), &JsValue::from(editor.can_save()));
    });

    result.into()
}

/// Try to enter the saving state. False means not dirty, not valid, or a
/// save is already in flight.
#[wasm_bindgen]
pub fn editor_begin_save() -> bool {
    EDITOR.with(|ed| ed.borrow_mut().as_mut().map(RuleEditor::begin_save).unwrap_or(false))
}

/// The gateway accepted the save; the saved text becomes the new baseline
/// and the parked draft is dropped.
#[wasm_bindgen]
pub fn editor_save_succeeded(saved: &str) {
    EDITOR.with(|ed| {
        let mut slot = ed.borrow_mut();
        let Some(editor) = slot.as_mut() else { return };
        editor.save_succeeded(saved);
        OBSERVER.with(|obs| {
            if let Err(e) = editor.clear_draft(obs.borrow_mut().store_mut()) {
                web_sys::console::debug_1(&JsValue::from_str(&format!("draft not cleared: {e}")));
            }
        });
    });
}

/// The save failed; back to dirty so the user can retry.
#[wasm_bindgen]
pub fn editor_save_failed() {
    EDITOR.with(|ed| {
        if let Some(editor) = ed.borrow_mut().as_mut() {
            editor.save_failed();
        }
    });
}

/// Drop the parked draft for the current session's scope (explicit refresh).
#[wasm_bindgen]
pub fn editor_clear_draft() {
    EDITOR.with(|ed| {
        let slot = ed.borrow();
        let Some(editor) = slot.as_ref() else { return };
        OBSERVER.with(|obs| {
            if let Err(e) = editor.clear_draft(obs.borrow_mut().store_mut()) {
                web_sys::console::debug_1(&JsValue::from_str(&format!("draft not cleared: {e}")));
            }
        });
    });
}

// =============================================================================
// Session settings
// =============================================================================

/// The stored gateway session:
/// `{serverUrl: string, token: string|null, username: string|null,
///   authenticated: bool}`. `serverUrl` falls back to the well-known default.
#[wasm_bindgen]
pub fn session_load() -> JsValue {
    let session = OBSERVER
        .with(|obs| SessionConfig::load(obs.borrow().store()))
        .unwrap_or_default();

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(
        &result,
        &"serverUrl".into(),
        &JsValue::from_str(session.server_or_default()),
    );
    let _ = js_sys::Reflect::set(
        &result,
        &"token".into(),
        &session.token.clone().map(JsValue::from).unwrap_or(JsValue::NULL),
    );
    let _ = js_sys::Reflect::set(
        &result,
        &"username".into(),
        &session.username.clone().map(JsValue::from).unwrap_or(JsValue::NULL),
    );
    let _ = js_sys::Reflect::set(
        &result,
        &"authenticated".into(),
        &JsValue::from(session.is_authenticated()),
    );
    result.into()
}

/// Persist the given session fields; nulls leave the stored value alone.
#[wasm_bindgen]
pub fn session_store(server_url: Option<String>, token: Option<String>, username: Option<String>) {
    let session = SessionConfig { server_url, token, username };
    OBSERVER.with(|obs| {
        if let Err(e) = session.store(obs.borrow_mut().store_mut()) {
            web_sys::console::debug_1(&JsValue::from_str(&format!("session not stored: {e}")));
        }
    });
}

/// Forget the token and username but keep the server address.
#[wasm_bindgen]
pub fn session_logout() {
    OBSERVER.with(|obs| {
        if let Err(e) = SessionConfig::clear_auth(obs.borrow_mut().store_mut()) {
            web_sys::console::debug_1(&JsValue::from_str(&format!("session not cleared: {e}")));
        }
    });
}
