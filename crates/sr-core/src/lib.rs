//! SiteRouter Core Library
//!
//! This crate provides the core engine for the SiteRouter proxy companion:
//! per-tab tracking of contacted hosts with health counters, and reconciliation
//! of per-host rule blocks inside the remote routing document.
//!
//! # Architecture
//!
//! All durable state lives behind the [`storage::StoragePort`] trait so the same
//! engine runs against `chrome.storage.local` (via the wasm bindings), an
//! in-memory fake (tests), or anything else that behaves like a string map.
//! The engine itself never blocks and never panics on bad input: the observer
//! is best-effort telemetry and swallows its own errors.
//!
//! # Modules
//!
//! - `url`: hostname extraction without URL allocation
//! - `types`: per-tab records and health counters
//! - `storage`: storage port trait, key layout, in-memory and journaling stores
//! - `observer`: network request observer and stale-tab sweep
//! - `rules`: routing-document reconciler, validator and editor state machine
//! - `session`: gateway connection settings kept in the durable map

pub mod url;
pub mod types;
pub mod storage;
pub mod observer;
pub mod rules;
pub mod session;

// Re-export commonly used types
pub use types::{TabId, HostStat, FailureDetail, TabView};
pub use storage::{StoragePort, StorageError, MemoryStore, JournalStore, StorageOp};
pub use observer::Observer;
pub use rules::{matches_host, load_host_view, compute_save_text, validate};
pub use session::SessionConfig;
