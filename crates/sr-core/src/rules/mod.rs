//! Routing-document reconciliation
//!
//! The remote routing config is an ordered plaintext document. Each host this
//! extension manages owns one marker-delimited block inside it; older manual
//! rules mentioning the host may float anywhere else. This module locates a
//! host's full contribution, merges it for display, and on save replaces
//! exactly that contribution while every unrelated line keeps its bytes and
//! its position.

mod matcher;
mod reconcile;
mod validate;
mod editor;

pub use matcher::matches_host;
pub use reconcile::{
    append_rule, compute_save_text, end_marker, load_host_view, normalize_block, proxy_rule,
    remove_line_at, remove_rule, start_marker, HostView, ReconcileError,
};
pub use validate::{validate, RuleIssue, RuleIssueKind, ValidationReport};
pub use editor::{EditPhase, EditScope, RuleEditor};
