//! Editing-surface state machine
//!
//! One editor implementation drives both the host-scoped rule view and the
//! whole-document view; the scope only changes which text is loaded and
//! where drafts are parked. The machine gates saving: dirty and valid, with
//! no save already in flight.

use crate::storage::{StorageError, StoragePort};

use super::validate::{validate, ValidationReport};

/// What an editor session is editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditScope {
    /// One host's merged contribution.
    Host(String),
    /// The entire routing document.
    Document,
}

impl EditScope {
    /// Durable key for the scope's unsaved draft.
    pub fn draft_key(&self) -> String {
        match self {
            EditScope::Host(host) => format!("draft_rules_{host}"),
            EditScope::Document => "draft_rules_global".to_string(),
        }
    }
}

/// Save lifecycle. `Invalid` is tracked separately: a dirty buffer stays
/// dirty while validation fails, it just cannot be saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Clean,
    Dirty,
    Saving,
}

/// State machine for one editing surface.
#[derive(Debug)]
pub struct RuleEditor {
    scope: EditScope,
    baseline: String,
    phase: EditPhase,
    invalid: bool,
}

impl RuleEditor {
    pub fn new(scope: EditScope) -> Self {
        Self {
            scope,
            baseline: String::new(),
            phase: EditPhase::Clean,
            invalid: false,
        }
    }

    pub fn scope(&self) -> &EditScope {
        &self.scope
    }

    pub fn phase(&self) -> EditPhase {
        self.phase
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Freshly loaded (or reloaded) content becomes the clean baseline.
    pub fn load(&mut self, displayed: &str) {
        self.baseline = displayed.trim().to_string();
        self.phase = EditPhase::Clean;
        self.invalid = false;
    }

    /// The buffer changed. Revalidates and re-derives dirtiness against the
    /// baseline; a save in flight is not interrupted.
    pub fn on_edit(&mut self, current: &str) -> ValidationReport {
        let report = validate(current);
        self.invalid = !report.is_ok();

        if self.phase != EditPhase::Saving {
            self.phase = if current.trim() == self.baseline {
                EditPhase::Clean
            } else {
                EditPhase::Dirty
            };
        }
        report
    }

    /// Saving is allowed only for a dirty, structurally valid buffer with no
    /// other save outstanding.
    pub fn can_save(&self) -> bool {
        self.phase == EditPhase::Dirty && !self.invalid
    }

    /// Enter the saving state. Returns false (and changes nothing) when the
    /// machine is not in a savable state, so a double-click cannot start a
    /// second round trip.
    pub fn begin_save(&mut self) -> bool {
        if !self.can_save() {
            return false;
        }
        self.phase = EditPhase::Saving;
        true
    }

    /// The remote accepted the save; the saved text is the new baseline.
    pub fn save_succeeded(&mut self, saved: &str) {
        self.baseline = saved.trim().to_string();
        self.phase = EditPhase::Clean;
    }

    /// The save failed (transport or remote rejection); back to dirty so the
    /// user can retry.
    pub fn save_failed(&mut self) {
        if self.phase == EditPhase::Saving {
            self.phase = EditPhase::Dirty;
        }
    }

    // =========================================================================
    // Draft persistence
    // =========================================================================

    /// Park the unsaved buffer so a closed popup does not lose the edit.
    pub fn store_draft<S: StoragePort>(&self, store: &mut S, current: &str) -> Result<(), StorageError> {
        store.set(&self.scope.draft_key(), serde_json::to_string(current.trim()).unwrap_or_default())
    }

    /// Restore a parked draft, if it differs from the loaded baseline.
    pub fn restore_draft<S: StoragePort>(&self, store: &S) -> Result<Option<String>, StorageError> {
        let Some(raw) = store.get(&self.scope.draft_key())? else {
            return Ok(None);
        };
        let draft: String = serde_json::from_str(&raw).unwrap_or_default();
        let draft = draft.trim();
        if draft.is_empty() || draft == self.baseline {
            return Ok(None);
        }
        Ok(Some(draft.to_string()))
    }

    pub fn clear_draft<S: StoragePort>(&self, store: &mut S) -> Result<(), StorageError> {
        store.remove(&self.scope.draft_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_draft_keys() {
        assert_eq!(
            EditScope::Host("example.com".into()).draft_key(),
            "draft_rules_example.com"
        );
        assert_eq!(EditScope::Document.draft_key(), "draft_rules_global");
    }

    #[test]
    fn test_clean_dirty_transitions() {
        let mut ed = RuleEditor::new(EditScope::Host("example.com".into()));
        ed.load("domain(example.com)->proxy");
        assert_eq!(ed.phase(), EditPhase::Clean);
        assert!(!ed.can_save());

        ed.on_edit("domain(example.com)->direct");
        assert_eq!(ed.phase(), EditPhase::Dirty);
        assert!(ed.can_save());

        // Editing back to the baseline (modulo whitespace) is clean again.
        ed.on_edit("  domain(example.com)->proxy  ");
        assert_eq!(ed.phase(), EditPhase::Clean);
    }

    #[test]
    fn test_save_round_trip() {
        let mut ed = RuleEditor::new(EditScope::Document);
        ed.load("a->proxy");
        ed.on_edit("b->proxy");

        assert!(ed.begin_save());
        assert_eq!(ed.phase(), EditPhase::Saving);
        // No second save while one is outstanding.
        assert!(!ed.begin_save());

        ed.save_succeeded("b->proxy");
        assert_eq!(ed.phase(), EditPhase::Clean);
        ed.on_edit("b->proxy");
        assert_eq!(ed.phase(), EditPhase::Clean);
    }

    #[test]
    fn test_save_failure_returns_to_dirty() {
        let mut ed = RuleEditor::new(EditScope::Document);
        ed.load("a->proxy");
        ed.on_edit("b->proxy");
        assert!(ed.begin_save());

        ed.save_failed();
        assert_eq!(ed.phase(), EditPhase::Dirty);
        assert!(ed.can_save());
    }

    #[test]
    fn test_invalid_suppresses_save_until_fixed() {
        let mut ed = RuleEditor::new(EditScope::Document);
        ed.load("a->proxy");

        let report = ed.on_edit("domain(a.com)proxy");
        assert!(!report.is_ok());
        assert!(ed.is_invalid());
        assert_eq!(ed.phase(), EditPhase::Dirty);
        assert!(!ed.can_save());
        assert!(!ed.begin_save());

        let report = ed.on_edit("domain(a.com)->proxy");
        assert!(report.is_ok());
        assert!(ed.can_save());
    }

    #[test]
    fn test_draft_store_and_restore() {
        let mut store = MemoryStore::new();
        let mut ed = RuleEditor::new(EditScope::Host("example.com".into()));
        ed.load("a->proxy");

        ed.store_draft(&mut store, "b->proxy").unwrap();
        assert_eq!(ed.restore_draft(&store).unwrap(), Some("b->proxy".to_string()));

        // A draft equal to the baseline is not worth restoring.
        ed.store_draft(&mut store, "a->proxy").unwrap();
        assert_eq!(ed.restore_draft(&store).unwrap(), None);

        ed.clear_draft(&mut store).unwrap();
        assert_eq!(ed.restore_draft(&store).unwrap(), None);
    }
}
