//! Structural validation of routing-rule text
//!
//! These checks are shape-only: they catch text that the gateway would choke
//! on without trying to understand the routing language itself. Findings
//! never block local editing, only the remote save.

/// What is structurally wrong with a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleIssueKind {
    UnbalancedParens,
    MissingArrowAfterList,
    MissingAction,
    ControlCharacters,
}

impl std::fmt::Display for RuleIssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleIssueKind::UnbalancedParens => write!(f, "unbalanced parentheses"),
            RuleIssueKind::MissingArrowAfterList => write!(f, "expected ')->' after domain/ip list"),
            RuleIssueKind::MissingAction => write!(f, "missing action after '->'"),
            RuleIssueKind::ControlCharacters => write!(f, "contains control characters"),
        }
    }
}

/// A structural problem found on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleIssue {
    /// 1-based line number, matching what an editor shows.
    pub line: usize,
    pub kind: RuleIssueKind,
}

impl std::fmt::Display for RuleIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

/// Outcome of validating a whole document or edited block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<RuleIssue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// All findings joined for a one-line status message.
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Check every line of `text` for structural problems.
pub fn validate(text: &str) -> ValidationReport {
    let mut issues = Vec::new();

    for (idx, raw) in text.split('\n').enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let number = idx + 1;

        let open = line.bytes().filter(|&b| b == b'(').count();
        let close = line.bytes().filter(|&b| b == b')').count();
        if open != close {
            issues.push(RuleIssue { line: number, kind: RuleIssueKind::UnbalancedParens });
        }

        if has_list_call(line) && !has_arrow_after_paren(line) {
            issues.push(RuleIssue { line: number, kind: RuleIssueKind::MissingArrowAfterList });
        }

        if let Some(pos) = line.find("->") {
            if line[pos + 2..].trim().is_empty() {
                issues.push(RuleIssue { line: number, kind: RuleIssueKind::MissingAction });
            }
        }

        if line.bytes().any(is_control_byte) {
            issues.push(RuleIssue { line: number, kind: RuleIssueKind::ControlCharacters });
        }
    }

    ValidationReport { issues }
}

/// Control bytes that can never appear in a rule. Tab, LF and CR stay legal.
fn is_control_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F)
}

/// Does the line invoke a `domain(...)` or `ip(...)` list? The keyword must
/// stand on its own: `subdomain(` is not a list call.
fn has_list_call(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    for keyword in ["domain", "ip"] {
        let mut from = 0;
        while let Some(rel) = lower[from..].find(keyword) {
            let at = from + rel;
            let boundary_ok = at == 0
                || !lower.as_bytes()[at - 1].is_ascii_alphanumeric() && lower.as_bytes()[at - 1] != b'_';
            let after = lower[at + keyword.len()..].trim_start();
            if boundary_ok && after.starts_with('(') {
                return true;
            }
            from = at + keyword.len();
        }
    }
    false
}

/// Is there a `)` followed (possibly after spaces) by `->` anywhere?
fn has_arrow_after_paren(line: &str) -> bool {
    let mut from = 0;
    while let Some(rel) = line[from..].find(')') {
        let at = from + rel;
        if line[at + 1..].trim_start().starts_with("->") {
            return true;
        }
        from = at + 1;
    }
    false
}
