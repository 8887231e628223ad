//! Locating, merging and rewriting a host's contribution to the document

use super::matcher::matches_host;

/// Error type for the document-level rule edits.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("rule already exists")]
    DuplicateRule,
}

/// Opening marker of a host's managed block.
pub fn start_marker(host: &str) -> String {
    format!("# domain - web extension config: {host}")
}

/// Closing marker of a host's managed block.
pub fn end_marker(host: &str) -> String {
    format!("# end domain - web extension config: {host}")
}

/// The canonical proxy rule written for a bare host.
pub fn proxy_rule(host: &str) -> String {
    format!("domain({host})->proxy")
}

fn is_marker(line: &str, marker: &str) -> bool {
    line.trim().eq_ignore_ascii_case(marker)
}

// =============================================================================
// Host View
// =============================================================================

/// A host's merged contribution to the document, as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostView {
    /// Block-content lines first (original order), then legacy matches in
    /// document order, deduplicated by exact string equality.
    pub lines: Vec<String>,
    /// Whether a marker block for the host existed in the document.
    pub block_found: bool,
}

impl HostView {
    /// The text placed into the editing surface.
    pub fn display_text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Collect everything the document currently says about `host`: the content
/// of its marker block plus every other line that matches the host.
pub fn load_host_view(text: &str, host: &str) -> HostView {
    let all_lines: Vec<&str> = text.split('\n').collect();
    let start = start_marker(host);
    let end = end_marker(host);

    let mut block_lines: Vec<&str> = Vec::new();
    let mut block_found = false;
    if let Some(start_idx) = all_lines.iter().position(|l| is_marker(l, &start)) {
        let rest = &all_lines[start_idx + 1..];
        if let Some(end_rel) = rest.iter().position(|l| is_marker(l, &end)) {
            block_lines = rest[..end_rel].to_vec();
            block_found = true;
        }
    }

    let mut lines: Vec<String> = Vec::new();
    for line in block_lines
        .iter()
        .copied()
        .chain(all_lines.iter().copied().filter(|l| matches_host(l, host)))
    {
        if !lines.iter().any(|seen| seen == line) {
            lines.push(line.to_string());
        }
    }

    HostView { lines, block_found }
}

// =============================================================================
// Save
// =============================================================================

/// Rewrite the full document so that `edited` becomes the host's entire
/// contribution.
///
/// The host's existing marker block (markers included) and every remaining
/// line matching the host are dropped; all other lines keep their bytes and
/// their order. A non-empty edit is appended as a fresh marker block wrapping
/// the given lines verbatim; an empty edit leaves no block behind at all.
/// Loading the result again reproduces the same displayed view.
pub fn compute_save_text(text: &str, host: &str, edited: &[String]) -> String {
    let all_lines: Vec<&str> = text.split('\n').collect();
    let start = start_marker(host);
    let end = end_marker(host);

    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < all_lines.len() {
        let line = all_lines[i];
        if is_marker(line, &start) {
            // Skip to the matching end marker (or the document end if the
            // block was left unterminated).
            let mut j = i + 1;
            while j < all_lines.len() && !is_marker(all_lines[j], &end) {
                j += 1;
            }
            i = j + 1;
            continue;
        }
        if matches_host(line, host) {
            i += 1;
            continue;
        }
        remaining.push(line);
        i += 1;
    }

    let has_content = edited.iter().any(|l| !l.trim().is_empty());
    if !has_content {
        return remaining.join("\n");
    }

    let mut out: Vec<&str> = remaining;
    out.push(&start);
    out.extend(edited.iter().map(String::as_str));
    out.push(&end);
    out.join("\n")
}

/// Normalize an edited block before saving: trim each line, drop blanks and
/// exact duplicates while keeping first-occurrence order.
pub fn normalize_block(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !lines.iter().any(|seen| seen == line) {
            lines.push(line.to_string());
        }
    }
    lines
}

// =============================================================================
// Whole-document edits
// =============================================================================

/// Insert the canonical proxy rule for `host` right after the document's
/// first line, so the default route stays on top.
pub fn append_rule(text: &str, host: &str) -> Result<String, ReconcileError> {
    let rule = proxy_rule(host);
    if text.split('\n').any(|l| l.trim() == rule) {
        return Err(ReconcileError::DuplicateRule);
    }

    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.len() == 1 && lines[0].is_empty() {
        return Ok(rule);
    }
    let at = 1.min(lines.len());
    lines.insert(at, &rule);
    Ok(lines.join("\n"))
}

/// Drop every line that is exactly the canonical proxy rule for `host`.
pub fn remove_rule(text: &str, host: &str) -> String {
    let rule = proxy_rule(host);
    text.split('\n')
        .filter(|l| l.trim() != rule)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop one line by zero-based index. Out-of-range indices leave the
/// document unchanged.
pub fn remove_line_at(text: &str, idx: usize) -> String {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if idx < lines.len() {
        lines.remove(idx);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "example.com";

    fn doc(lines: &[&str]) -> String {
        lines.join("\n")
    }

    #[test]
    fn test_load_view_merges_block_and_legacy_lines() {
        let text = doc(&[
            "default: proxy",
            "domain(example.com)->direct", // legacy line outside the block
            "# domain - web extension config: example.com",
            "domain(sub.example.com)->proxy",
            "# end domain - web extension config: example.com",
            "domain(other.org)->proxy",
        ]);
        let view = load_host_view(&text, HOST);
        assert!(view.block_found);
        assert_eq!(
            view.lines,
            vec!["domain(sub.example.com)->proxy", "domain(example.com)->direct"]
        );
    }

    #[test]
    fn test_load_view_dedupes_block_line_matched_twice() {
        let text = doc(&[
            "# domain - web extension config: example.com",
            "domain(example.com)->proxy",
            "# end domain - web extension config: example.com",
        ]);
        let view = load_host_view(&text, HOST);
        assert_eq!(view.lines, vec!["domain(example.com)->proxy"]);
    }

    #[test]
    fn test_load_view_without_block() {
        let text = doc(&["default: direct", "domain(example.com)->proxy"]);
        let view = load_host_view(&text, HOST);
        assert!(!view.block_found);
        assert_eq!(view.lines, vec!["domain(example.com)->proxy"]);
    }

    #[test]
    fn test_save_replaces_only_the_hosts_contribution() {
        let text = doc(&[
            "default: proxy",
            "  domain(other.org)->direct  ", // whitespace must survive untouched
            "domain(example.com)->direct",
            "# domain - web extension config: example.com",
            "domain(sub.example.com)->proxy",
            "# end domain - web extension config: example.com",
            "",
            "ip(10.0.0.0/8)->direct",
        ]);
        let edited = vec!["domain(example.com)->proxy".to_string()];
        let saved = compute_save_text(&text, HOST, &edited);
        assert_eq!(
            saved,
            doc(&[
                "default: proxy",
                "  domain(other.org)->direct  ",
                "",
                "ip(10.0.0.0/8)->direct",
                "# domain - web extension config: example.com",
                "domain(example.com)->proxy",
                "# end domain - web extension config: example.com",
            ])
        );
    }

    #[test]
    fn test_save_is_idempotent() {
        let text = doc(&[
            "default: proxy",
            "domain(example.com)->direct",
            "domain(other.org)->proxy",
        ]);
        let view = load_host_view(&text, HOST);
        let edited = normalize_block(&view.display_text());

        let once = compute_save_text(&text, HOST, &edited);
        let view_again = load_host_view(&once, HOST);
        assert_eq!(normalize_block(&view_again.display_text()), edited);

        let twice = compute_save_text(&once, HOST, &edited);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_edit_removes_block_and_keeps_the_rest() {
        let text = doc(&[
            "default: proxy",
            "# domain - web extension config: example.com",
            "domain(example.com)->proxy",
            "# end domain - web extension config: example.com",
            "domain(other.org)->proxy",
        ]);
        let saved = compute_save_text(&text, HOST, &[]);
        assert_eq!(saved, doc(&["default: proxy", "domain(other.org)->proxy"]));

        // Blank-only edits count as empty too.
        let saved = compute_save_text(&text, HOST, &["   ".to_string(), String::new()]);
        assert_eq!(saved, doc(&["default: proxy", "domain(other.org)->proxy"]));
    }

    #[test]
    fn test_markers_match_case_insensitively() {
        let text = doc(&[
            "# DOMAIN - Web Extension Config: EXAMPLE.COM",
            "domain(example.com)->proxy",
            "# End Domain - web extension config: Example.Com",
        ]);
        let view = load_host_view(&text, HOST);
        assert!(view.block_found);
        assert_eq!(view.lines, vec!["domain(example.com)->proxy"]);

        let saved = compute_save_text(&text, HOST, &[]);
        assert_eq!(saved, "");
    }

    #[test]
    fn test_unterminated_block_swallows_to_document_end() {
        let text = doc(&[
            "default: proxy",
            "# domain - web extension config: example.com",
            "domain(example.com)->proxy",
        ]);
        let saved = compute_save_text(&text, HOST, &[]);
        assert_eq!(saved, "default: proxy");
    }

    #[test]
    fn test_normalize_block() {
        let normalized = normalize_block("  a->proxy \n\n a->proxy\nb->direct\n   ");
        assert_eq!(normalized, vec!["a->proxy", "b->direct"]);
    }

    #[test]
    fn test_append_rule_after_first_line() {
        let text = doc(&["default: proxy", "domain(other.org)->proxy"]);
        let out = append_rule(&text, HOST).unwrap();
        assert_eq!(
            out,
            doc(&["default: proxy", "domain(example.com)->proxy", "domain(other.org)->proxy"])
        );
    }

    #[test]
    fn test_append_rule_rejects_duplicate() {
        let text = doc(&["default: proxy", "domain(example.com)->proxy"]);
        assert_eq!(append_rule(&text, HOST), Err(ReconcileError::DuplicateRule));
    }

    #[test]
    fn test_append_rule_into_empty_document() {
        assert_eq!(append_rule("", HOST).unwrap(), "domain(example.com)->proxy");
    }

    #[test]
    fn test_remove_rule_and_line_at() {
        let text = doc(&["default: proxy", "domain(example.com)->proxy", "x->direct"]);
        assert_eq!(remove_rule(&text, HOST), doc(&["default: proxy", "x->direct"]));
        assert_eq!(remove_line_at(&text, 2), doc(&["default: proxy", "domain(example.com)->proxy"]));
        assert_eq!(remove_line_at(&text, 9), text);
    }
}
