//! Host matching against individual rule lines

/// Prefixes a `domain(...)` token may carry before the actual name.
const TOKEN_PREFIXES: [&str; 2] = ["geosite:", "domain:"];

/// Does this rule line concern the given host?
///
/// Comment lines never match, so block markers cannot match themselves.
/// Matching is case-insensitive. A line matches if it mentions the host
/// anywhere, or if a `domain(...)` list contains a token equal to the host,
/// a subdomain of it, a parent domain of it, or one that merely contains it.
/// The bare-substring checks are deliberately loose; see DESIGN.md.
pub fn matches_host(line: &str, host: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || host.is_empty() {
        return false;
    }

    let line = trimmed.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    if line.contains(&host) {
        return true;
    }

    match domain_list(&line) {
        Some(inner) => inner
            .split(',')
            .map(strip_token_prefix)
            .any(|token| token_matches(token, &host)),
        None => false,
    }
}

/// Extract the inside of the first `domain(...)` call, if any.
fn domain_list(line: &str) -> Option<&str> {
    let start = line.find("domain(")? + "domain(".len();
    let rest = &line[start..];
    let end = rest.find(')')?;
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

fn strip_token_prefix(token: &str) -> &str {
    let token = token.trim();
    for prefix in TOKEN_PREFIXES {
        if let Some(rest) = token.strip_prefix(prefix) {
            return rest.trim();
        }
    }
    token
}

fn token_matches(token: &str, host: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    token == host
        || token.ends_with(&format!(".{host}"))
        || host.ends_with(&format!(".{token}"))
        || token.contains(host)
}
