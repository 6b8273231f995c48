//! DNS-safe name canonicalization.

/// Canonicalize a display name into a DNS label.
///
/// Lowercases, turns underscores into dashes and drops every character
/// outside `[a-z0-9-]`. Two names that differ only in case or punctuation
/// canonicalize to the same label.
pub fn canonicalize(name: &str) -> String {
    name.chars()
        .map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}
