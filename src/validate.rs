//! Field validators
//!
//! Pure, total predicates over raw user text. A `false` result means the
//! calling state re-prompts; nothing here can fail or panic.

use regex::Regex;
use std::sync::LazyLock;

/// Longest display name we accept
pub const MAX_NAME_CHARS: usize = 64;

// local@domain.tld: the part after the last `@` needs a dot with a non-empty
// label on each side, and no whitespace anywhere.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S+@[^@\s]+\.[^@\s.]+$").expect("email pattern is valid")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 \-]{7,}$").expect("phone pattern is valid"));

pub fn is_valid_email(text: &str) -> bool {
    EMAIL_RE.is_match(text.trim())
}

/// Optional leading `+`, then at least seven digits, spaces or hyphens.
pub fn is_valid_phone(text: &str) -> bool {
    PHONE_RE.is_match(text.trim())
}

/// Non-empty after trimming, bounded length, and not something that looks
/// like a command token.
pub fn is_valid_name(text: &str) -> bool {
    let name = text.trim();
    !name.is_empty() && name.chars().count() <= MAX_NAME_CHARS && !name.starts_with('/')
}
