//! Output directory naming for submitted jobs.
//!
//! Each job writes its artifacts into its own directory under the output
//! root. The directory name is derived from the job input and its
//! submission timestamp so that it stays human-readable on disk.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Timestamp;

/// Characters that are not safe in a directory name on every platform.
static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

/// Leading URL scheme (`https://`, `file://`, ...).
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").expect("valid regex"));

/// Maximum length of the sanitized input portion of a directory name.
pub const MAX_STEM_LEN: usize = 64;

/// Stem used when nothing usable remains after sanitizing.
const FALLBACK_STEM: &str = "job";

/// Timestamp layout with microsecond resolution.
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%6f";

/// Reduce an arbitrary job input to a filesystem-safe stem.
///
/// Strips a URL scheme, replaces every run of unsafe characters with a
/// single `_`, trims leading/trailing separators, and caps the length at
/// [`MAX_STEM_LEN`].
///
/// ```
/// use gauntlet_core::naming::sanitize_input;
///
/// assert_eq!(sanitize_input("https://example.com/game"), "example.com_game");
/// assert_eq!(sanitize_input("   "), "job");
/// ```
pub fn sanitize_input(input: &str) -> String {
    let without_scheme = SCHEME_RE.replace(input.trim(), "");
    let replaced = UNSAFE_CHARS_RE.replace_all(&without_scheme, "_");
    let trimmed = replaced.trim_matches(|c| c == '_' || c == '.' || c == '-');

    let stem: String = trimmed.chars().take(MAX_STEM_LEN).collect();
    let stem = stem.trim_end_matches(|c| c == '_' || c == '.' || c == '-');

    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem.to_string()
    }
}

/// Build the directory name for a job submitted at `submitted_at`.
///
/// Convention: `{sanitized_input}_{YYYYMMDD-HHMMSS-micros}`.
pub fn output_dir_name(input: &str, submitted_at: Timestamp) -> String {
    format!(
        "{}_{}",
        sanitize_input(input),
        submitted_at.format(TIMESTAMP_FORMAT)
    )
}

/// Append a numeric suffix to a directory name that is already taken.
///
/// `attempt` starts at 2 so the second job with the same name becomes
/// `{name}-2`.
pub fn disambiguate(name: &str, attempt: u32) -> String {
    format!("{name}-{attempt}")
}
