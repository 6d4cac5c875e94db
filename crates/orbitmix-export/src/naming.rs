//! Recording file names.

use chrono::{DateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;

/// Prefix of generated recording names.
pub const DEFAULT_FILE_PREFIX: &str = "bulka_";

/// Longest sanitized basename, in characters.
pub const MAX_BASENAME_CHARS: usize = 100;

/// Length of the timestamp part of a generated basename (`YYYY-MM-DDTHH-MM-SS`).
const TIMESTAMP_CHARS: usize = 19;

lazy_static! {
    static ref TITLE_DIRECTIVE: Regex = Regex::new(r"//\s*@title\s+(.+?)(?:\n|$)")
        .unwrap_or_else(|e| panic!("invalid title pattern: {e}"));
}

/// Basename for a recording saved without an explicit name.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use orbitmix_export::default_basename;
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 9, 21, 5, 7).unwrap();
/// assert_eq!(default_basename("bulka_", at), "bulka_2024-03-09T21-05-07");
/// ```
pub fn default_basename(prefix: &str, timestamp: DateTime<Utc>) -> String {
    let stamp: String = timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
        .chars()
        .take(TIMESTAMP_CHARS)
        .collect();
    format!("{prefix}{stamp}")
}

pub fn wav_file_name(basename: &str) -> String {
    format!("{basename}.wav")
}

/// Title declared by a `// @title <name>` line in pattern source.
pub fn extract_title(code: &str) -> Option<String> {
    let title = TITLE_DIRECTIVE.captures(code)?.get(1)?.as_str().trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Replace characters that are invalid in file names with `_` and cap the length.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .take(MAX_BASENAME_CHARS)
        .collect()
}

/// Basename derived from the pattern's declared title, if it has one.
pub fn basename_from_code(code: &str) -> Option<String> {
    extract_title(code).map(|title| sanitize_filename(&title))
}

/// Elapsed recording time as `MM:SS`.
pub fn format_elapsed(elapsed_ms: u64) -> String {
    let total_seconds = elapsed_ms / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_basename_drops_millis() {
        let at = Utc
            .with_ymd_and_hms(2025, 12, 31, 23, 59, 58)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(456))
            .unwrap();
        let name = default_basename(DEFAULT_FILE_PREFIX, at);

        assert_eq!(name, "bulka_2025-12-31T23-59-58");
        assert_eq!(wav_file_name(&name), "bulka_2025-12-31T23-59-58.wav");
    }

    #[test]
    fn test_extract_title() {
        let code = "// @title  Night Drive \nsound(\"bd\")";
        assert_eq!(extract_title(code).as_deref(), Some("Night Drive"));
        assert_eq!(extract_title("//@title last line").as_deref(), Some("last line"));
        assert_eq!(extract_title("sound(\"bd\")"), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b:c*d?"), "a_b_c_d_");
        assert_eq!(sanitize_filename(&"x".repeat(150)).len(), MAX_BASENAME_CHARS);
    }

    #[test]
    fn test_basename_from_code() {
        let code = "// @title drums: take 2\n";
        assert_eq!(basename_from_code(code).as_deref(), Some("drums_ take 2"));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(65_432), "01:05");
        assert_eq!(format_elapsed(3_600_000), "60:00");
    }
}
