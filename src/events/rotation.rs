//! Rotated log file naming.
//!
//! Rotation renames `audit.log` to `audit.log.1`, `audit.log.1` to
//! `audit.log.2` and so on, so a higher numeric suffix means an older file.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches the part of a file name after the base name: empty, or a dot
/// followed by a rotation number.
pub static ROTATION_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\.\d+)?$").expect("invalid rotation suffix pattern"));

static DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").expect("invalid digits pattern"));

/// Return true if `name` is a rotated log file name (`base.N`).
pub fn is_rotated_file_name(name: &str) -> bool {
    match name.rfind('.') {
        Some(pos) => DIGITS_RE.is_match(&name[pos + 1..]),
        None => false,
    }
}

/// Strip the rotation suffix, if any.
pub fn rotation_base(name: &str) -> &str {
    if is_rotated_file_name(name) {
        &name[..name.rfind('.').expect("rotated names contain a dot")]
    } else {
        name
    }
}

/// Sort log file names in time order, newest last.
///
/// The unsuffixed file sorts first within its base name, then rotated
/// files by descending rotation number: `audit.log`, `audit.log.10`,
/// `audit.log.2`, `audit.log.1`.
pub fn sorted_log_files<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
    names.sort_by_key(|name| sort_key(name));
    names
}

fn sort_key(name: &str) -> (String, i64) {
    if let Some(pos) = name.rfind('.') {
        let suffix = &name[pos + 1..];
        if DIGITS_RE.is_match(suffix) {
            if let Ok(n) = suffix.parse::<i64>() {
                return (name[..pos].to_string(), -n);
            }
        }
    }
    // The unsuffixed file sorts before any rotation number.
    (name.to_string(), i64::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rotation_suffixes() {
        assert!(is_rotated_file_name("audit.log.12"));
        assert!(!is_rotated_file_name("audit.log"));
        assert!(!is_rotated_file_name("audit.log.bak"));
        assert!(!is_rotated_file_name("nodots"));
    }

    #[test]
    fn base_strips_only_rotation_suffixes() {
        assert_eq!(rotation_base("audit.log.3"), "audit.log");
        assert_eq!(rotation_base("audit.log"), "audit.log");
        assert_eq!(rotation_base("audit.log.bak"), "audit.log.bak");
    }

    #[test]
    fn sorts_unsuffixed_first_then_descending_numbers() {
        let names = ["audit.log.1", "audit.log.10", "audit.log", "audit.log.2"];
        assert_eq!(
            sorted_log_files(names),
            vec!["audit.log", "audit.log.10", "audit.log.2", "audit.log.1"]
        );
    }

    #[test]
    fn different_bases_stay_grouped() {
        let names = ["b.log", "a.log.2", "a.log", "a.log.1"];
        assert_eq!(
            sorted_log_files(names),
            vec!["a.log", "a.log.2", "a.log.1", "b.log"]
        );
    }

    #[test]
    fn suffix_regex_accepts_empty_remainder() {
        assert!(ROTATION_SUFFIX_RE.is_match(""));
        assert!(ROTATION_SUFFIX_RE.is_match(".7"));
        assert!(!ROTATION_SUFFIX_RE.is_match(".bak"));
        assert!(!ROTATION_SUFFIX_RE.is_match("7"));
    }
}
