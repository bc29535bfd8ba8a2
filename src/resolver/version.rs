//! Normalization of free-form version strings into framework versions.
//!
//! Build tools and manifests use loose version syntax (`1.2-SNAPSHOT`,
//! `2`, `3.0.0.RELEASE`, `r09`). Framework version matching needs
//! `major.minor.micro[.qualifier]` with numeric fields and a restricted
//! qualifier alphabet.

use regex::Regex;
use std::sync::OnceLock;

/// Loose `major[.minor[.micro]][<sep>qualifier]` pattern.
///
/// - Group 1: major
/// - Group 2: minor
/// - Group 3: micro
/// - Group 4: qualifier, after any single non-alphanumeric separator
fn fuzzy_version() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^([0-9]+)(?:\.([0-9]+)(?:\.([0-9]+))?)?(?:[^a-zA-Z0-9](.*))?$").unwrap()
    })
}

/// Converts any version string into a canonical framework version.
///
/// Missing minor and micro fields become `0`. A qualifier is only emitted
/// when the input has one. Input that does not start with a number becomes
/// the qualifier of `0.0.0`.
///
/// # Example
///
/// ```
/// use bundlescan::resolver::normalize;
///
/// assert_eq!(normalize("1.2.3-beta"), "1.2.3.beta");
/// assert_eq!(normalize("2"), "2.0.0");
/// assert_eq!(normalize("1.0-SNAPSHOT"), "1.0.0.SNAPSHOT");
/// assert_eq!(normalize("r09"), "0.0.0.r09");
/// ```
pub fn normalize(raw: &str) -> String {
    let Some(captures) = fuzzy_version().captures(raw) else {
        let mut result = String::from("0.0.0.");
        push_qualifier(&mut result, raw);
        return result;
    };

    let field = |index: usize| captures.get(index).map(|m| m.as_str());
    let major = field(1).unwrap_or("0");
    let minor = field(2).unwrap_or("0");
    let micro = field(3).unwrap_or("0");

    let mut result = format!("{}.{}.{}", major, minor, micro);
    if let Some(qualifier) = field(4) {
        result.push('.');
        push_qualifier(&mut result, qualifier);
    }
    result
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
fn push_qualifier(result: &mut String, qualifier: &str) {
    result.extend(qualifier.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            '_'
        }
    }));
}

/// Returns true if `version` already has the canonical shape.
pub fn is_canonical(version: &str) -> bool {
    let mut fields = version.splitn(4, '.');
    let numeric = |field: Option<&str>| {
        field.is_some_and(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
    };
    if !(numeric(fields.next()) && numeric(fields.next()) && numeric(fields.next())) {
        return false;
    }
    match fields.next() {
        Some(qualifier) => qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_version_with_qualifier() {
        assert_eq!(normalize("1.2.3-beta"), "1.2.3.beta");
        assert_eq!(normalize("3.0.0.RELEASE"), "3.0.0.RELEASE");
    }

    #[test]
    fn test_missing_fields_are_zero_filled() {
        assert_eq!(normalize("2"), "2.0.0");
        assert_eq!(normalize("1.2"), "1.2.0");
        assert_eq!(normalize("1.2.3"), "1.2.3");
    }

    #[test]
    fn test_qualifier_fills_skipped_fields() {
        assert_eq!(normalize("1-SNAPSHOT"), "1.0.0.SNAPSHOT");
        assert_eq!(normalize("1.2-SNAPSHOT"), "1.2.0.SNAPSHOT");
    }

    #[test]
    fn test_extra_fields_become_qualifier() {
        assert_eq!(normalize("1.2.3.4.5"), "1.2.3.4_5");
        assert_eq!(normalize("1.2.3 build 7"), "1.2.3.build_7");
    }

    #[test]
    fn test_backtracks_when_minor_is_not_numeric() {
        assert_eq!(normalize("1.2a"), "1.0.0.2a");
    }

    #[test]
    fn test_non_numeric_input() {
        assert_eq!(normalize(""), "0.0.0.");
        assert_eq!(normalize("r09"), "0.0.0.r09");
        assert_eq!(normalize("1a"), "0.0.0.1a");
        assert_eq!(normalize("latest.release"), "0.0.0.latest_release");
    }

    #[test]
    fn test_empty_qualifier_after_separator() {
        assert_eq!(normalize("1.2.3-"), "1.2.3.");
    }

    #[test]
    fn test_sanitizes_one_for_one() {
        assert_eq!(normalize("1.0.0-a+b/c"), "1.0.0.a_b_c");
        assert_eq!(normalize("v1.é"), "0.0.0.v1__");
    }

    #[test]
    fn test_multiline_input_is_total() {
        assert_eq!(normalize("1.0\nfoo"), "1.0.0.foo");
        assert_eq!(normalize("\n"), "0.0.0._");
    }

    #[test]
    fn test_only_ascii_digits_are_numeric() {
        assert_eq!(normalize("١٢"), "0.0.0.__");
    }

    #[test]
    fn test_outputs_are_canonical() {
        let inputs = [
            "1", "1.2", "1.2.3", "1.2.3-beta", "1.2.3.4.5", "x", "1.0 final", "9-", "007",
            "1..2", "..", "1.2.3_rc-1", "2.0.0.M1", "\t", "1.2.3.",
        ];
        for input in inputs {
            let output = normalize(input);
            assert!(is_canonical(&output), "{input:?} -> {output:?}");
        }
    }

    #[test]
    fn test_numeric_triplet_is_stable() {
        for input in ["1", "1.2", "1.2.3", "4.5-x", "junk"] {
            let once = normalize(input);
            let triplet: String = once.splitn(4, '.').take(3).collect::<Vec<_>>().join(".");
            assert_eq!(normalize(&triplet), triplet);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_is_canonical_rejects_loose_versions() {
        assert!(is_canonical("1.0.0"));
        assert!(is_canonical("1.0.0.beta-1"));
        assert!(!is_canonical("1.0"));
        assert!(!is_canonical("1.0.0.a.b"));
        assert!(!is_canonical("a.0.0"));
    }
}
