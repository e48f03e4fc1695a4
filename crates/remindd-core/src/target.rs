//! Delivery-target parsing, validation and normalization.
//!
//! A reminder's target field is a comma-joined list. Each entry is one of:
//! - a direct number: 6–15 digits
//! - a group id: `<digits>-<digits>` with optional `@g.us` suffix
//! - a fully-qualified JID: `<digits>@s.whatsapp.net`, `@g.us` or `@broadcast`

use std::sync::LazyLock;

use regex::Regex;

use crate::error::InvalidTargetError;

static DIRECT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{6,15}$").unwrap());
static GROUP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-\d+(@g\.us)?$").unwrap());
static FULL_JID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+@(s\.whatsapp\.net|g\.us|broadcast)$").unwrap());

/// Split a comma-joined target field into trimmed, de-duplicated entries,
/// preserving first-seen order. Empty entries are dropped.
pub fn split_targets(raw: &str) -> Vec<String> {
    let mut targets = Vec::new();
    for part in raw.split(',') {
        let t = part.trim();
        if t.is_empty() || targets.iter().any(|seen| seen == t) {
            continue;
        }
        targets.push(t.to_string());
    }
    targets
}

pub fn is_valid_target(target: &str) -> bool {
    DIRECT_NUMBER.is_match(target)
        || GROUP_ID.is_match(target)
        || FULL_JID.is_match(target)
}

/// Validate every entry and return the canonical comma-joined form.
///
/// An empty input is valid and stays empty (the dispatch engine falls back
/// to the linked delivery identity). A single malformed entry fails the
/// whole field.
pub fn normalize_targets(raw: &str) -> Result<String, InvalidTargetError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(String::new());
    }

    let targets = split_targets(raw);
    for target in &targets {
        if !is_valid_target(target) {
            return Err(InvalidTargetError {
                target: target.clone(),
            });
        }
    }
    Ok(targets.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_trims_and_dedupes_preserving_order() {
        let got = split_targets(" 15551234567 , 123-456 ,15551234567,, ");
        assert_eq!(got, vec!["15551234567", "123-456"]);
    }

    #[test]
    fn accepts_direct_numbers() {
        assert!(is_valid_target("123456"));
        assert!(is_valid_target("155512345678901"));
        assert!(!is_valid_target("12345")); // too short
        assert!(!is_valid_target("1234567890123456")); // too long
        assert!(!is_valid_target("+15551234567"));
    }

    #[test]
    fn accepts_group_ids_with_optional_suffix() {
        assert!(is_valid_target("12036304-1581234567"));
        assert!(is_valid_target("12036304-1581234567@g.us"));
        assert!(!is_valid_target("12036304-"));
    }

    #[test]
    fn accepts_fully_qualified_jids() {
        assert!(is_valid_target("15551234567@s.whatsapp.net"));
        assert!(is_valid_target("123456789@g.us"));
        assert!(is_valid_target("123@broadcast"));
        assert!(!is_valid_target("alice@s.whatsapp.net"));
    }

    #[test]
    fn empty_input_normalizes_to_empty() {
        assert_eq!(normalize_targets("").unwrap(), "");
        assert_eq!(normalize_targets("  ,  , ").unwrap(), "");
    }

    #[test]
    fn one_bad_entry_fails_the_whole_field() {
        let err = normalize_targets("15551234567,bogus").unwrap_err();
        assert_eq!(err.target, "bogus");
    }

    #[test]
    fn canonical_form_is_comma_joined() {
        let got = normalize_targets(" 15551234567 ,123-456@g.us ").unwrap();
        assert_eq!(got, "15551234567,123-456@g.us");
    }
}
