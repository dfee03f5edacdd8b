//! Issue type canonicalization.
//!
//! Detectors disagree on naming conventions: one reports
//! `"Duplicate Charge"`, another `"duplicate_charge"`, a third
//! `"duplicate-charge"`. Matching runs on canonical forms so those all
//! land in the same slot.

/// Canonicalize a raw issue type string.
///
/// Lowercases, collapses every run of non-alphanumeric characters into a
/// single underscore, and strips leading/trailing underscores. Pure and
/// deterministic; an input with no alphanumeric characters canonicalizes
/// to the empty string, which the evaluator treats as malformed.
///
/// # Example
///
/// ```
/// use benchvault::eval::canonical_type;
///
/// assert_eq!(canonical_type("Duplicate Charge"), "duplicate_charge");
/// assert_eq!(canonical_type("  duplicate--charge  "), "duplicate_charge");
/// assert_eq!(canonical_type("UNBUNDLING"), "unbundling");
/// ```
#[must_use]
pub fn canonical_type(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    // Lowercase first: one uppercase char can lowercase to several chars,
    // and each of those must go through the separator logic itself.
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }

    out
}

/// Whether two raw issue type strings name the same finding.
#[must_use]
pub fn types_match(a: &str, b: &str) -> bool {
    canonical_type(a) == canonical_type(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casing_and_spacing_collapse() {
        assert_eq!(canonical_type("Duplicate Charge"), "duplicate_charge");
        assert_eq!(canonical_type("duplicate_charge"), "duplicate_charge");
        assert_eq!(canonical_type("Duplicate-Charge"), "duplicate_charge");
        assert_eq!(canonical_type("DUPLICATE  CHARGE"), "duplicate_charge");
    }

    #[test]
    fn punctuation_runs_become_one_underscore() {
        assert_eq!(canonical_type("upcoding (E/M)"), "upcoding_e_m");
        assert_eq!(canonical_type("balance--billing!!"), "balance_billing");
    }

    #[test]
    fn leading_and_trailing_separators_are_stripped() {
        assert_eq!(canonical_type("  duplicate charge  "), "duplicate_charge");
        assert_eq!(canonical_type("__duplicate__"), "duplicate");
    }

    #[test]
    fn digits_are_preserved() {
        assert_eq!(canonical_type("CPT 99213 mismatch"), "cpt_99213_mismatch");
    }

    #[test]
    fn empty_and_symbol_only_inputs_canonicalize_to_empty() {
        assert_eq!(canonical_type(""), "");
        assert_eq!(canonical_type("---"), "");
        assert_eq!(canonical_type("  !? "), "");
    }

    #[test]
    fn idempotent() {
        let once = canonical_type("Duplicate Charge");
        assert_eq!(canonical_type(&once), once);
    }

    #[test]
    fn types_match_is_symmetric() {
        assert!(types_match("Duplicate Charge", "duplicate_charge"));
        assert!(types_match("duplicate_charge", "Duplicate Charge"));
        assert!(!types_match("duplicate_charge", "excessive_charge"));
    }
}
