//! Reference matcher — extracts a claim id from free-text bank references.
//!
//! Matching is an ordered rule list, first hit wins. Application-formatted
//! references (`FC-…-COMPENSATION`, `AESA-…`) are tried before the generic
//! 8-hex-character fallback; the ordering is a deliberate precedence rule,
//! kept as data so rules can be tested and extended independently.

use std::sync::LazyLock;

use regex::Regex;

/// One prioritised extraction rule.
pub struct MatchRule {
  pub name:    &'static str,
  pub pattern: Regex,
}

impl MatchRule {
  fn new(name: &'static str, pattern: &str) -> Self {
    Self {
      name,
      // Patterns are compile-time constants; a failure here is a programmer
      // error caught by the unit tests below.
      pattern: Regex::new(pattern).expect("invalid match rule pattern"),
    }
  }
}

/// The rule list, in precedence order.
pub static MATCH_RULES: LazyLock<Vec<MatchRule>> = LazyLock::new(|| {
  vec![
    MatchRule::new("fc-compensation", r"FC-([A-Z0-9]+)-COMPENSATION"),
    MatchRule::new("aesa-year", r"AESA-\d{4}-([A-Z0-9]+)"),
    MatchRule::new("claim-prefix", r"CLAIM([A-Z0-9]+)"),
    // Bare UUID prefix, e.g. the first 8 hex chars of a claim id.
    MatchRule::new("hex-prefix", r"([A-F0-9]{8})"),
  ]
});

/// Extract a claim id from `reference`, case-insensitively.
/// Returns `None` when no rule fires.
pub fn match_claim_reference(reference: &str) -> Option<String> {
  let upper = reference.to_uppercase();
  for rule in MATCH_RULES.iter() {
    if let Some(caps) = rule.pattern.captures(&upper) {
      let id = caps
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_else(|| caps.get(0).map(|m| m.as_str()).unwrap_or_default());
      if !id.is_empty() {
        return Some(id.to_string());
      }
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fc_compensation_reference() {
    assert_eq!(
      match_claim_reference("FC-ABC123-COMPENSATION"),
      Some("ABC123".to_string())
    );
  }

  #[test]
  fn aesa_year_reference() {
    assert_eq!(
      match_claim_reference("AESA-2024-XYZ9"),
      Some("XYZ9".to_string())
    );
  }

  #[test]
  fn claim_prefix_reference() {
    assert_eq!(
      match_claim_reference("payment for CLAIM77A"),
      Some("77A".to_string())
    );
  }

  #[test]
  fn hex_fallback_fires_last() {
    assert_eq!(
      match_claim_reference("random text 4F3A9B2C"),
      Some("4F3A9B2C".to_string())
    );
  }

  #[test]
  fn matching_is_case_insensitive() {
    assert_eq!(
      match_claim_reference("fc-abc123-compensation"),
      Some("ABC123".to_string())
    );
  }

  #[test]
  fn specific_rules_win_over_fallback() {
    // AESA reference whose claim id is itself 8 hex chars: the AESA rule
    // must capture it, not the hex fallback scanning the year digits.
    assert_eq!(
      match_claim_reference("AESA-2024-ABCD1234"),
      Some("ABCD1234".to_string())
    );
  }

  #[test]
  fn no_pattern_yields_none() {
    assert_eq!(match_claim_reference("no pattern here"), None);
    assert_eq!(match_claim_reference(""), None);
  }

  #[test]
  fn hyphenated_ids_never_span_a_rule() {
    // Claim ids are alphanumeric; a hyphenated infix must not be stitched
    // together into a match.
    assert_eq!(match_claim_reference("FC-2024-001-COMPENSATION"), None);
  }
}
