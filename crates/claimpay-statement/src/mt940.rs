//! Simplified MT940 SWIFT statement parser.
//!
//! Scans for `:61:` statement lines of the form
//! `YYMMDD[MMDD]C<amount>N<3-4 letter code><reference>` and extracts only the
//! credit (`C`) entries. This is a deliberate subset of MT940 — enough for
//! the AESA transfer files we receive, not a general implementation.

use std::sync::LazyLock;

use chrono::NaiveDate;
use claimpay_core::engine::Transaction;
use regex::Regex;

static TAG_61: LazyLock<Regex> = LazyLock::new(|| {
  // The transaction code quantifier is lazy: a greedy {3,4} would swallow
  // the first character of references that start with a capital letter.
  Regex::new(r":61:(\d{6})\d*C([\d,\.]+)N[A-Z]{3,4}?([^\n]+)")
    .expect("invalid MT940 tag pattern")
});

/// Reinterpret a `YYMMDD` value date using the two-digit-year convention
/// (chrono's `%y`: 00-68 → 20xx, 69-99 → 19xx). Falls back to the raw string
/// when the digits are not a real date.
fn format_value_date(raw: &str) -> String {
  match NaiveDate::parse_from_str(raw, "%y%m%d") {
    Ok(d) => d.format("%Y-%m-%d").to_string(),
    Err(_) => raw.to_string(),
  }
}

/// Parse MT940 content into credit transactions.
/// Malformed tag lines are silently skipped; debit (`D`) entries never match
/// the pattern at all.
pub fn parse_mt940(content: &str) -> Vec<Transaction> {
  let mut transactions = Vec::new();

  for caps in TAG_61.captures_iter(content) {
    let date_raw = &caps[1];
    let amount_raw = &caps[2];
    let reference = caps[3].trim();

    // MT940 uses a comma as the decimal separator.
    let Ok(amount) = amount_raw.replace(',', ".").parse::<f64>() else {
      continue;
    };
    if amount <= 0.0 {
      continue;
    }

    transactions.push(Transaction {
      date:        format_value_date(date_raw),
      description: reference.to_string(),
      amount,
      reference:   reference.chars().take(50).collect(),
    });
  }

  transactions
}

#[cfg(test)]
mod tests {
  use super::*;

  const STATEMENT: &str = "\
:20:STMT-2024-001
:25:ES9121000418450200051332
:61:2401150115C400,00NTRFAESA-2024-CLAIM123
:61:2401160116D12,50NCHGBANK FEE
:61:240117C250,00NTRFFC-ABC123-COMPENSATION
:62F:C240117EUR637,50
";

  #[test]
  fn only_credit_entries_are_extracted() {
    let txns = parse_mt940(STATEMENT);
    assert_eq!(txns.len(), 2);
    assert_eq!(txns[0].amount, 400.0);
    assert_eq!(txns[0].reference, "AESA-2024-CLAIM123");
    assert_eq!(txns[1].amount, 250.0);
    assert_eq!(txns[1].reference, "FC-ABC123-COMPENSATION");
  }

  #[test]
  fn value_date_uses_two_digit_year_convention() {
    let txns = parse_mt940(STATEMENT);
    assert_eq!(txns[0].date, "2024-01-15");
    // Line without the optional entry date parses identically.
    assert_eq!(txns[1].date, "2024-01-17");
  }

  #[test]
  fn comma_is_the_decimal_separator() {
    let txns = parse_mt940(":61:240101C1234,56NTRFREF-X\n");
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0].amount, 1234.56);
  }

  #[test]
  fn long_references_are_truncated_to_50_chars() {
    let long_ref = "R".repeat(80);
    let content = format!(":61:240101C100,00NTRF{long_ref}\n");
    let txns = parse_mt940(&content);
    assert_eq!(txns[0].reference.len(), 50);
    assert_eq!(txns[0].description.len(), 80);
  }

  #[test]
  fn malformed_tag_lines_are_skipped() {
    let content = "\
:61:garbageC100,00NTRFREF
:61:240101Cnot-an-amountNTRFREF
:61:240102C75,00NTRFGOOD-REF
";
    let txns = parse_mt940(content);
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0].reference, "GOOD-REF");
  }

  #[test]
  fn empty_content_yields_nothing() {
    assert!(parse_mt940("").is_empty());
  }
}
