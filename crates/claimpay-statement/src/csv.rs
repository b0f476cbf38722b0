//! Header-driven CSV statement parser.
//!
//! Expected columns (case-insensitive): `Date, Description, Credit, Debit,
//! Reference`. Only rows with a positive `Credit` value become transactions;
//! debit-only rows and malformed rows are dropped silently.

use claimpay_core::engine::Transaction;

// ─── Field splitting ─────────────────────────────────────────────────────────

/// Split one CSV record on `,` while respecting double-quoted fields, and
/// strip the surrounding quotes (unescaping doubled `""`).
fn split_fields(line: &str) -> Vec<String> {
  let mut fields = Vec::new();
  let mut current = String::new();
  let mut in_quotes = false;
  let mut chars = line.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '"' if in_quotes && chars.peek() == Some(&'"') => {
        chars.next();
        current.push('"');
      }
      '"' => in_quotes = !in_quotes,
      ',' if !in_quotes => {
        fields.push(std::mem::take(&mut current));
      }
      _ => current.push(c),
    }
  }
  fields.push(current);
  fields
}

// ─── Header mapping ──────────────────────────────────────────────────────────

struct Columns {
  date:        Option<usize>,
  description: Option<usize>,
  credit:      usize,
  reference:   Option<usize>,
}

impl Columns {
  /// Locate the columns we care about. Returns `None` when no `Credit`
  /// column exists — without it the file cannot yield transactions.
  fn from_header(header: &[String]) -> Option<Self> {
    let find = |name: &str| {
      header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    Some(Self {
      date:        find("date"),
      description: find("description"),
      credit:      find("credit")?,
      reference:   find("reference"),
    })
  }
}

// ─── Amounts ─────────────────────────────────────────────────────────────────

/// Normalize an amount string by stripping thousands separators and spaces:
/// `"1,000.50"` parses to `1000.50`. Empty or non-numeric input is `None`.
fn parse_amount(raw: &str) -> Option<f64> {
  let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != ' ').collect();
  if cleaned.is_empty() {
    return None;
  }
  cleaned.parse().ok()
}

// ─── Parser ──────────────────────────────────────────────────────────────────

/// Parse CSV statement content into credit transactions.
pub fn parse_csv(content: &str) -> Vec<Transaction> {
  let mut lines = content
    .lines()
    .map(|l| l.strip_suffix('\r').unwrap_or(l))
    .filter(|l| !l.trim().is_empty());

  let Some(header_line) = lines.next() else {
    return Vec::new();
  };
  let Some(columns) = Columns::from_header(&split_fields(header_line)) else {
    tracing::warn!("CSV statement has no Credit column, skipping file");
    return Vec::new();
  };

  let mut transactions = Vec::new();
  for line in lines {
    let fields = split_fields(line);

    let Some(credit_raw) = fields.get(columns.credit) else {
      continue;
    };
    let Some(amount) = parse_amount(credit_raw) else {
      continue;
    };
    if amount <= 0.0 {
      continue;
    }

    let field_at = |idx: Option<usize>| {
      idx
        .and_then(|i| fields.get(i))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
    };

    transactions.push(Transaction {
      date:        field_at(columns.date),
      description: field_at(columns.description),
      amount,
      reference:   field_at(columns.reference),
    });
  }

  transactions
}
