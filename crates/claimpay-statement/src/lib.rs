//! Bank statement parsing for Claimpay.
//!
//! Converts raw statement files (CSV, simplified MT940) into a normalized
//! sequence of credit [`Transaction`]s. Parsing is deliberately tolerant:
//! malformed rows and tag lines are skipped, never fatal — bad data in one
//! row must not abort the whole file.

pub mod csv;
pub mod error;
pub mod mt940;

pub use claimpay_core::engine::Transaction;
pub use error::{Error, Result};

use std::path::Path;

/// The statement formats we understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
  Csv,
  Mt940,
}

impl StatementKind {
  /// Infer the kind from a file extension: `.csv`, or `.mt940` / `.sta`
  /// for SWIFT statements. Anything else is not a statement file.
  pub fn from_path(path: &Path) -> Option<Self> {
    match path
      .extension()
      .and_then(|e| e.to_str())
      .map(str::to_ascii_lowercase)
      .as_deref()
    {
      Some("csv") => Some(Self::Csv),
      Some("mt940") | Some("sta") => Some(Self::Mt940),
      _ => None,
    }
  }
}

/// Parse raw statement content of the given kind.
/// Only positive-amount (credit) entries are yielded.
pub fn parse(kind: StatementKind, content: &str) -> Vec<Transaction> {
  match kind {
    StatementKind::Csv => csv::parse_csv(content),
    StatementKind::Mt940 => mt940::parse_mt940(content),
  }
}

/// Read and parse a statement file. Fails only on file-level problems;
/// malformed rows inside the file are skipped by the parsers.
pub fn read_statement(path: &Path, kind: StatementKind) -> Result<Vec<Transaction>> {
  let bytes = std::fs::read(path)?;
  let content = String::from_utf8(bytes).map_err(|_| Error::Encoding)?;
  Ok(parse(kind, &content))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn kind_from_extension() {
    assert_eq!(
      StatementKind::from_path(&PathBuf::from("jan.csv")),
      Some(StatementKind::Csv)
    );
    assert_eq!(
      StatementKind::from_path(&PathBuf::from("jan.MT940")),
      Some(StatementKind::Mt940)
    );
    assert_eq!(
      StatementKind::from_path(&PathBuf::from("jan.sta")),
      Some(StatementKind::Mt940)
    );
    assert_eq!(StatementKind::from_path(&PathBuf::from("notes.txt")), None);
    assert_eq!(StatementKind::from_path(&PathBuf::from("noext")), None);
  }
}
