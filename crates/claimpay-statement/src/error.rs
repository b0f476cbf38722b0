//! Error type for `claimpay-statement`.
//!
//! Row-level problems never surface as errors — rows are skipped. This type
//! covers file-level failures only (I/O, non-UTF-8 content), which callers
//! report and treat as zero transactions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to read statement file: {0}")]
  Io(#[from] std::io::Error),

  #[error("statement file is not valid UTF-8")]
  Encoding,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
