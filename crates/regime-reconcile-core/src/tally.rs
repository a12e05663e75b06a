//! Append-only tally of pair comparisons.
//!
//! Format:
//!
//! ```text
//! dirs,num_diff_pixels,% diff
//! 02-03,1200,2.10
//! ```
//!
//! Every attempted pair gets exactly one row, abandoned ones included. Rows
//! are flushed as they are written so an interrupted run keeps its tally.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::diff::DiffResult;
use crate::error::{ReconcileError, ReconcileResult};
use crate::runs::PairTag;

/// Header line of the tally file.
pub const TALLY_HEADER: &str = "dirs,num_diff_pixels,% diff";

/// One tally row.
#[derive(Debug, Clone, PartialEq)]
pub struct TallyRecord {
    /// Pair tag, `<tag1>-<tag2>`
    pub tag: PairTag,
    /// Final score of the pair
    pub result: DiffResult,
}

impl fmt::Display for TallyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{:.2}", self.tag, self.result.count, self.result.percent)
    }
}

/// Tally writer. Single owner; rows are appended in processing order.
pub struct TallyLog<W: Write> {
    writer: W,
    origin: PathBuf,
    rows: usize,
}

impl TallyLog<BufWriter<File>> {
    /// Create (truncating) the tally file at `path` and write the header.
    pub fn create(path: &Path) -> ReconcileResult<Self> {
        let file = File::create(path).map_err(|e| ReconcileError::io(path, e))?;
        Self::new(BufWriter::new(file), path)
    }
}

impl<W: Write> TallyLog<W> {
    /// Wrap `writer` and write the header. `origin` names the destination in
    /// error messages.
    pub fn new(writer: W, origin: impl Into<PathBuf>) -> ReconcileResult<Self> {
        let mut log = Self {
            writer,
            origin: origin.into(),
            rows: 0,
        };
        log.write_line(TALLY_HEADER)?;
        Ok(log)
    }

    /// Append one row and flush.
    pub fn append(&mut self, record: &TallyRecord) -> ReconcileResult<()> {
        self.write_line(&record.to_string())?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, header excluded.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &str) -> ReconcileResult<()> {
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| ReconcileError::io(&self.origin, e))
    }
}
