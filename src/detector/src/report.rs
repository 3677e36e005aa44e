use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::DetectorError;
use crate::model::DeleteCandidates;

/// Writes the candidate list, one topic per line in sorted order.
///
/// The list goes to a temporary file next to the destination and is renamed
/// into place, so readers never observe a partially written report.
#[derive(Clone, Debug)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the report and return its canonical path.
    pub fn write(&self, candidates: &DeleteCandidates) -> Result<PathBuf, DetectorError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir).map_err(|e| self.error(e))?;
        for topic in candidates.names() {
            writeln!(file, "{topic}").map_err(|e| self.error(e))?;
        }
        file.as_file().sync_all().map_err(|e| self.error(e))?;
        file.persist(&self.path).map_err(|e| self.error(e.error))?;

        let written = self.path.canonicalize().map_err(|e| self.error(e))?;
        tracing::debug!(
            path = %written.display(),
            topics = candidates.len(),
            "Report written"
        );
        Ok(written)
    }

    fn error(&self, source: std::io::Error) -> DetectorError {
        DetectorError::Report {
            path: self.path.clone(),
            source,
        }
    }
}
