//! Core domain types for proceedings assembly.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Contribution
// ---------------------------------------------------------------------------

/// One contribution directory and the files found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    /// Absolute path of the contribution directory.
    pub dir: PathBuf,
    /// Directory name (e.g. `contrib-03-AnalysisWithPython`).
    pub name: String,
    /// Text-source files, sorted by file name.
    pub sources: Vec<PathBuf>,
    /// Metadata files, sorted by file name.
    pub metadata: Vec<PathBuf>,
}

impl Contribution {
    /// Whether there is anything to render.
    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Path of the rendered PDF: the first source file with a `.pdf` extension.
    pub fn rendered_path(&self) -> Option<PathBuf> {
        self.sources.first().map(|src| src.with_extension("pdf"))
    }
}

// ---------------------------------------------------------------------------
// Merge results
// ---------------------------------------------------------------------------

/// Where one input document landed in the merged output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlacement {
    /// The input PDF.
    pub source: PathBuf,
    /// 1-indexed page of the output where this document starts.
    pub first_page: usize,
    /// Pages copied from the input.
    pub page_count: usize,
    /// Blank pages appended after it.
    pub padding: usize,
}

/// What the merger did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// `false` when an existing output was left untouched.
    pub written: bool,
    /// One entry per input, in order. Empty when nothing was written.
    pub sections: Vec<SectionPlacement>,
    /// Total pages in the output, padding included.
    pub total_pages: usize,
}

impl MergeOutcome {
    /// Outcome for a merge that was skipped because the output already exists.
    pub fn skipped() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// AssemblyReport
// ---------------------------------------------------------------------------

/// Per-contribution line of the assembly report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionEntry {
    /// Directory name.
    pub name: String,
    /// Rendered PDF, `None` when the contribution had no sources.
    pub rendered: Option<PathBuf>,
    /// Placement in the merged output, when it was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<SectionPlacement>,
}

/// Summary of a full assembly run, serializable as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyReport {
    /// Merged output file.
    pub output: PathBuf,
    /// Whether the output was (re)written in this run.
    pub written: bool,
    /// Contributions in book order, skipped ones included.
    pub contributions: Vec<ContributionEntry>,
    /// Total pages in the output; zero when nothing was written.
    pub total_pages: usize,
    /// Hex SHA-256 of the output file when it was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Tool version that produced the book.
    pub tool_version: String,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
}

impl AssemblyReport {
    /// Number of contributions that produced a document.
    pub fn rendered_count(&self) -> usize {
        self.contributions
            .iter()
            .filter(|c| c.rendered.is_some())
            .count()
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            crate::ProcbookError::validation(format!("JSON serialization failed: {e}"))
        })?;
        std::fs::write(path, json).map_err(|e| crate::ProcbookError::io(path, e))
    }
}
