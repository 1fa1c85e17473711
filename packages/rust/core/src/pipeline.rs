//! End-to-end assembly: discover → render each contribution → merge → report.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use procbook_shared::{
    AssemblyConfig, AssemblyReport, ContributionEntry, ProcbookError, Result,
};

use crate::discovery::discover_contributions;
use crate::merge::{MergeOptions, merge_documents};
use crate::render::Renderer;

/// Progress callback for reporting assembly status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each contribution, rendered or skipped.
    fn contribution_done(&self, name: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &AssemblyReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn contribution_done(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &AssemblyReport) {}
}

/// Build the proceedings book.
///
/// 1. Discover contribution directories
/// 2. Render each one, in order (contributions without sources are skipped)
/// 3. Merge the rendered documents into `config.output`
///
/// Any failure aborts the run. With overwrite off and an existing output the
/// run succeeds and the report says nothing was written, even when no
/// contribution produced a document.
#[instrument(skip_all, fields(root = %config.root.display(), output = %config.output.display()))]
pub async fn assemble_proceedings(
    config: &AssemblyConfig,
    progress: &dyn ProgressReporter,
) -> Result<AssemblyReport> {
    progress.phase("Discovering contributions");
    let contributions = discover_contributions(config)?;
    info!(count = contributions.len(), "found contributions");

    let renderer = Renderer::from(config);
    let total = contributions.len();
    let mut rendered: Vec<Option<PathBuf>> = Vec::with_capacity(total);

    for (i, contribution) in contributions.iter().enumerate() {
        progress.phase(&format!("Rendering {}", contribution.name));
        let pdf = renderer.render(contribution).await?;
        if pdf.is_none() {
            warn!(contribution = %contribution.name, "no source files, skipping");
        }
        progress.contribution_done(&contribution.name, i + 1, total);
        rendered.push(pdf);
    }

    let inputs: Vec<&Path> = rendered.iter().flatten().map(PathBuf::as_path).collect();
    let keep_existing = !config.overwrite && config.output.exists();
    if inputs.is_empty() && !keep_existing {
        return Err(ProcbookError::assembly(
            "no contributions produced a document",
        ));
    }

    progress.phase("Merging documents");
    let options = MergeOptions::from(config);
    let outcome = merge_documents(&config.output, &inputs, &options)?;

    if !outcome.written && config.overwrite {
        return Err(ProcbookError::assembly(format!(
            "cannot merge files: {} was not written",
            config.output.display()
        )));
    }

    let sha256 = if outcome.written {
        Some(checksum(&config.output)?)
    } else {
        None
    };

    let mut placements = outcome.sections.into_iter();
    let entries = contributions
        .iter()
        .zip(rendered)
        .map(|(contribution, pdf)| ContributionEntry {
            name: contribution.name.clone(),
            placement: pdf.as_ref().and_then(|_| placements.next()),
            rendered: pdf,
        })
        .collect();

    let report = AssemblyReport {
        output: config.output.clone(),
        written: outcome.written,
        contributions: entries,
        total_pages: outcome.total_pages,
        sha256,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        completed_at: Utc::now(),
    };

    info!(
        written = report.written,
        rendered = report.rendered_count(),
        total_pages = report.total_pages,
        "assembly complete"
    );
    progress.done(&report);

    Ok(report)
}

fn checksum(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| ProcbookError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
