//! Per-contribution rendering through the external conversion tool.
//!
//! The tool is spawned with an explicit argument vector and an explicit
//! working directory. The caller's process state (current directory,
//! environment) is never modified.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, instrument};

use procbook_shared::{AssemblyConfig, Contribution, ProcbookError, Result};

/// Runs the conversion tool for one contribution at a time.
#[derive(Debug, Clone)]
pub struct Renderer {
    /// Executable name or path.
    pub tool: String,
    /// Arguments placed before the standard flags.
    pub extra_args: Vec<String>,
    /// Standalone template.
    pub template: PathBuf,
    /// Directory the tool runs in.
    pub working_dir: PathBuf,
    /// Pass `--listings`.
    pub listings: bool,
    /// Optional limit on a single invocation.
    pub timeout: Option<Duration>,
}

impl From<&AssemblyConfig> for Renderer {
    fn from(config: &AssemblyConfig) -> Self {
        // Projects without a `latex/` directory run the tool from the root.
        let working_dir = if config.working_dir.is_dir() {
            config.working_dir.clone()
        } else {
            config.root.clone()
        };

        Self {
            tool: config.tool.clone(),
            extra_args: config.extra_args.clone(),
            template: config.template.clone(),
            working_dir,
            listings: config.listings,
            timeout: config.timeout,
        }
    }
}

impl Renderer {
    /// Render one contribution to a standalone PDF.
    ///
    /// Returns `None` when the contribution has no source files. Otherwise the
    /// PDF is written next to the first source file, named after it.
    #[instrument(skip_all, fields(contribution = %contribution.name))]
    pub async fn render(&self, contribution: &Contribution) -> Result<Option<PathBuf>> {
        let Some(output) = contribution.rendered_path() else {
            debug!("no source files");
            return Ok(None);
        };

        let template = std::path::absolute(&self.template)
            .map_err(|e| ProcbookError::io(&self.template, e))?;
        let args = self.arguments(contribution, &output, &template);

        info!(
            tool = %self.tool,
            output = %output.display(),
            sources = contribution.sources.len(),
            metadata = contribution.metadata.len(),
            "rendering contribution"
        );

        let result = self.run(&args).await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let stderr = stderr.trim();
            debug!(%stderr, "conversion tool stderr");

            let status = match result.status.code() {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            };
            let message = if stderr.is_empty() {
                format!("{status} while rendering {}", contribution.name)
            } else {
                format!("{status} while rendering {}: {stderr}", contribution.name)
            };
            return Err(ProcbookError::tool(&self.tool, message));
        }

        debug!(output = %output.display(), "contribution rendered");
        Ok(Some(output))
    }

    /// Build the tool's argument vector.
    ///
    /// `<extra args> -o <output> --template <template> [--listings] <metadata...> <sources...>`
    pub fn arguments(
        &self,
        contribution: &Contribution,
        output: &Path,
        template: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.extra_args.iter().map(OsString::from).collect();
        args.push("-o".into());
        args.push(output.into());
        args.push("--template".into());
        args.push(template.into());
        if self.listings {
            args.push("--listings".into());
        }
        args.extend(contribution.metadata.iter().map(OsString::from));
        args.extend(contribution.sources.iter().map(OsString::from));
        args
    }

    /// Spawn the tool and wait for it, killing it if the timeout expires.
    async fn run(&self, args: &[OsString]) -> Result<Output> {
        let mut command = Command::new(&self.tool);
        command
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    ProcbookError::tool(
                        &self.tool,
                        format!("timed out after {:.1}s", limit.as_secs_f64()),
                    )
                })?,
            None => command.output().await,
        };

        output.map_err(|e| {
            ProcbookError::tool(
                &self.tool,
                format!("failed to spawn: {e}. Is `{}` installed?", self.tool),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTool, sample_pdf};

    fn contribution(dir: &Path, sources: &[&str], metadata: &[&str]) -> Contribution {
        std::fs::create_dir_all(dir).unwrap();
        let touch = |name: &&str| {
            let path = dir.join(name);
            std::fs::write(&path, "---\ntitle: test\n---\n").unwrap();
            path
        };
        Contribution {
            dir: dir.to_path_buf(),
            name: dir.file_name().unwrap().to_string_lossy().into_owned(),
            sources: sources.iter().map(touch).collect(),
            metadata: metadata.iter().map(touch).collect(),
        }
    }

    fn renderer(tool: &FakeTool, working_dir: &Path) -> Renderer {
        Renderer {
            tool: "sh".into(),
            extra_args: vec![tool.script.to_string_lossy().into_owned()],
            template: working_dir.join("standalone.tex"),
            working_dir: working_dir.to_path_buf(),
            listings: true,
            timeout: None,
        }
    }

    #[test]
    fn argument_order() {
        let c = Contribution {
            dir: PathBuf::from("/book/contrib-01"),
            name: "contrib-01".into(),
            sources: vec![PathBuf::from("/book/contrib-01/paper.md")],
            metadata: vec![PathBuf::from("/book/contrib-01/meta.yaml")],
        };
        let r = Renderer {
            tool: "pandoc".into(),
            extra_args: vec!["--pdf-engine=xelatex".into()],
            template: PathBuf::from("/book/latex/standalone.tex"),
            working_dir: PathBuf::from("/book/latex"),
            listings: true,
            timeout: None,
        };

        let args = r.arguments(
            &c,
            Path::new("/book/contrib-01/paper.pdf"),
            Path::new("/book/latex/standalone.tex"),
        );
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            [
                "--pdf-engine=xelatex",
                "-o",
                "/book/contrib-01/paper.pdf",
                "--template",
                "/book/latex/standalone.tex",
                "--listings",
                "/book/contrib-01/meta.yaml",
                "/book/contrib-01/paper.md",
            ]
        );
    }

    #[test]
    fn listings_flag_is_optional() {
        let c = Contribution {
            dir: PathBuf::from("/b/c"),
            name: "c".into(),
            sources: vec![PathBuf::from("/b/c/p.md")],
            metadata: vec![],
        };
        let r = Renderer {
            tool: "pandoc".into(),
            extra_args: vec![],
            template: PathBuf::from("/b/t.tex"),
            working_dir: PathBuf::from("/b"),
            listings: false,
            timeout: None,
        };
        let args = r.arguments(&c, Path::new("/b/c/p.pdf"), Path::new("/b/t.tex"));
        assert!(!args.iter().any(|a| a == "--listings"));
        assert_eq!(args.len(), 5);
    }

    #[tokio::test]
    async fn contribution_without_sources_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let c = contribution(&tmp.path().join("contrib-01"), &[], &["meta.yaml"]);
        // A tool that would fail if it were ever invoked.
        let tool = FakeTool::failing(tmp.path(), 1);

        let rendered = renderer(&tool, tmp.path()).render(&c).await.unwrap();
        assert_eq!(rendered, None);
        assert!(!tmp.path().join("contrib-01/meta.pdf").exists());
    }

    #[tokio::test]
    async fn renders_next_to_first_source() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = tmp.path().join("fixture.pdf");
        sample_pdf(&fixture, 3, 595);
        let tool = FakeTool::copying(tmp.path(), &fixture);
        let c = contribution(
            &tmp.path().join("contrib-02"),
            &["a-paper.md", "b-appendix.md"],
            &["meta.yaml"],
        );

        let rendered = renderer(&tool, tmp.path()).render(&c).await.unwrap();

        let expected = tmp.path().join("contrib-02/a-paper.pdf");
        assert_eq!(rendered, Some(expected.clone()));
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn tool_runs_in_configured_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let latex = tmp.path().join("latex");
        std::fs::create_dir_all(&latex).unwrap();
        let fixture = tmp.path().join("fixture.pdf");
        sample_pdf(&fixture, 1, 595);
        let tool = FakeTool::copying(tmp.path(), &fixture);
        let c = contribution(&tmp.path().join("contrib-01"), &["paper.md"], &[]);
        let cwd_before = std::env::current_dir().unwrap();

        renderer(&tool, &latex).render(&c).await.unwrap();

        let recorded = std::fs::read_to_string(tmp.path().join("contrib-01/paper.pdf.cwd")).unwrap();
        assert_eq!(
            PathBuf::from(recorded.trim()).canonicalize().unwrap(),
            latex.canonicalize().unwrap()
        );
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_tool_error_and_keeps_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = FakeTool::failing(tmp.path(), 43);
        let c = contribution(&tmp.path().join("contrib-01"), &["paper.md"], &[]);
        let cwd_before = std::env::current_dir().unwrap();

        let err = renderer(&tool, tmp.path()).render(&c).await.unwrap_err();

        assert!(matches!(err, ProcbookError::ToolInvocation { .. }));
        let msg = err.to_string();
        assert!(msg.contains("status 43"), "{msg}");
        assert!(msg.contains("template not found"), "{msg}");
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
    }

    #[tokio::test]
    async fn missing_executable_is_a_tool_error() {
        let tmp = tempfile::tempdir().unwrap();
        let c = contribution(&tmp.path().join("contrib-01"), &["paper.md"], &[]);
        let r = Renderer {
            tool: "procbook-no-such-converter".into(),
            extra_args: vec![],
            template: tmp.path().join("standalone.tex"),
            working_dir: tmp.path().to_path_buf(),
            listings: true,
            timeout: None,
        };

        let err = r.render(&c).await.unwrap_err();
        assert!(matches!(err, ProcbookError::ToolInvocation { .. }));
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = FakeTool::sleeping(tmp.path(), 10);
        let c = contribution(&tmp.path().join("contrib-01"), &["paper.md"], &[]);
        let mut r = renderer(&tool, tmp.path());
        r.timeout = Some(Duration::from_millis(200));

        let err = r.render(&c).await.unwrap_err();
        assert!(matches!(err, ProcbookError::ToolInvocation { .. }));
        assert!(err.to_string().contains("timed out"));
    }
}
