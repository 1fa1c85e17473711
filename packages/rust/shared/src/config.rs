//! Application configuration for procbook.
//!
//! A project may carry its own `procbook.toml` next to the contribution
//! directories; otherwise the user config at `~/.procbook/procbook.toml` is
//! used. CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProcbookError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "procbook.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".procbook";

// ---------------------------------------------------------------------------
// Config structs (matching procbook.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Book-level defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Conversion tool settings.
    #[serde(default)]
    pub pandoc: PandocConfig,

    /// Page alignment settings.
    #[serde(default)]
    pub merge: MergeConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Glob matched against directory names under the root.
    #[serde(default = "default_contrib_pattern")]
    pub contrib_pattern: String,

    /// Merged output file, relative to the root.
    #[serde(default = "default_output")]
    pub output: String,

    /// Replace an existing output file.
    #[serde(default = "default_true")]
    pub overwrite: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            contrib_pattern: default_contrib_pattern(),
            output: default_output(),
            overwrite: true,
        }
    }
}

fn default_contrib_pattern() -> String {
    "contrib-*".into()
}
fn default_output() -> String {
    "output.pdf".into()
}
fn default_true() -> bool {
    true
}

/// `[pandoc]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PandocConfig {
    /// Executable name or path of the conversion tool.
    #[serde(default = "default_command")]
    pub command: String,

    /// Standalone template, relative to the root.
    #[serde(default = "default_template")]
    pub template: String,

    /// Directory the tool runs in, relative to the root.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Pass `--listings` for code blocks.
    #[serde(default = "default_true")]
    pub listings: bool,

    /// Extra arguments placed before the standard flags (e.g. `--pdf-engine=xelatex`).
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Extension of text-source files inside a contribution.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Extension of metadata files inside a contribution.
    #[serde(default = "default_metadata_extension")]
    pub metadata_extension: String,

    /// Kill the tool after this many seconds. No limit when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for PandocConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            template: default_template(),
            working_dir: default_working_dir(),
            listings: true,
            extra_args: Vec::new(),
            source_extension: default_source_extension(),
            metadata_extension: default_metadata_extension(),
            timeout_secs: None,
        }
    }
}

fn default_command() -> String {
    "pandoc".into()
}
fn default_template() -> String {
    "latex/standalone.tex".into()
}
fn default_working_dir() -> String {
    "latex".into()
}
fn default_source_extension() -> String {
    "md".into()
}
fn default_metadata_extension() -> String {
    "yaml".into()
}

/// `[merge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Page-count divisor every contribution is padded to.
    #[serde(default = "default_alignment")]
    pub alignment: u32,

    /// Pad after the last contribution as well.
    #[serde(default = "default_true")]
    pub pad_trailing: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            alignment: default_alignment(),
            pad_trailing: true,
        }
    }
}

fn default_alignment() -> u32 {
    2
}

// ---------------------------------------------------------------------------
// Assembly config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime assembly configuration with every path resolved against the root.
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    /// Directory holding the contribution directories.
    pub root: PathBuf,
    /// Glob for contribution directory names.
    pub contrib_pattern: String,
    /// Merged output file.
    pub output: PathBuf,
    /// Replace an existing output file.
    pub overwrite: bool,
    /// Conversion tool executable.
    pub tool: String,
    /// Standalone template passed to the tool.
    pub template: PathBuf,
    /// Directory the tool runs in.
    pub working_dir: PathBuf,
    /// Pass `--listings` to the tool.
    pub listings: bool,
    /// Arguments placed before the standard flags.
    pub extra_args: Vec<String>,
    /// Text-source file extension.
    pub source_extension: String,
    /// Metadata file extension.
    pub metadata_extension: String,
    /// Optional limit on a single tool invocation.
    pub timeout: Option<Duration>,
    /// Page alignment (2 = every contribution starts on an odd page).
    pub alignment: u32,
    /// Pad after the last contribution as well.
    pub pad_trailing: bool,
}

impl AssemblyConfig {
    /// Build the runtime config for `root` from the loaded app config.
    pub fn resolve(config: &AppConfig, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            contrib_pattern: config.defaults.contrib_pattern.clone(),
            output: root.join(&config.defaults.output),
            overwrite: config.defaults.overwrite,
            tool: config.pandoc.command.clone(),
            template: root.join(&config.pandoc.template),
            working_dir: root.join(&config.pandoc.working_dir),
            listings: config.pandoc.listings,
            extra_args: config.pandoc.extra_args.clone(),
            source_extension: config.pandoc.source_extension.clone(),
            metadata_extension: config.pandoc.metadata_extension.clone(),
            timeout: config.pandoc.timeout_secs.map(Duration::from_secs),
            alignment: config.merge.alignment,
            pad_trailing: config.merge.pad_trailing,
            root,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.procbook/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ProcbookError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.procbook/procbook.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the user config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProcbookError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ProcbookError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Pick the config for a run: an explicit file, the project's
/// `procbook.toml`, or the user config, in that order.
pub fn resolve_config(explicit: Option<&Path>, root: &Path) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let project = root.join(CONFIG_FILE_NAME);
    if project.is_file() {
        tracing::debug!(path = %project.display(), "using project config");
        return load_config_from(&project);
    }

    load_config()
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProcbookError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProcbookError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProcbookError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
