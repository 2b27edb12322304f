use crate::Result;
use crate::pipeline::{CapPolicy, RunConfig};
use camino::{Utf8Path, Utf8PathBuf};
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

const LOG_TARGET: &str = "    config";

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up next to the catalog
pub const CONFIG_FILE_NAME: &str = "census.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Largest total file count a repository may have and still be eligible
    pub max_candidate_size: u64,

    /// Most eligible repositories a run takes on
    pub max_count: usize,

    /// Which repositories use up a slot under `max_count`
    pub cap_policy: CapPolicy,

    /// Remove each workspace after its repository is processed
    pub delete_workspace_after: bool,

    /// Repositories processed at once
    pub concurrency: usize,

    /// Metrics tool binary
    pub tool: String,

    /// Catalog count key and manifest filter, including the leading dot
    pub source_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            max_candidate_size: run.max_candidate_size,
            max_count: run.max_count,
            cap_policy: run.cap_policy,
            delete_workspace_after: run.delete_workspace_after,
            concurrency: run.concurrency,
            tool: "ffi-metrics".to_string(),
            source_extension: ".rs".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `census.toml` in `catalog_dir` is used when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load(catalog_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading ffi-census configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = catalog_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!(target: LOG_TARGET, "No '{path}' found, using the default configuration");
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading ffi-census configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(app_err!("concurrency must be at least 1"));
        }

        if self.tool.trim().is_empty() {
            return Err(app_err!("tool must name a metrics tool binary"));
        }

        if self.source_extension.len() < 2 || !self.source_extension.starts_with('.') || self.source_extension.contains('/') {
            return Err(app_err!(
                "source_extension must look like '.rs', got '{}'",
                self.source_extension
            ));
        }

        Ok(())
    }

    #[must_use]
    pub const fn run_config(&self) -> RunConfig {
        RunConfig {
            max_candidate_size: self.max_candidate_size,
            max_count: self.max_count,
            delete_workspace_after: self.delete_workspace_after,
            concurrency: self.concurrency,
            cap_policy: self.cap_policy,
        }
    }
}
