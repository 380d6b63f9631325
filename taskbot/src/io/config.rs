//! Engine configuration stored in `taskbot.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::trajectory::SmootherConfig;
use crate::io::tabletop::SceneConfig;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "taskbot.toml";

/// Engine configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to the values
/// the engine ships with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskbotConfig {
    pub executor: ExecutorConfig,
    pub smoother: SmootherConfig,
    pub scene: SceneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Wall-clock budget per run, checked between steps.
    pub timeout_secs: f64,

    /// Extra whole-task attempts after the first one fails.
    pub retries: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30.0,
            retries: 1,
        }
    }
}

impl ExecutorConfig {
    /// Budget as a duration; values too large to represent saturate.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::MAX)
    }
}

impl TaskbotConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.executor.timeout_secs.is_finite() || self.executor.timeout_secs <= 0.0 {
            return Err(anyhow!("executor.timeout_secs must be > 0"));
        }
        let problems = self.smoother.problems();
        if !problems.is_empty() {
            return Err(anyhow!(
                "invalid smoother settings:\n- {}",
                problems.join("\n- ")
            ));
        }
        self.scene.validate()?;
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TaskbotConfig::default()`.
pub fn load_config(path: &Path) -> Result<TaskbotConfig> {
    if !path.exists() {
        let cfg = TaskbotConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TaskbotConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &TaskbotConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
