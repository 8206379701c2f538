use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Directory holding project state, relative to the project root.
pub const PROJECT_DIR: &str = ".packtree";

/// Environment variable overriding `warehouse.max_package_depth`.
pub const MAX_DEPTH_ENV: &str = "PACKTREE_MAX_DEPTH";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub warehouse: WarehouseConfig,
}

/// Warehouse-level settings read by the validator.
///
/// Passed explicitly to every operation that needs it. Changing it does not
/// re-validate trees that already exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Maximum number of levels in one package tree. 2 allows one level of
    /// packages (with no sub-packages) inside an outer package.
    #[serde(default = "default_max_package_depth")]
    pub max_package_depth: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            max_package_depth: default_max_package_depth(),
        }
    }
}

impl WarehouseConfig {
    #[must_use]
    pub const fn with_max_depth(max_package_depth: u32) -> Self {
        Self { max_package_depth }
    }
}

/// Path of the project config file under `project_root`.
#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join("config.toml")
}

pub fn load_project_config(project_root: &Path) -> Result<Option<ProjectConfig>> {
    let path = project_config_path(project_root);
    if !path.exists() {
        return Ok(None);
    }
    read_config(&path).map(Some)
}

pub fn load_user_config() -> Result<Option<ProjectConfig>> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(None);
    };

    let path = config_dir.join("packtree/config.toml");
    if !path.exists() {
        return Ok(None);
    }
    read_config(&path).map(Some)
}

fn read_config(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the effective config.
///
/// Precedence (highest wins): `PACKTREE_MAX_DEPTH`, the project config, the
/// user config, built-in defaults.
pub fn resolve_config(project_root: &Path) -> Result<ProjectConfig> {
    let config = match load_project_config(project_root)? {
        Some(project) => project,
        None => load_user_config()?.unwrap_or_default(),
    };
    apply_env_override(config, env::var(MAX_DEPTH_ENV).ok())
}

fn apply_env_override(mut config: ProjectConfig, max_depth: Option<String>) -> Result<ProjectConfig> {
    if let Some(raw) = max_depth {
        let depth: u32 = raw
            .trim()
            .parse()
            .with_context(|| format!("{MAX_DEPTH_ENV} must be a positive integer, got '{raw}'"))?;
        ensure!(depth > 0, "{MAX_DEPTH_ENV} must be a positive integer, got '{raw}'");
        config.warehouse.max_package_depth = depth;
    }
    Ok(config)
}

/// Write `config` to the project config file, creating `.packtree/`.
pub fn write_project_config(project_root: &Path, config: &ProjectConfig) -> Result<PathBuf> {
    let path = project_config_path(project_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create config directory {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("serialize project config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

const fn default_max_package_depth() -> u32 {
    2
}
