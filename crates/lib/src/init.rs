//! Initialize the configuration directory: create ~/.houtong, a default config, and an editable copy of the bundled script.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;
use crate::script::BUNDLED_SCRIPT;

/// Default config written by `init`: empty, so every field takes its default and secrets come from env.
const DEFAULT_CONFIG: &[u8] = b"{}";

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Writes `script.yaml` from the bundled script if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let script_path = config::default_script_path(config_path);
    if !script_path.exists() {
        std::fs::write(&script_path, BUNDLED_SCRIPT)
            .with_context(|| format!("writing default script to {}", script_path.display()))?;
        log::info!("wrote default tour script to {}", script_path.display());
    } else {
        log::debug!(
            "script already exists at {}, skipping",
            script_path.display()
        );
    }

    Ok(config_dir.to_path_buf())
}
