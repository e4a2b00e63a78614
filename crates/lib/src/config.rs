//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.houtong/config.json`) and environment.
//! LINE secrets are usually supplied through `CHANNEL_ACCESS_TOKEN` / `CHANNEL_SECRET`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (LINE).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Tour script and dispatch settings.
    #[serde(default)]
    pub tour: TourConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the webhook and health endpoints (default 15152).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1"). Put a TLS proxy in front when exposing it to LINE.
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    15152
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub line: LineChannelConfig,
}

/// LINE Messaging API channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChannelConfig {
    /// Long-lived channel access token. Overridden by CHANNEL_ACCESS_TOKEN env when set.
    pub channel_access_token: Option<String>,
    /// Channel secret used to verify X-Line-Signature. Overridden by CHANNEL_SECRET env when set.
    pub channel_secret: Option<String>,
    /// Messaging API base URL (default https://api.line.me).
    pub api_base: Option<String>,
}

/// How incoming text is matched against the rule table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Only rules legal at the user's current stage are considered.
    #[default]
    Scoped,

    /// Every rule is considered regardless of the user's stage (first rule in table order wins).
    Global,
}

/// Tour settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourConfig {
    /// "scoped" (default) or "global".
    #[serde(default)]
    pub mode: DispatchMode,

    /// Script file. Relative paths are resolved against the config file's parent. When unset,
    /// `script.yaml` next to the config file is used if present, else the bundled script.
    #[serde(default)]
    pub script: Option<PathBuf>,
}

fn env_or_config(var: &str, configured: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            configured
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the channel access token: env CHANNEL_ACCESS_TOKEN overrides config.
pub fn resolve_line_access_token(config: &Config) -> Option<String> {
    env_or_config(
        "CHANNEL_ACCESS_TOKEN",
        config.channels.line.channel_access_token.as_ref(),
    )
}

/// Resolve the channel secret: env CHANNEL_SECRET overrides config.
pub fn resolve_line_channel_secret(config: &Config) -> Option<String> {
    env_or_config("CHANNEL_SECRET", config.channels.line.channel_secret.as_ref())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("HOUTONG_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".houtong").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Returns the config and the path that was used (for resolving the script path).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Default script location: `script.yaml` next to the config file.
pub fn default_script_path(config_path: &Path) -> PathBuf {
    config_parent(config_path).join("script.yaml")
}

/// Resolve which script file to load. `None` means use the bundled script.
pub fn resolve_script_path(config: &Config, config_path: &Path) -> Option<PathBuf> {
    match &config.tour.script {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                Some(p.clone())
            } else {
                Some(config_parent(config_path).join(p))
            }
        }
        _ => {
            let default = default_script_path(config_path);
            default.exists().then_some(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 15152);
        assert_eq!(g.bind, "127.0.0.1");
    }

    #[test]
    fn parses_camel_case_config() {
        let json = r#"{
            "gateway": { "port": 8080 },
            "channels": { "line": { "channelSecret": "s", "apiBase": "http://localhost:1" } },
            "tour": { "mode": "global", "script": "tour.yaml" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.bind, "127.0.0.1");
        assert_eq!(config.channels.line.channel_secret.as_deref(), Some("s"));
        assert_eq!(config.tour.mode, DispatchMode::Global);
        assert_eq!(config.tour.script, Some(PathBuf::from("tour.yaml")));
    }

    #[test]
    fn empty_config_defaults_to_scoped() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.tour.mode, DispatchMode::Scoped);
        assert!(config.tour.script.is_none());
    }

    #[test]
    fn resolve_script_path_relative_and_absolute() {
        let path = Path::new("/home/user/.houtong/config.json");
        let mut config = Config::default();
        config.tour.script = Some(PathBuf::from("tours/houtong.yaml"));
        assert_eq!(
            resolve_script_path(&config, path),
            Some(PathBuf::from("/home/user/.houtong/tours/houtong.yaml"))
        );
        config.tour.script = Some(PathBuf::from("/srv/script.yaml"));
        assert_eq!(
            resolve_script_path(&config, path),
            Some(PathBuf::from("/srv/script.yaml"))
        );
    }

    #[test]
    fn resolve_script_path_missing_default_uses_bundled() {
        let config = Config::default();
        let path = Path::new("/nonexistent/houtong/config.json");
        assert_eq!(resolve_script_path(&config, path), None);
        assert_eq!(
            default_script_path(path),
            PathBuf::from("/nonexistent/houtong/script.yaml")
        );
    }
}
