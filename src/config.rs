use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Shrike Engine".to_string(), width: 1280, height: 720, vsync: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Entry file name inside the scripts directory.
    pub entry: String,
    /// Font the diagnostic screen uses when a script fault is on display.
    pub error_font: String,
    /// Rerun `LoadContent` after a watcher-triggered reload. Reloads reset
    /// script state the content hook may have to rebuild.
    pub reload_reruns_load_content: bool,
    /// Log a fault once when it first renders, instead of every frame.
    pub log_fault_once: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            entry: "main.rhai".to_string(),
            error_font: "errorfont".to_string(),
            reload_reruns_load_content: true,
            log_fault_once: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    pub window: WindowConfig,
    pub scripts: ScriptConfig,
}

/// Loads `config/app.json`. A missing file is not an error; defaults apply.
pub fn load_config(path: &Path) -> Result<HostConfig> {
    if !path.is_file() {
        return Ok(HostConfig::default());
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("reading config '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_missing_fields() {
        let config: HostConfig =
            serde_json::from_str(r#"{"scripts":{"entry":"boot.rhai"}}"#).expect("parse config");
        assert_eq!(config.scripts.entry, "boot.rhai");
        assert_eq!(config.scripts.error_font, "errorfont");
        assert!(config.scripts.reload_reruns_load_content);
        assert!(config.scripts.log_fault_once);
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = load_config(&dir.path().join("config/app.json")).expect("defaults");
        assert_eq!(config.scripts.entry, "main.rhai");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("app.json");
        std::fs::write(&path, "{").expect("write config");
        assert!(load_config(&path).is_err());
    }
}
