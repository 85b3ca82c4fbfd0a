use crate::config::HostConfig;
use anyhow::{anyhow, bail, Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    width: Option<u32>,
    height: Option<u32>,
    vsync: Option<bool>,
    entry: Option<String>,
    error_font: Option<String>,
    reload_assets: Option<bool>,
    log_once: Option<bool>,
    frames: Option<u64>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "width" => {
                    overrides.width =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid width '{value}'"))?);
                }
                "height" => {
                    overrides.height =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid height '{value}'"))?);
                }
                "vsync" => {
                    overrides.vsync = Some(parse_bool_flag("vsync", &value)?);
                }
                "entry" => {
                    overrides.entry = Some(value);
                }
                "error-font" => {
                    overrides.error_font = Some(value);
                }
                "reload-assets" => {
                    overrides.reload_assets = Some(parse_bool_flag("reload-assets", &value)?);
                }
                "log-once" => {
                    overrides.log_once = Some(parse_bool_flag("log-once", &value)?);
                }
                "frames" => {
                    overrides.frames = Some(
                        value.parse::<u64>().with_context(|| format!("Invalid frame count '{value}'"))?,
                    );
                }
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --width, --height, --vsync, \
                     --entry, --error-font, --reload-assets, --log-once, --frames."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn apply_to(&self, config: &mut HostConfig) {
        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        if let Some(vsync) = self.vsync {
            config.window.vsync = vsync;
        }
        if let Some(entry) = &self.entry {
            config.scripts.entry = entry.clone();
        }
        if let Some(font) = &self.error_font {
            config.scripts.error_font = font.clone();
        }
        if let Some(reload_assets) = self.reload_assets {
            config.scripts.reload_reruns_load_content = reload_assets;
        }
        if let Some(log_once) = self.log_once {
            config.scripts.log_fault_once = log_once;
        }
    }

    /// Frame budget for headless runs; `None` runs until the script quits.
    pub fn frames(&self) -> Option<u64> {
        self.frames
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}
