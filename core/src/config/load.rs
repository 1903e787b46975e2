use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default relaylog data directory: ~/.relaylog
pub fn get_relaylog_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".relaylog"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.relaylog/config.toml (highest)
    // Priority 2: ./relaylog.toml (current directory)
    let user_config = get_relaylog_data_dir().ok().map(|d| d.join("config.toml"));
    let local_config = Path::new("relaylog.toml");

    let cfg = match user_config.filter(|p| p.exists()) {
        Some(path) => read_config(&path)?,
        None if local_config.exists() => read_config(local_config)?,
        None => AppConfig::default(),
    };

    finish(cfg)
}

/// Load an explicitly named config file; a missing file is an error.
pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let cfg = read_config(path)?;
    finish(cfg)
}

fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {} failed: {e}", path.display()))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse {} failed: {e}", path.display()))?;
    Ok(cfg)
}

fn finish(mut cfg: AppConfig) -> anyhow::Result<AppConfig> {
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

// Environment variable overrides sit above every config file.
fn apply_env_overrides(cfg: &mut AppConfig) -> anyhow::Result<()> {
    if let Ok(v) = std::env::var("RELAYLOG_HOST") {
        if !v.trim().is_empty() {
            cfg.collector.host = v;
        }
    }
    if let Ok(v) = std::env::var("RELAYLOG_PORT") {
        if !v.trim().is_empty() {
            cfg.collector.port = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid RELAYLOG_PORT {v:?}: {e}"))?;
        }
    }
    Ok(())
}
