/// File logging.
///
/// The TUI owns stdout, so tracing output goes to
/// `<data dir>/sitechat.log`. The filter comes from `SITECHAT_LOG`
/// (e.g. `SITECHAT_LOG=debug`), defaulting to `info`.
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config;

pub fn log_path() -> PathBuf {
    config::data_dir().join("sitechat.log")
}

pub fn init() -> Result<PathBuf> {
    let path = log_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file at {}", path.display()))?;

    let filter = EnvFilter::try_from_env("SITECHAT_LOG").unwrap_or_else(|_| "info".into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(path)
}
