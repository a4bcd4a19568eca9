use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::DEFAULT_GREETING;

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Base URL of the answer service; `/chat` is appended for questions
    pub endpoint: String,
    /// Upper bound on a single question/answer round trip, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bot turn the transcript is seeded with
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Show a clock time next to every turn
    #[serde(default)]
    pub show_timestamps: bool,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            greeting: default_greeting(),
            show_timestamps: false,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            profiles: HashMap::new(),
        }
    }
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        write_default_to(&path)?;
        Ok(path)
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

fn write_default_to(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("Failed to write config file at {}", path.display()))?;
    Ok(())
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub greeting: String,
    pub show_timestamps: bool,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        endpoint_override: Option<&str>,
        timeout_override: Option<u64>,
        timestamps_flag: bool,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        // A zero timeout would fail every request instantly
        let secs = timeout_override.unwrap_or(base.timeout_secs).max(1);

        Self {
            endpoint: endpoint_override
                .map(str::to_string)
                .unwrap_or(base.endpoint),
            timeout: Duration::from_secs(secs),
            greeting: base.greeting,
            show_timestamps: timestamps_flag || base.show_timestamps,
            profile_name,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sitechat")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

/// Where the log file lives: `$XDG_DATA_HOME/sitechat` or `~/.local/share/sitechat`.
pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(std::env::var("HOME").unwrap_or_default()).join(".local/share")
        })
        .join("sitechat")
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# sitechat configuration
# Run `sitechat --init` to regenerate this file.

default_profile = "local"

# ── Local backend (default) ───────────────────────────────────────────────────
[profiles.local]
endpoint     = "http://127.0.0.1:8000"
timeout_secs = 60
# greeting        = "👷 Hi — I'm your construction assistant. Ask me anything about construction."
# show_timestamps = false

# ── Hosted backend example ────────────────────────────────────────────────────
# Free-tier hosts can take a while to wake up; keep the timeout generous.
# [profiles.hosted]
# endpoint     = "https://construction-chatbot.example.com"
# timeout_secs = 90
"#;
