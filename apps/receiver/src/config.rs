//! Receiver configuration.
//!
//! Read from TOML at `$RESEND_CONFIG`, or `~/.config/resend/receiver.toml`
//! when unset. `RESEND_DEST` and `RESEND_PORT` override the file.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use resend_transfer::ReceiverConfig;
use serde::{Deserialize, Serialize};

/// Receiver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Address to listen on.
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory that receives completed files.
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Seconds allowed for the sender to deliver its header.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Seconds without payload before a session is abandoned.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Offer the length of an already promoted file when no staging file exists.
    #[serde(default = "default_true")]
    pub resume_completed: bool,
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    resend_protocol::DEFAULT_PORT
}

fn default_destination() -> PathBuf {
    let home = std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    home.join("Downloads")
}

fn default_handshake_timeout() -> u64 {
    resend_protocol::HANDSHAKE_TIMEOUT.as_secs()
}

fn default_idle_timeout() -> u64 {
    resend_protocol::IDLE_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            destination: default_destination(),
            handshake_timeout_secs: default_handshake_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            resume_completed: default_true(),
        }
    }
}

impl Config {
    /// Loads the config file (defaults if absent) and applies env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    /// Applies `RESEND_DEST` and `RESEND_PORT` through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(dest) = lookup("RESEND_DEST").filter(|d| !d.is_empty()) {
            self.destination = PathBuf::from(dest);
        }
        if let Some(port) = lookup("RESEND_PORT").filter(|p| !p.is_empty()) {
            self.port = port
                .parse()
                .with_context(|| format!("invalid RESEND_PORT {port:?}"))?;
        }
        Ok(())
    }

    /// Session settings for a destination root that has already been resolved.
    pub fn receiver_config(&self, root: PathBuf) -> ReceiverConfig {
        ReceiverConfig {
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            resume_completed: self.resume_completed,
            ..ReceiverConfig::new(root)
        }
    }
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("RESEND_CONFIG").filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("resend").join("receiver.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("resend")
            .join("receiver.toml")
    }
}
