use anyhow::{anyhow, bail, Context, Result};
use eframe::egui::Color32;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    artwork::{ArtSource, EmbeddedArt, LibraryArt, DEFAULT_COVER_NAMES},
    daemon::{DaemonAddr, RetryPolicy},
};

const APP_DIR: &str = "mpd-art-box";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub art: ArtConfig,
    pub window: WindowConfig,
}

impl Config {
    /// Reads `explicit` when given (it must exist), otherwise the first
    /// config file found in the usual places, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for path in candidate_paths() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        doc.try_into()
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(config_home) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(config_home).join(APP_DIR).join("config.toml"));
    } else if let Some(home) = env::var_os("HOME") {
        candidates.push(
            PathBuf::from(home)
                .join(".config")
                .join(APP_DIR)
                .join("config.toml"),
        );
    }

    if let Ok(current_dir) = env::current_dir() {
        candidates.push(current_dir.join("config.toml"));
    }

    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("config.toml"));
        }
    }

    candidates
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let addr = DaemonAddr::default();
        let policy = RetryPolicy::default();
        Self {
            host: addr.host,
            port: addr.port,
            connect_attempts: policy.attempts,
            retry_delay: policy.delay,
        }
    }
}

impl DaemonConfig {
    pub fn addr(&self) -> DaemonAddr {
        DaemonAddr::new(self.host.clone(), self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.connect_attempts.max(1),
            delay: self.retry_delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtStrategy {
    Library,
    Embedded,
}

#[derive(Debug, Clone)]
pub struct ArtConfig {
    /// `None` picks the library lookup when a library is configured.
    pub strategy: Option<ArtStrategy>,
    pub library: Option<PathBuf>,
    pub cover_names: Vec<String>,
}

impl Default for ArtConfig {
    fn default() -> Self {
        Self {
            strategy: None,
            library: None,
            cover_names: DEFAULT_COVER_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ArtConfig {
    pub fn strategy(&self) -> ArtStrategy {
        match (self.strategy, &self.library) {
            (Some(strategy), _) => strategy,
            (None, Some(_)) => ArtStrategy::Library,
            (None, None) => ArtStrategy::Embedded,
        }
    }

    pub fn source(&self) -> Result<Box<dyn ArtSource>> {
        match self.strategy() {
            ArtStrategy::Embedded => Ok(Box::new(EmbeddedArt)),
            ArtStrategy::Library => {
                let Some(library) = &self.library else {
                    bail!("art source \"library\" needs a library path (--library or art.library)");
                };
                if self.cover_names.is_empty() {
                    bail!("art.cover_names must name at least one file");
                }
                Ok(Box::new(LibraryArt::with_cover_names(
                    library.clone(),
                    self.cover_names.iter().cloned(),
                )))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub background: Color32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 500.0,
            height: 500.0,
            background: Color32::BLACK,
        }
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// Splits MPD's `password@host` notation into its parts. A leading `@`
/// names an abstract socket and is returned untouched.
pub fn split_mpd_host(value: &str) -> (Option<&str>, &str) {
    if value.starts_with('@') {
        return (None, value);
    }
    match value.rsplit_once('@') {
        Some((password, host)) if !host.is_empty() => (Some(password), host),
        _ => (None, value),
    }
}

fn parse_hex_color(value: &str) -> Result<Color32> {
    let hex = value
        .trim()
        .strip_prefix('#')
        .ok_or_else(|| anyhow!("Colors must start with '#': {value}"))?;
    let bytes = match hex.len() {
        6 | 8 if hex.chars().all(|c| c.is_ascii_hexdigit()) => u32::from_str_radix(hex, 16).ok(),
        _ => None,
    }
    .ok_or_else(|| anyhow!("Invalid hex color: #{hex}"))?;

    Ok(if hex.len() == 6 {
        let r = ((bytes >> 16) & 0xFF) as u8;
        let g = ((bytes >> 8) & 0xFF) as u8;
        let b = (bytes & 0xFF) as u8;
        Color32::from_rgb(r, g, b)
    } else {
        let r = ((bytes >> 24) & 0xFF) as u8;
        let g = ((bytes >> 16) & 0xFF) as u8;
        let b = ((bytes >> 8) & 0xFF) as u8;
        let a = (bytes & 0xFF) as u8;
        Color32::from_rgba_unmultiplied(r, g, b, a)
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    #[serde(default)]
    daemon: DaemonSection,
    #[serde(default)]
    art: ArtSection,
    #[serde(default)]
    window: WindowSection,
}

impl TryFrom<ConfigDocument> for Config {
    type Error = anyhow::Error;

    fn try_from(value: ConfigDocument) -> Result<Self> {
        let defaults = Config::default();

        let daemon = DaemonConfig {
            host: value.daemon.host.unwrap_or(defaults.daemon.host),
            port: value.daemon.port.unwrap_or(defaults.daemon.port),
            connect_attempts: value
                .daemon
                .connect_attempts
                .unwrap_or(defaults.daemon.connect_attempts)
                .max(1),
            retry_delay: value
                .daemon
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.daemon.retry_delay),
        };

        let art = ArtConfig {
            strategy: value.art.source,
            library: value.art.library.as_deref().map(expand_home),
            cover_names: value.art.cover_names.unwrap_or(defaults.art.cover_names),
        };

        let background = match value.window.background.as_deref() {
            Some(color) => parse_hex_color(color).context("window.background")?,
            None => defaults.window.background,
        };
        let window = WindowConfig {
            width: value.window.width.unwrap_or(defaults.window.width).max(1.0),
            height: value.window.height.unwrap_or(defaults.window.height).max(1.0),
            background,
        };

        Ok(Config {
            daemon,
            art,
            window,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DaemonSection {
    host: Option<String>,
    port: Option<u16>,
    connect_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtSection {
    source: Option<ArtStrategy>,
    library: Option<PathBuf>,
    cover_names: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowSection {
    width: Option<f32>,
    height: Option<f32>,
    background: Option<String>,
}
