use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const STARTER_FILE_NAME: &str = "1cestart.exe";
pub const STORAGE_FILE_NAME: &str = "run1c_storage.ini";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_FONT_PATH: &str = "C:\\Windows\\Fonts\\segoeui.ttf";
const FALLBACK_STARTER_PATH: &str = "C:\\Program Files\\1cv8\\common\\1cestart.exe";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::Parse(error) => write!(f, "parse error: {error}"),
            Self::Invalid(error) => write!(f, "invalid config: {error}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub font_path: Option<PathBuf>,
    pub starter_path: Option<PathBuf>,
    pub base_font_size: u16,
    pub storage_path: Option<PathBuf>,
    pub launch_timeout_secs: u64,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_path: None,
            starter_path: None,
            base_font_size: 18,
            storage_path: None,
            launch_timeout_secs: 30,
            config_path: stable_app_data_dir().join(CONFIG_FILE_NAME),
        }
    }
}

impl Config {
    /// Custom font when it points at an existing TrueType/OpenType file, otherwise the system default.
    pub fn resolved_font_path(&self) -> PathBuf {
        match &self.font_path {
            Some(path) if is_font_path_valid(path) => path.clone(),
            _ => default_font_path(),
        }
    }

    /// Custom starter when it exists and is named `1cestart.exe`, otherwise the install default.
    pub fn resolved_starter_path(&self) -> PathBuf {
        match &self.starter_path {
            Some(path) if is_starter_valid(path) => path.clone(),
            _ => default_starter_path(),
        }
    }

    pub fn resolved_storage_path(&self) -> PathBuf {
        if let Some(path) = &self.storage_path {
            if !path.as_os_str().is_empty() {
                return path.clone();
            }
        }
        platform_storage_path().unwrap_or_else(|| PathBuf::from(STORAGE_FILE_NAME))
    }
}

pub fn validate(cfg: &Config) -> Result<(), String> {
    if !(8..=72).contains(&cfg.base_font_size) {
        return Err("base_font_size must be between 8 and 72".into());
    }

    if !(1..=600).contains(&cfg.launch_timeout_secs) {
        return Err("launch_timeout_secs must be between 1 and 600".into());
    }

    if cfg.config_path.as_os_str().is_empty() {
        return Err("config_path is required".into());
    }

    Ok(())
}

pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| stable_app_data_dir().join(CONFIG_FILE_NAME));

    let mut cfg = if config_path.exists() {
        let raw = std::fs::read_to_string(&config_path)?;
        parse(&config_path, &raw)?
    } else {
        Config::default()
    };
    cfg.config_path = config_path;

    validate(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    validate(cfg).map_err(ConfigError::Invalid)?;
    if let Some(parent) = cfg.config_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let encoded = toml::to_string_pretty(cfg).map_err(|e| ConfigError::Parse(e.to_string()))?;
    std::fs::write(&cfg.config_path, encoded)?;
    Ok(())
}

fn parse(path: &Path, raw: &str) -> Result<Config, ConfigError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("json5"))
        .unwrap_or(false);

    if is_json {
        json5::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    } else {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

pub fn default_font_path() -> PathBuf {
    PathBuf::from(DEFAULT_FONT_PATH)
}

pub fn default_starter_path() -> PathBuf {
    match non_empty_env("PROGRAMFILES") {
        Some(program_files) => PathBuf::from(program_files)
            .join("1cv8")
            .join("common")
            .join(STARTER_FILE_NAME),
        None => PathBuf::from(FALLBACK_STARTER_PATH),
    }
}

pub fn is_valid_path(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.exists()
}

pub fn is_starter_valid(path: &Path) -> bool {
    is_valid_path(path)
        && path
            .file_name()
            .map(|name| name == STARTER_FILE_NAME)
            .unwrap_or(false)
}

pub fn is_font_path_valid(path: &Path) -> bool {
    is_valid_path(path)
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
            .unwrap_or(false)
}

/// Per-user directory for config and logs; falls back to the temp dir when no profile is set.
pub fn stable_app_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(local) = non_empty_env("LOCALAPPDATA") {
            return PathBuf::from(local).join("RUN1C");
        }
        if let Some(profile) = non_empty_env("USERPROFILE") {
            return PathBuf::from(profile)
                .join("AppData")
                .join("Local")
                .join("RUN1C");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = non_empty_env("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("RUN1C");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(home) = non_empty_env("HOME") {
            return PathBuf::from(home).join(".config").join("run1c");
        }
    }

    std::env::temp_dir().join("run1c")
}

fn platform_storage_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        non_empty_env("LOCALAPPDATA")
            .map(|local| PathBuf::from(local).join("RUN1C"))
            .or_else(|| {
                non_empty_env("USERPROFILE").map(|profile| {
                    PathBuf::from(profile)
                        .join("AppData")
                        .join("Local")
                        .join("RUN1C")
                })
            })
            .map(|dir| dir.join(STORAGE_FILE_NAME))
    }

    #[cfg(target_os = "macos")]
    {
        non_empty_env("HOME").map(|home| {
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("RUN1C")
                .join(STORAGE_FILE_NAME)
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        non_empty_env("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("run1c")
                .join(STORAGE_FILE_NAME)
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
