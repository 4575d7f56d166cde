use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = "catalogfs/0.1";

/// Which tags wrap the audio body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagLayout {
    /// ID3v2.4 header only.
    #[serde(rename = "id3v2")]
    Id3v2,
    /// ID3v2.4 header plus a 128 byte ID3v1.1 trailer.
    #[serde(rename = "id3v2_id3v1")]
    Id3v2Id3v1,
}

impl TagLayout {
    pub fn has_trailer(self) -> bool {
        matches!(self, TagLayout::Id3v2Id3v1)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    pub version: u32,
    pub catalog_url: String,
    pub username: String,
    pub password: String,
    pub device_id: String,
    /// Probe exact audio lengths instead of trusting the catalog estimate.
    pub true_file_size: bool,
    pub lowercase: bool,
    pub tag_layout: TagLayout,
    pub scan_on_start: bool,
    pub enrich_metadata: bool,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            catalog_url: "http://localhost:8080/api".to_string(),
            username: String::new(),
            password: String::new(),
            device_id: String::new(),
            true_file_size: false,
            lowercase: false,
            tag_layout: TagLayout::Id3v2Id3v1,
            scan_on_start: true,
            enrich_metadata: true,
            http_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    /// The file holds credentials but other users can read it.
    Insecure(PathBuf),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
            ConfigError::Insecure(path) => write!(
                f,
                "{:?} contains credentials and is readable by other users (chmod 600)",
                path
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("CATALOGFS_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("catalogfs.yaml"))
            .unwrap_or_else(|| PathBuf::from("catalogfs.yaml")),
        Err(_) => PathBuf::from("catalogfs.yaml"),
    }
}

/// Loads the config at `path`, writing defaults there first when it does
/// not exist. The flag tells whether the file was created.
pub fn load_or_create_config(path: &Path) -> Result<(FsConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: FsConfig = serde_yaml::from_str(&contents)?;
        if !config.password.is_empty() {
            check_private(path)?;
        }
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        normalize(&mut config);
        return Ok((config, false));
    }

    let config = FsConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &FsConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    let mut file = private_options().open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

fn normalize(config: &mut FsConfig) {
    let device_id = config.device_id.trim();
    let device_id = device_id
        .strip_prefix("0x")
        .or_else(|| device_id.strip_prefix("0X"))
        .unwrap_or(device_id);
    config.device_id = device_id.to_string();
    config.catalog_url = config.catalog_url.trim().trim_end_matches('/').to_string();
    if config.http_timeout_secs == 0 {
        config.http_timeout_secs = DEFAULT_TIMEOUT_SECS;
    }
    if config.user_agent.trim().is_empty() {
        config.user_agent = DEFAULT_USER_AGENT.to_string();
    }
}

#[cfg(unix)]
fn check_private(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)?.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(ConfigError::Insecure(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_private(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn private_options() -> fs::OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true).mode(0o600);
    options
}

#[cfg(not(unix))]
fn private_options() -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    options
}
