//! Config module - Quản lý cấu hình bwsync (bwsync.toml).
//!
//! File cấu hình chứa:
//! - Appdata directory và server URL cho từng profile
//! - Sync settings (worker count, tên sync field)
//! - Đường dẫn bw binary (override)
//!
//! Credentials KHÔNG nằm trong file này - chúng đến từ environment
//! (SRC_BW_CLIENT_ID, SRC_BW_CLIENT_SECRET, SRC_BW_PASSWORD và DST_* tương tự).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bw::Profile;
use crate::sync::SYNC_FIELD;

/// Cấu hình cho một vault profile
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileConfig {
    /// Override appdata directory (BITWARDENCLI_APPDATA_DIR) cho profile này
    pub appdata_dir: Option<PathBuf>,
    /// Server URL (Vaultwarden compatible); env var SRC_BW_SERVER/DST_BW_SERVER
    /// thắng giá trị này
    pub server: Option<String>,
}

/// Cấu hình sync planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Số workers cho so sánh song song
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Tên custom field giữ sync identity
    #[serde(default = "default_sync_field")]
    pub sync_field: String,
}

fn default_workers() -> usize {
    8
}

fn default_sync_field() -> String {
    SYNC_FIELD.to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            sync_field: default_sync_field(),
        }
    }
}

/// Cấu hình chính của bwsync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Phiên bản config (để migrate trong tương lai)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Override đường dẫn bw binary (mặc định: cạnh executable, rồi PATH)
    pub bw_path: Option<PathBuf>,

    /// Profile nguồn
    #[serde(default)]
    pub source: ProfileConfig,

    /// Profile đích
    #[serde(default)]
    pub destination: ProfileConfig,

    /// Sync settings
    #[serde(default)]
    pub sync: SyncSettings,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            bw_path: None,
            source: ProfileConfig::default(),
            destination: ProfileConfig::default(),
            sync: SyncSettings::default(),
        }
    }
}

/// Lấy đường dẫn config directory mặc định (~/.config/bwsync/)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("bwsync"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Lấy đường dẫn config file mặc định
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("bwsync.toml")
}

/// Thư mục cha mặc định cho các profile appdata dirs
pub fn default_profiles_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("bwsync").join("profiles"))
        .unwrap_or_else(|| PathBuf::from("./profiles"))
}

impl Config {
    /// Tạo config mới với các giá trị mặc định
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config từ file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config từ đường dẫn mặc định, fallback về defaults nếu chưa có file
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Lưu config ra file
    pub fn save(&self, path: &Path) -> Result<()> {
        // Tạo thư mục cha nếu chưa tồn tại
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).with_context(|| "Cannot serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Cannot write config file: {}", path.display()))?;

        Ok(())
    }

    /// Config của một profile
    pub fn profile(&self, profile: Profile) -> &ProfileConfig {
        match profile {
            Profile::Source => &self.source,
            Profile::Destination => &self.destination,
        }
    }

    /// Appdata directory thực tế cho một profile
    pub fn appdata_dir(&self, profile: Profile) -> PathBuf {
        self.profile(profile)
            .appdata_dir
            .clone()
            .unwrap_or_else(|| default_profiles_dir().join(profile.name()))
    }

    /// Đường dẫn bw binary thực tế
    pub fn bw_path(&self) -> PathBuf {
        self.bw_path.clone().unwrap_or_else(crate::bw::find_bw_binary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.sync.workers, 8);
        assert_eq!(config.sync.sync_field, "sync_id");
        assert!(config.bw_path.is_none());
    }

    #[test]
    fn test_default_appdata_dirs_are_isolated() {
        let config = Config::default();
        let src = config.appdata_dir(Profile::Source);
        let dst = config.appdata_dir(Profile::Destination);
        assert_ne!(src, dst);
        assert!(src.ends_with("source"));
        assert!(dst.ends_with("destination"));
    }

    #[test]
    fn test_appdata_dir_override() {
        let mut config = Config::default();
        config.source.appdata_dir = Some(PathBuf::from("/custom/src-profile"));
        assert_eq!(
            config.appdata_dir(Profile::Source),
            PathBuf::from("/custom/src-profile")
        );
        // Destination vẫn dùng default
        assert!(config.appdata_dir(Profile::Destination).ends_with("destination"));
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("bwsync.toml");

        let mut config = Config::new();
        config.source.server = Some("https://vault.example.com".to_string());
        config.sync.workers = 4;
        config.save(&config_path)?;

        let loaded = Config::load(&config_path)?;
        assert_eq!(
            loaded.source.server,
            Some("https://vault.example.com".to_string())
        );
        assert_eq!(loaded.sync.workers, 4);
        assert_eq!(loaded.version, 1);

        Ok(())
    }

    #[test]
    fn test_partial_toml_uses_defaults() -> Result<()> {
        let config: Config = toml::from_str("[destination]\nserver = \"https://dst.example\"\n")?;
        assert_eq!(config.version, 1);
        assert_eq!(config.sync.workers, 8);
        assert_eq!(
            config.destination.server,
            Some("https://dst.example".to_string())
        );
        assert!(config.source.server.is_none());
        Ok(())
    }
}
