use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::{bail, Result};
use std::fs;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub system: SystemConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub images: ImageConfig,
    pub menu: MenuConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct SystemConfig {
    pub debug: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,
    /// Root of the documents namespace, e.g.
    /// `https://firestore.googleapis.com/v1/projects/<id>/databases/(default)/documents/`
    pub base_url: String,
    pub api_key: Option<String>,
    pub user_agent: Option<String>,
    pub proxy_ip: Option<String>,
    pub proxy_port: Option<u16>,
    pub proxy_auth_user: Option<String>,
    pub proxy_auth_password: Option<String>,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ImageConfig {
    pub icon_size: u32,
    pub banner_max_dimension: u32,
    pub jpeg_quality: u8,
    pub pixel_art: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MenuConfig {
    pub dev_mode: bool,
    pub refresh_rate: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "fishwiki.db".to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://firestore.googleapis.com/v1/projects/fishwiki/databases/(default)/documents/".to_string(),
            api_key: None,
            user_agent: None,
            proxy_ip: None,
            proxy_port: None,
            proxy_auth_user: None,
            proxy_auth_password: None,
            timeout_secs: 15,
            poll_interval_secs: 30,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            icon_size: 128,
            banner_max_dimension: 1200,
            jpeg_quality: 85,
            pixel_art: true,
        }
    }
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            refresh_rate: 0.3,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: Config = toml::from_str(&content)?;

        // Trim key
        config.remote.api_key = config.remote.api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        if config.images.icon_size == 0 || config.images.banner_max_dimension == 0 {
            bail!("images.icon_size and images.banner_max_dimension must be at least 1");
        }
        if !(1..=100).contains(&config.images.jpeg_quality) {
            bail!("images.jpeg_quality must be between 1 and 100");
        }

        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Loads `path`, writing the defaults there first when it does not exist.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Config::load(path)
        } else {
            let cfg = Config::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.system.debug { log::LevelFilter::Debug } else { log::LevelFilter::Info }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_or_create_writes_defaults_then_reads_them_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.storage.db_path, "fishwiki.db");

        let mut edited = created.clone();
        edited.menu.dev_mode = true;
        edited.remote.api_key = Some("  secret  ".to_string());
        edited.save(&path).unwrap();

        let loaded = Config::load_or_create(&path).unwrap();
        assert!(loaded.menu.dev_mode);
        assert_eq!(loaded.remote.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn blank_api_key_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.remote.api_key = Some("   ".to_string());
        cfg.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap().remote.api_key, None);
    }

    #[test]
    fn missing_sections_and_keys_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[system]\ndebug = true\n\n[images]\nicon_size = 64\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(loaded.system.debug);
        assert_eq!(loaded.images.icon_size, 64);
        assert_eq!(loaded.images.jpeg_quality, 85);
        assert_eq!(loaded.storage.db_path, "fishwiki.db");
        assert_eq!(loaded.remote.poll_interval_secs, 30);
    }

    #[test]
    fn zero_icon_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[images]\nicon_size = 0\n").unwrap();

        assert!(Config::load(&path).is_err());
    }
}
