use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{BurpError, BurpResult};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub export: ExportConfig,
    pub table: TableConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the scraper backend, e.g. `http://127.0.0.1:5001`
    pub base_url: String,
    /// No timeout when unset; scrapes can legitimately run for minutes.
    pub request_timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub history_limit: usize,
    /// Attempts for a read-modify-write before a version conflict is surfaced
    pub max_write_attempts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub default_format: String,
    pub compression_enabled: bool,
    pub output_directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
    pub formatted_preview_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub json_format: bool,
    pub max_files: usize,
    pub log_directory: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = get_data_directory();
        Self::with_data_dir(&data_dir)
    }
}

impl AppConfig {
    /// Defaults rooted at a specific data directory
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://127.0.0.1:5001".to_string(),
                request_timeout_seconds: None,
                connect_timeout_seconds: 10,
            },
            storage: StorageConfig {
                path: data_dir.join("burp.db"),
                history_limit: 1000,
                max_write_attempts: 5,
            },
            export: ExportConfig {
                default_format: "csv".to_string(),
                compression_enabled: false,
                output_directory: data_dir.join("exports"),
            },
            table: TableConfig {
                page_size: 10,
                page_size_options: vec![5, 10, 25, 50, 100],
                formatted_preview_limit: 20,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: true,
                console_enabled: false,
                json_format: false,
                max_files: 5,
                log_directory: data_dir.join("logs"),
            },
        }
    }

    /// Load configuration from the default location, writing defaults on first run
    pub async fn load() -> BurpResult<Self> {
        let config_path = get_config_path();

        let mut config = if config_path.exists() {
            Self::read_file(&config_path).await?
        } else {
            info!("No configuration file found, using defaults");
            let config = Self::default();
            config.save_to(&config_path).await?;
            config
        };

        ConfigOverrides::apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> BurpResult<Self> {
        let mut config = Self::read_file(path.as_ref()).await?;
        ConfigOverrides::apply(&mut config);
        config.validate()?;

        info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    async fn read_file(path: &Path) -> BurpResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|_| BurpError::InvalidConfig {
            path: path.display().to_string(),
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a path
    pub async fn save_to(&self, config_path: &Path) -> BurpResult<()> {
        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(config_path, content).await?;

        info!("Configuration saved to: {}", config_path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> BurpResult<()> {
        url::Url::parse(&self.api.base_url)
            .map_err(|e| BurpError::config(format!("api.base_url is not a valid URL: {}", e)))?;

        if self.api.request_timeout_seconds == Some(0) {
            return Err(BurpError::config("api.request_timeout_seconds must be > 0 when set"));
        }

        if self.storage.history_limit == 0 {
            return Err(BurpError::config("storage.history_limit must be > 0"));
        }

        if self.storage.max_write_attempts == 0 {
            return Err(BurpError::config("storage.max_write_attempts must be > 0"));
        }

        if self.table.page_size == 0 {
            return Err(BurpError::config("table.page_size must be > 0"));
        }

        self.export
            .default_format
            .parse::<crate::export::ExportFormat>()?;

        Ok(())
    }

    /// Ensure all required directories exist
    pub async fn ensure_directories(&self) -> BurpResult<()> {
        let mut dirs = vec![self.export.output_directory.clone()];
        if let Some(parent) = self.storage.path.parent() {
            dirs.push(parent.to_path_buf());
        }
        if self.logging.file_enabled {
            dirs.push(self.logging.log_directory.clone());
        }

        for dir in dirs {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                tokio::fs::create_dir_all(&dir).await?;
                info!("Created directory: {}", dir.display());
            }
        }

        Ok(())
    }
}

/// Get the default data directory
pub fn get_data_directory() -> PathBuf {
    if let Ok(dir) = std::env::var("BURP_DATA_DIR") {
        return PathBuf::from(dir);
    }

    directories::ProjectDirs::from("ai", "burp", "studio")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("data"))
}

/// Get the configuration file path
pub fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("ai", "burp", "studio")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("config.toml"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        if let Ok(base_url) = std::env::var("BURP_API_URL") {
            config.api.base_url = base_url;
        }

        if let Ok(timeout_str) = std::env::var("BURP_REQUEST_TIMEOUT") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                config.api.request_timeout_seconds = Some(timeout);
            }
        }

        if let Ok(data_dir) = std::env::var("BURP_DATA_DIR") {
            let data_dir = PathBuf::from(data_dir);
            config.storage.path = data_dir.join("burp.db");
            config.export.output_directory = data_dir.join("exports");
            config.logging.log_directory = data_dir.join("logs");
        }

        if let Ok(page_size_str) = std::env::var("BURP_PAGE_SIZE") {
            if let Ok(page_size) = page_size_str.parse::<usize>() {
                config.table.page_size = page_size;
            }
        }

        if let Ok(log_level) = std::env::var("BURP_LOG_LEVEL") {
            config.logging.level = log_level;
        }
    }
}
