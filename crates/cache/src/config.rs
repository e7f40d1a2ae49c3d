//! Cache configuration system for user-configurable cache sizes and locations.
//!
//! Configuration can be loaded from a file, environment variables, or created
//! programmatically.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Configuration for the cache system.
///
/// Provides user-configurable settings for the memory and disk cache limits,
/// as well as the disk cache location.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Memory cache size limit in bytes
    pub memory_cache_size: usize,
    /// Disk cache size limit in bytes
    pub disk_cache_size: u64,
    /// Directory path for disk cache storage
    pub disk_cache_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_cache_size: 64 * 1024 * 1024,  // 64 MB
            disk_cache_size: 256 * 1024 * 1024,   // 256 MB
            disk_cache_dir: Self::default_cache_dir(),
        }
    }
}

impl CacheConfig {
    /// Creates a new cache configuration with custom values in megabytes.
    ///
    /// # Arguments
    /// * `memory_mb` - Memory cache size in megabytes
    /// * `disk_mb` - Disk cache size in megabytes
    /// * `disk_dir` - Directory path for disk cache storage
    pub fn new(memory_mb: usize, disk_mb: u64, disk_dir: PathBuf) -> Self {
        Self {
            memory_cache_size: memory_mb * 1024 * 1024,
            disk_cache_size: disk_mb * 1024 * 1024,
            disk_cache_dir: disk_dir,
        }
    }

    /// Sets the memory cache size in megabytes.
    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.memory_cache_size = mb * 1024 * 1024;
        self
    }

    /// Sets the disk cache size in megabytes.
    pub fn with_disk_mb(mut self, mb: u64) -> Self {
        self.disk_cache_size = mb * 1024 * 1024;
        self
    }

    /// Sets the disk cache directory.
    pub fn with_disk_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.disk_cache_dir = path.as_ref().to_path_buf();
        self
    }

    /// Returns the default cache directory for the current platform.
    ///
    /// - macOS: ~/Library/Caches/pixload/images
    /// - Linux: ~/.cache/pixload/images
    /// - Windows: %LOCALAPPDATA%\pixload\images
    pub fn default_cache_dir() -> PathBuf {
        if let Some(cache_dir) = dirs::cache_dir() {
            cache_dir.join("pixload").join("images")
        } else {
            // Fallback to current directory if cache dir unavailable
            PathBuf::from("cache/images")
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PIXLOAD_MEMORY_CACHE_MB`: memory cache size in MB (default: 64)
    /// - `PIXLOAD_DISK_CACHE_MB`: disk cache size in MB (default: 256)
    /// - `PIXLOAD_CACHE_DIR`: disk cache directory path
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PIXLOAD_MEMORY_CACHE_MB") {
            config.memory_cache_size = val
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue("PIXLOAD_MEMORY_CACHE_MB".to_string()))?
                * 1024
                * 1024;
        }

        if let Ok(val) = std::env::var("PIXLOAD_DISK_CACHE_MB") {
            config.disk_cache_size = val
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue("PIXLOAD_DISK_CACHE_MB".to_string()))?
                * 1024
                * 1024;
        }

        if let Ok(val) = std::env::var("PIXLOAD_CACHE_DIR") {
            config.disk_cache_dir = PathBuf::from(val);
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format:
    /// ```toml
    /// memory_cache_mb = 64
    /// disk_cache_mb = 256
    /// disk_cache_dir = "/path/to/cache"
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(ConfigError::IoError)?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in toml_str.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match key {
                    "memory_cache_mb" => {
                        config.memory_cache_size = value
                            .parse::<usize>()
                            .map_err(|_| ConfigError::InvalidValue(key.to_string()))?
                            * 1024
                            * 1024;
                    }
                    "disk_cache_mb" => {
                        config.disk_cache_size = value
                            .parse::<u64>()
                            .map_err(|_| ConfigError::InvalidValue(key.to_string()))?
                            * 1024
                            * 1024;
                    }
                    "disk_cache_dir" => {
                        config.disk_cache_dir = PathBuf::from(value);
                    }
                    _ => {} // Ignore unknown keys
                }
            }
        }

        Ok(config)
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml = self.to_toml();
        fs::write(path.as_ref(), toml).map_err(ConfigError::IoError)
    }

    /// Converts configuration to TOML format.
    fn to_toml(&self) -> String {
        format!(
            "# Pixload Cache Configuration\n\
             memory_cache_mb = {}\n\
             disk_cache_mb = {}\n\
             disk_cache_dir = \"{}\"\n",
            self.memory_cache_size / (1024 * 1024),
            self.disk_cache_size / (1024 * 1024),
            self.disk_cache_dir.display()
        )
    }

    /// Returns the memory cache size in megabytes.
    pub fn memory_cache_mb(&self) -> usize {
        self.memory_cache_size / (1024 * 1024)
    }

    /// Returns the disk cache size in megabytes.
    pub fn disk_cache_mb(&self) -> u64 {
        self.disk_cache_size / (1024 * 1024)
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    InvalidValue(String),
    /// I/O error reading or writing configuration file
    IoError(io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(key) => {
                write!(f, "Invalid value for configuration key: {}", key)
            }
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
