//! Configuration management for the Plaza wallet and casino games
//!
//! Defaults reproduce the stock tables. A TOML file can override any field,
//! and a handful of `PLAZA_*` environment variables override the file.

use crate::errors::{ConfigurationError, PlazaResult};
use crate::games::plinko::PLINKO_MULTIPLIERS_TENTHS;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Complete Plaza configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlazaConfig {
    pub wallet: WalletConfig,
    pub storage: StorageConfig,
    pub mines: MinesConfig,
    pub plinko: PlinkoConfig,
    pub crash: CrashConfig,
}

/// Shared balance settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WalletConfig {
    /// Key the balance is persisted under
    pub storage_key: String,
    /// Balance used when nothing is persisted and on reset
    pub default_balance: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            storage_key: "wallet-sh".to_string(),
            default_balance: 10_000,
        }
    }
}

/// Backend selection for the persisted store
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local map, lost on exit
    Memory,
    /// RocksDB database under `data_directory`
    Rocksdb,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    /// Upper bound on records returned by one history page
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Rocksdb,
            data_directory: "./plaza_data".to_string(),
            history_limit: 50,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MinesConfig {
    pub grid_size: u8,
    pub default_mines: u8,
}

impl Default for MinesConfig {
    fn default() -> Self {
        Self {
            grid_size: 25,
            default_mines: 2,
        }
    }
}

/// Board geometry and physics constants for the ball drop
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlinkoConfig {
    pub slots: usize,
    pub rows: usize,
    pub peg_radius: f64,
    pub ball_radius: f64,
    pub spacing_x: f64,
    pub spacing_y: f64,
    pub board_width: f64,
    pub board_height: f64,
    pub top_margin: f64,
    pub floor_margin: f64,
    pub gravity: f64,
    pub drag: f64,
    pub bounce: f64,
    pub max_velocity: f64,
    pub substeps: u32,
    pub max_balls_per_drop: u32,
    /// Frames after which a ball that never reached the floor is landed where it is
    pub max_frames: u32,
}

impl Default for PlinkoConfig {
    fn default() -> Self {
        Self {
            slots: 13,
            rows: 12,
            peg_radius: 4.0,
            ball_radius: 5.5,
            spacing_x: 28.0,
            spacing_y: 28.0,
            board_width: 400.0,
            board_height: 420.0,
            top_margin: 28.0,
            floor_margin: 28.0,
            gravity: 0.35,
            drag: 0.995,
            bounce: 0.22,
            max_velocity: 6.2,
            substeps: 3,
            max_balls_per_drop: 10,
            max_frames: 5_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrashConfig {
    /// `k` in `m(t) = e^(k·t)`, t in seconds
    pub growth_rate: f64,
    pub rare_probability: f64,
    pub max_crash: f64,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            growth_rate: 0.35,
            rare_probability: 0.03,
            max_crash: 50.0,
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> PlazaResult<PlazaConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => PlazaConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> PlazaResult<PlazaConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut PlazaConfig) -> PlazaResult<()> {
        if let Ok(balance) = env::var("PLAZA_DEFAULT_BALANCE") {
            config.wallet.default_balance = balance.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "PLAZA_DEFAULT_BALANCE".to_string(),
                value: balance,
                reason: "Expected a non-negative integer".to_string(),
            })?;
        }
        if let Ok(key) = env::var("PLAZA_WALLET_KEY") {
            config.wallet.storage_key = key;
        }
        if let Ok(backend) = env::var("PLAZA_STORAGE_BACKEND") {
            config.storage.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::Rocksdb,
                _ => {
                    return Err(ConfigurationError::InvalidValue {
                        field: "PLAZA_STORAGE_BACKEND".to_string(),
                        value: backend,
                        reason: "Expected 'memory' or 'rocksdb'".to_string(),
                    }
                    .into())
                }
            };
        }
        if let Ok(data_dir) = env::var("PLAZA_DATA_DIR") {
            config.storage.data_directory = data_dir;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &PlazaConfig) -> PlazaResult<()> {
        if config.wallet.storage_key.is_empty() {
            return Err(ConfigurationError::MissingRequired("wallet.storage_key".to_string()).into());
        }

        if config.storage.backend == StorageBackend::Rocksdb && config.storage.data_directory.is_empty() {
            return Err(ConfigurationError::MissingRequired("storage.data_directory".to_string()).into());
        }

        if config.storage.history_limit == 0 {
            return Err(invalid("storage.history_limit", "0", "History limit cannot be zero"));
        }

        let mines = &config.mines;
        if mines.grid_size < 2 {
            return Err(invalid(
                "mines.grid_size",
                &mines.grid_size.to_string(),
                "Grid needs at least two tiles",
            ));
        }
        if mines.default_mines == 0 || mines.default_mines >= mines.grid_size {
            return Err(invalid(
                "mines.default_mines",
                &mines.default_mines.to_string(),
                "Must leave at least one mine and one safe tile",
            ));
        }

        let plinko = &config.plinko;
        if plinko.slots != PLINKO_MULTIPLIERS_TENTHS.len() {
            return Err(invalid(
                "plinko.slots",
                &plinko.slots.to_string(),
                "Must match the multiplier table",
            ));
        }
        if plinko.rows == 0 || plinko.substeps == 0 || plinko.max_frames == 0 {
            return Err(ConfigurationError::ValidationFailed(
                "plinko.rows, plinko.substeps and plinko.max_frames must be positive".to_string(),
            )
            .into());
        }
        if plinko.max_balls_per_drop == 0 {
            return Err(invalid("plinko.max_balls_per_drop", "0", "At least one ball per drop"));
        }
        let last_peg_row = plinko.top_margin + plinko.rows as f64 * plinko.spacing_y;
        if plinko.board_height - plinko.floor_margin <= last_peg_row {
            return Err(invalid(
                "plinko.board_height",
                &plinko.board_height.to_string(),
                "Floor must sit below the last peg row",
            ));
        }

        let crash = &config.crash;
        if !(crash.growth_rate > 0.0) {
            return Err(invalid(
                "crash.growth_rate",
                &crash.growth_rate.to_string(),
                "Growth rate must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&crash.rare_probability) {
            return Err(invalid(
                "crash.rare_probability",
                &crash.rare_probability.to_string(),
                "Probability must lie in [0, 1]",
            ));
        }
        if crash.max_crash < 1.0 {
            return Err(invalid(
                "crash.max_crash",
                &crash.max_crash.to_string(),
                "Cap must be at least 1x",
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &PlazaConfig, path: &str) -> PlazaResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> crate::errors::PlazaError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Builder pattern for creating configurations
#[derive(Default)]
pub struct ConfigBuilder {
    config: PlazaConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wallet(mut self, wallet: WalletConfig) -> Self {
        self.config.wallet = wallet;
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// In-memory storage, handy for tests and one-off sessions
    pub fn in_memory(mut self) -> Self {
        self.config.storage.backend = StorageBackend::Memory;
        self
    }

    pub fn default_balance(mut self, balance: u64) -> Self {
        self.config.wallet.default_balance = balance;
        self
    }

    pub fn mines(mut self, mines: MinesConfig) -> Self {
        self.config.mines = mines;
        self
    }

    pub fn plinko(mut self, plinko: PlinkoConfig) -> Self {
        self.config.plinko = plinko;
        self
    }

    pub fn crash(mut self, crash: CrashConfig) -> Self {
        self.config.crash = crash;
        self
    }

    pub fn build(self) -> PlazaConfig {
        self.config
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &str) -> PlazaResult<()> {
    ConfigLoader::new().save(&PlazaConfig::default(), path)
}
