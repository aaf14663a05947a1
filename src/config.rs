use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::scramble::{CubeType, DEFAULT_SCRAMBLE_LENGTH, MAX_SCRAMBLE_LENGTH, MIN_SCRAMBLE_LENGTH};
use crate::stats::StatsConfig;
use crate::timer::DEFAULT_HOLD_THRESHOLD_MS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub cube_type: CubeType,
    pub scramble_length: usize,
    pub hold_threshold_ms: u64,
    /// false hides the running time (focus mode)
    pub show_time: bool,
    /// Rolling windows shown while timing
    pub window_sizes: Vec<usize>,
    pub last_session: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cube_type: CubeType::ThreeByThree,
            scramble_length: DEFAULT_SCRAMBLE_LENGTH,
            hold_threshold_ms: DEFAULT_HOLD_THRESHOLD_MS,
            show_time: true,
            window_sizes: vec![5, 12],
            last_session: None,
        }
    }
}

impl Config {
    pub fn stats_config(&self) -> StatsConfig {
        StatsConfig::new(self.window_sizes.iter().copied())
    }

    pub fn set_scramble_length(&mut self, length: usize) {
        self.scramble_length = length.clamp(MIN_SCRAMBLE_LENGTH, MAX_SCRAMBLE_LENGTH);
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("cubestats_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("ignoring unreadable config {}: {err}", self.path.display());
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
