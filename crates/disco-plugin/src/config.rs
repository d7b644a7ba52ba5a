use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "DISCO_DATA_DIR";
pub const LOG_LEVEL_ENV: &str = "DISCO_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub data_dir: PathBuf,
    pub db_file_name: String,
    pub log_file_name: String,
    pub log_level: String,
    pub log_queue_capacity: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file_name: "disco.db".to_string(),
            log_file_name: "disco.log".to_string(),
            log_level: "info".to_string(),
            log_queue_capacity: 1024,
        }
    }
}

impl PluginConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(dir) = value(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = value(LOG_LEVEL_ENV) {
            config.log_level = level.trim().to_string();
        }
        config
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file_name)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file_name)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("disco"))
        .unwrap_or_else(|| PathBuf::from("data"))
}
