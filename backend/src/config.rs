use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const OUTPUT_SUBDIR: &str = "output_images";
const TEXT_SUBDIR: &str = "text_files";
const LOG_FILE_NAME: &str = "detected_emotions.txt";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Whether concurrent batches may interleave their writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// No locking: concurrent batches race on the log and output files.
    #[default]
    Unlocked,
    /// One batch at a time, covering output writes and the log rewrite.
    Serialized,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            public_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub static_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static"),
        }
    }
}

impl StorageConfig {
    pub fn output_dir(&self) -> PathBuf {
        self.static_dir.join(OUTPUT_SUBDIR)
    }

    pub fn text_dir(&self) -> PathBuf {
        self.static_dir.join(TEXT_SUBDIR)
    }

    pub fn log_file(&self) -> PathBuf {
        self.text_dir().join(LOG_FILE_NAME)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8501/detect".to_string(),
            timeout_secs: 30,
        }
    }
}

impl DetectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub tick_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { tick_ms: 1000 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub detector: DetectorConfig,
    pub annotation: AnnotationConfig,
    pub progress: ProgressConfig,
    pub batch_policy: BatchPolicy,
}

impl AppConfig {
    /// Loads `.env`, then the YAML file named by `EMOTION_CONFIG`, then
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match env::var("EMOTION_CONFIG") {
            Ok(path) => Self::from_yaml_file(PathBuf::from(path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path, e))?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_value("PORT", port)?;
        }
        if let Some(base) = lookup("PUBLIC_BASE_URL") {
            self.server.public_base_url = Some(base.trim_end_matches('/').to_string());
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.storage.static_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("DETECTOR_URL") {
            self.detector.url = url;
        }
        if let Some(secs) = lookup("DETECTOR_TIMEOUT_SECS") {
            self.detector.timeout_secs = parse_value("DETECTOR_TIMEOUT_SECS", secs)?;
        }
        if let Some(font) = lookup("ANNOTATION_FONT") {
            self.annotation.font_path = Some(PathBuf::from(font));
        }
        if let Some(ms) = lookup("PROGRESS_TICK_MS") {
            self.progress.tick_ms = parse_value("PROGRESS_TICK_MS", ms)?;
        }
        if let Some(flag) = lookup("SERIALIZE_BATCHES") {
            self.batch_policy = if parse_value::<bool>("SERIALIZE_BATCHES", flag)? {
                BatchPolicy::Serialized
            } else {
                BatchPolicy::Unlocked
            };
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
