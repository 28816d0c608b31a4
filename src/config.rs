use crate::error::ConfigError;
use reqwest::Url;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Configuration file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "pageflow.toml";

/// Endpoint the query term is appended to
pub const DEFAULT_API_URL: &str = "http://api.goeuro.com/api/v2/position/suggest/en/";

/// Separator between nesting levels in flattened keys
pub const DEFAULT_ATTRIBUTES_DELIMITER: &str = ".";

/// Reads attempted per page before giving up
pub const DEFAULT_CONNECTION_ATTEMPTS: i64 = 3;

/// Seconds to wait between read attempts
pub const DEFAULT_RECONNECTION_DELAY_SECS: i64 = 1;

/// Columns written, in order, `;`-separated
pub const DEFAULT_ATTRIBUTES_WANTED: &str =
    "_id;name;type;geo_position.latitude;geo_position.longitude";

pub const DEFAULT_CSV_DELIMITER: &str = ",";

pub const DEFAULT_CSV_PATH: &str = "GoEuroTest.csv";

/// Per-request HTTP timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Runtime settings, loaded from an optional TOML file.
///
/// Every key is optional; missing keys take the `DEFAULT_*` constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_url: String,
    pub attributes_delimiter: String,
    pub connection_attempts: i64,
    pub reconnection_delay: i64,
    #[serde(deserialize_with = "attribute_list")]
    pub attributes_wanted: Vec<String>,
    pub csv_delimiter: String,
    pub csv_path: PathBuf,
    pub request_timeout: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            attributes_delimiter: DEFAULT_ATTRIBUTES_DELIMITER.to_string(),
            connection_attempts: DEFAULT_CONNECTION_ATTEMPTS,
            reconnection_delay: DEFAULT_RECONNECTION_DELAY_SECS,
            attributes_wanted: split_attributes(DEFAULT_ATTRIBUTES_WANTED),
            csv_delimiter: DEFAULT_CSV_DELIMITER.to_string(),
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = ?path, "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;

        info!(path = ?path, "Loaded configuration");
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attributes_delimiter.is_empty() {
            return Err(ConfigError::Invalid(
                "attributes_delimiter must not be empty".to_string(),
            ));
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout must be at least 1 second".to_string(),
            ));
        }
        self.csv_delimiter_byte()?;
        Url::parse(&self.api_url)
            .map_err(|e| ConfigError::Invalid(format!("api_url {:?}: {e}", self.api_url)))?;
        Ok(())
    }

    /// Attempt budget; zero or negative disables extraction entirely.
    pub fn max_attempts(&self) -> u32 {
        self.connection_attempts.clamp(0, i64::from(u32::MAX)) as u32
    }

    /// Backoff between attempts; negative values clamp to zero.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.reconnection_delay.max(0) as u64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn csv_delimiter_byte(&self) -> Result<u8, ConfigError> {
        match self.csv_delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(ConfigError::Invalid(format!(
                "csv_delimiter must be a single ASCII character, got {:?}",
                self.csv_delimiter
            ))),
        }
    }

    /// `api_url` with `query` appended as one escaped path segment.
    pub fn source_url(&self, query: &str) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| ConfigError::Invalid(format!("api_url {:?}: {e}", self.api_url)))?;
        url.path_segments_mut()
            .map_err(|_| ConfigError::Invalid(format!("api_url {:?} cannot take a path", self.api_url)))?
            .pop_if_empty()
            .push(query);
        Ok(url)
    }
}

pub fn split_attributes(joined: &str) -> Vec<String> {
    joined
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AttributeList {
    Joined(String),
    List(Vec<String>),
}

fn attribute_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match AttributeList::deserialize(deserializer)? {
        AttributeList::Joined(s) => split_attributes(&s),
        AttributeList::List(v) => v,
    })
}
