//! Scheduler configuration: the upload mode, chunk size and frame interval.

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use media::Dimensions;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// How textures are streamed to the GPU.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(into = "String", try_from = "String")]
pub enum UploadMode {
    /// One whole texture per processed frame.
    #[default]
    OneByOne,
    /// Every queued whole texture in a single processed frame.
    AtTheSameTime,
    /// One chunk per processed frame. The new storage is shown as soon as it
    /// exists, so chunks appear as they land.
    Partial,
    /// One chunk per processed frame. The old content stays visible until
    /// every chunk has landed.
    PartialNoInterim,
}

impl UploadMode {
    pub const ALL: [UploadMode; 4] = [
        UploadMode::OneByOne,
        UploadMode::AtTheSameTime,
        UploadMode::Partial,
        UploadMode::PartialNoInterim,
    ];

    /// Whether textures are split into chunks in this mode.
    pub const fn is_chunked(&self) -> bool {
        matches!(self, UploadMode::Partial | UploadMode::PartialNoInterim)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            UploadMode::OneByOne => "one_by_one",
            UploadMode::AtTheSameTime => "at_the_same_time",
            UploadMode::Partial => "partial",
            UploadMode::PartialNoInterim => "partial_no_interim",
        }
    }
}

impl Display for UploadMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadMode {
    type Err = ConfigError;

    /// Parse a mode name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == lower)
            .ok_or_else(|| ConfigError::InvalidMode(s.to_owned()))
    }
}

impl From<UploadMode> for String {
    fn from(val: UploadMode) -> Self {
        val.as_str().to_owned()
    }
}

impl TryFrom<String> for UploadMode {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The size of one chunk in chunked modes. Both sides must be powers of two.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkSize {
    pub width: u32,
    pub height: u32,
}

impl ChunkSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check both sides are non-zero powers of two.
    pub fn validate(&self) -> Result<Dimensions, ConfigError> {
        Dimensions::new(self.width, self.height)
            .filter(Dimensions::is_power_of_two)
            .ok_or(ConfigError::NonPowerOfTwoChunkSize {
                width: self.width,
                height: self.height,
            })
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

impl Display for ChunkSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Everything that can be configured on a
/// [TextureUploader](crate::TextureUploader) apart from the completion
/// callback.
///
/// ```
/// # use uploader::{UploaderConfig, UploadMode};
/// let config = UploaderConfig::from_json_str(r#"{ "mode": "Partial", "interval": 2 }"#).unwrap();
/// assert_eq!(config.mode, UploadMode::Partial);
/// assert_eq!(config.chunk_size.width, 256);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct UploaderConfig {
    /// Work is only done on every `interval`th frame.
    pub interval: u32,
    pub mode: UploadMode,
    pub chunk_size: ChunkSize,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            interval: 1,
            mode: UploadMode::default(),
            chunk_size: ChunkSize::default(),
        }
    }
}

impl UploaderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        self.chunk_size.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take their
    /// default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
