//! TOML configuration
//!
//! Everything has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! [encoder]
//! program = "/opt/wwise/WwiseConsole.sh"
//! project = "~/WwiseProjects/Mod/Mod.wproj"
//! timeout_secs = 120
//!
//! [search]
//! min_quality = -2
//! max_quality = 10
//! adaptive = true
//! sample_rates = [48000, 44100, 32000, 24000, 22050, 16000, 11025, 8000]
//!
//! [scan]
//! signature = [1, 0, 4, 0, 2]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::formats::bnk::Signature;

/// Default config file name, looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "bnkforge.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub encoder: EncoderConfig,
    pub search: SearchConfig,
    pub scan: ScanConfig,
}

/// How to invoke the external encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder executable (name on PATH or full path)
    pub program: String,
    /// Argument template. Placeholders: `{project}`, `{descriptor}`,
    /// `{output_dir}`, `{input}`, `{quality}`
    pub args: Vec<String>,
    /// Encoder project file substituted for `{project}`
    pub project: Option<PathBuf>,
    /// Conversion name written to the descriptor; `{quality}` is substituted
    pub conversion: String,
    /// Extension of the artifact the encoder writes
    pub artifact_extension: String,
    /// Per-invocation time budget
    pub timeout_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "WwiseConsole".to_string(),
            args: [
                "convert-external-source",
                "{project}",
                "--source-file",
                "{descriptor}",
                "--output",
                "{output_dir}",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            project: None,
            conversion: "Vorbis Quality {quality}".to_string(),
            artifact_extension: "wem".to_string(),
            timeout_secs: 120,
        }
    }
}

impl EncoderConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Quality and sample rate search bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Lowest quality value the encoder accepts
    pub min_quality: i32,
    /// Highest quality value the encoder accepts
    pub max_quality: i32,
    /// Fall back to lower sample rates when no quality fits
    pub adaptive: bool,
    /// Candidate sample rates, descending
    pub sample_rates: Vec<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_quality: -2,
            max_quality: 10,
            adaptive: true,
            sample_rates: vec![48000, 44100, 32000, 24000, 22050, 16000, 11025, 8000],
        }
    }
}

/// SoundBank scanning options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Byte pattern preceding each record's source ID
    pub signature: Signature,
}

impl ForgeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `explicit` if given, else the default config file if present, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if search.min_quality > search.max_quality {
            return Err(config_error(format!(
                "min_quality ({}) is greater than max_quality ({})",
                search.min_quality, search.max_quality
            )));
        }
        if search.sample_rates.is_empty() {
            return Err(config_error("sample_rates must not be empty".to_string()));
        }
        if search.sample_rates.contains(&0) {
            return Err(config_error("sample_rates must be non-zero".to_string()));
        }
        if search.sample_rates.windows(2).any(|w| w[0] <= w[1]) {
            return Err(config_error(
                "sample_rates must be strictly descending".to_string(),
            ));
        }
        if self.encoder.program.trim().is_empty() {
            return Err(config_error("encoder program must be set".to_string()));
        }
        if self.encoder.timeout_secs == 0 {
            return Err(config_error("timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// `<config dir>/bnkforge.toml`, if the platform has a config directory
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

fn config_error(message: String) -> Error {
    Error::Config { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_default() {
        let config = ForgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ForgeConfig::default());
        assert_eq!(config.scan.signature, Signature::VORBIS_STREAMED);
    }

    #[test]
    fn test_partial_override() {
        let config = ForgeConfig::from_toml_str(
            r#"
            [encoder]
            program = "/usr/local/bin/fake-encoder"
            timeout_secs = 5

            [search]
            max_quality = 4
            adaptive = false

            [scan]
            signature = [1, 0, 4, 0, 0]
            "#,
        )
        .unwrap();

        assert_eq!(config.encoder.program, "/usr/local/bin/fake-encoder");
        assert_eq!(config.encoder.timeout(), Duration::from_secs(5));
        assert_eq!(config.encoder.artifact_extension, "wem");
        assert_eq!(config.search.min_quality, -2);
        assert_eq!(config.search.max_quality, 4);
        assert!(!config.search.adaptive);
        assert_eq!(config.scan.signature, Signature::VORBIS_EMBEDDED);
    }

    #[test]
    fn test_rejects_inverted_quality_range() {
        let err = ForgeConfig::from_toml_str("[search]\nmin_quality = 5\nmax_quality = 1\n")
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_rejects_unsorted_rates() {
        let err =
            ForgeConfig::from_toml_str("[search]\nsample_rates = [22050, 44100]\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_rejects_bad_signature_length() {
        let err = ForgeConfig::from_toml_str("[scan]\nsignature = [1, 2, 3]\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }
}
