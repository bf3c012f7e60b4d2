use crate::search::{DEFAULT_DESTINATION, SweepOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write sweep configuration: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML sweep configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize sweep configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

fn default_destination() -> PathBuf {
    PathBuf::from(DEFAULT_DESTINATION)
}

/// A regularization sweep as stored in a human-editable TOML file.
///
/// ```toml
/// sigmas = [1e-6, 1e-4, 1e-2, 1.0]
/// destination = "./Results_validation_set"
/// mean_center = -12.5
/// parallel = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub sigmas: Vec<f64>,
    #[serde(default = "default_destination")]
    pub destination: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_center: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rcond: Option<f64>,
    #[serde(default)]
    pub parallel: bool,
}

impl SweepConfig {
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            destination: default_destination(),
            mean_center: None,
            rcond: None,
            parallel: false,
        }
    }

    pub fn to_options(&self) -> SweepOptions {
        SweepOptions {
            mean_center: self.mean_center,
            rcond: self.rcond,
            parallel: self.parallel,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_fields_take_defaults() {
        let config: SweepConfig = toml::from_str("sigmas = [0.1, 1.0]").expect("parse");
        assert_eq!(config.sigmas, vec![0.1, 1.0]);
        assert_eq!(config.destination, PathBuf::from(DEFAULT_DESTINATION));
        assert_eq!(config.mean_center, None);
        assert!(!config.parallel);
    }

    #[test]
    fn config_survives_save_and_load() {
        let mut config = SweepConfig::new(vec![1e-3, 1e-1, 10.0]);
        config.mean_center = Some(-3.5);
        config.parallel = true;

        let file = NamedTempFile::new().expect("Failed to create temp file");
        config.save(file.path()).expect("save");
        let loaded = SweepConfig::load(file.path()).expect("load");
        assert_eq!(loaded, config);

        let options = loaded.to_options();
        assert_eq!(options.mean_center, Some(-3.5));
        assert!(options.parallel);
    }
}
