use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use dpcount_engine::PrivacyParameters;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConfigFormat {
    Auto,
    Toml,
    Yaml,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format:?} config: {details}")]
    Parse {
        format: ConfigFormat,
        details: String,
    },
    #[error("configuration invalid: {0}")]
    Validation(String),
    #[error(transparent)]
    Privacy(#[from] dpcount_engine::ConfigError),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub privacy: PrivacyParameters,
    #[serde(default)]
    pub domain: DomainSection,
    #[serde(default)]
    pub io: IoSection,
    #[serde(default)]
    pub scenario: ScenarioSection,
}

/// Opening hours of the restaurant; both ends are part of the domain.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DomainSection {
    #[serde(default = "default_opening_hour")]
    pub opening_hour: i64,
    #[serde(default = "default_closing_hour")]
    pub closing_hour: i64,
}

impl Default for DomainSection {
    fn default() -> Self {
        Self {
            opening_hour: default_opening_hour(),
            closing_hour: default_closing_hour(),
        }
    }
}

impl DomainSection {
    pub fn hours(&self) -> impl Iterator<Item = i64> {
        self.opening_hour..=self.closing_hour
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IoSection {
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_non_private_output")]
    pub non_private_output: PathBuf,
    #[serde(default = "default_private_output")]
    pub private_output: PathBuf,
}

impl Default for IoSection {
    fn default() -> Self {
        Self {
            input: default_input(),
            non_private_output: default_non_private_output(),
            private_output: default_private_output(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScenarioSection {
    /// Only visits from this day are counted; all days when absent.
    #[serde(default)]
    pub day: Option<i64>,
    /// Worker count for sharded ingestion; 0 or 1 scans sequentially.
    #[serde(default)]
    pub shards: usize,
}

const fn default_opening_hour() -> i64 {
    9
}

const fn default_closing_hour() -> i64 {
    20
}

fn default_input() -> PathBuf {
    PathBuf::from("day_data.csv")
}

fn default_non_private_output() -> PathBuf {
    PathBuf::from("non_private.csv")
}

fn default_private_output() -> PathBuf {
    PathBuf::from("private.csv")
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.privacy.validate()?;
        let DomainSection {
            opening_hour,
            closing_hour,
        } = self.domain;
        if !(0..24).contains(&opening_hour) || !(0..24).contains(&closing_hour) {
            return Err(ConfigError::Validation(format!(
                "opening and closing hours must be within 0..=23 (got {opening_hour}..={closing_hour})"
            )));
        }
        if opening_hour > closing_hour {
            return Err(ConfigError::Validation(
                "opening hour cannot be after closing hour".into(),
            ));
        }
        if self.io.private_output == self.io.non_private_output {
            return Err(ConfigError::Validation(
                "private and non-private outputs must be different files".into(),
            ));
        }
        Ok(())
    }

    pub fn sample() -> Self {
        Self {
            privacy: PrivacyParameters::default(),
            domain: DomainSection::default(),
            io: IoSection::default(),
            scenario: ScenarioSection::default(),
        }
    }
}

pub fn load_config(path: &Path, format: ConfigFormat) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&contents, resolve_format(path, format))?;
    config.validate()?;
    Ok(config)
}

pub fn parse_config(contents: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    match format {
        ConfigFormat::Toml | ConfigFormat::Auto => {
            toml::from_str(contents).map_err(|err| ConfigError::Parse {
                format: ConfigFormat::Toml,
                details: err.to_string(),
            })
        }
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|err| ConfigError::Parse {
            format,
            details: err.to_string(),
        }),
    }
}

fn resolve_format(path: &Path, format: ConfigFormat) -> ConfigFormat {
    match format {
        ConfigFormat::Auto => match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        },
        _ => format,
    }
}
