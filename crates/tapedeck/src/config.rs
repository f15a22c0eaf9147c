//! Configuration surface for the cassette engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matchers;
use crate::recorder::RecordMode;
use crate::scrub::Redaction;
use crate::storage::StorageKind;

/// Recognized options: cassette directory, storage encoding, enabled
/// matcher names, record mode and the redaction list. Loadable from a YAML
/// file except for redactions, which may carry callbacks and are attached
/// programmatically.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory the cassette files live in. Must exist; never created
    /// implicitly.
    #[serde(default = "default_cassette_dir")]
    pub cassette_dir: PathBuf,

    /// Storage encoding: json, yaml or blackhole.
    #[serde(default)]
    pub storage: StorageKind,

    /// Request matchers enabled for playback comparison, in order.
    #[serde(default = "default_matchers")]
    pub enabled_matchers: Vec<String>,

    /// Record mode: new_episodes, once or none.
    #[serde(default)]
    pub mode: RecordMode,

    /// Token → secret redactions applied around storage.
    #[serde(skip)]
    pub redactions: Vec<Redaction>,
}

fn default_cassette_dir() -> PathBuf {
    PathBuf::from("tests/fixtures")
}

fn default_matchers() -> Vec<String> {
    matchers::available()
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cassette_dir: default_cassette_dir(),
            storage: StorageKind::default(),
            enabled_matchers: default_matchers(),
            mode: RecordMode::default(),
            redactions: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on setup mistakes: a missing cassette directory or an
    /// unknown/empty matcher name. Mode and storage names are validated by
    /// their types at parse time.
    pub fn validate(&self) -> Result<()> {
        if self.storage != StorageKind::Blackhole && !self.cassette_dir.is_dir() {
            return Err(Error::CassettePathNotFound(
                self.cassette_dir.display().to_string(),
            ));
        }
        for name in &self.enabled_matchers {
            matchers::create(name)?;
        }
        Ok(())
    }

    pub fn with_redaction(mut self, redaction: Redaction) -> Self {
        self.redactions.push(redaction);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_matcher() {
        let config = Config::default();
        assert_eq!(config.enabled_matchers, default_matchers());
        assert_eq!(config.storage, StorageKind::Json);
        assert_eq!(config.mode, RecordMode::NewEpisodes);
    }

    #[test]
    fn validate_rejects_missing_cassette_dir() {
        let mut config = Config::default();
        config.cassette_dir = PathBuf::from("/definitely/not/here");
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::CassettePathNotFound(_)
        ));
    }

    #[test]
    fn validate_rejects_unknown_matcher_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cassette_dir = dir.path().to_path_buf();
        config.enabled_matchers = vec!["method".to_string(), "vibes".to_string()];
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::UnknownMatcher(..)
        ));
    }

    #[test]
    fn loads_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let cassettes = dir.path().join("cassettes");
        std::fs::create_dir(&cassettes).unwrap();
        let config_path = dir.path().join("tapedeck.yml");
        std::fs::write(
            &config_path,
            format!(
                "cassette_dir: {}\nstorage: yaml\nmode: once\nenabled_matchers: [method, url]\n",
                cassettes.display()
            ),
        )
        .unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.storage, StorageKind::Yaml);
        assert_eq!(config.mode, RecordMode::Once);
        assert_eq!(config.enabled_matchers, vec!["method", "url"]);
    }

    #[test]
    fn invalid_mode_name_fails_at_parse_time() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("tapedeck.yml");
        std::fs::write(&config_path, "mode: sometimes\n").unwrap();
        assert!(matches!(
            Config::from_file(&config_path).unwrap_err(),
            Error::Yaml(_)
        ));
    }
}
