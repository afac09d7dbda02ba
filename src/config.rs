//! YAML configuration for a pipeline run.
//!
//! Every stage config lives in one file. Sections may be omitted and fall
//! back to their defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "daily-2023-11-03"
//!
//! run:
//!   archive: "data/20231103.nc.tar.gz"
//!   members: ["0000320193-23-000106.nc"]
//!   output_dir: "runs/20231103"
//!   skip_binary: true
//!   skip_existing: false
//!
//! ingest:
//!   version: 1
//!   max_member_bytes: 268435456
//!   drop_invalid_utf8: true
//!
//! canonical:
//!   version: 1
//!   treat_as_html: true
//!   normalize_unicode: false
//!
//! anchor:
//!   context_window: 80
//!   chunk_chars: 2000
//!   heading_max_chars: 140
//!
//! chunk:
//!   chunk_size: 40
//!   stride: 20
//!
//! hot_zone:
//!   threshold: 1.0
//!   verdict: "include"
//!
//! retry:
//!   max_attempts: 3
//!   base_delay: 1000
//!   max_delay: 10000
//!   jitter: true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anchor::AnchorConfig;
use canonical::CanonicalizeConfig;
use ingest::IngestConfig;
use plan::{ChunkConfig, HotZoneConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Top-level YAML configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub canonical: CanonicalizeConfig,

    #[serde(default)]
    pub anchor: AnchorConfig,

    #[serde(default)]
    pub chunk: ChunkConfig,

    #[serde(default)]
    pub hot_zone: HotZoneConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl PipelineConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.run.validate()?;
        self.ingest
            .validate()
            .map_err(|err| section_error("ingest", err))?;
        self.canonical
            .validate()
            .map_err(|err| section_error("canonical", err))?;
        self.anchor
            .validate()
            .map_err(|err| section_error("anchor", err))?;
        self.chunk
            .validate()
            .map_err(|err| section_error("chunk", err))?;
        self.hot_zone
            .validate()
            .map_err(|err| section_error("hot_zone", err))?;
        self.retry
            .validate()
            .map_err(|err| section_error("retry", err))?;

        Ok(())
    }

    /// The archive to read, or [`ConfigLoadError::MissingField`] when the
    /// `run` section names none.
    pub fn archive(&self) -> Result<&Path, ConfigLoadError> {
        self.run
            .archive
            .as_deref()
            .ok_or_else(|| ConfigLoadError::MissingField("run.archive".into()))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            run: RunConfig::default(),
            ingest: IngestConfig::default(),
            canonical: CanonicalizeConfig::default(),
            anchor: AnchorConfig::default(),
            chunk: ChunkConfig::default(),
            hot_zone: HotZoneConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

fn section_error(section: &str, err: impl std::fmt::Display) -> ConfigLoadError {
    ConfigLoadError::Validation(format!("{section}: {err}"))
}

/// Which archive to read and where bundles go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub archive: Option<PathBuf>,

    /// Members to process. Empty means every member of the archive.
    pub members: Vec<String>,

    /// One bundle directory per kept segment is created under here, plus
    /// `manifest.json`.
    pub output_dir: PathBuf,

    /// Run the built-in binary/graphic segment filter.
    pub skip_binary: bool,

    /// Record segments whose bundle directory already exists as skipped
    /// instead of failing the run.
    pub skip_existing: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            archive: None,
            members: Vec::new(),
            output_dir: PathBuf::from("out"),
            skip_binary: true,
            skip_existing: false,
        }
    }
}

impl RunConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigLoadError::Validation(
                "run.output_dir must not be empty".into(),
            ));
        }
        if let Some(member) = self.members.iter().find(|m| m.trim().is_empty()) {
            return Err(ConfigLoadError::Validation(format!(
                "run.members contains a blank entry: {member:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
version: "1.0"
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_load_full_config() {
        let yaml = r#"
version: "1.0"
name: "nightly"
run:
  archive: "data/20231103.nc.tar.gz"
  members: ["a.nc", "b.nc"]
  output_dir: "runs/x"
  skip_binary: false
ingest:
  max_member_bytes: 1048576
canonical:
  normalize_unicode: true
anchor:
  chunk_chars: 500
chunk:
  chunk_size: 10
  stride: 10
hot_zone:
  threshold: 2.5
  verdict: "include"
retry:
  max_attempts: 5
  base_delay: 250
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("nightly"));
        assert_eq!(config.archive().unwrap(), Path::new("data/20231103.nc.tar.gz"));
        assert_eq!(config.run.members, vec!["a.nc", "b.nc"]);
        assert!(!config.run.skip_binary);
        assert_eq!(config.ingest.max_member_bytes, Some(1_048_576));
        assert!(config.ingest.drop_invalid_utf8);
        assert!(config.canonical.normalize_unicode);
        assert_eq!(config.anchor.chunk_chars, Some(500));
        assert_eq!(config.anchor.context_window, 80);
        assert_eq!(config.chunk.chunk_size, 10);
        assert_eq!(config.hot_zone.threshold, 2.5);
        assert_eq!(config.hot_zone.verdict.as_deref(), Some("include"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "version: \"1\"\nrun:\n  output_dir: \"bundles\"").unwrap();
        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.run.output_dir, PathBuf::from("bundles"));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file("/nonexistent/pipeline.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileRead(_)));
    }

    #[test]
    fn test_invalid_version() {
        let err = PipelineConfig::from_yaml("version: \"2.0\"").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = PipelineConfig::from_yaml("version: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigLoadError::YamlParse(_)));
    }

    #[test]
    fn test_section_validation_is_prefixed() {
        let yaml = r#"
version: "1.0"
chunk:
  stride: 0
"#;
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        match err {
            ConfigLoadError::Validation(message) => {
                assert!(message.starts_with("chunk: "), "{message}");
                assert!(message.contains("positive"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let yaml = r#"
version: "1.0"
canonical:
  version: 0
"#;
        assert!(matches!(
            PipelineConfig::from_yaml(yaml),
            Err(ConfigLoadError::Validation(m)) if m.starts_with("canonical: ")
        ));
    }

    #[test]
    fn test_blank_member_rejected() {
        let yaml = r#"
version: "1.0"
run:
  members: ["a.nc", "  "]
"#;
        assert!(matches!(
            PipelineConfig::from_yaml(yaml),
            Err(ConfigLoadError::Validation(_))
        ));
    }

    #[test]
    fn test_archive_is_required_for_runs() {
        let config = PipelineConfig::default();
        assert!(matches!(
            config.archive(),
            Err(ConfigLoadError::MissingField(field)) if field == "run.archive"
        ));
    }
}
