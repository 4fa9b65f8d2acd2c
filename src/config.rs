//! Run configuration: a TOML file, overridable from the command line.
//!
//! ```toml
//! inputs = ["data/DfTRoadSafety_Accidents_2010.csv", "data/DfTRoadSafety_Accidents_201[1-3].csv"]
//! output = "target/DfTRoadSafety_Accidents_consolidated.csv"
//! batch_size = 10000
//! queue_capacity = 10
//! enrich_threads = 4
//! ```

use crate::error::PipelineError;
use crate::io::csv::CsvFormat;
use crate::io::glob::expand_inputs;
use crate::logging::LogLevel;
use crate::pipeline::{DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY, PipelineOptions};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Paths or glob patterns, processed in this order.
    pub inputs: Vec<String>,
    pub output: PathBuf,
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub enrich_threads: usize,
    pub has_headers: bool,
    pub delimiter: char,
    pub log_level: LogLevel,
    pub log_json: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: PathBuf::from("target/consolidated.csv"),
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            enrich_threads: 1,
            has_headers: true,
            delimiter: ',',
            log_level: LogLevel::Info,
            log_json: false,
        }
    }
}

impl RunConfig {
    /// # Errors
    /// The file cannot be read or is not valid TOML for this struct.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parse config {}", path.display()))
    }

    /// # Errors
    /// `text` is not valid TOML for this struct.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// # Errors
    /// [`PipelineError::InvalidConfig`] describing the first bad setting.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::InvalidConfig(msg.to_string()));
        if self.inputs.is_empty() {
            return invalid("at least one input is required");
        }
        if self.batch_size == 0 {
            return invalid("batch size must be at least 1");
        }
        if self.queue_capacity == 0 {
            return invalid("queue capacity must be at least 1");
        }
        if self.enrich_threads == 0 {
            return invalid("enrich threads must be at least 1");
        }
        if !self.delimiter.is_ascii() {
            return invalid("delimiter must be a single ASCII character");
        }
        Ok(())
    }

    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            batch_size: self.batch_size,
            queue_capacity: self.queue_capacity,
        }
    }

    /// Dialect for inputs and output. Call after [`RunConfig::validate`].
    #[must_use]
    pub fn csv_format(&self) -> CsvFormat {
        CsvFormat {
            has_headers: self.has_headers,
            delimiter: u8::try_from(self.delimiter).unwrap_or(b','),
        }
    }

    /// Expand glob patterns into the ordered file list.
    ///
    /// # Errors
    /// An invalid pattern or one that matches nothing.
    pub fn resolve_inputs(&self) -> anyhow::Result<Vec<PathBuf>> {
        expand_inputs(&self.inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() -> anyhow::Result<()> {
        let cfg = RunConfig::from_toml(r#"inputs = ["a.csv"]"#)?;
        assert_eq!(cfg.batch_size, 10_000);
        assert_eq!(cfg.queue_capacity, 10);
        assert_eq!(cfg.enrich_threads, 1);
        assert!(cfg.has_headers);
        assert!(cfg.validate().is_ok());
        Ok(())
    }

    #[test]
    fn full_file_parses() -> anyhow::Result<()> {
        let cfg = RunConfig::from_toml(
            r#"
            inputs = ["x/*.csv", "y.csv"]
            output = "out/all.csv.gz"
            batch_size = 5
            queue_capacity = 1
            enrich_threads = 2
            has_headers = false
            delimiter = ";"
            log_level = "debug"
            log_json = true
            "#,
        )?;
        assert_eq!(cfg.inputs, vec!["x/*.csv", "y.csv"]);
        assert_eq!(cfg.output, PathBuf::from("out/all.csv.gz"));
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.csv_format().delimiter, b';');
        assert!(!cfg.csv_format().has_headers);
        Ok(())
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(RunConfig::from_toml("inputs = []\nworkers = 20").is_err());
    }

    #[test]
    fn validation_rejects_zero_sizes() {
        let base = RunConfig {
            inputs: vec!["a.csv".into()],
            ..RunConfig::default()
        };
        for cfg in [
            RunConfig { batch_size: 0, ..base.clone() },
            RunConfig { queue_capacity: 0, ..base.clone() },
            RunConfig { enrich_threads: 0, ..base.clone() },
            RunConfig { delimiter: 'é', ..base.clone() },
            RunConfig { inputs: vec![], ..base.clone() },
        ] {
            assert!(matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_))));
        }
    }
}
