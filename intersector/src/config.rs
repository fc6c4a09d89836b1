use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{IntersectError, Result};

/// log2(1.5): a 1.5-fold change in either direction.
pub const DEFAULT_LOG2FC_THRESHOLD: f64 = 0.585;
pub const DEFAULT_PVALUE_THRESHOLD: f64 = 0.05;
pub const DEFAULT_ANNOTATOR: &str = "annotatePeaks.pl";
pub const DEFAULT_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// Genome assemblies the annotation tool is installed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genome {
    Mm10,
    Mm39,
    Hg19,
    Hg38,
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Genome::Mm10 => "mm10",
            Genome::Mm39 => "mm39",
            Genome::Hg19 => "hg19",
            Genome::Hg38 => "hg38",
        };
        write!(f, "{s}")
    }
}

/// Whether the annotation table starts with a header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// Detect from the first row.
    #[default]
    Auto,
    Present,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Magnitude cut-off applied symmetrically to log2 fold change.
    pub log2_fold_change: f64,
    pub p_value: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            log2_fold_change: DEFAULT_LOG2FC_THRESHOLD,
            p_value: DEFAULT_PVALUE_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        if !self.log2_fold_change.is_finite() || self.log2_fold_change < 0.0 {
            return Err(IntersectError::InvalidConfig(format!(
                "log2 fold-change threshold must be a non-negative number, got {}",
                self.log2_fold_change
            )));
        }
        if !(self.p_value > 0.0 && self.p_value <= 1.0) {
            return Err(IntersectError::InvalidConfig(format!(
                "p-value threshold must lie in (0, 1], got {}",
                self.p_value
            )));
        }
        Ok(())
    }
}

/// Tunables that may come from a JSON config file. Command-line values win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub thresholds: Thresholds,
    pub output_dir: PathBuf,
    pub annotator: String,
    /// `None` waits for the annotator indefinitely.
    pub timeout_secs: Option<u64>,
    pub annotation_header: HeaderMode,
    pub deg_has_header: bool,
    pub keep_intermediates: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            output_dir: PathBuf::from("."),
            annotator: DEFAULT_ANNOTATOR.to_string(),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            annotation_header: HeaderMode::Auto,
            deg_has_header: true,
            keep_intermediates: false,
        }
    }
}

impl RunSettings {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        info!("Reading settings from {}", path.display());
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IntersectError::MissingInput(path.to_path_buf()),
            _ => IntersectError::Io(e),
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectConfig {
    pub deg_file: PathBuf,
    pub peak_file: PathBuf,
    pub genome: Genome,
    #[serde(flatten)]
    pub settings: RunSettings,
}

impl IntersectConfig {
    pub fn new(deg_file: impl Into<PathBuf>, peak_file: impl Into<PathBuf>, genome: Genome) -> Self {
        Self {
            deg_file: deg_file.into(),
            peak_file: peak_file.into(),
            genome,
            settings: RunSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.thresholds.validate()?;
        if self.settings.annotator.trim().is_empty() {
            return Err(IntersectError::InvalidConfig("annotator program must not be empty".into()));
        }
        if self.settings.timeout_secs == Some(0) {
            return Err(IntersectError::InvalidConfig(
                "annotation timeout must be positive; omit it to wait indefinitely".into(),
            ));
        }
        Ok(())
    }
}
