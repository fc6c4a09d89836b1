use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Genome, HeaderMode, IntersectConfig, RunSettings};
use crate::errors::Result;

#[derive(Debug, Parser)]
#[command(name = "chip-rna-intersect")]
#[command(version)]
#[command(about = "Intersect RNA-seq differential expression with ChIP-seq peak annotation")]
#[command(long_about = r#"
chip-rna-intersect - which differentially expressed genes are bound by the factor?

WORKFLOW:
  DE table → normalize → annotatePeaks.pl <peaks> <genome> → classify up/down
  → intersect with bound genes → summary, gene lists, Venn diagram, bar graph

INPUT:
  DE table   .csv, .tsv/.txt, .xls/.xlsx; three columns in this order:
             gene id, log2 fold change, p-value (first row is a header)
  Peaks      BED/narrowPeak file passed straight to the annotator

OUTPUT FILES (in --outdir):
  upregulated_genes.txt, downregulated_genes.txt
  upregulated_bound_genes.txt, downregulated_bound_genes.txt
  intersect_summary.txt, intersect_summary.json
  venn_diagram.png, bar_graph.png, run_config.json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full intersection pipeline
    Intersect(IntersectArgs),
    /// Append annotated gene names to a called-peak BED file
    AnnotateBed(AnnotateBedArgs),
}

#[derive(Debug, Args)]
pub struct IntersectArgs {
    #[arg(
        short = 'r',
        long = "rnaseq",
        value_name = "PATH",
        help = "Differential expression table: gene id, log2FC, p-value"
    )]
    pub deg_file: PathBuf,

    #[arg(short = 'b', long = "bed", value_name = "PATH", help = "ChIP-seq called peaks (BED)")]
    pub peak_file: PathBuf,

    #[arg(short = 'g', long = "genome", value_enum, help = "Genome the samples are aligned to")]
    pub genome: Genome,

    #[arg(short = 'f', long = "log2fc", value_name = "FLOAT", help = "log2 fold-change cutoff [default: 0.585]")]
    pub log2fc: Option<f64>,

    #[arg(short = 'p', long = "pval", value_name = "FLOAT", help = "p-value cutoff [default: 0.05]")]
    pub pval: Option<f64>,

    #[arg(short = 'o', long = "outdir", value_name = "DIR", help = "Output directory [default: .]")]
    pub output_dir: Option<PathBuf>,

    #[arg(long = "annotator", value_name = "PROGRAM", help = "Annotation program [default: annotatePeaks.pl]")]
    pub annotator: Option<String>,

    #[arg(
        long = "timeout-secs",
        value_name = "SECONDS",
        help = "Abort annotation after this many seconds; 0 waits indefinitely [default: 7200]"
    )]
    pub timeout_secs: Option<u64>,

    #[arg(long = "annotation-header", value_enum, help = "Header row in the annotation output [default: auto]")]
    pub annotation_header: Option<HeaderMode>,

    #[arg(long = "deg-no-header", help = "The DE table has no header row")]
    pub deg_no_header: bool,

    #[arg(long = "keep-intermediates", help = "Keep the normalized table and raw annotation")]
    pub keep_intermediates: bool,

    #[arg(short = 'c', long = "config", value_name = "JSON", help = "Settings file; flags override it")]
    pub config: Option<PathBuf>,
}

impl IntersectArgs {
    /// Settings file first, then command-line overrides.
    pub fn into_config(self) -> Result<IntersectConfig> {
        let mut settings = match &self.config {
            Some(path) => RunSettings::from_json_file(path)?,
            None => RunSettings::default(),
        };

        if let Some(v) = self.log2fc {
            settings.thresholds.log2_fold_change = v;
        }
        if let Some(v) = self.pval {
            settings.thresholds.p_value = v;
        }
        if let Some(dir) = self.output_dir {
            settings.output_dir = dir;
        }
        if let Some(program) = self.annotator {
            settings.annotator = program;
        }
        if let Some(secs) = self.timeout_secs {
            settings.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(mode) = self.annotation_header {
            settings.annotation_header = mode;
        }
        if self.deg_no_header {
            settings.deg_has_header = false;
        }
        if self.keep_intermediates {
            settings.keep_intermediates = true;
        }

        let config = IntersectConfig {
            deg_file: self.deg_file,
            peak_file: self.peak_file,
            genome: self.genome,
            settings,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct AnnotateBedArgs {
    #[arg(short = 'b', long = "bed", value_name = "PATH", help = "Called peaks (BED/narrowPeak)")]
    pub bed_file: PathBuf,

    #[arg(short = 'a', long = "annotation", value_name = "PATH", help = "annotatePeaks.pl output")]
    pub annotation_file: PathBuf,

    #[arg(short = 'o', long = "output", value_name = "PATH", help = "Annotated BED to write")]
    pub output: PathBuf,

    #[arg(long = "annotation-header", value_enum, default_value_t = HeaderMode::Auto)]
    pub annotation_header: HeaderMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_LOG2FC_THRESHOLD, DEFAULT_TIMEOUT_SECS};
    use crate::errors::IntersectError;

    fn intersect_args(extra: &[&str]) -> IntersectArgs {
        let mut argv = vec!["chip-rna-intersect", "intersect", "-r", "deg.csv", "-b", "peaks.bed", "-g", "hg38"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Intersect(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn defaults_apply_when_flags_are_absent() {
        let config = intersect_args(&[]).into_config().unwrap();
        assert_eq!(config.genome, Genome::Hg38);
        assert_eq!(config.settings.thresholds.log2_fold_change, DEFAULT_LOG2FC_THRESHOLD);
        assert_eq!(config.settings.timeout_secs, Some(DEFAULT_TIMEOUT_SECS));
        assert!(config.settings.deg_has_header);
    }

    #[test]
    fn flags_override_thresholds_and_timeout() {
        let config = intersect_args(&["-f", "1", "-p", "0.01", "--timeout-secs", "0", "--deg-no-header"])
            .into_config()
            .unwrap();
        assert_eq!(config.settings.thresholds.log2_fold_change, 1.0);
        assert_eq!(config.settings.thresholds.p_value, 0.01);
        assert_eq!(config.settings.timeout_secs, None);
        assert!(!config.settings.deg_has_header);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let err = intersect_args(&["-p", "1.5"]).into_config().unwrap_err();
        assert!(matches!(err, IntersectError::InvalidConfig(_)));
    }

    #[test]
    fn unknown_genome_is_a_usage_error() {
        let argv = ["chip-rna-intersect", "intersect", "-r", "d.csv", "-b", "p.bed", "-g", "dm6"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
