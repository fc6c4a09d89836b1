use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chip_rna_intersect::cli::{AnnotateBedArgs, Cli, Commands, IntersectArgs};
use chip_rna_intersect::data_handling::annotation_table::AnnotationTable;
use chip_rna_intersect::data_handling::peak_bed::annotate_bed;
use chip_rna_intersect::{CancellationToken, HomerAnnotator, Pipeline};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let start = std::time::Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Intersect(args) => run_intersect(args),
        Commands::AnnotateBed(args) => run_annotate_bed(args),
    };
    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }

    info!("Elapsed time: {:?}", start.elapsed());
}

fn run_intersect(args: IntersectArgs) -> Result<()> {
    let config = args.into_config().context("invalid run configuration")?;
    info!("Running with {:?}", config);

    let annotator = HomerAnnotator::new(config.settings.annotator.clone(), config.settings.timeout());
    let report = Pipeline::new(config, annotator)
        .run(&CancellationToken::new())
        .context("intersection pipeline aborted")?;

    info!(
        "Up: {} ({} bound, fraction {}); down: {} ({} bound, fraction {})",
        report.intersections.upregulated.total_class_genes,
        report.intersections.upregulated.bound_count,
        report.intersections.upregulated.fraction_bound,
        report.intersections.downregulated.total_class_genes,
        report.intersections.downregulated.bound_count,
        report.intersections.downregulated.fraction_bound,
    );
    if !report.outputs.chart_failures.is_empty() {
        info!(
            "{} chart(s) could not be rendered; text outputs are complete",
            report.outputs.chart_failures.len()
        );
    }
    Ok(())
}

fn run_annotate_bed(args: AnnotateBedArgs) -> Result<()> {
    let table = AnnotationTable::read(&args.annotation_file, args.annotation_header)
        .with_context(|| format!("could not read {}", args.annotation_file.display()))?;
    annotate_bed(&args.bed_file, &table, &args.output)
        .with_context(|| format!("could not annotate {}", args.bed_file.display()))?;
    Ok(())
}
