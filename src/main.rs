use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use similarity_communities::config::{
    DEFAULT_INPUT, DEFAULT_LEVEL, DEFAULT_MAX_LEVELS, DEFAULT_THRESHOLD,
};
use similarity_communities::{
    generate_dissimilarity_file, run, GeneratorConfig, PipelineConfig, PipelineReport, Weighting,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Threshold a dissimilarity file, detect communities and export them
    Run(RunArgs),
    /// Write a synthetic dissimilarity file with planted groups
    Generate(GenerateArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Triplet file (`label label score` per line)
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Directory for the exported files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Field delimiter of the input
    #[arg(long, default_value_t = ' ')]
    delimiter: char,

    /// Dissimilarities above this are dropped
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Number of partitions to materialise
    #[arg(long, default_value_t = DEFAULT_MAX_LEVELS)]
    max_levels: usize,

    /// 1-based partition exported to the pals files
    #[arg(short, long, default_value_t = DEFAULT_LEVEL)]
    level: usize,

    /// Path metric used for edge betweenness
    #[arg(long, value_enum, default_value_t = WeightingArg::Unweighted)]
    weighting: WeightingArg,

    /// Skip the per-level DOT files
    #[arg(long)]
    no_dot: bool,

    /// Render each DOT file to PNG with graphviz
    #[arg(long)]
    render: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum WeightingArg {
    Unweighted,
    Distance,
}

impl From<WeightingArg> for Weighting {
    fn from(arg: WeightingArg) -> Self {
        match arg {
            WeightingArg::Unweighted => Weighting::Unweighted,
            WeightingArg::Distance => Weighting::Distance,
        }
    }
}

#[derive(clap::Args)]
struct GenerateArgs {
    /// Output triplet file
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    output: PathBuf,

    #[arg(long, default_value_t = 60)]
    labels: usize,

    #[arg(long, default_value_t = 4)]
    groups: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl RunArgs {
    fn into_config(self) -> Result<PipelineConfig> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character, got {:?}", self.delimiter);
        }
        Ok(PipelineConfig {
            input: self.input,
            output_dir: self.output_dir,
            delimiter: self.delimiter as u8,
            threshold: self.threshold,
            max_levels: self.max_levels,
            level: self.level,
            weighting: self.weighting.into(),
            write_dot: !self.no_dot,
            render: self.render,
        })
    }
}

fn print_report(report: &PipelineReport) {
    println!("Labels: {}", report.label_count);
    if let Some(s) = report.summary {
        println!("avg={:.2} min={:.2} max={:.2}", s.mean, s.min, s.max);
    }
    println!("{} out of {} values set to zero", report.zeroed, report.cells);
    println!(
        "Graph: {} nodes, {} edges ({} written for Gephi)",
        report.node_count, report.edge_count, report.gephi_edges
    );
    for (k, partition) in report.levels.iter().enumerate() {
        println!("Possibility {}: {} communities", k + 1, partition.len());
    }
    println!(
        "Exported possibility {} ({} communities, {} pals edges)",
        report.selected_level,
        report.selected().len(),
        report.pals_edges
    );

    if let Some((label, degree, neighbors)) = &report.hub {
        println!("The node is {label}, and it has {degree} neighbors.");
        println!("Neighbors: {}", neighbors.join(", "));
    }
    println!("Degree histogram (degree: nodes):");
    for (degree, count) in report.degrees.histogram() {
        println!("  {degree}: {count}");
    }
    print!("{}", report.degrees.render_table());
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    match Cli::parse().command {
        Command::Run(args) => {
            let config = args.into_config()?;
            let report = run(&config)
                .with_context(|| format!("pipeline failed for {}", config.input.display()))?;
            print_report(&report);
        }
        Command::Generate(args) => {
            let config = GeneratorConfig {
                labels: args.labels,
                groups: args.groups,
                seed: args.seed,
                ..GeneratorConfig::default()
            };
            let rows = generate_dissimilarity_file(&args.output, &config)
                .with_context(|| format!("failed to write {}", args.output.display()))?;
            info!("done: {rows} rows");
        }
    }
    Ok(())
}
