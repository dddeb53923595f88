//! drugprop CLI: run propagation steps from the command line
//!
//! Every command reads the same YAML pipeline config and shares its
//! artifact cache with the `drugprop` binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use drugprop::matrix::{normalize, Axis, LabeledMatrix};
use drugprop::propagation::drug_target_matrix;
use drugprop::{
    table, DiagonalPolicy, Pipeline, PipelineConfig, PropagationMethod, CONFIG_ENV,
    DEFAULT_CONFIG_FILE,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "drugprop", version, about = "Drug-target network propagation")]
struct Cli {
    /// Pipeline config (YAML)
    #[arg(long, global = true, env = CONFIG_ENV, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Rows shown in table output
    #[arg(long, default_value_t = 20, global = true)]
    limit: usize,

    /// Also write the resulting matrix to this CSV file
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Recompute every artifact, ignoring the cache
    #[arg(long, global = true)]
    renew: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the gene-gene network matrix
    Network {
        /// Seed the diagonal with 1
        #[arg(long)]
        self_loop: bool,
    },
    /// Propagate single-drug targets over the network
    Propagate {
        /// target_as_1, target_as_0, RWlike, plain_diffusion or random_walk
        #[arg(long)]
        method: Option<PropagationMethod>,
    },
    /// Union the targets of every synergy pair
    Combine,
    /// Random walk with restart kernel propagation of the drug-target table
    Kernel,
    /// Full run: combine, propagate and join with expression
    Features,
    /// Cross-check inputs for references that would be dropped
    Coverage,
    /// Normalize a matrix CSV by row or column
    Normalize {
        input: PathBuf,
        /// row (0, index) or column (1)
        #[arg(long, default_value = "row")]
        axis: String,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = PipelineConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config {:?}", cli.config))?;
    if cli.renew {
        config.renew = drugprop::RenewFlags::all();
    }
    drugprop::logging::init(config.log_file.as_deref())?;

    let matrix = match cli.command {
        Commands::Network { self_loop } => {
            let pipeline = Pipeline::new(config)?;
            let inputs = pipeline.load_inputs()?;
            let policy = if self_loop {
                DiagonalPolicy::SelfLoop
            } else {
                DiagonalPolicy::Zero
            };
            let network = pipeline.network_matrix(&inputs, policy)?;
            let (n, _) = network.shape();
            let edges = network.values().indexed_iter().filter(|((i, j), v)| i < j && **v != 0.0).count();
            println!("Genes: {}", n);
            println!("Edges: {}", edges);
            network
        }
        Commands::Propagate { method } => {
            if let Some(method) = method {
                config.method = method;
            }
            let pipeline = Pipeline::new(config)?;
            let inputs = pipeline.load_inputs()?;
            let targets = drug_target_matrix(&inputs.drug_targets, &inputs.genes);
            pipeline.propagate(&inputs, &targets)?
        }
        Commands::Combine => {
            let pipeline = Pipeline::new(config)?;
            let inputs = pipeline.load_inputs()?;
            pipeline.combined_targets(&inputs)?
        }
        Commands::Kernel => Pipeline::new(config)?.run_kernel()?,
        Commands::Features => {
            let output = Pipeline::new(config)?.run()?;
            output
                .features
                .context("no expression table configured (inputs.expression)")?
        }
        Commands::Coverage => {
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.load_inputs()?.coverage();
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                _ => {
                    print_list("Genes missing from network", &report.genes_missing_from_network);
                    print_list("Unresolved drug-target genes", &report.unresolved_target_genes);
                    print_list("Drugs missing from targets", &report.drugs_missing_from_targets);
                    print_list("Unresolved expression genes", &report.unresolved_expression_genes);
                    print_list(
                        "Cell lines missing from expression",
                        &report.cell_lines_missing_from_expression,
                    );
                }
            }
            return Ok(());
        }
        Commands::Normalize { input, axis } => {
            let axis: Axis = axis.parse()?;
            normalize(&table::read_matrix(&input)?, axis)
        }
    };

    if let Some(path) = &cli.output {
        write_output(path, &matrix)?;
    }
    print_matrix(&matrix, &cli.format, cli.limit)
}

fn write_output(path: &Path, matrix: &LabeledMatrix) -> anyhow::Result<()> {
    table::write_matrix(path, matrix).with_context(|| format!("writing {:?}", path))?;
    eprintln!("Wrote {} to {:?}", matrix, path);
    Ok(())
}

fn print_list<T: std::fmt::Display>(title: &str, items: &[T]) {
    if items.is_empty() {
        println!("{}: none", title);
    } else {
        let items: Vec<String> = items.iter().map(|i| i.to_string()).collect();
        println!("{} ({}): {}", title, items.len(), items.join(", "));
    }
}

fn print_matrix(matrix: &LabeledMatrix, format: &OutputFormat, limit: usize) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let values: Vec<Vec<f64>> = matrix.values().rows().into_iter().map(|r| r.to_vec()).collect();
            let json = serde_json::json!({
                "rows": matrix.row_labels().iter().collect::<Vec<_>>(),
                "columns": matrix.col_labels().iter().collect::<Vec<_>>(),
                "values": values,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Csv => {
            let header: Vec<&str> = std::iter::once("")
                .chain(matrix.col_labels().iter().map(String::as_str))
                .collect();
            println!("{}", header.join(","));
            for (label, row) in matrix.row_labels().iter().zip(matrix.values().rows()) {
                let cells: Vec<String> = std::iter::once(label.clone())
                    .chain(row.iter().map(|v| v.to_string()))
                    .collect();
                println!("{}", cells.join(","));
            }
        }
        OutputFormat::Table => {
            if matrix.nrows() == 0 {
                println!("(no rows)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            let header: Vec<String> = std::iter::once(String::new())
                .chain(matrix.col_labels().iter().cloned())
                .collect();
            table.set_header(header);

            for (label, row) in matrix.row_labels().iter().zip(matrix.values().rows()).take(limit) {
                let cells: Vec<String> = std::iter::once(label.clone())
                    .chain(row.iter().map(|v| format!("{:.4}", v)))
                    .collect();
                table.add_row(cells);
            }

            println!("{}", table);
            println!("{} row(s) x {} column(s)", matrix.nrows(), matrix.ncols());
        }
    }
    Ok(())
}
