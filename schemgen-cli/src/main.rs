//! SchemGen CLI - compile circuit descriptions into KiCad schematics.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use schemgen::{
    read_schematic, BuildOptions, BuildOutput, Dialect, LayoutOutput, LayoutStrategy,
    RouteStrategy, SchemGen, ValidationReport,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemgen")]
#[command(about = "Compile circuit descriptions into KiCad schematics", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a schematic from a description file
    Generate {
        /// Circuit description file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output schematic path (defaults to INPUT with .kicad_sch)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        #[command(flatten)]
        build: BuildArgs,

        /// Output format for the build summary
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Check described positions against the page bounds
    Validate {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        build: BuildArgs,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code when any position is off the page
        #[arg(long)]
        fail_on_error: bool,
    },

    /// Summarize a generated schematic
    Parse {
        #[arg(value_name = "SCHEMATIC")]
        schematic: PathBuf,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Place components and print the positions
    Layout {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        build: BuildArgs,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

/// Options shared by every command that reads a description.
#[derive(Args, Clone, Default)]
struct BuildArgs {
    /// JSON options file; flags below override its fields
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Description dialect
    #[arg(long, value_enum)]
    dialect: Option<DialectArg>,

    /// Automatic layout strategy (positions in the description are ignored)
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Wire routing strategy
    #[arg(long, value_enum)]
    routing: Option<RoutingArg>,

    /// Guess wiring when the description has no connections
    #[arg(long)]
    infer_wiring: bool,

    /// Page width in mm
    #[arg(long)]
    page_width: Option<f64>,

    /// Page height in mm
    #[arg(long)]
    page_height: Option<f64>,

    /// Page margin in mm
    #[arg(long)]
    margin: Option<f64>,

    /// Deterministic UUIDs
    #[arg(long)]
    sequential_ids: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Auto,
    Block,
    Line,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Grid,
    Row,
    Column,
    Circular,
    Hierarchical,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoutingArg {
    Direct,
    Manhattan,
    Optimized,
}

impl BuildArgs {
    fn resolve(&self) -> anyhow::Result<BuildOptions> {
        let mut options = match &self.options {
            Some(path) => BuildOptions::from_json_file(path)
                .with_context(|| format!("reading options from {}", path.display()))?,
            None => BuildOptions::default(),
        };

        if let Some(dialect) = self.dialect {
            options.dialect = match dialect {
                DialectArg::Auto => Dialect::Auto,
                DialectArg::Block => Dialect::Block,
                DialectArg::Line => Dialect::Line,
            };
        }
        if let Some(strategy) = self.strategy {
            options.layout_strategy = Some(match strategy {
                StrategyArg::Grid => LayoutStrategy::Grid,
                StrategyArg::Row => LayoutStrategy::Row,
                StrategyArg::Column => LayoutStrategy::Column,
                StrategyArg::Circular => LayoutStrategy::Circular,
                StrategyArg::Hierarchical => LayoutStrategy::Hierarchical,
            });
        }
        if let Some(routing) = self.routing {
            options.routing_strategy = match routing {
                RoutingArg::Direct => RouteStrategy::Direct,
                RoutingArg::Manhattan => RouteStrategy::Manhattan,
                RoutingArg::Optimized => RouteStrategy::Optimized,
            };
        }
        if self.infer_wiring {
            options.infer_wiring = true;
        }
        if self.sequential_ids {
            options.sequential_ids = true;
        }
        if let Some(width) = self.page_width {
            options.bounds.width = width;
        }
        if let Some(height) = self.page_height {
            options.bounds.height = height;
        }
        if let Some(margin) = self.margin {
            options.bounds.margin = margin;
        }
        Ok(options)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Generate {
            input,
            output,
            build,
            format,
        } => handle_generate(&input, output, &build, format),
        Commands::Validate {
            input,
            build,
            format,
            fail_on_error,
        } => handle_validate(&input, &build, format, fail_on_error),
        Commands::Parse { schematic, format } => handle_parse(&schematic, format),
        Commands::Layout {
            input,
            build,
            format,
        } => handle_layout(&input, &build, format),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn handle_generate(
    input: &Path,
    output: Option<PathBuf>,
    build: &BuildArgs,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let options = build.resolve()?;
    let text = read_input(input)?;
    let result = SchemGen::build(&text, &options)?;

    let out_path = output.unwrap_or_else(|| input.with_extension("kicad_sch"));
    std::fs::write(&out_path, &result.schematic)
        .with_context(|| format!("writing {}", out_path.display()))?;
    tracing::debug!(path = %out_path.display(), bytes = result.schematic.len(), "schematic written");

    match format {
        OutputFormat::Human => output_build_human(&result, &out_path),
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "output": out_path.display().to_string(),
                "circuit": result.circuit.name,
                "components": result.circuit.components.len(),
                "power_symbols": result.circuit.power_symbols.len(),
                "nets": result.nets,
                "wires": result.wire_count(),
                "layout": result.layout_stats,
                "routing": result.routing_stats,
                "connectivity": result.connectivity_stats,
                "diagnostics": result.diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(0)
}

fn output_build_human(result: &BuildOutput, out_path: &Path) {
    println!("Wrote {}", out_path.display());
    println!("{}", "─".repeat(60));
    println!("  Circuit:     {}", result.circuit.name);
    println!("  Components:  {}", result.circuit.components.len());
    println!("  Power:       {}", result.circuit.power_symbols.len());
    println!("  Nets:        {}", result.nets.len());
    println!("  Wires:       {}", result.wire_count());

    if !result.diagnostics.is_empty() {
        println!("\n  Diagnostics:");
        for diagnostic in &result.diagnostics {
            println!("    - {}", diagnostic);
        }
    }
}

fn handle_validate(
    input: &Path,
    build: &BuildArgs,
    format: OutputFormat,
    fail_on_error: bool,
) -> anyhow::Result<i32> {
    let options = build.resolve()?;
    let text = read_input(input)?;
    let report = SchemGen::validate(&text, &options)?;

    output_report(&report, format)?;
    if fail_on_error && report.has_errors() {
        return Ok(1);
    }
    Ok(0)
}

fn output_report(report: &ValidationReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Human => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn handle_parse(schematic: &Path, format: OutputFormat) -> anyhow::Result<i32> {
    let document = read_schematic(schematic)?;
    let circuit = &document.circuit;

    match format {
        OutputFormat::Human => {
            println!("Schematic: {}", schematic.display());
            println!("{}", "─".repeat(60));
            println!("  Title: {}", circuit.name);
            println!("\n  Components ({}):", circuit.components.len());
            for c in &circuit.components {
                println!("    {:<8} {:<16} {:<12} {}", c.reference, c.lib_id(), c.value, c.position);
            }
            println!("\n  Power symbols ({}):", circuit.power_symbols.len());
            for p in &circuit.power_symbols {
                println!("    {:<8} {:<16} {}", p.reference, p.power_type, p.position);
            }
            println!("\n  Wires: {}", document.wires.len());
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "file": schematic.display().to_string(),
                "circuit": circuit,
                "wires": document.wires,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(0)
}

fn handle_layout(input: &Path, build: &BuildArgs, format: OutputFormat) -> anyhow::Result<i32> {
    let options = build.resolve()?;
    let text = read_input(input)?;
    let layout = SchemGen::layout(&text, &options)?;

    match format {
        OutputFormat::Human => output_layout_human(&layout),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&layout)?),
    }
    Ok(0)
}

fn output_layout_human(layout: &LayoutOutput) {
    println!("Layout: {}", layout.circuit.name);
    println!("{}", "─".repeat(60));
    for placement in &layout.placements {
        println!("  {:<8} {}", placement.reference, placement.position);
    }
    let stats = &layout.statistics;
    println!("\n  Summary:");
    println!("    Placed:          {}", stats.total_components);
    println!("    Utilization:     {:.1}%", stats.area_utilization * 100.0);
    println!("    Average spacing: {:.2} mm", stats.average_spacing);
    println!("    Out of bounds:   {}", stats.bounds_violations);
}
