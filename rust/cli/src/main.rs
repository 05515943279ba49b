//! `isavm`: assemble, inspect and run programs for catalog-defined instruction sets.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use isavm_vm_runtime::{launch, ExecutionConfig, Toolchain};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "isavm", version)]
#[command(about = "Assemble and run programs for catalog-defined instruction sets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble and execute a program
    Run(RunArgs),
    /// Print the grammar synthesized from a catalog
    Grammar {
        /// Catalog JSON (defaults to the standard catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Write the grammar here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the address-annotated listing of a program
    Listing {
        file: PathBuf,
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Program file
    file: PathBuf,

    /// Integer arguments passed on the stack
    #[arg(allow_negative_numbers = true)]
    args: Vec<i64>,

    /// Print the listing and a state dump around every step
    #[arg(long)]
    verbose: bool,

    /// Catalog JSON (defaults to the standard catalog)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Execution config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many instructions (0 = unlimited)
    #[arg(long)]
    max_steps: Option<u64>,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Grammar { catalog, out } => grammar(catalog.as_deref(), out.as_deref()),
        Command::Listing { file, catalog } => listing(&file, catalog.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so program output on stdout stays clean. `RUST_LOG` overrides
/// the default filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: RunArgs) -> Result<()> {
    let toolchain = load_toolchain(args.catalog.as_deref())?;
    let program = assemble(&toolchain, &args.file)?;

    let mut config = match &args.config {
        Some(path) => serde_json::from_str::<ExecutionConfig>(&read(path)?)
            .with_context(|| format!("invalid execution config {}", path.display()))?,
        None => ExecutionConfig::default(),
    };
    if let Some(limit) = args.max_steps {
        config.sandbox_limits.instruction_limit = limit;
    }

    if args.verbose {
        println!("Instructions:");
        print!("{}", program.listing());
        println!("Begin Execution");
    }
    let mut execution = launch(&program, &args.args, &config, io::stdout());
    let trace = if args.verbose {
        execution.run_observed(|snapshot| println!("{snapshot}"))
    } else {
        execution.run()
    }
    .with_context(|| format!("{} failed", args.file.display()))?;
    if args.verbose {
        println!("End Execution");
    }
    execution
        .into_output()
        .flush()
        .context("failed to flush program output")?;

    debug!(
        steps = trace.metrics.instructions,
        covered = trace.coverage.len(),
        "program halted"
    );
    Ok(())
}

fn grammar(catalog: Option<&Path>, out: Option<&Path>) -> Result<()> {
    let toolchain = load_toolchain(catalog)?;
    let text = toolchain.grammar().to_string();
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn listing(file: &Path, catalog: Option<&Path>) -> Result<()> {
    let toolchain = load_toolchain(catalog)?;
    let program = assemble(&toolchain, file)?;
    print!("{}", program.listing());
    Ok(())
}

fn load_toolchain(catalog: Option<&Path>) -> Result<Toolchain> {
    match catalog {
        Some(path) => Toolchain::from_catalog_json(&read(path)?)
            .with_context(|| format!("invalid catalog {}", path.display())),
        None => Toolchain::standard().context("standard catalog failed to compile"),
    }
}

fn assemble(toolchain: &Toolchain, file: &Path) -> Result<isavm_vm_runtime::Program> {
    let source = read(file)?;
    toolchain
        .assemble(&source)
        .with_context(|| format!("failed to load {}", file.display()))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
