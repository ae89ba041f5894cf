//! bashmap — inventory bash utility functions and the scripts that use them.
//!
//! Three subcommands over the `bashmap-syntax` library:
//!
//! - `bashmap functions lib/*.sh` — every function definition plus duplicate names
//! - `bashmap deps -u lib bin/*.sh` — which utility files/functions each script calls
//! - `bashmap duplicates lib/` — lint for redefined names (exit status 1 when found)

mod discover;
mod render;

use anyhow::{Context, Result};
use bashmap_syntax::{
    duplicate_locations, extract_functions, BashFunction, Catalog, DuplicateScope, FileDependencies,
    FunctionSummary,
};
use clap::{Args, Parser, Subcommand};
use discover::Source;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "bashmap",
    about = "Inventory bash utility functions, duplicate definitions and script dependencies"
)]
struct Cli {
    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List function definitions and names defined more than once.
    /// Reads one script from stdin when no files are given.
    Functions {
        #[command(flatten)]
        input: InputArgs,

        /// Duplicate scope: file (redefined within one file) or repo (anywhere)
        #[arg(long, default_value = "file")]
        scope: DuplicateScope,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Map each script to the utility files and functions it calls
    Deps {
        /// Directory of utility scripts forming the catalog
        #[arg(short = 'u', long)]
        utils: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Report duplicate definitions; exits with status 1 when any exist
    Duplicates {
        #[command(flatten)]
        input: InputArgs,

        /// Duplicate scope: file (redefined within one file) or repo (anywhere)
        #[arg(long, default_value = "file")]
        scope: DuplicateScope,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Input files (glob patterns and directories supported)
    files: Vec<String>,

    /// Fail on the first file that cannot be parsed instead of skipping it
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// Output format: markdown (default), json
    #[arg(short = 'f', long, default_value = "markdown")]
    format: String,

    /// Write to this file instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Command::Functions {
            input,
            scope,
            output,
        } => functions_mode(&input, scope, &output),
        Command::Deps {
            utils,
            input,
            output,
        } => deps_mode(&utils, &input, &output),
        Command::Duplicates { input, scope } => duplicates_mode(&input, scope),
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("BASHMAP_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// functions mode: extract every input, print one summary.
fn functions_mode(input: &InputArgs, scope: DuplicateScope, output: &OutputArgs) -> Result<ExitCode> {
    let renderer = render::create_renderer(&output.format)?;

    let sources = if input.files.is_empty() {
        vec![discover::read_stdin()?]
    } else {
        discover::read_sources(&input.files)?
    };

    let summary = FunctionSummary::new(extract_all(&sources, input.strict)?, scope);
    write_output(output.output.as_deref(), &renderer.render_summary(&summary)?)?;
    Ok(ExitCode::SUCCESS)
}

/// deps mode: catalog the utility directory, then map each input against it.
fn deps_mode(utils: &Path, input: &InputArgs, output: &OutputArgs) -> Result<ExitCode> {
    let renderer = render::create_renderer(&output.format)?;
    if input.files.is_empty() {
        anyhow::bail!("no input files given");
    }

    let utility_sources = discover::read_utility_dir(utils)?;
    let utility_functions = extract_all(&utility_sources, input.strict)?;
    let catalog = Catalog::from_functions(&utility_functions).context("invalid utility catalog")?;
    tracing::info!(
        dir = %utils.display(),
        files = utility_sources.len(),
        functions = catalog.len(),
        "loaded utility catalog"
    );

    let records: Vec<FileDependencies> = discover::read_sources(&input.files)?
        .iter()
        .map(|source| {
            // Scripts inside the utility dir use catalog labels so they skip their own functions
            let label = discover::relative_label(&source.path, utils);
            catalog.dependencies_of(&label, &source.text)
        })
        .collect();

    write_output(output.output.as_deref(), &renderer.render_dependencies(&records)?)?;
    Ok(ExitCode::SUCCESS)
}

/// duplicates mode: list each duplicated name with its definition sites.
fn duplicates_mode(input: &InputArgs, scope: DuplicateScope) -> Result<ExitCode> {
    if input.files.is_empty() {
        anyhow::bail!("no input files given");
    }

    let sources = discover::read_sources(&input.files)?;
    let functions = extract_all(&sources, input.strict)?;
    let groups = duplicate_locations(&functions, scope);

    for group in &groups {
        let sites: Vec<String> = group
            .locations
            .iter()
            .map(|(file, line)| format!("{}:{}", file, line))
            .collect();
        println!("{}: {}", group.name, sites.join(", "));
    }

    if groups.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!(scope = %scope, count = groups.len(), "duplicate function names");
        Ok(ExitCode::from(1))
    }
}

/// Extract functions from every source. Unparseable files are skipped with a
/// warning unless `strict` is set.
fn extract_all(sources: &[Source], strict: bool) -> Result<Vec<BashFunction>> {
    let mut functions = Vec::new();
    for source in sources {
        match extract_functions(&source.label, &source.text) {
            Ok(found) => functions.extend(found),
            Err(e) if strict => return Err(e).context("parse failed (--strict)"),
            Err(e) => tracing::warn!("skipping {}: {}", source.label, e),
        }
    }
    Ok(functions)
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}
