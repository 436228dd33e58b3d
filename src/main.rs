//! Tern CLI - run, check and dump serialized programs

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use tern::error::format_runtime_error;
use tern::{driver, Interpreter, ProgramFormat, RuntimeConfig, StdoutOutput};

#[derive(Parser)]
#[command(name = "tern")]
#[command(about = "Tree-walking execution engine for serialized syntax trees", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program and exit with the entry function's status
    Run {
        /// Path to a .json or .yaml program
        path: PathBuf,

        /// Entry function called after the module body
        #[arg(long, conflicts_with = "no_entry")]
        entry: Option<String>,

        /// Only run the module body
        #[arg(long)]
        no_entry: bool,

        /// Maximum call depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// TOML runtime config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Load a program and report its size
    Check {
        /// Path to a .json or .yaml program
        path: PathBuf,
    },

    /// Re-serialize a program
    Dump {
        /// Path to a .json or .yaml program
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = DumpFormat::Json)]
        format: DumpFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DumpFormat {
    Json,
    Yaml,
}

impl From<DumpFormat> for ProgramFormat {
    fn from(format: DumpFormat) -> Self {
        match format {
            DumpFormat::Json => ProgramFormat::Json,
            DumpFormat::Yaml => ProgramFormat::Yaml,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; program output owns stdout
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            path,
            entry,
            no_entry,
            max_depth,
            config,
        } => {
            let mut runtime = RuntimeConfig::from_env();
            if let Some(config_path) = &config {
                runtime = runtime.merge_file(config_path)?;
            }
            if let Some(entry) = entry {
                runtime.entry_point = Some(entry);
            }
            if no_entry {
                runtime.entry_point = None;
            }
            if let Some(depth) = max_depth {
                runtime.max_call_depth = depth;
            }

            let code = run(&path, runtime)?;
            std::process::exit(code);
        }

        Commands::Check { path } => {
            let module = tern::load_program(&path)?;
            println!(
                "{} {}: {} top-level statement(s)",
                "✓".green().bold(),
                path.display(),
                module.statements.len()
            );
        }

        Commands::Dump { path, format } => {
            let module = tern::load_program(&path)?;
            let text = tern::dump_program(&module, format.into())?;
            println!("{}", text.trim_end());
        }
    }

    Ok(())
}

/// Run a program, printing a traceback on failure
fn run(path: &Path, config: RuntimeConfig) -> Result<i32> {
    let module = tern::load_program(path)?;
    let mut interpreter = Interpreter::with_output(config, Box::new(StdoutOutput));

    match driver::run(&mut interpreter, &module) {
        Ok(outcome) => Ok(outcome.exit_code),
        Err(err) => {
            eprint!("{}", format_runtime_error(&err, None));
            Ok(1)
        }
    }
}
