use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jinsql_core::{Config, Diagnostic, Severity};
use jinsql_project::{FileCatalog, ProjectCompiler, ProjectError};

const DEFAULT_CONFIG: &str = "jinsql.toml";

/// jinsql - compile Jinja-templated SQL projects
#[derive(Parser)]
#[command(name = "jinsql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: jinsql.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of worker threads (overrides the config file)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every model and test
    Compile,

    /// Print the compiled SQL of one model
    Show {
        /// Model name (file stem or any trailing part of its path)
        model: String,
    },

    /// List discovered macros, models and tests
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Makes `.env` visible to env_var()
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
    if let Some(threads) = cli.threads {
        config.threads = threads.max(1);
    }

    if cli.verbose {
        eprintln!(
            "{} {} ({} threads, target {})",
            "Project:".cyan(),
            config.name,
            config.threads,
            config.target.name
        );
    }

    let result = match cli.command {
        Commands::Compile => compile_command(config),
        Commands::Show { model } => show_command(config, &model),
        Commands::List => list_command(&config),
    };

    // Project errors are reported as diagnostics; anything else goes to anyhow
    match result {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast::<ProjectError>() {
            Ok(project_error) => {
                print_diagnostic(&project_error.to_diagnostic());
                std::process::exit(1);
            }
            Err(other) => Err(other),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    if let Some(path) = path {
        return Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG);
    if default_path.exists() {
        return Ok(Config::from_file(default_path)?);
    }

    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(Config::default())
}

/// Compile command - render every model and test
fn compile_command(config: Config) -> Result<()> {
    let compiler = ProjectCompiler::load(config)?;
    let compiled = compiler.compile_all().map_err(ProjectError::from)?;

    for warning in &compiled.warnings {
        print_diagnostic(warning);
    }

    let catalog = compiler.catalog();
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Compilation Summary".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
    println!("  Macros: {}", catalog.macros().len());
    println!("  Models: {}", catalog.models().len());
    println!("  Tests:  {}", catalog.tests().len());
    if !compiled.warnings.is_empty() {
        println!(
            "  Warnings: {}",
            compiled.warnings.len().to_string().yellow()
        );
    }
    println!();
    println!(
        "{}",
        format!("✓ Compiled {} files", compiled.len()).green().bold()
    );

    Ok(())
}

/// Show command - print one model's compiled SQL
fn show_command(config: Config, model: &str) -> Result<()> {
    let compiler = ProjectCompiler::load(config)?;
    let sql = compiler.compile_model(model)?;
    println!("{sql}");
    Ok(())
}

/// List command - print the discovered files by kind
fn list_command(config: &Config) -> Result<()> {
    let catalog = FileCatalog::discover(config).map_err(ProjectError::from)?;

    let sections = [
        ("Macros", catalog.macros()),
        ("Models", catalog.models()),
        ("Tests", catalog.tests()),
    ];
    for (title, files) in sections {
        println!("{} ({})", title.bold(), files.len());
        for file in files {
            println!("  {} {}", file.name.green(), file.path.display().to_string().dimmed());
        }
        println!();
    }

    Ok(())
}

fn print_diagnostic(diag: &Diagnostic) {
    let severity = match diag.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warn => "warn".yellow().bold(),
    };

    match &diag.location {
        Some(location) => eprintln!(
            "{}: {}[{}]: {}",
            location.to_string().bold(),
            severity,
            diag.code,
            diag.message
        ),
        None => eprintln!("{}[{}]: {}", severity, diag.code, diag.message),
    }
}
