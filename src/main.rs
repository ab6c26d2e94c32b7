//! Datapack CLI - algorithm execution and view rendering

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use datapack::validate::validate_datapackage;
use datapack::{Config, DatapackError, ExecuteRequest, FixSuggestion, Result, RunId, Runner};

#[derive(Parser)]
#[command(name = "datapack")]
#[command(about = "CLI for executing datapackage algorithms and rendering views")]
#[command(version)]
struct Cli {
    /// Datapackage root directory (default: ./datapackage)
    #[arg(long, global = true, env = "DATAPACKAGE_PATH")]
    datapackage: Option<PathBuf>,

    /// Write the event log to this file as JSON lines
    #[arg(long, global = true)]
    events: Option<PathBuf>,

    /// Without a subcommand, VIEW, ALGORITHM or RUN in the environment decides
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an algorithm against an argument set and save its outputs
    Execute {
        /// Algorithm identifier
        #[arg(long, env = "ALGORITHM")]
        algorithm: Option<String>,

        /// Argument set name (arguments/<algorithm>.<arguments>.json)
        #[arg(long, env = "ARGUMENTS")]
        arguments: Option<String>,

        /// Execution environment identifier recorded on the argument set
        #[arg(long, env = "CONTAINER")]
        container: Option<String>,

        /// Run as <algorithm>.<arguments>; fills in whichever of the two is unset
        #[arg(long, env = "RUN")]
        run: Option<String>,
    },

    /// Render a view and export its image and object
    View {
        /// View identifier (views/<view>.json)
        #[arg(long, env = "VIEW")]
        view: Option<String>,

        /// Export under views/<algorithm>.<arguments>/ instead of views/
        #[arg(long, env = "RUN")]
        run: Option<String>,
    },

    /// Check argument and resource records (parse only)
    Validate,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_root(cli.datapackage);

    let command = match cli.command {
        Some(command) => Ok(command),
        None => command_from_env(),
    };

    let result = match command {
        Ok(Commands::Execute {
            algorithm,
            arguments,
            container,
            run,
        }) => execute(config, algorithm, arguments, container, run, cli.events).await,
        Ok(Commands::View { view, run }) => render(config, view, run, cli.events).await,
        Ok(Commands::Validate) => validate(&config),
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

/// VIEW → view, else ALGORITHM or RUN → execute, else fail
fn command_from_env() -> Result<Commands> {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

    if var("VIEW").is_some() {
        Ok(Commands::View {
            view: var("VIEW"),
            run: var("RUN"),
        })
    } else if var("ALGORITHM").is_some() || var("RUN").is_some() {
        Ok(Commands::Execute {
            algorithm: var("ALGORITHM"),
            arguments: var("ARGUMENTS"),
            container: var("CONTAINER"),
            run: var("RUN"),
        })
    } else {
        Err(DatapackError::MissingParameter {
            name: "VIEW, ALGORITHM or RUN".into(),
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DatapackError::MissingParameter { name: name.into() })
}

fn parse_run(run: Option<String>) -> Result<Option<RunId>> {
    run.filter(|r| !r.is_empty())
        .map(|r| RunId::parse(&r))
        .transpose()
}

async fn execute(
    config: Config,
    algorithm: Option<String>,
    arguments: Option<String>,
    container: Option<String>,
    run: Option<String>,
    events: Option<PathBuf>,
) -> Result<()> {
    let run = parse_run(run)?;
    let algorithm = required(
        algorithm.or_else(|| run.as_ref().map(|r| r.algorithm.clone())),
        "ALGORITHM",
    )?;
    let arguments = required(
        arguments.or_else(|| run.as_ref().map(|r| r.arguments.clone())),
        "ARGUMENTS",
    )?;
    let mut request = ExecuteRequest::new(algorithm, arguments);
    if let Some(c) = container.filter(|c| !c.is_empty()) {
        request = request.with_container(c);
    }

    println!(
        "{} Executing {} with arguments {}",
        "→".cyan(),
        request.algorithm.cyan().bold(),
        request.arguments.cyan()
    );

    let runner = Runner::new(config);
    let result = runner.execute(&request).await;
    write_events(&runner, events.as_deref())?;
    let execution = result?;

    let updated = execution.reconciliation.updated();
    if updated.is_empty() {
        println!("{} No outputs returned", "✓".green());
    } else {
        println!("{} Updated: {}", "✓".green(), updated.join(", "));
    }
    Ok(())
}

async fn render(
    config: Config,
    view: Option<String>,
    run: Option<String>,
    events: Option<PathBuf>,
) -> Result<()> {
    let view = required(view, "VIEW")?;
    let run = parse_run(run)?;

    let runner = Runner::new(config);
    let result = runner.view(&view, run.as_ref()).await;
    write_events(&runner, events.as_deref())?;
    let export = result?;

    println!("{} Saved image at {}", "✓".green(), export.image.display());
    println!("{} Saved object at {}", "✓".green(), export.object.display());
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    let report = validate_datapackage(config);

    for (path, problem) in &report.problems {
        println!("{} {}: {}", "✗".red(), path.display(), problem);
    }

    if let Some((_, first)) = report.problems.first() {
        println!(
            "{} {} problem(s) in {} argument set(s), {} resource(s)",
            "✗".red(),
            report.problems.len(),
            report.arguments,
            report.resources
        );
        return Err(DatapackError::InvalidRecord {
            path: config.root().display().to_string(),
            details: format!("validation failed ({})", first.code()),
        });
    }

    println!(
        "{} Datapackage '{}' is valid",
        "✓".green(),
        config.root().display()
    );
    println!("  Argument sets: {}", report.arguments);
    println!("  Resources: {}", report.resources);
    Ok(())
}

fn write_events(runner: &Runner, path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(path) => runner.event_log().write_jsonl(path),
        None => Ok(()),
    }
}
