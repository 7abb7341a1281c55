use clap::Parser;
use ftlplay::{render_with_options, RenderOptions, RenderResponse};
use std::path::{Path, PathBuf};
use std::{fs, io, process::ExitCode};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Render a FreeMarker playground snippet", long_about = None)]
struct Cli {
    /// Path to the template file
    template: PathBuf,

    /// Path to a JSON file with the data context
    #[arg(short, long, conflicts_with = "json")]
    data: Option<PathBuf>,

    /// Inline JSON data context
    #[arg(short, long)]
    json: Option<String>,

    /// Path to a JSON file with render options
    #[arg(short, long, env = "FTLPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Print only the rendered output instead of the JSON result object
    #[arg(long)]
    raw: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_options(path: Option<&Path>) -> Result<RenderOptions, CliError> {
    let Some(path) = path else {
        return Ok(RenderOptions::default());
    };
    let text = read(path)?;
    RenderOptions::from_json(&text).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: &Cli) -> Result<bool, CliError> {
    let options = load_options(cli.config.as_deref())?;
    debug!(?options, "render options");

    let template = read(&cli.template)?;
    let data = match (&cli.data, &cli.json) {
        (Some(path), _) => Some(read(path)?),
        (None, Some(inline)) => Some(inline.clone()),
        (None, None) => None,
    };

    info!(template = %cli.template.display(), "rendering");
    let response = render_with_options(&template, data.as_deref(), &options);

    match (&response, cli.raw) {
        (RenderResponse::Rendered { output, .. }, true) => println!("{output}"),
        (RenderResponse::Failed { error }, true) => eprintln!("{error}"),
        (_, false) => println!("{}", serde_json::to_string_pretty(&response)?),
    }
    Ok(response.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
