mod scenario;

use clap::{Parser, Subcommand};
use map_hash::{DecodeError, InvalidZoomRange, LatLon, SyncConfig, ViewportState};
use scenario::{Scenario, ScenarioError};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Encode, decode and replay `#?map=<zoom>/<lat>/<lon>` location fragments.
#[derive(Parser)]
#[command(name = "map-hash", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the fragment for a view
    Encode {
        #[arg(long)]
        zoom: f64,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Print the view stored in a fragment as JSON
    Decode {
        /// Fragment, with or without the leading `#`
        fragment: String,
        #[arg(long)]
        pretty: bool,
    },
    /// Replay a scripted session and print both sides after every step
    Replay {
        /// Scenario file (RON)
        scenario: PathBuf,
        /// Config file (RON); defaults to the user config dir
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error("invalid fragment: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("failed to serialize view: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    ZoomRange(#[from] InvalidZoomRange),
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Encode { zoom, lat, lon } => {
            let state = ViewportState::new(zoom, LatLon::new(lat, lon));
            println!("{}", map_hash::encode(&state));
        }
        Command::Decode { fragment, pretty } => {
            let body = fragment.strip_prefix('#').unwrap_or(&fragment);
            let state = map_hash::decode(body)?;
            let json = if pretty {
                serde_json::to_string_pretty(&state)?
            } else {
                serde_json::to_string(&state)?
            };
            println!("{json}");
        }
        Command::Replay { scenario, config } => {
            let config = SyncConfig::load_or_default(config.as_deref());
            log::info!(
                "Replaying {} (throttle {} ms, leading {})",
                scenario.display(),
                config.throttle_ms,
                config.leading
            );

            let (snapshots, had_initial) = Scenario::load(&scenario)?.replay(config)?;
            for (index, snapshot) in snapshots.iter().enumerate() {
                println!(
                    "{index:>3} {:>6}ms  {:<40} {:<32} zoom {:.2} at {:.5}, {:.5} (history {})",
                    snapshot.elapsed.as_millis(),
                    snapshot.label,
                    display_location(&snapshot.location),
                    snapshot.viewport.zoom,
                    snapshot.viewport.center.lat,
                    snapshot.viewport.center.lon,
                    snapshot.history_len,
                );
            }
            println!("had initial location: {had_initial}");
        }
    }
    Ok(())
}

fn display_location(location: &str) -> &str {
    if location.is_empty() { "(none)" } else { location }
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse().command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
