pub mod browser;
pub mod commands;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod listing;
pub mod platforms;

use clap::Parser;
use engine::Outcome;
use std::path::PathBuf;
use std::process::ExitCode;

/// Fill a vehicle listing into an open marketplace form.
#[derive(Debug, Parser)]
#[command(name = "vehicle-lister", version, about)]
pub struct Cli {
    /// Listing JSON produced by the extraction side
    #[arg(long, required_unless_present_any = ["check", "list_profiles"])]
    pub record: Option<PathBuf>,

    /// Form profile to drive
    #[arg(long, default_value = "marketplace")]
    pub profile: String,

    /// Chrome remote debugging port
    #[arg(long, default_value_t = 9222)]
    pub port: u16,

    /// Use the tab whose URL contains this text
    #[arg(long)]
    pub url_contains: Option<String>,

    /// Dry run against a saved HTML page instead of Chrome
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Engine configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub skip_images: bool,

    /// Only report whether Chrome is reachable
    #[arg(long)]
    pub check: bool,

    #[arg(long)]
    pub list_profiles: bool,
}

pub async fn run() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list_profiles {
        return print_json(&commands::chrome::get_profiles());
    }

    if cli.check {
        let status = commands::chrome::check_chrome(cli.port, cli.url_contains.as_deref()).await;
        let ready = status.ready;
        let code = print_json(&status);
        return if ready { code } else { ExitCode::FAILURE };
    }

    let Some(record_path) = cli.record else {
        log::error!("--record is required");
        return ExitCode::FAILURE;
    };
    let request = commands::fill::FillRequest {
        record_path,
        profile: cli.profile,
        port: cli.port,
        url_contains: cli.url_contains,
        snapshot: cli.snapshot,
        config_path: cli.config,
        skip_images: cli.skip_images,
    };

    match commands::fill::fill_listing(&request).await {
        Ok(outcome) => {
            let code = print_json(&outcome);
            if outcome.outcome == Outcome::Failed {
                ExitCode::FAILURE
            } else {
                code
            }
        }
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_required_for_fill() {
        assert!(Cli::try_parse_from(["vehicle-lister"]).is_err());
        let cli = Cli::try_parse_from(["vehicle-lister", "--check", "--port", "9333"]).unwrap();
        assert_eq!(cli.port, 9333);
        let cli = Cli::try_parse_from(["vehicle-lister", "--record", "car.json", "--skip-images"])
            .unwrap();
        assert!(cli.skip_images);
        assert_eq!(cli.profile, "marketplace");
    }
}
