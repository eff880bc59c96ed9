mod auth;
mod cli;
mod commands;
mod datetime;
mod events;
mod oauth;
mod store;
mod tally;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::ReportOptions;
use datetime::WeekWindow;
use events::google::GoogleCalendar;
use oauth::google::GoogleAuthorizer;
use store::{CredentialStore, FileStore, KeyringStore};
use tally::AllDayPolicy;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    // Logs go to stderr so the report on stdout stays clean.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store: Box<dyn CredentialStore> = if cli.keyring {
        Box::new(KeyringStore::default())
    } else {
        Box::new(FileStore::new(&cli.token_cache))
    };

    match &cli.command {
        Some(Commands::Logout) => commands::logout(store.as_ref()),
        None => {
            let window = match cli.week_of {
                Some(date) => WeekWindow::of_date(date),
                None => WeekWindow::containing(Utc::now()),
            };
            let all_day = if cli.count_all_day {
                AllDayPolicy::FullSpan
            } else {
                AllDayPolicy::ZeroLength
            };

            let options = ReportOptions {
                window,
                max_results: cli.max_results,
                all_day,
            };

            commands::report(
                store.as_ref(),
                &GoogleAuthorizer::new(&cli.credentials),
                &GoogleCalendar::default(),
                &options,
                &mut std::io::stdout(),
            )
            .await
        }
    }
}
