use std::path::PathBuf;

use chrono::prelude::*;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// OAuth client secrets downloaded from the Google Cloud Console
    #[arg(long, env = "WEEKTALLY_CREDENTIALS", default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// File the authorized credential is cached in between runs
    #[arg(long, env = "WEEKTALLY_TOKEN_CACHE", default_value = "token.json")]
    pub token_cache: PathBuf,

    /// Cache the credential in the OS keyring instead of a file
    #[arg(long, env = "WEEKTALLY_KEYRING", default_value_t = false)]
    pub keyring: bool,

    /// Report the week containing this date, in the form of MM/DD/YYYY (default today)
    #[arg(long, value_parser = parse_date)]
    pub week_of: Option<NaiveDate>,

    /// Maximum number of events to request
    #[arg(long, default_value_t = 100)]
    pub max_results: u32,

    /// Count all-day events for their whole span (by default they count as zero)
    #[arg(long, default_value_t = false)]
    pub count_all_day: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

fn parse_date(arg: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(arg, "%m/%d/%Y")
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Forgets the cached credential so the next run asks for authorization again
    Logout,
}
