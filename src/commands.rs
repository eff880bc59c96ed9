use std::io::Write;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use crate::auth::{self, Authorizer};
use crate::datetime::WeekWindow;
use crate::events::google::GoogleCalendar;
use crate::store::CredentialStore;
use crate::tally::{hours, print_totals, AllDayPolicy, Tally};

const CALENDAR_ID: &str = "primary";

pub struct ReportOptions {
    pub window: WeekWindow,
    pub max_results: u32,
    pub all_day: AllDayPolicy,
}

fn header<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "\n#####################\n\n\n")
}

/// Authorize, fetch the week's events, and print a line per event followed by the
/// per-project totals.
pub async fn report<W: Write>(
    store: &dyn CredentialStore,
    authorizer: &dyn Authorizer,
    calendar: &GoogleCalendar,
    options: &ReportOptions,
    out: &mut W,
) -> anyhow::Result<()> {
    let credential = auth::obtain(store, authorizer, Utc::now()).await?;

    writeln!(out, "Getting events for {}", options.window)?;
    let events = calendar
        .get_calendar_events(
            &credential.token,
            CALENDAR_ID,
            &options.window,
            options.max_results,
        )
        .await
        .context("failed to fetch events")?;
    info!(count = events.len(), "fetched events");

    if events.is_empty() {
        writeln!(out, "No upcoming events found.")?;
        return Ok(());
    }

    header(&mut *out)?;

    let totals = Tally::new(options.all_day).aggregate(&events, &mut *out)?;
    print_totals(&totals, &mut *out)?;
    info!(hours = hours(totals.total_seconds()), "week total");

    Ok(())
}

pub fn logout(store: &dyn CredentialStore) -> anyhow::Result<()> {
    store.clear()?;
    println!("Removed cached credential.");
    Ok(())
}
