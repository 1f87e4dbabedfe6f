use chrono::NaiveDate;
use clap::Subcommand;
use worktally_core::EntryId;

use super::{open_session, CliResult};

#[derive(Subcommand)]
pub enum EntriesAction {
    /// List entries for a day
    List {
        /// Day to list (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record what a finished entry earned
    Earn {
        /// Entry ID
        id: String,
        /// Amount earned
        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },
}

pub fn run(action: EntriesAction) -> CliResult {
    let mut session = open_session()?;

    match action {
        EntriesAction::List { date } => {
            let entries = match date {
                Some(date) => session.entries_on(date)?,
                None => session.entries_today()?,
            };
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        EntriesAction::Earn { id, amount } => {
            let entry = session.record_earnings(&EntryId::from(id), amount)?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
    }
    Ok(())
}
