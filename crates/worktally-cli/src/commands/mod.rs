pub mod config;
pub mod cycle;
pub mod entries;
pub mod timer;

use std::rc::Rc;
use std::sync::Arc;

use worktally_core::{
    Alert, Config, CoreError, Database, LogNotifier, Notifier, Outcome, Report, Session, SystemClock,
};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Writes alerts to stderr so stdout stays machine-readable.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn dispatch(&self, alert: &Alert) {
        LogNotifier.dispatch(alert);
        let sound = alert.sound.as_deref().unwrap_or("silent");
        match &alert.message {
            Some(message) => eprintln!("\x07alert [{sound}]: {message}"),
            None => eprintln!("\x07alert [{sound}]: {:?}", alert.kind),
        }
    }
}

/// Rehydrate the session from the on-disk database and config file.
pub fn open_session() -> Result<Session, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Rc::new(Database::open()?);
    let outcome = Session::new(
        config,
        Arc::new(SystemClock),
        Box::new(db.clone()),
        Box::new(db),
        Box::new(TerminalNotifier),
    );
    report_warnings(&outcome.warnings);
    Ok(outcome.into_value())
}

pub fn report_warnings(warnings: &[CoreError]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}

/// Print what a command did: its events, or the current snapshot when
/// it was a no-op.
pub fn print_report(session: &mut Session, outcome: Outcome<Report>) -> CliResult {
    report_warnings(&outcome.warnings);
    if outcome.value.is_empty() {
        return print_snapshot(session);
    }
    println!("{}", serde_json::to_string_pretty(&outcome.value.events)?);
    Ok(())
}

pub fn print_snapshot(session: &mut Session) -> CliResult {
    let snapshot = session.snapshot();
    report_warnings(&snapshot.warnings);
    println!("{}", serde_json::to_string_pretty(&snapshot.value)?);
    Ok(())
}
