use clap::Subcommand;

use super::{open_session, print_report, print_snapshot, report_warnings, CliResult};

#[derive(Subcommand)]
pub enum CycleAction {
    /// Run the current phase; a focus phase also starts the tracker
    Start,
    /// Pause the countdown and the tracker
    Pause,
    /// Resume the countdown and the tracker
    Resume,
    /// Rewind the countdown and stop the tracker
    Stop,
    /// Rewind the countdown only
    Reset,
    /// Move to the next phase now
    Skip,
    /// Check for completion and print cycle state as JSON
    Status,
}

pub fn run(action: CycleAction) -> CliResult {
    let mut session = open_session()?;

    let outcome = match action {
        CycleAction::Start => session.start_cycle(),
        CycleAction::Pause => session.pause_cycle(),
        CycleAction::Resume => session.resume_cycle(),
        CycleAction::Stop => session.stop_cycle(),
        CycleAction::Reset => session.reset_cycle(),
        CycleAction::Skip => session.skip_phase(),
        CycleAction::Status => {
            let ticked = session.tick();
            report_warnings(&ticked.warnings);
            for event in &ticked.value.events {
                println!("{}", serde_json::to_string_pretty(event)?);
            }
            return print_snapshot(&mut session);
        }
    };

    print_report(&mut session, outcome)
}
