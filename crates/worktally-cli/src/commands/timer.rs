use std::time::{Duration, Instant};

use clap::Subcommand;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use worktally_core::Session;

use super::{open_session, print_report, print_snapshot, report_warnings, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start tracking elapsed time
    Start {
        /// What is being worked on (defaults to tracker.default_label)
        label: Option<String>,
    },
    /// Pause the running tracker
    Pause,
    /// Resume the paused tracker
    Resume,
    /// Stop tracking and finalize the entry
    Stop,
    /// Discard the current run without finalizing it
    Reset,
    /// Evaluate alerts once and print current state as JSON
    Status,
    /// Keep evaluating on an interval, printing alerts and completions
    Watch {
        /// Milliseconds between evaluations
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
        /// Stop after this many evaluations
        #[arg(long)]
        count: Option<u64>,
    },
}

pub fn run(action: TimerAction) -> CliResult {
    let mut session = open_session()?;

    let outcome = match action {
        TimerAction::Start { label } => {
            let label = label.unwrap_or_else(|| session.config().tracker.default_label.clone());
            session.start(&label)
        }
        TimerAction::Pause => session.pause(),
        TimerAction::Resume => session.resume(),
        TimerAction::Stop => session.stop(),
        TimerAction::Reset => session.reset(),
        TimerAction::Status => {
            let ticked = session.tick();
            report_warnings(&ticked.warnings);
            for event in &ticked.value.events {
                println!("{}", serde_json::to_string_pretty(event)?);
            }
            return print_snapshot(&mut session);
        }
        TimerAction::Watch { interval_ms, count } => {
            return watch(session, Duration::from_millis(interval_ms.max(1)), count);
        }
    };

    print_report(&mut session, outcome)
}

/// Drive `tick` the way a UI host would. A wake-up that comes much later
/// than scheduled is treated as the host regaining the foreground.
fn watch(mut session: Session, every: Duration, count: Option<u64>) -> CliResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    runtime.block_on(async {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();
        let mut ticks = 0u64;

        loop {
            ticker.tick().await;
            let gap = last.elapsed();
            last = Instant::now();

            let outcome = if ticks > 0 && gap > every * 2 {
                debug!(gap_ms = gap.as_millis() as u64, "late wake-up, refreshing");
                session.on_foreground_regained()
            } else {
                session.tick()
            };
            report_warnings(&outcome.warnings);
            for event in &outcome.value.events {
                println!("{}", serde_json::to_string(event)?);
            }

            ticks += 1;
            if count.is_some_and(|limit| ticks >= limit) {
                break;
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    print_snapshot(&mut session)
}
