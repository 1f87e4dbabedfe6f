mod common;

use common::{quiet_config, Harness};
use proptest::prelude::*;
use worktally_core::AlertKind;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Elapsed time only depends on how long the tracker ran, never on how
    /// the ticks between were spaced.
    #[test]
    fn elapsed_is_independent_of_tick_spacing(gaps in prop::collection::vec(0i64..900, 1..40)) {
        let mut h = Harness::with_config(quiet_config());
        h.session.start("design");
        for gap in &gaps {
            h.advance(*gap);
            h.session.tick();
        }
        let total: i64 = gaps.iter().sum();
        prop_assert_eq!(h.session.current_elapsed() as i64, total);
    }

    /// Paused spans never count.
    #[test]
    fn paused_time_is_excluded(spans in prop::collection::vec((1i64..600, 1i64..600), 1..12)) {
        let mut h = Harness::with_config(quiet_config());
        h.session.start("design");
        let mut running = 0i64;
        for (work, idle) in &spans {
            h.advance(*work);
            running += work;
            h.session.pause();
            h.advance(*idle);
            h.session.resume();
        }
        let run = h.session.stop().into_value().stopped;
        prop_assert_eq!(run.map(|r| r.elapsed_secs() as i64), Some(running));
    }

    /// A reminder fires on every tick that carries elapsed time past a new
    /// boundary, once, however many boundaries that tick skipped over.
    #[test]
    fn reminders_fire_once_per_boundary_reached(gaps in prop::collection::vec(1i64..2400, 1..30)) {
        let mut h = Harness::with_config(quiet_config());
        h.session.start("design");
        let (mut elapsed, mut reminders, mut hourly) = (0i64, 0usize, 0usize);
        for gap in &gaps {
            let before = elapsed;
            elapsed += gap;
            reminders += usize::from(elapsed / 1800 > before / 1800);
            hourly += usize::from(elapsed / 3600 > before / 3600);
            h.advance(*gap);
            h.session.tick();
        }
        prop_assert_eq!(h.alerts.count(AlertKind::PeriodicReminder), reminders);
        prop_assert_eq!(h.alerts.count(AlertKind::HourlyMilestone), hourly);
    }
}
