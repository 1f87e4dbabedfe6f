//! End-to-end behavior of a session driven by a manual clock.

mod common;

use chrono::NaiveTime;
use common::{quiet_config, Harness};
use worktally_core::{AlertKind, Clock, EntryLog, Event, Phase, TrackerStatus};

#[test]
fn elapsed_equals_clock_advance_regardless_of_ticks() {
    let mut h = Harness::new();
    h.session.start("design");
    h.advance(4321);
    assert_eq!(h.session.current_elapsed(), 4321);

    let mut h = Harness::new();
    h.session.start("design");
    for _ in 0..4321 {
        h.advance(1);
        h.session.tick();
    }
    assert_eq!(h.session.current_elapsed(), 4321);
}

#[test]
fn pause_resume_conserves_only_running_time() {
    let mut h = Harness::new();
    h.session.start("design");
    h.advance(5);
    h.session.pause();
    h.advance(10);
    h.session.resume();
    h.advance(3);
    let report = h.session.stop().into_value();
    assert_eq!(report.stopped.unwrap().elapsed_secs(), 8);
}

#[test]
fn repeated_or_idle_commands_change_nothing() {
    let mut h = Harness::new();
    let stopped = h.session.stop();
    assert!(stopped.is_clean());
    assert!(stopped.value.is_empty());
    assert!(h.session.pause().value.is_empty());

    h.session.start("design");
    h.advance(7);
    assert!(!h.session.pause().value.is_empty());
    let frozen = h.session.tracker().state().clone();
    let again = h.session.pause();
    assert!(again.is_clean());
    assert!(again.value.is_empty());
    assert_eq!(h.session.tracker().state(), &frozen);
    assert_eq!(h.session.tracker().status(), TrackerStatus::Paused);
}

#[test]
fn reminder_fires_on_each_boundary_exactly_once() {
    let mut h = Harness::with_config(quiet_config());
    h.session.start("design");
    let mut fired_at = Vec::new();
    for second in 1..=5400 {
        h.advance(1);
        let report = h.session.tick().into_value();
        if report.alerts().any(|k| k == AlertKind::PeriodicReminder) {
            fired_at.push(second);
        }
        // A second tick at the same instant fires nothing.
        if second % 600 == 0 {
            let extra = h.session.tick().into_value();
            assert_eq!(extra.alerts().count(), 0);
        }
    }
    assert_eq!(fired_at, vec![1800, 3600, 5400]);
    assert_eq!(h.alerts.count(AlertKind::HourlyMilestone), 1);
}

#[test]
fn backgrounded_gap_fires_each_crossed_cadence_once() {
    let mut h = Harness::with_config(quiet_config());
    h.session.start("design");
    h.advance(1750);
    h.session.tick();
    assert!(h.alerts.alerts().is_empty());

    h.advance(1950);
    let report = h.session.on_foreground_regained().into_value();
    let kinds: Vec<_> = report.alerts().collect();
    assert_eq!(kinds, vec![AlertKind::PeriodicReminder, AlertKind::HourlyMilestone]);

    h.session.tick();
    assert_eq!(h.alerts.count(AlertKind::PeriodicReminder), 1);
    assert_eq!(h.alerts.count(AlertKind::HourlyMilestone), 1);
}

#[test]
fn focus_completion_stops_tracker_and_finalizes_once() {
    let mut h = Harness::new();
    h.session.start_cycle();
    assert!(h.session.is_running());
    let entry_id = h.session.tracker().linked_entry_id().cloned().unwrap();

    h.advance(1499);
    h.session.tick();
    assert!(h.session.is_running());

    h.advance(1);
    let report = h.session.tick().into_value();
    assert_eq!(h.session.tracker().status(), TrackerStatus::Idle);
    assert_eq!(h.log.update_count(), 1);
    let entry = h.log.find_entry(&entry_id).unwrap().unwrap();
    assert!(!entry.provisional);
    assert_eq!(entry.duration_secs(), 1500);

    let completed = report
        .events
        .iter()
        .position(|e| matches!(e, Event::PhaseCompleted { phase: Phase::Focus, .. }))
        .unwrap();
    let advanced = report
        .events
        .iter()
        .position(|e| matches!(e, Event::PhaseAdvanced { .. }))
        .unwrap();
    assert!(completed < advanced);
    assert_eq!(h.alerts.count(AlertKind::FocusComplete), 1);
    assert_eq!(h.session.phase(), Phase::ShortBreak);

    for _ in 0..10 {
        h.advance(30);
        h.session.tick();
    }
    assert_eq!(h.log.update_count(), 1);
}

#[test]
fn cycle_joins_a_manual_run_without_restarting_it() {
    let mut h = Harness::new();
    h.session.start("client work");
    let entry_id = h.session.tracker().linked_entry_id().cloned();
    h.advance(600);
    h.session.start_cycle();
    assert_eq!(h.session.tracker().label(), Some("client work"));
    assert_eq!(h.session.tracker().linked_entry_id().cloned(), entry_id);
    assert_eq!(h.session.current_elapsed(), 600);
    assert_eq!(h.log.all().len(), 1);
}

#[test]
fn manual_stop_halts_the_focus_countdown() {
    let mut h = Harness::new();
    h.session.start_cycle();
    h.advance(300);
    h.session.stop();
    assert!(!h.session.cycle().is_running());
    h.advance(5000);
    let report = h.session.tick().into_value();
    assert!(!report
        .events
        .iter()
        .any(|e| matches!(e, Event::PhaseCompleted { .. })));
    assert_eq!(h.session.remaining_secs(), 1500);
}

#[test]
fn auto_start_policy_is_evaluated_after_completion() {
    let mut config = quiet_config();
    config.cycle.auto_start_breaks = true;
    config.cycle.auto_start_work = true;
    let mut h = Harness::with_config(config);
    h.session.start_cycle();
    h.advance(1500);
    h.session.tick();
    assert_eq!(h.session.phase(), Phase::ShortBreak);
    assert!(h.session.cycle().is_running());
    assert!(!h.session.tracker().is_active());

    h.advance(300);
    h.session.tick();
    assert_eq!(h.session.phase(), Phase::Focus);
    assert!(h.session.cycle().is_running());
    assert!(h.session.is_running());
    assert_eq!(h.log.all().len(), 2);
}

#[test]
fn without_auto_start_the_next_phase_waits() {
    let mut h = Harness::with_config(quiet_config());
    h.session.start_cycle();
    h.advance(1500);
    h.session.tick();
    assert_eq!(h.session.phase(), Phase::ShortBreak);
    assert!(!h.session.cycle().is_running());
    assert_eq!(h.session.remaining_secs(), 300);
}

#[test]
fn pause_cycle_pauses_tracker_and_resume_resumes_both() {
    let mut h = Harness::new();
    h.session.start_cycle();
    h.advance(100);
    h.session.pause_cycle();
    assert!(h.session.is_paused());
    h.advance(1000);
    h.session.resume_cycle();
    assert!(h.session.is_running());
    assert!(h.session.cycle().is_running());
    h.advance(50);
    assert_eq!(h.session.current_elapsed(), 150);
    assert_eq!(h.session.remaining_secs(), 1350);
}

#[test]
fn stop_cycle_finalizes_the_run() {
    let mut h = Harness::new();
    h.session.start_cycle();
    h.advance(420);
    let report = h.session.stop_cycle().into_value();
    assert_eq!(report.stopped.unwrap().elapsed_secs(), 420);
    assert!(!h.session.tracker().is_active());
    assert_eq!(h.session.remaining_secs(), 1500);
}

#[test]
fn entry_round_trip_leaves_earned_blank() {
    let mut h = Harness::new();
    h.session.start("design");
    let id = h.session.tracker().linked_entry_id().cloned().unwrap();
    let created = h.log.find_entry(&id).unwrap().unwrap();
    assert!(created.provisional);
    assert_eq!(created.end, None);
    assert_eq!(created.duration_hours, 0.0);

    h.advance(3661);
    let run = h.session.stop().into_value().stopped.unwrap();
    assert_eq!(run.entry_id.as_ref(), Some(&id));

    let entry = h.log.find_entry(&id).unwrap().unwrap();
    assert!((entry.duration_hours - 1.016_944).abs() < 1e-5);
    assert_eq!(entry.end, Some(NaiveTime::from_hms_opt(10, 1, 1).unwrap()));
    assert_eq!(entry.earned, 0.0);
    assert_eq!(entry.effective_rate(), None);

    let earned = h.session.record_earnings(&id, 3000.0).unwrap();
    assert_eq!(earned.earned, 3000.0);
    assert!((earned.effective_rate().unwrap() - 2950.0).abs() < 0.5);
}

#[test]
fn unreachable_log_does_not_block_tracking() {
    let mut h = Harness::new();
    h.log.set_available(false);
    let started = h.session.start("design");
    assert!(!started.is_clean());
    assert!(h.session.is_running());
    assert!(h.session.tracker().linked_entry_id().is_none());

    h.advance(90);
    let stopped = h.session.stop().into_value();
    let run = stopped.stopped.unwrap();
    assert_eq!(run.entry_id, None);
    assert_eq!(run.elapsed_secs(), 90);
    assert!(!h.session.tracker().is_active());
}

#[test]
fn failed_finalize_is_retried_on_later_ticks() {
    let mut h = Harness::new();
    h.session.start("design");
    let id = h.session.tracker().linked_entry_id().cloned().unwrap();
    h.advance(600);
    h.log.set_available(false);
    let stopped = h.session.stop();
    assert!(!stopped.is_clean());
    assert!(!h.session.tracker().is_active());
    assert_eq!(h.session.pending_finalizations().len(), 1);

    h.log.set_available(true);
    h.advance(60);
    h.session.tick();
    assert!(h.session.pending_finalizations().is_empty());
    assert!(!h.log.find_entry(&id).unwrap().unwrap().provisional);
}

#[test]
fn overtime_thresholds_fire_once_each() {
    let mut h = Harness::with_config(quiet_config());
    h.session.start("long day");
    h.advance(8 * 3600 + 1800);
    h.session.tick();
    assert_eq!(h.alerts.count(AlertKind::OvertimeWarning), 1);
    assert_eq!(h.alerts.count(AlertKind::OvertimeCritical), 0);

    for _ in 0..9 {
        h.advance(1800);
        h.session.tick();
    }
    // 13h tracked: critical threshold is 12h.
    assert_eq!(h.session.current_elapsed(), 13 * 3600);
    assert_eq!(h.alerts.count(AlertKind::OvertimeWarning), 1);
    assert_eq!(h.alerts.count(AlertKind::OvertimeCritical), 1);
}

#[test]
fn overtime_counts_entries_already_logged_today() {
    let mut h = Harness::with_config(quiet_config());
    h.session.start("morning");
    h.advance(5 * 3600);
    h.session.stop();

    h.session.start("afternoon");
    h.advance(3 * 3600 + 1800);
    let report = h.session.tick().into_value();
    assert!(report.alerts().any(|k| k == AlertKind::OvertimeWarning));
}

#[test]
fn overtime_state_resets_on_a_new_day() {
    let mut h = Harness::with_config(quiet_config());
    h.session.start("a");
    h.advance(9 * 3600);
    h.session.tick();
    h.session.stop();
    assert_eq!(h.alerts.count(AlertKind::OvertimeWarning), 1);

    // 18:00 -> next day 09:00
    h.advance(15 * 3600);
    h.session.start("b");
    h.advance(9 * 3600);
    h.session.tick();
    assert_eq!(h.alerts.count(AlertKind::OvertimeWarning), 2);
}

#[test]
fn restart_resumes_accrual_and_suppresses_repeat_alerts() {
    let mut h = Harness::with_config(quiet_config());
    h.session.start("design");
    h.advance(1800);
    h.session.tick();
    assert_eq!(h.alerts.count(AlertKind::PeriodicReminder), 1);

    h.advance(100);
    h.restart(quiet_config());
    assert!(h.session.is_running());
    assert_eq!(h.session.current_elapsed(), 1900);
    h.session.tick();
    assert_eq!(h.alerts.count(AlertKind::PeriodicReminder), 1);
}

#[test]
fn restart_after_unseen_completion_advances_the_cycle() {
    let mut h = Harness::with_config(quiet_config());
    h.session.skip_phase();
    h.session.start_cycle();
    assert_eq!(h.session.phase(), Phase::ShortBreak);
    h.advance(30);
    h.session.tick();

    // The process exits; the countdown would have run out meanwhile.
    h.advance(3600);
    h.restart(quiet_config());
    h.session.tick();
    assert_eq!(h.session.phase(), Phase::Focus);
    assert!(!h.session.cycle().is_running());
}

#[test]
fn backwards_clock_is_clamped() {
    let mut h = Harness::new();
    h.session.start("design");
    h.advance(120);
    h.session.pause();
    h.session.resume();
    h.clock.advance_secs(-3600);
    assert_eq!(h.session.current_elapsed(), 120);
    h.session.tick();
    let run = h.session.stop().into_value().stopped.unwrap();
    assert_eq!(run.elapsed_secs(), 120);
}

#[test]
fn daily_focus_count_starts_over() {
    let mut h = Harness::with_config(quiet_config());
    h.session.skip_phase();
    h.session.skip_phase();
    assert_eq!(h.session.cycle().completed_today(h.clock.today()), 1);
    h.advance(24 * 3600);
    assert_eq!(h.session.cycle().completed_today(h.clock.today()), 0);
    h.session.skip_phase();
    assert_eq!(h.session.cycle().completed_focus_count(), 1);
    assert_eq!(h.session.cycle().state().total_focus_count, 2);
}

#[test]
fn late_tick_stops_the_run_when_focus_ran_out() {
    let mut h = Harness::with_config(quiet_config());
    h.session.start_cycle();
    let entry_id = h.session.tracker().linked_entry_id().cloned().unwrap();

    h.advance(3 * 3600);
    let report = h.session.tick().into_value();
    let run = report.stopped.clone().unwrap();
    assert_eq!(run.elapsed_secs(), 1500);
    assert_eq!(run.at, h.clock.now() - chrono::Duration::seconds(3 * 3600 - 1500));

    let entry = h.log.find_entry(&entry_id).unwrap().unwrap();
    assert_eq!(entry.duration_secs(), 1500);
    assert_eq!(entry.end, Some(NaiveTime::from_hms_opt(9, 25, 0).unwrap()));

    // Elapsed never got past the focus length, so no cadence was due.
    assert_eq!(h.alerts.count(AlertKind::PeriodicReminder), 0);
    assert_eq!(h.alerts.count(AlertKind::HourlyMilestone), 0);
    assert_eq!(h.session.phase(), Phase::ShortBreak);
}

#[test]
fn late_tick_alerts_precede_completion() {
    let mut config = quiet_config();
    config.notifications.reminder_interval_min = 20;
    let mut h = Harness::with_config(config);
    h.session.start_cycle();
    h.advance(1000);
    h.session.tick();

    h.advance(1000);
    let report = h.session.tick().into_value();
    let reminder = report
        .events
        .iter()
        .position(|e| matches!(e, Event::AlertFired { kind: AlertKind::PeriodicReminder, .. }))
        .unwrap();
    let completed = report
        .events
        .iter()
        .position(|e| matches!(e, Event::PhaseCompleted { phase: Phase::Focus, .. }))
        .unwrap();
    let advanced = report
        .events
        .iter()
        .position(|e| matches!(e, Event::PhaseAdvanced { .. }))
        .unwrap();
    assert!(reminder < completed);
    assert!(completed < advanced);
    assert_eq!(report.stopped.unwrap().elapsed_secs(), 1500);
    assert_eq!(h.alerts.count(AlertKind::PeriodicReminder), 1);
}

#[test]
fn manual_stop_after_unnoticed_completion_keeps_the_focus_length() {
    let mut h = Harness::with_config(quiet_config());
    h.session.start_cycle();
    h.advance(2 * 3600);

    let report = h.session.stop().into_value();
    assert_eq!(report.stopped.unwrap().elapsed_secs(), 1500);
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, Event::PhaseCompleted { phase: Phase::Focus, .. })));
    assert_eq!(h.session.phase(), Phase::ShortBreak);
    assert_eq!(h.session.cycle().completed_focus_count(), 1);
    assert_eq!(h.log.update_count(), 1);
}

#[test]
fn focus_ending_on_a_directly_paused_tracker_does_not_stop_it() {
    let mut h = Harness::new();
    h.session.start_cycle();
    h.advance(100);
    h.session.pause();
    assert!(h.session.cycle().is_running());

    h.advance(1400);
    let report = h.session.tick().into_value();
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, Event::PhaseCompleted { phase: Phase::Focus, .. })));
    assert!(report.stopped.is_none());
    assert!(h.session.is_paused());
    assert_eq!(h.session.current_elapsed(), 100);
    assert_eq!(h.log.update_count(), 0);
    assert_eq!(h.session.phase(), Phase::ShortBreak);
}

#[test]
fn completion_alert_names_the_phase() {
    let mut h = Harness::new();
    h.session.start_cycle();
    h.advance(1500);
    h.session.tick();
    let alert = h
        .alerts
        .alerts()
        .into_iter()
        .find(|a| a.kind == AlertKind::FocusComplete)
        .unwrap();
    assert_eq!(alert.message.as_deref(), Some("Focus complete"));

    h.session.start_cycle();
    h.advance(300);
    h.session.tick();
    let alert = h
        .alerts
        .alerts()
        .into_iter()
        .find(|a| a.kind == AlertKind::BreakComplete)
        .unwrap();
    assert_eq!(alert.message.as_deref(), Some("Short Break complete"));
}

#[test]
fn run_across_midnight_counts_only_today() {
    let mut h = Harness::with_config(quiet_config());
    // 09:00 -> 23:00
    h.advance(14 * 3600);
    h.session.start("late");
    h.advance(2 * 3600);
    assert_eq!(h.session.current_elapsed(), 2 * 3600);
    assert_eq!(h.session.today_total_secs().into_value(), 3600);
}
