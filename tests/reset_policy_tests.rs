// Reset policy tests: boundary clamping, Armed/Fired transitions, the reset
// transaction and its persistence order.

mod common;

use common::{Workspace, date, snap};
use std::collections::BTreeMap;
use trafficmeter::config::AppConfig;
use trafficmeter::ledger::TrafficLedger;
use trafficmeter::models::{BootSessionKey, RESET_SUM_KEY};
use trafficmeter::reset_policy::{ResetPhase, ResetPolicy, ResetState, reset_boundary};

fn state(reset_day: u32, last: Option<&str>) -> ResetState {
    ResetState {
        reset_day,
        last_reset_date: last.map(date),
    }
}

fn ledger_with(entries: &[(&str, u64, u64)]) -> TrafficLedger {
    TrafficLedger::from_entries(
        entries
            .iter()
            .map(|(k, s, r)| (k.to_string(), snap(*s, *r)))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[test]
fn boundary_uses_reset_day_within_month() {
    assert_eq!(reset_boundary(10, 2024, 8), Some(date("2024-08-10")));
    assert_eq!(reset_boundary(1, 2024, 1), Some(date("2024-01-01")));
}

#[test]
fn boundary_clamps_to_month_end() {
    assert_eq!(reset_boundary(31, 2024, 2), Some(date("2024-02-29")));
    assert_eq!(reset_boundary(31, 2023, 2), Some(date("2023-02-28")));
    assert_eq!(reset_boundary(31, 2024, 4), Some(date("2024-04-30")));
    assert_eq!(reset_boundary(30, 2024, 2), Some(date("2024-02-29")));
}

#[test]
fn phase_transitions_across_months() {
    let s = state(10, Some("2024-07-15"));
    assert_eq!(s.phase(date("2024-07-20")), ResetPhase::Fired);
    assert!(!s.is_due(date("2024-07-20")));
    // August: armed, but not due before the 10th
    assert_eq!(s.phase(date("2024-08-09")), ResetPhase::Armed);
    assert!(!s.is_due(date("2024-08-09")));
    assert!(s.is_due(date("2024-08-10")));
    assert!(s.is_due(date("2024-08-25")));
}

#[test]
fn never_reset_is_due_once_boundary_reached() {
    let s = state(1, None);
    assert!(s.is_due(date("2024-08-01")));
    assert!(s.is_due(date("2024-08-19")));
}

#[test]
fn clamped_boundary_fires_on_last_day_of_february() {
    let s = state(31, Some("2024-01-31"));
    assert!(!s.is_due(date("2024-02-28")));
    assert!(s.is_due(date("2024-02-29")));
    let s = state(31, Some("2023-01-31"));
    assert!(s.is_due(date("2023-02-28")));
}

#[test]
fn last_reset_in_future_keeps_policy_fired() {
    // Clock moved backwards: never fire again for a boundary already covered.
    let s = state(10, Some("2024-09-12"));
    assert_eq!(s.phase(date("2024-08-15")), ResetPhase::Fired);
    assert!(!s.is_due(date("2024-08-15")));
}

#[test]
fn next_reset_date_rolls_into_next_month() {
    let s = state(10, Some("2024-07-15"));
    assert_eq!(s.next_reset_date(date("2024-07-20")), date("2024-08-10"));
    assert_eq!(s.next_reset_date(date("2024-08-02")), date("2024-08-10"));
    assert_eq!(s.next_reset_date(date("2024-08-12")), date("2024-08-12"));
    let s = state(31, Some("2024-01-31"));
    assert_eq!(s.next_reset_date(date("2024-02-01")), date("2024-02-29"));
    let s = state(5, Some("2024-12-05"));
    assert_eq!(s.next_reset_date(date("2024-12-20")), date("2025-01-05"));
}

#[test]
fn reset_fires_and_persists_ledger_then_config() {
    let ws = Workspace::new();
    let config = ws.config(10, Some("2024-07-15"));
    let mut policy = ResetPolicy::new(config, &ws.config_path);
    let mut ledger = ledger_with(&[("sessA", 100, 200)]);

    let outcome = policy
        .evaluate(&mut ledger, &ws.ledger_path, date("2024-08-10"))
        .unwrap()
        .expect("reset should fire");

    assert_eq!(outcome.date, date("2024-08-10"));
    assert_eq!(outcome.absorbed, snap(100, 200));
    assert_eq!(outcome.sessions_cleared, 1);
    assert_eq!(ledger, ledger_with(&[(RESET_SUM_KEY, 100, 200)]));
    assert_eq!(policy.config().last_reset_date, Some(date("2024-08-10")));

    assert_eq!(TrafficLedger::load(&ws.ledger_path).unwrap(), ledger);
    let saved = AppConfig::load_or_create(&ws.config_path).unwrap();
    assert_eq!(saved.last_reset_date, Some(date("2024-08-10")));
}

#[test]
fn second_evaluation_same_day_is_a_no_op() {
    let ws = Workspace::new();
    let mut policy = ResetPolicy::new(ws.config(10, Some("2024-07-15")), &ws.config_path);
    let mut ledger = ledger_with(&[("sessA", 100, 200)]);
    policy
        .evaluate(&mut ledger, &ws.ledger_path, date("2024-08-10"))
        .unwrap();

    // New sample for sessA after the reset, as the next tick would record
    ledger.upsert_session(&BootSessionKey::new("sessA").unwrap(), snap(130, 260));
    let ledger_before = ledger.clone();
    let config_before = policy.config().clone();

    let again = policy
        .evaluate(&mut ledger, &ws.ledger_path, date("2024-08-10"))
        .unwrap();
    assert!(again.is_none());
    assert_eq!(ledger, ledger_before);
    assert_eq!(ledger.baseline(), snap(100, 200));
    assert_eq!(ledger.aggregate(), snap(30, 60));
    assert_eq!(policy.config(), &config_before);
}

#[test]
fn reset_conserves_traffic_into_baseline() {
    let ws = Workspace::new();
    let mut policy = ResetPolicy::new(ws.config(1, Some("2024-07-01")), &ws.config_path);
    let mut ledger = ledger_with(&[
        (RESET_SUM_KEY, 1_000, 2_000),
        ("2024-07-03 08:00:00", 1_500, 2_600),
        ("2024-07-20 21:14:09", 700, 50),
    ]);
    let aggregate_before = ledger.aggregate();
    let baseline_before = ledger.baseline();

    policy
        .evaluate(&mut ledger, &ws.ledger_path, date("2024-08-01"))
        .unwrap()
        .expect("reset should fire");

    let baseline_after = ledger.baseline();
    assert_eq!(
        baseline_after.saturating_sub(baseline_before),
        aggregate_before
    );
    assert!(baseline_after.bytes_sent >= baseline_before.bytes_sent);
    assert!(baseline_after.bytes_recv >= baseline_before.bytes_recv);
    assert_eq!(ledger.session_count(), 0);
}

#[test]
fn failed_ledger_write_rolls_back_and_stays_armed() {
    let ws = Workspace::new();
    // A non-empty directory where the ledger file should go makes the rename fail.
    std::fs::create_dir(&ws.ledger_path).unwrap();
    std::fs::write(ws.ledger_path.join("occupied"), "x").unwrap();

    let mut policy = ResetPolicy::new(ws.config(10, Some("2024-07-15")), &ws.config_path);
    let mut ledger = ledger_with(&[("sessA", 100, 200)]);
    let before = ledger.clone();

    let err = policy
        .evaluate(&mut ledger, &ws.ledger_path, date("2024-08-10"))
        .unwrap_err();
    assert_eq!(err.kind(), "LedgerIo");
    assert!(!err.is_fatal());
    assert_eq!(ledger, before);
    assert_eq!(policy.config().last_reset_date, Some(date("2024-07-15")));
    assert!(policy.state().is_due(date("2024-08-10")));
    assert!(!ws.config_path.exists(), "config untouched when ledger write fails");
}

#[test]
fn failed_config_write_is_fatal() {
    let ws = Workspace::new();
    std::fs::create_dir(&ws.config_path).unwrap();
    std::fs::write(ws.config_path.join("occupied"), "x").unwrap();

    let mut policy = ResetPolicy::new(ws.config(10, Some("2024-07-15")), &ws.config_path);
    let mut ledger = ledger_with(&[("sessA", 100, 200)]);

    let err = policy
        .evaluate(&mut ledger, &ws.ledger_path, date("2024-08-10"))
        .unwrap_err();
    assert_eq!(err.kind(), "ConfigIo");
    assert!(err.is_fatal());
    // Ledger was written first
    assert_eq!(
        TrafficLedger::load(&ws.ledger_path).unwrap().baseline(),
        snap(100, 200)
    );
}

#[test]
fn consecutive_months_accumulate_baseline() {
    let ws = Workspace::new();
    let mut policy = ResetPolicy::new(ws.config(1, Some("2024-06-01")), &ws.config_path);
    let session = BootSessionKey::new("2024-06-01 00:00:05").unwrap();
    let mut ledger = TrafficLedger::new();

    ledger.upsert_session(&session, snap(100, 100));
    policy
        .evaluate(&mut ledger, &ws.ledger_path, date("2024-07-01"))
        .unwrap()
        .unwrap();
    // Same boot continues: cumulative counters re-enter the ledger
    ledger.upsert_session(&session, snap(150, 180));
    assert_eq!(ledger.aggregate(), snap(50, 80));

    policy
        .evaluate(&mut ledger, &ws.ledger_path, date("2024-08-01"))
        .unwrap()
        .unwrap();
    assert_eq!(ledger.baseline(), snap(150, 180));
    ledger.upsert_session(&session, snap(160, 200));
    assert_eq!(ledger.aggregate(), snap(10, 20));
}
