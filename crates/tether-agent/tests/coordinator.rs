mod common;

use common::*;
use tether_agent::ReconcileSummary;

fn ids(summary_ids: &[smol_str::SmolStr]) -> Vec<&str> {
    summary_ids.iter().map(smol_str::SmolStr::as_str).collect()
}

#[test]
fn reconcile_is_idempotent() {
    let mut fx = Fixture::new();
    let desired = vec![
        Breakpoint::at("b1", "code.js", 5),
        Breakpoint::at("b2", "lib/util.js", 9),
    ];
    let summary = fx.coordinator.reconcile(desired.clone());
    assert_eq!(ids(&summary.added), ["b1", "b2"]);
    assert_eq!(fx.engine().num_breakpoints(), 2);

    assert_eq!(fx.coordinator.reconcile(desired), ReconcileSummary::default());
    assert_eq!(fx.engine().num_breakpoints(), 2);
    assert_eq!(fx.runtime.native_breakpoint_count(), 2);
}

#[test]
fn breakpoints_missing_from_the_set_are_cleared() {
    let mut fx = Fixture::new();
    fx.coordinator.reconcile(vec![
        Breakpoint::at("b1", "code.js", 5),
        Breakpoint::at("b2", "lib/util.js", 9),
    ]);
    let summary = fx.coordinator.reconcile(vec![Breakpoint::at("b1", "code.js", 5)]);
    assert_eq!(ids(&summary.cleared), ["b2"]);
    assert!(summary.added.is_empty());
    assert!(!fx.engine().is_active("b2"));
    assert_eq!(fx.runtime.native_breakpoint_count(), 1);
    assert!(fx.reports().is_empty());
}

#[test]
fn completed_breakpoints_are_not_reinstalled_and_later_forgotten() {
    let mut fx = Fixture::new();
    let desired = vec![Breakpoint::at("b1", "code.js", 5)];
    fx.coordinator.reconcile(desired.clone());
    assert!(fx.run_line(CODE_JS, 5));
    assert_eq!(fx.only_report().id, "b1");

    // The server has not seen the report yet and still lists the breakpoint.
    assert!(fx.coordinator.reconcile(desired).is_empty());
    assert_eq!(fx.engine().num_breakpoints(), 0);
    assert_eq!(fx.runtime.native_breakpoint_count(), 0);

    let summary = fx.coordinator.reconcile(Vec::new());
    assert_eq!(ids(&summary.forgotten), ["b1"]);
    assert!(!fx.engine().is_completed("b1"));
}

#[test]
fn unreported_completions_are_dropped_once_forgotten() {
    let mut fx = Fixture::new();
    fx.coordinator.reconcile(vec![Breakpoint::at("b1", "missing.js", 5)]);
    fx.coordinator.reconcile(Vec::new());
    assert!(fx.reports().is_empty());
}

#[test]
fn expressions_need_to_be_allowed() {
    let mut config = config();
    config.allow_expressions = false;
    let mut fx = Fixture::with_config(config);
    let summary = fx.coordinator.reconcile(vec![
        Breakpoint::at("plain", "code.js", 5),
        Breakpoint::at("cond", "code.js", 6).with_condition("x > 1"),
        Breakpoint::at("watch", "code.js", 7).with_expressions(["x"]),
        Breakpoint::at("blank", "code.js", 8).with_condition(" "),
    ]);
    assert_eq!(ids(&summary.added), ["plain", "cond", "watch", "blank"]);
    assert!(fx.engine().is_active("plain"));
    assert!(fx.engine().is_active("blank"));

    let reports = fx.reports();
    let rejected: Vec<&str> = reports.iter().map(|report| report.id.as_str()).collect();
    assert_eq!(rejected, ["cond", "watch"]);
    for report in &reports {
        let status = report.status.as_ref().unwrap();
        assert_eq!(status.message(), messages::EXPRESSIONS_NOT_ALLOWED);
        assert_eq!(status.refers_to, RefersTo::Unspecified);
        assert!(status.is_error);
    }
}

#[test]
fn requeued_reports_come_back() {
    let mut fx = Fixture::new();
    fx.coordinator.reconcile(vec![Breakpoint::at("b1", "missing.js", 5)]);
    let report = fx.only_report();
    fx.coordinator.requeue(report.clone());
    assert_eq!(fx.reports(), vec![report]);
}
