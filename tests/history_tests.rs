//! Status-history invariants: ordering, dedup, flap suppression, and the
//! active-hours accounting derived from the event stream.

use boardwatch::model::{normalize_history, Job, JobStatus, Status};
use chrono::{DateTime, Duration, Utc};

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid timestamp")
}

fn ev(status: JobStatus, s: &str) -> Status {
    Status {
        status,
        at: ts(s),
    }
}

fn flap() -> Duration {
    Duration::hours(6)
}

#[test]
fn normalization_sorts_and_collapses_duplicates() {
    let history = vec![
        ev(JobStatus::Active, "2025-01-02T00:00:00Z"),
        ev(JobStatus::Active, "2025-01-01T00:00:00Z"),
        ev(JobStatus::Inactive, "2025-01-03T00:00:00Z"),
        ev(JobStatus::Inactive, "2025-01-04T00:00:00Z"),
    ];
    let normalized = normalize_history(history, flap());
    assert_eq!(
        normalized,
        vec![
            ev(JobStatus::Active, "2025-01-01T00:00:00Z"),
            ev(JobStatus::Inactive, "2025-01-03T00:00:00Z"),
        ]
    );
}

#[test]
fn flap_within_window_is_erased() {
    // active 09:00, inactive 10:00, active again at 14:59 (<= 6h later):
    // the bounce never happened.
    let history = vec![
        ev(JobStatus::Active, "2025-01-01T09:00:00Z"),
        ev(JobStatus::Inactive, "2025-01-01T10:00:00Z"),
        ev(JobStatus::Active, "2025-01-01T14:59:00Z"),
    ];
    let normalized = normalize_history(history, flap());
    assert_eq!(normalized, vec![ev(JobStatus::Active, "2025-01-01T09:00:00Z")]);
}

#[test]
fn slow_return_keeps_the_gap() {
    let history = vec![
        ev(JobStatus::Active, "2025-01-01T09:00:00Z"),
        ev(JobStatus::Inactive, "2025-01-01T10:00:00Z"),
        ev(JobStatus::Active, "2025-01-01T16:01:00Z"),
    ];
    let normalized = normalize_history(history.clone(), flap());
    assert_eq!(normalized, history);
}

#[test]
fn normalization_is_idempotent() {
    let histories = vec![
        vec![],
        vec![ev(JobStatus::Inactive, "2025-01-01T00:00:00Z")],
        vec![
            ev(JobStatus::Active, "2025-01-01T00:00:00Z"),
            ev(JobStatus::Inactive, "2025-01-01T01:00:00Z"),
            ev(JobStatus::Active, "2025-01-01T02:00:00Z"),
            ev(JobStatus::Inactive, "2025-01-02T00:00:00Z"),
            ev(JobStatus::Active, "2025-01-03T00:00:00Z"),
        ],
    ];
    for history in histories {
        let once = normalize_history(history, flap());
        let twice = normalize_history(once.clone(), flap());
        assert_eq!(once, twice);
    }
}

#[test]
fn no_adjacent_duplicates_and_no_flaps_after_normalization() {
    let history = vec![
        ev(JobStatus::Active, "2025-01-01T00:00:00Z"),
        ev(JobStatus::Inactive, "2025-01-01T03:00:00Z"),
        ev(JobStatus::Active, "2025-01-01T05:00:00Z"),
        ev(JobStatus::Active, "2025-01-01T06:00:00Z"),
        ev(JobStatus::Inactive, "2025-01-05T00:00:00Z"),
        ev(JobStatus::Active, "2025-01-05T02:00:00Z"),
    ];
    let normalized = normalize_history(history, flap());

    for pair in normalized.windows(2) {
        assert_ne!(pair[0].status, pair[1].status, "adjacent duplicate");
    }
    for triple in normalized.windows(3) {
        let is_flap = triple[0].status == JobStatus::Active
            && triple[1].status == JobStatus::Inactive
            && triple[2].status == JobStatus::Active
            && triple[2].at - triple[0].at <= flap();
        assert!(!is_flap, "flap survived normalization");
    }
}

#[test]
fn mark_skips_duplicate_statuses() {
    let mut job = Job::new("Engineer", "https://x/jobs/1");
    job.mark(JobStatus::Active, ts("2025-01-01T00:00:00Z"), flap());
    job.mark(JobStatus::Active, ts("2025-01-02T00:00:00Z"), flap());
    assert_eq!(job.history.len(), 1);
    assert!(job.is_active());
}

#[test]
fn active_hours_follow_the_trailing_run() {
    let mut job = Job::new("Engineer", "https://x/jobs/1");
    let now = ts("2025-01-03T00:00:00Z");

    // Not active: zero.
    assert_eq!(job.active_hours_at(now), 0.0);

    job.mark(JobStatus::Active, ts("2025-01-01T00:00:00Z"), flap());
    assert!((job.active_hours_at(now) - 48.0).abs() < 1e-9);

    job.mark(JobStatus::Inactive, ts("2025-01-02T00:00:00Z"), flap());
    assert_eq!(job.active_hours_at(now), 0.0);
    assert!(!job.is_active());

    // Re-activation past the flap window starts a fresh run.
    job.mark(JobStatus::Active, ts("2025-01-02T12:00:00Z"), flap());
    assert!(job.is_active());
    assert!((job.active_hours_at(now) - 12.0).abs() < 1e-9);
}

#[test]
fn active_hours_positive_implies_active() {
    let mut job = Job::new("Engineer", "https://x/jobs/1");
    job.mark(JobStatus::Active, ts("2025-01-01T00:00:00Z"), flap());
    job.mark(JobStatus::Inactive, ts("2025-02-01T00:00:00Z"), flap());
    let now = ts("2025-03-01T00:00:00Z");
    if job.active_hours_at(now) > 0.0 {
        assert!(job.is_active());
    }
}
