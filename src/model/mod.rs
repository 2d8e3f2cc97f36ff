//! Board and job data model: append-only status history with flap
//! suppression, the scrape-health state machine, and the health-aware merge.
//!
//! Everything here is pure state manipulation; timestamps are passed in by
//! callers so the merge logic stays deterministic under test.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single observation of a posting's visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub status: JobStatus,
    /// UTC timestamp of when this status was observed.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Inactive,
}

/// A `(title, canonical link)` pair produced by the scrape engine, before it
/// is merged into a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub title: String,
    pub link: String,
}

impl Posting {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// Normalize a status history:
///   - sort ascending by timestamp
///   - collapse consecutive duplicate statuses (keeping the earliest of a run)
///   - fold `inactive -> active` bounces that happen within `flap_window`:
///     the inactive and the returning active are both dropped, as if the
///     posting had never gone away.
///
/// The transform is idempotent and stable under re-application.
pub fn normalize_history(history: Vec<Status>, flap_window: Duration) -> Vec<Status> {
    if history.is_empty() {
        return history;
    }

    let mut hist = history;
    hist.sort_by_key(|s| s.at);

    let mut out: Vec<Status> = Vec::with_capacity(hist.len());
    for st in hist {
        if let Some(last) = out.last() {
            if last.status == st.status {
                continue;
            }
            if st.status == JobStatus::Active
                && last.status == JobStatus::Inactive
                && st.at - last.at <= flap_window
            {
                out.pop();
                continue;
            }
        }
        out.push(st);
    }
    out
}

/// A job posting, uniquely identified within its board by canonical link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub history: Vec<Status>,
}

impl Job {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            history: Vec::new(),
        }
    }

    /// Restore the history invariants in place.
    pub fn normalize(&mut self, flap_window: Duration) {
        self.history = normalize_history(std::mem::take(&mut self.history), flap_window);
    }

    /// A job is active iff its latest observed status is `active`.
    pub fn is_active(&self) -> bool {
        matches!(
            self.history.last(),
            Some(Status {
                status: JobStatus::Active,
                ..
            })
        )
    }

    /// Hours since the start of the trailing unbroken active run, or 0 when
    /// the job is not currently active.
    pub fn active_hours_at(&self, now: DateTime<Utc>) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        let mut start = None;
        for st in self.history.iter().rev() {
            if st.status == JobStatus::Inactive {
                break;
            }
            start = Some(st.at);
        }
        match start {
            Some(t) => ((now - t).num_seconds() as f64 / 3600.0).max(0.0),
            None => 0.0,
        }
    }

    pub fn active_hours(&self) -> f64 {
        self.active_hours_at(Utc::now())
    }

    /// Append a status-change event unless it duplicates the last event,
    /// then re-normalize.
    pub fn mark(&mut self, status: JobStatus, at: DateTime<Utc>, flap_window: Duration) {
        if let Some(last) = self.history.last()
            && last.status == status
        {
            return;
        }
        self.history.push(Status { status, at });
        self.normalize(flap_window);
    }
}

/// One scrape attempt against a board. Boards retain a sliding window of the
/// most recent [`ATTEMPT_WINDOW`] attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeAttempt {
    pub at: DateTime<Utc>,
    pub ok: bool,
    pub count: u32,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub renderer_used: Option<bool>,
    #[serde(default)]
    pub error_kind: Option<String>,
}

pub const ATTEMPT_WINDOW: usize = 50;

/// Per-board tuning knobs. Raw seconds keep the JSON serialization simple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapePolicy {
    pub time_flag_duration_s: i64,
    pub attempt_threshold_for_down: u32,
    pub attempt_window_size: usize,
    pub min_baseline_to_flag: u32,
    pub require_two_successful_zeros_to_deactivate: bool,
    pub manual_override: bool,
    pub flap_window_s: i64,
}

impl Default for ScrapePolicy {
    fn default() -> Self {
        Self {
            time_flag_duration_s: 24 * 3600,
            attempt_threshold_for_down: 5,
            attempt_window_size: 10,
            min_baseline_to_flag: 3,
            require_two_successful_zeros_to_deactivate: true,
            manual_override: false,
            flap_window_s: 6 * 3600,
        }
    }
}

impl ScrapePolicy {
    pub fn flap_window(&self) -> Duration {
        Duration::seconds(self.flap_window_s)
    }

    pub fn time_flag_duration(&self) -> Duration {
        Duration::seconds(self.time_flag_duration_s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Normal,
    Suspect,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HealthReason {
    #[default]
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "ZERO_SPIKE")]
    ZeroSpike,
    #[serde(rename = "EMPTY_STREAK")]
    EmptyStreak,
    #[serde(rename = "MANUAL")]
    Manual,
}

/// Derived health signal used to gate destructive merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScrapeHealth {
    pub status: HealthStatus,
    pub reason: HealthReason,

    pub first_zero_at: Option<DateTime<Utc>>,
    pub consecutive_zero_attempts: u32,
    pub flagged_until: Option<DateTime<Utc>>,

    pub last_nonzero_at: Option<DateTime<Utc>>,
    pub last_nonzero_count: Option<u32>,

    /// Median of recent non-zero successful counts.
    pub baseline_nonzero_count: Option<u32>,

    pub last_success_at: Option<DateTime<Utc>>,
    pub last_success_count: Option<u32>,
}

fn median(values: &[u32]) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    let mut s = values.to_vec();
    s.sort_unstable();
    let mid = s.len() / 2;
    if s.len() % 2 == 1 {
        Some(s[mid])
    } else {
        Some((s[mid - 1] + s[mid]) / 2)
    }
}

/// A tracked career site with its postings, attempt window, and health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobBoard {
    pub title: String,
    pub icon_url: String,
    pub website_url: String,

    #[serde(default)]
    pub attempts: Vec<ScrapeAttempt>,
    #[serde(default)]
    pub scrape_health: ScrapeHealth,
    #[serde(default)]
    pub policy: ScrapePolicy,

    /// Last attempt time, successful or not.
    #[serde(default)]
    pub last_scraped: Option<DateTime<Utc>>,
    /// Last attempt with `ok` and `count > 0`.
    #[serde(default)]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_scrape_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub content: Vec<Job>,
}

impl JobBoard {
    pub fn new(
        title: impl Into<String>,
        icon_url: impl Into<String>,
        website_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            icon_url: icon_url.into(),
            website_url: website_url.into(),
            attempts: Vec::new(),
            scrape_health: ScrapeHealth::default(),
            policy: ScrapePolicy::default(),
            last_scraped: None,
            last_success_at: None,
            next_scrape_at: None,
            content: Vec::new(),
        }
    }

    /// Record a scrape attempt, update the health state machine, and return
    /// the current health. Does not touch `content`.
    #[allow(clippy::too_many_arguments)]
    pub fn record_attempt(
        &mut self,
        count: u32,
        ok: bool,
        at: DateTime<Utc>,
        duration_ms: Option<u64>,
        renderer_used: Option<bool>,
        error_kind: Option<&str>,
    ) -> &ScrapeHealth {
        self.last_scraped = Some(at);

        self.attempts.push(ScrapeAttempt {
            at,
            ok,
            count,
            duration_ms,
            renderer_used,
            error_kind: error_kind.map(str::to_owned),
        });
        if self.attempts.len() > ATTEMPT_WINDOW {
            let excess = self.attempts.len() - ATTEMPT_WINDOW;
            self.attempts.drain(..excess);
        }

        let window = self.policy.time_flag_duration();
        let health = &mut self.scrape_health;

        if self.policy.manual_override {
            health.status = if health.status == HealthStatus::Down {
                HealthStatus::Down
            } else {
                HealthStatus::Suspect
            };
            health.reason = HealthReason::Manual;
            // Counters frozen while the override holds.
            return &self.scrape_health;
        }

        if count > 0 && ok {
            health.consecutive_zero_attempts = 0;
            health.first_zero_at = None;
            health.flagged_until = None;
            health.status = HealthStatus::Normal;
            health.reason = HealthReason::None;

            health.last_nonzero_at = Some(at);
            health.last_nonzero_count = Some(count);
            health.last_success_at = Some(at);
            health.last_success_count = Some(count);
            self.last_success_at = Some(at);

            let k = self.policy.attempt_window_size;
            let successes: Vec<u32> = self
                .attempts
                .iter()
                .rev()
                .filter(|a| a.ok && a.count > 0)
                .take(k)
                .map(|a| a.count)
                .collect();
            self.scrape_health.baseline_nonzero_count =
                median(&successes).or(Some(count));
            return &self.scrape_health;
        }

        // Empty or failed attempt.
        if health.consecutive_zero_attempts == 0 {
            health.first_zero_at = Some(at);
        }
        health.consecutive_zero_attempts += 1;

        let prev = if self.attempts.len() >= 2 {
            self.attempts.get(self.attempts.len() - 2)
        } else {
            None
        };
        health.reason = match prev {
            Some(p) if p.ok && p.count > 0 && count == 0 => HealthReason::ZeroSpike,
            _ => HealthReason::EmptyStreak,
        };

        let flag_until = at + window;
        health.flagged_until = Some(match health.flagged_until {
            Some(existing) if existing > flag_until => existing,
            _ => flag_until,
        });

        let prior_nonzero = health.last_nonzero_count.unwrap_or(0) >= self.policy.min_baseline_to_flag;
        if prior_nonzero {
            let within_window = health
                .first_zero_at
                .map(|fz| at - fz <= window)
                .unwrap_or(false);
            health.status = if within_window
                && health.consecutive_zero_attempts >= self.policy.attempt_threshold_for_down
            {
                HealthStatus::Down
            } else {
                HealthStatus::Suspect
            };
        } else {
            // No baseline yet; only two or more zero attempts raise suspicion.
            health.status = if health.consecutive_zero_attempts >= 2 {
                HealthStatus::Suspect
            } else {
                HealthStatus::Normal
            };
        }

        &self.scrape_health
    }

    /// Flat snapshot of the health fields for read-only consumers.
    pub fn health_summary(&self) -> serde_json::Value {
        let h = &self.scrape_health;
        serde_json::json!({
            "status": h.status,
            "reason": h.reason,
            "first_zero_at": h.first_zero_at,
            "consecutive_zero_attempts": h.consecutive_zero_attempts,
            "flagged_until": h.flagged_until,
            "last_nonzero_at": h.last_nonzero_at,
            "last_nonzero_count": h.last_nonzero_count,
            "baseline_nonzero_count": h.baseline_nonzero_count,
            "last_success_at": h.last_success_at,
            "last_success_count": h.last_success_count,
        })
    }

    /// Merge the currently visible postings into this board with health
    /// gating: every attempt is recorded, but a zero result only deactivates
    /// existing jobs when the policy and the health state allow it.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_scrape(
        &mut self,
        scraped: &[Posting],
        scraped_at: DateTime<Utc>,
        ok: bool,
        duration_ms: Option<u64>,
        renderer_used: Option<bool>,
        error_kind: Option<&str>,
    ) {
        let count = scraped.len() as u32;
        let health_status = self
            .record_attempt(count, ok, scraped_at, duration_ms, renderer_used, error_kind)
            .status;

        if count == 0 {
            let safe_to_deactivate = if self.policy.require_two_successful_zeros_to_deactivate {
                let prev = if self.attempts.len() >= 2 {
                    self.attempts.get(self.attempts.len() - 2)
                } else {
                    None
                };
                ok && prev.is_some_and(|p| p.ok && p.count == 0)
                    && health_status == HealthStatus::Normal
            } else {
                health_status == HealthStatus::Normal
            };

            if !safe_to_deactivate {
                return;
            }
        }

        let flap_window = self.policy.flap_window();

        // Upsert scraped postings, deduplicated by canonical link.
        let mut scraped_links: Vec<&str> = Vec::with_capacity(scraped.len());
        for posting in scraped {
            if scraped_links.contains(&posting.link.as_str()) {
                continue;
            }
            scraped_links.push(&posting.link);

            match self.content.iter_mut().find(|j| j.link == posting.link) {
                Some(existing) => {
                    if !posting.title.is_empty() && posting.title != existing.title {
                        existing.title = posting.title.clone();
                    }
                    existing.mark(JobStatus::Active, scraped_at, flap_window);
                }
                None => {
                    let mut job = Job::new(posting.title.clone(), posting.link.clone());
                    job.history = normalize_history(
                        vec![Status {
                            status: JobStatus::Active,
                            at: scraped_at,
                        }],
                        flap_window,
                    );
                    self.content.push(job);
                }
            }
        }

        // Deactivate active jobs missing from this scrape.
        for job in &mut self.content {
            if job.is_active() && !scraped_links.contains(&job.link.as_str()) {
                job.mark(JobStatus::Inactive, scraped_at, flap_window);
            }
        }

        if count > 0 && ok {
            self.last_success_at = Some(scraped_at);
            self.scrape_health.last_success_at = Some(scraped_at);
            self.scrape_health.last_success_count = Some(count);
        }

        self.content
            .sort_by_key(|j| (!j.is_active(), j.title.to_lowercase()));
    }
}
