use chrono::{DateTime, Duration, Local, LocalResult, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const INPUT_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Paused,
}

/// Status of the timer as a whole. `Stopped` has no session counterpart: it is
/// what an empty (or absent) session log reads as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Stopped,
    Running,
    Paused,
}

impl TimerStatus {
    pub fn label(self) -> &'static str {
        match self {
            TimerStatus::Stopped => "stopped",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
        }
    }
}

impl From<SessionStatus> for TimerStatus {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Running => TimerStatus::Running,
            SessionStatus::Paused => TimerStatus::Paused,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub status: SessionStatus,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl Session {
    pub fn open(status: SessionStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            start_time: format_timestamp(now),
            end_time: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Length of a closed session. `None` while open or when either bound
    /// does not parse.
    pub fn elapsed(&self) -> Option<Duration> {
        let start = parse_timestamp(&self.start_time)?;
        let end = parse_timestamp(self.end_time.as_deref()?)?;
        Some(end - start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_name: Option<String>,
    pub overall_start_time: String,
    #[serde(default)]
    pub overall_end_time: Option<String>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl Task {
    pub fn begin(now: DateTime<Utc>) -> Self {
        Self {
            task_name: Some(String::new()),
            overall_start_time: format_timestamp(now),
            overall_end_time: None,
            sessions: vec![Session::open(SessionStatus::Running, now)],
        }
    }

    pub fn display_name(&self) -> String {
        display_name(self.task_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    pub task_name: Option<String>,
    pub overall_start_time: String,
    pub overall_end_time: String,
    #[serde(default)]
    pub sessions: Vec<Session>,
    pub total_work_time: i64,
    pub total_pause_time: i64,
    #[serde(default)]
    pub original_duration: i64,
}

impl CompletedTask {
    pub fn display_name(&self) -> String {
        display_name(self.task_name.as_deref())
    }

    /// Baseline for edit validation. Records written before the baseline was
    /// tracked fall back to their work time.
    pub fn validation_baseline(&self) -> i64 {
        if self.original_duration > 0 {
            self.original_duration
        } else {
            self.total_work_time
        }
    }

    pub fn is_same_span(&self, other: &CompletedTask) -> bool {
        self.overall_start_time == other.overall_start_time
            && self.overall_end_time == other.overall_end_time
    }
}

/// Trimmed name, `None` when nothing but whitespace is left.
pub fn normalize_task_name(name: Option<&str>) -> Option<String> {
    let trimmed = name?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn display_name(name: Option<&str>) -> String {
    normalize_task_name(name).unwrap_or_else(|| "(untitled)".to_string())
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

pub fn format_time_hms(millis: i64) -> String {
    let total_seconds = millis.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

pub fn format_date_time(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(timestamp) => timestamp
            .with_timezone(&Local)
            .format("%b %-d, %H:%M:%S")
            .to_string(),
        None => raw.to_string(),
    }
}

pub fn format_date_time_for_input(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(timestamp) => timestamp
            .with_timezone(&Local)
            .format(INPUT_DATE_TIME_FORMAT)
            .to_string(),
        None => raw.to_string(),
    }
}

/// Parses local wall-clock input such as `2026-01-01T09:30` or
/// `2026-01-01 09:30:15`.
pub fn parse_input_date_time(input: &str) -> Result<DateTime<Utc>, String> {
    let mut normalized = input.trim().replacen(' ', "T", 1);
    if normalized.len() == 16 {
        normalized.push_str(":00");
    }

    let naive = NaiveDateTime::parse_from_str(&normalized, INPUT_DATE_TIME_FORMAT)
        .map_err(|err| format!("invalid date/time '{input}': {err}"))?;
    local_naive_to_utc(naive)
        .ok_or_else(|| format!("local time does not exist: {input}"))
}

fn local_naive_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(local_datetime) => Some(local_datetime.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => Some(first.min(second).with_timezone(&Utc)),
        LocalResult::None => None,
    }
}
