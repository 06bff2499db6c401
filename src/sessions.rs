//! Interval history of the active task.
//!
//! The session log is the only record of what state a task is in: the last
//! session's status is the timer status, and an empty log reads as stopped.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Session, SessionStatus, TimerStatus, format_timestamp, parse_timestamp};

/// Closes the open session (if any) at `now` and opens a new one with
/// `status`. Call order is the state machine's concern, not the ledger's.
pub fn append_session(sessions: &mut Vec<Session>, status: SessionStatus, now: DateTime<Utc>) {
    close_open_session(sessions, now);
    sessions.push(Session::open(status, now));
}

/// Sets the end of the last session to `now` when it is still open.
pub fn close_open_session(sessions: &mut [Session], now: DateTime<Utc>) -> bool {
    match sessions.last_mut() {
        Some(last) if last.is_open() => {
            last.end_time = Some(format_timestamp(now));
            true
        }
        _ => false,
    }
}

/// Sum over closed sessions with `status`. Sessions whose bounds do not
/// parse contribute nothing.
pub fn total_duration(sessions: &[Session], status: SessionStatus) -> Duration {
    sessions
        .iter()
        .filter(|session| session.status == status)
        .filter_map(Session::elapsed)
        .fold(Duration::zero(), |total, elapsed| total + elapsed)
}

pub fn open_session_elapsed(
    sessions: &[Session],
    status: SessionStatus,
    now: DateTime<Utc>,
) -> Duration {
    let Some(last) = sessions.last() else {
        return Duration::zero();
    };
    if last.status != status || !last.is_open() {
        return Duration::zero();
    }

    parse_timestamp(&last.start_time)
        .map(|start| now - start)
        .unwrap_or_else(Duration::zero)
}

pub fn current_status(sessions: &[Session]) -> TimerStatus {
    sessions
        .last()
        .map(|session| TimerStatus::from(session.status))
        .unwrap_or(TimerStatus::Stopped)
}

/// Closed sessions followed by at most one open session.
pub fn is_well_formed(sessions: &[Session]) -> bool {
    match sessions.split_last() {
        Some((_, earlier)) => earlier.iter().all(|session| !session.is_open()),
        None => true,
    }
}

/// Restoration rule for a log that was left running while nobody watched:
/// a running session open longer than `idle_threshold` is closed at `now`
/// and a paused session is opened in its place.
pub fn close_abandoned_session(
    sessions: &mut Vec<Session>,
    now: DateTime<Utc>,
    idle_threshold: Duration,
) -> bool {
    let open_for = match sessions.last() {
        Some(last) if last.status == SessionStatus::Running && last.is_open() => {
            match parse_timestamp(&last.start_time) {
                Some(start) => now - start,
                None => return false,
            }
        }
        _ => return false,
    };

    if open_for <= idle_threshold {
        return false;
    }

    append_session(sessions, SessionStatus::Paused, now);
    true
}
