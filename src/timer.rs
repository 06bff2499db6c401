//! Start/pause/resume/stop state machine around the active task.
//!
//! Transitions run against a scratch copy of the state and are committed only
//! when they succeed, then both persisted keys are rewritten. Persistence is
//! advisory: a failed write is logged and the in-memory state stands.

use std::cell::Cell;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::config::Settings;
use crate::domain::{
    CompletedTask, Session, SessionStatus, Task, TimerStatus, format_timestamp, normalize_task_name,
    parse_timestamp,
};
use crate::sessions::{
    append_session, close_abandoned_session, close_open_session, current_status,
    is_well_formed, open_session_elapsed, total_duration,
};
use crate::storage::{KeyValueStore, PersistedState, load_state, save_state};
use crate::validate::validate_time_range;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("another operation is still in progress")]
    Busy,
    #[error("cannot {action} while {status}")]
    InvalidTransition {
        action: &'static str,
        status: &'static str,
    },
    #[error("no completed task #{0}")]
    UnknownRecord(usize),
    #[error("{0}")]
    Rejected(String),
}

/// Busy flag that admits one operation at a time. The permit clears the
/// flag when dropped. `TimerMachine` operations take `&mut self`, so safe
/// callers cannot overlap them and the flag is never observed as held
/// between calls.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: Cell<bool>,
}

impl SingleFlight {
    pub fn try_acquire(&self) -> Option<FlightPermit<'_>> {
        if self.busy.replace(true) {
            None
        } else {
            Some(FlightPermit { busy: &self.busy })
        }
    }
}

pub struct FlightPermit<'a> {
    busy: &'a Cell<bool>,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

#[derive(Debug, Clone)]
struct TransientError {
    message: String,
    raised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct TimerState {
    persisted: PersistedState,
    /// Most recent record appended by `stop`; used to drop a repeated append.
    last_archived: Option<CompletedTask>,
}

pub struct TimerMachine<S: KeyValueStore> {
    store: S,
    settings: Settings,
    state: TimerState,
    guard: SingleFlight,
    error: Option<TransientError>,
}

impl<S: KeyValueStore> TimerMachine<S> {
    /// Loads persisted state and applies the idle rule to a task that was
    /// left running.
    pub fn restore(store: S, settings: Settings, now: DateTime<Utc>) -> Self {
        let mut persisted = load_state(&store);
        let mut adjusted = false;

        if let Some(task) = persisted.current_task.as_mut() {
            if !is_well_formed(&task.sessions) {
                tracing::warn!("restored task has an open session before its last one");
            }
            adjusted = close_abandoned_session(&mut task.sessions, now, settings.idle_threshold());
            if adjusted {
                tracing::info!(
                    idle_threshold_minutes = settings.idle_threshold_minutes,
                    "paused task left running past idle threshold"
                );
            }
        }

        let mut machine = Self {
            store,
            settings,
            state: TimerState {
                persisted,
                last_archived: None,
            },
            guard: SingleFlight::default(),
            error: None,
        };

        if adjusted {
            machine.persist();
        }
        machine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.state.persisted.current_task.as_ref()
    }

    pub fn completed_tasks(&self) -> &[CompletedTask] {
        &self.state.persisted.completed_tasks
    }

    pub fn completed_task(&self, index: usize) -> Result<&CompletedTask, TimerError> {
        self.completed_tasks()
            .get(index)
            .ok_or(TimerError::UnknownRecord(index + 1))
    }

    pub fn completed_sessions(&self, index: usize) -> Result<&[Session], TimerError> {
        self.completed_task(index).map(|task| task.sessions.as_slice())
    }

    pub fn status(&self) -> TimerStatus {
        status_of(self.current_task())
    }

    /// Closed running time of the active task.
    pub fn total_work_time(&self) -> Duration {
        self.current_task()
            .map(|task| total_duration(&task.sessions, SessionStatus::Running))
            .unwrap_or_else(Duration::zero)
    }

    /// Time since the open running session started; zero unless running.
    pub fn current_session_elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.current_task()
            .map(|task| open_session_elapsed(&task.sessions, SessionStatus::Running, now))
            .unwrap_or_else(Duration::zero)
    }

    pub fn total_pause_time(&self) -> Duration {
        self.current_task()
            .map(|task| total_duration(&task.sessions, SessionStatus::Paused))
            .unwrap_or_else(Duration::zero)
    }

    /// Redraw cadence for the live counter, only while running.
    pub fn tick_interval(&self) -> Option<std::time::Duration> {
        match self.status() {
            TimerStatus::Running => Some(self.settings.tick_interval()),
            TimerStatus::Stopped | TimerStatus::Paused => None,
        }
    }

    /// Error from the last failed operation, until it expires.
    pub fn active_error(&self, now: DateTime<Utc>) -> Option<&str> {
        self.error
            .as_ref()
            .filter(|error| now - error.raised_at < self.settings.error_display())
            .map(|error| error.message.as_str())
    }

    pub fn error_deadline(&self) -> Option<DateTime<Utc>> {
        self.error
            .as_ref()
            .map(|error| error.raised_at + self.settings.error_display())
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        self.run("start", now, |state, _| {
            let status = status_of(state.persisted.current_task.as_ref());
            if status != TimerStatus::Stopped {
                return Err(invalid("start", status));
            }

            state.persisted.current_task = Some(Task::begin(now));
            Ok(())
        })
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        self.run("pause", now, |state, _| {
            transition(state, "pause", TimerStatus::Running, SessionStatus::Paused, now)
        })
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        self.run("resume", now, |state, _| {
            transition(state, "resume", TimerStatus::Paused, SessionStatus::Running, now)
        })
    }

    /// Archives the active task. Returns the appended record, or `None` when
    /// it repeated the previous append and was dropped.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<Option<CompletedTask>, TimerError> {
        self.run("stop", now, |state, _| {
            let Some(mut task) = state.persisted.current_task.take() else {
                return Err(invalid("stop", TimerStatus::Stopped));
            };

            // A clock that stepped back must not end the task before it began.
            let end = latest_start(&task).map_or(now, |latest| latest.max(now));
            if end != now {
                tracing::warn!(now = %now, end = %end, "clock behind task start, clamping stop time");
            }

            close_open_session(&mut task.sessions, end);
            let work = total_duration(&task.sessions, SessionStatus::Running)
                + open_session_elapsed(&task.sessions, SessionStatus::Running, end);
            let pause = total_duration(&task.sessions, SessionStatus::Paused);
            let work_seconds = work.num_seconds().max(0);

            let completed = CompletedTask {
                task_name: normalize_task_name(task.task_name.as_deref()),
                overall_start_time: task.overall_start_time,
                overall_end_time: format_timestamp(end),
                sessions: task.sessions,
                total_work_time: work_seconds,
                total_pause_time: pause.num_seconds().max(0),
                original_duration: work_seconds,
            };

            let repeated = state
                .last_archived
                .as_ref()
                .is_some_and(|previous| previous.is_same_span(&completed));
            if repeated {
                tracing::debug!(start = %completed.overall_start_time, "dropped repeated completion");
                return Ok(None);
            }

            state.last_archived = Some(completed.clone());
            state.persisted.completed_tasks.push(completed.clone());
            Ok(Some(completed))
        })
    }

    /// Renames the active task in place. Without an active task this does
    /// nothing.
    pub fn update_task_name(&mut self, name: &str, now: DateTime<Utc>) -> Result<(), TimerError> {
        self.run("rename", now, |state, _| {
            if let Some(task) = state.persisted.current_task.as_mut() {
                task.task_name = Some(name.to_string());
            }
            Ok(())
        })
    }

    /// Replaces name and time span of a completed record after checking the
    /// new span against its recorded duration. The session log is kept.
    pub fn edit_completed(
        &mut self,
        index: usize,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i64, TimerError> {
        self.run("edit", now, |state, settings| {
            let record = state
                .persisted
                .completed_tasks
                .get_mut(index)
                .ok_or(TimerError::UnknownRecord(index + 1))?;

            let result = validate_time_range(
                start,
                end,
                record.validation_baseline(),
                &settings.drift_policy(),
            );
            if !result.valid {
                return Err(TimerError::Rejected(
                    result.message.unwrap_or_else(|| "invalid time range".to_string()),
                ));
            }

            record.task_name = normalize_task_name(Some(name));
            record.overall_start_time = format_timestamp(start);
            record.overall_end_time = format_timestamp(end);
            record.total_work_time = result.duration_seconds;
            Ok(result.duration_seconds)
        })
    }

    pub fn delete_completed(&mut self, index: usize, now: DateTime<Utc>) -> Result<CompletedTask, TimerError> {
        self.run("delete", now, |state, _| {
            if index >= state.persisted.completed_tasks.len() {
                return Err(TimerError::UnknownRecord(index + 1));
            }
            Ok(state.persisted.completed_tasks.remove(index))
        })
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn run<T>(
        &mut self,
        action: &'static str,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut TimerState, &Settings) -> Result<T, TimerError>,
    ) -> Result<T, TimerError> {
        let Some(permit) = self.guard.try_acquire() else {
            tracing::debug!(action, "ignored while another operation runs");
            return Err(TimerError::Busy);
        };

        self.error = None;
        let mut scratch = self.state.clone();
        let outcome = op(&mut scratch, &self.settings);

        match &outcome {
            Ok(_) => {
                self.state = scratch;
                tracing::debug!(action, status = status_of(self.current_task()).label(), "applied");
                if let Err(err) = save_state(&mut self.store, &self.state.persisted) {
                    tracing::warn!(action, error = %err, "failed to persist timer state");
                }
            }
            Err(err) => {
                tracing::debug!(action, error = %err, "rejected");
                self.error = Some(TransientError {
                    message: err.to_string(),
                    raised_at: now,
                });
            }
        }

        drop(permit);
        outcome
    }

    fn persist(&mut self) {
        if let Err(err) = save_state(&mut self.store, &self.state.persisted) {
            tracing::warn!(error = %err, "failed to persist timer state");
        }
    }
}

fn status_of(task: Option<&Task>) -> TimerStatus {
    task.map(|task| current_status(&task.sessions))
        .unwrap_or(TimerStatus::Stopped)
}

/// Latest recorded start among the task and its sessions.
fn latest_start(task: &Task) -> Option<DateTime<Utc>> {
    std::iter::once(&task.overall_start_time)
        .chain(task.sessions.iter().map(|session| &session.start_time))
        .filter_map(|raw| parse_timestamp(raw))
        .max()
}

fn invalid(action: &'static str, status: TimerStatus) -> TimerError {
    TimerError::InvalidTransition {
        action,
        status: status.label(),
    }
}

fn transition(
    state: &mut TimerState,
    action: &'static str,
    from: TimerStatus,
    next: SessionStatus,
    now: DateTime<Utc>,
) -> Result<(), TimerError> {
    let status = status_of(state.persisted.current_task.as_ref());
    if status != from {
        return Err(invalid(action, status));
    }

    if let Some(task) = state.persisted.current_task.as_mut() {
        append_session(&mut task.sessions, next, now);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::config::Settings;
    use crate::domain::{Session, SessionStatus, Task, TimerStatus, format_timestamp};
    use crate::storage::{
        CURRENT_TASK_KEY, KeyValueStore, MemoryStore, PersistedState, StorageError, load_state,
        save_state,
    };

    use super::{SingleFlight, TimerError, TimerMachine};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn fresh() -> TimerMachine<MemoryStore> {
        TimerMachine::restore(MemoryStore::default(), Settings::default(), at(0))
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn save(&mut self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::other("read-only"),
            })
        }

        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            self.save(key, "")
        }
    }

    /// Memory store whose writes to one key always fail.
    struct BrokenKeyStore {
        inner: MemoryStore,
        broken: &'static str,
    }

    impl KeyValueStore for BrokenKeyStore {
        fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.load(key)
        }

        fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.broken {
                return Err(StorageError::Io {
                    key: key.to_string(),
                    source: std::io::Error::other("permission denied"),
                });
            }
            self.inner.save(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            if key == self.broken {
                return self.save(key, "");
            }
            self.inner.remove(key)
        }
    }

    #[test]
    fn status_follows_legal_transitions() {
        let mut timer = fresh();
        assert_eq!(timer.status(), TimerStatus::Stopped);
        assert_eq!(timer.tick_interval(), None);

        timer.start(at(0)).expect("start");
        assert_eq!(timer.status(), TimerStatus::Running);
        assert!(timer.tick_interval().is_some());

        timer.pause(at(10)).expect("pause");
        assert_eq!(timer.status(), TimerStatus::Paused);
        assert_eq!(timer.tick_interval(), None);

        timer.resume(at(15)).expect("resume");
        assert_eq!(timer.status(), TimerStatus::Running);

        timer.stop(at(30)).expect("stop");
        assert_eq!(timer.status(), TimerStatus::Stopped);
        assert!(timer.current_task().is_none());
        assert_eq!(timer.completed_tasks().len(), 1);
    }

    #[test]
    fn illegal_transitions_leave_state_alone() {
        let mut timer = fresh();
        assert_eq!(
            timer.pause(at(0)),
            Err(TimerError::InvalidTransition {
                action: "pause",
                status: "stopped",
            })
        );

        timer.start(at(0)).expect("start");
        let before = timer.current_task().cloned();
        assert!(matches!(timer.start(at(1)), Err(TimerError::InvalidTransition { .. })));
        assert!(matches!(timer.resume(at(1)), Err(TimerError::InvalidTransition { .. })));
        assert_eq!(timer.current_task().cloned(), before);
    }

    #[test]
    fn failures_are_visible_for_a_few_seconds() {
        let mut timer = fresh();
        let _ = timer.resume(at(0));
        assert_eq!(timer.active_error(at(0)), Some("cannot resume while stopped"));
        assert!(timer.active_error(at(0) + Duration::seconds(4)).is_some());
        assert_eq!(timer.active_error(at(0) + Duration::seconds(5)), None);

        timer.start(at(0)).expect("start");
        assert_eq!(timer.active_error(at(0)), None);

        let _ = timer.start(at(0));
        timer.clear_error();
        assert_eq!(timer.active_error(at(0)), None);
    }

    #[test]
    fn stop_computes_totals_from_sessions() {
        let mut timer = fresh();
        timer.start(at(0)).expect("start");
        timer.update_task_name("  Write report ", at(1)).expect("rename");
        timer.pause(at(20)).expect("pause");
        timer.resume(at(25)).expect("resume");

        assert_eq!(timer.total_work_time(), Duration::minutes(20));
        assert_eq!(timer.current_session_elapsed(at(30)), Duration::minutes(5));
        assert_eq!(timer.total_pause_time(), Duration::minutes(5));

        let completed = timer.stop(at(40)).expect("stop").expect("appended");
        assert_eq!(completed.task_name.as_deref(), Some("Write report"));
        assert_eq!(completed.total_work_time, 35 * 60);
        assert_eq!(completed.total_pause_time, 5 * 60);
        assert_eq!(completed.original_duration, completed.total_work_time);
        assert_eq!(completed.overall_end_time, format_timestamp(at(40)));
        assert!(completed.sessions.iter().all(|session| !session.is_open()));

        let span = (at(40) - at(0)).num_seconds();
        assert_eq!(completed.total_work_time + completed.total_pause_time, span);
    }

    #[test]
    fn totals_never_exceed_the_task_span() {
        let cases: &[&[(char, i64)]] = &[
            &[('p', 10), ('r', 12), ('p', 20), ('r', 31), ('x', 45)],
            &[('p', 5), ('x', 9)],
            &[('p', 1), ('r', 2), ('p', 3), ('r', 4), ('p', 5), ('x', 60)],
            &[('x', 0)],
        ];

        for steps in cases {
            let mut timer = fresh();
            timer.start(at(0)).expect("start");

            for &(step, minute) in *steps {
                let now = at(minute);
                let open = timer.current_session_elapsed(now);
                let live = timer.total_work_time() + timer.total_pause_time() + open;
                assert!(live <= now - at(0), "live totals overrun at minute {minute}");

                match step {
                    'p' => timer.pause(now).expect("pause"),
                    'r' => timer.resume(now).expect("resume"),
                    _ => {
                        let completed = timer.stop(now).expect("stop").expect("appended");
                        let span = (now - at(0)).num_seconds();
                        assert!(completed.total_work_time + completed.total_pause_time <= span);
                        assert_eq!(completed.total_work_time + completed.total_pause_time, span);
                    }
                }
            }
        }
    }

    #[test]
    fn stop_never_ends_before_the_task_began() {
        let mut timer = fresh();
        timer.start(at(10)).expect("start");

        let completed = timer.stop(at(5)).expect("stop").expect("appended");
        assert_eq!(completed.overall_start_time, format_timestamp(at(10)));
        assert_eq!(completed.overall_end_time, format_timestamp(at(10)));
        assert_eq!(completed.total_work_time, 0);
        assert_eq!(completed.total_pause_time, 0);
        assert!(completed.sessions.iter().all(|session| !session.is_open()));
    }

    #[test]
    fn blank_name_is_archived_as_none() {
        let mut timer = fresh();
        timer.start(at(0)).expect("start");
        let completed = timer.stop(at(1)).expect("stop").expect("appended");
        assert_eq!(completed.task_name, None);
    }

    #[test]
    fn second_stop_does_not_archive_again() {
        let mut timer = fresh();
        timer.start(at(0)).expect("start");
        timer.stop(at(5)).expect("stop");
        assert!(timer.stop(at(5)).is_err());
        assert_eq!(timer.completed_tasks().len(), 1);
    }

    #[test]
    fn identical_span_is_not_appended_twice() {
        // Two tasks started and stopped on the same instant collide.
        let mut timer = fresh();
        timer.start(at(0)).expect("start");
        assert!(timer.stop(at(0)).expect("stop").is_some());
        timer.start(at(0)).expect("start");
        assert!(timer.stop(at(0)).expect("stop").is_none());

        assert_eq!(timer.completed_tasks().len(), 1);
        assert!(timer.current_task().is_none());
    }

    #[test]
    fn rename_without_task_is_a_no_op() {
        let mut timer = fresh();
        timer.update_task_name("ghost", at(0)).expect("rename");
        assert!(timer.current_task().is_none());
    }

    #[test]
    fn every_change_is_persisted() {
        let mut timer = fresh();
        timer.start(at(0)).expect("start");
        let stored = load_state(timer.store());
        assert_eq!(stored.current_task.as_ref(), timer.current_task());

        timer.stop(at(3)).expect("stop");
        let stored = load_state(timer.store());
        assert!(stored.current_task.is_none());
        assert_eq!(stored.completed_tasks, timer.completed_tasks());
        assert_eq!(timer.store().load(CURRENT_TASK_KEY).expect("load"), None);
    }

    #[test]
    fn write_failures_keep_memory_state() {
        let mut timer = TimerMachine::restore(ReadOnlyStore, Settings::default(), at(0));
        timer.start(at(0)).expect("start should succeed despite storage");
        assert_eq!(timer.status(), TimerStatus::Running);
        assert_eq!(timer.active_error(at(0)), None);
    }

    #[test]
    fn stop_keeps_archive_when_active_key_cannot_be_written() {
        let store = BrokenKeyStore {
            inner: MemoryStore::default(),
            broken: CURRENT_TASK_KEY,
        };
        let mut timer = TimerMachine::restore(store, Settings::default(), at(0));
        timer.start(at(0)).expect("start");
        timer.stop(at(5)).expect("stop");

        let stored = load_state(timer.store());
        assert_eq!(timer.completed_tasks().len(), 1);
        assert_eq!(stored.completed_tasks, timer.completed_tasks());
    }

    #[test]
    fn restore_at_exact_threshold_keeps_running() {
        let mut store = MemoryStore::default();
        let state = PersistedState {
            current_task: Some(Task::begin(at(0))),
            completed_tasks: Vec::new(),
        };
        save_state(&mut store, &state).expect("seed");

        let timer = TimerMachine::restore(store.clone(), Settings::default(), at(30));
        assert_eq!(timer.status(), TimerStatus::Running);
        assert_eq!(timer.current_task().map(|task| task.sessions.len()), Some(1));

        let timer = TimerMachine::restore(store, Settings::default(), at(30) + Duration::seconds(1));
        assert_eq!(timer.status(), TimerStatus::Paused);
    }

    #[test]
    fn restore_pauses_abandoned_running_task() {
        let mut store = MemoryStore::default();
        let state = PersistedState {
            current_task: Some(Task::begin(at(0))),
            completed_tasks: Vec::new(),
        };
        save_state(&mut store, &state).expect("seed");

        let timer = TimerMachine::restore(store, Settings::default(), at(45));
        let task = timer.current_task().expect("restored task");
        assert_eq!(timer.status(), TimerStatus::Paused);
        assert_eq!(task.sessions.len(), 2);
        assert_eq!(task.sessions[0].end_time, Some(format_timestamp(at(45))));
        assert_eq!(task.sessions[1].start_time, format_timestamp(at(45)));
        assert_eq!(timer.total_work_time(), Duration::minutes(45));

        let stored = load_state(timer.store());
        assert_eq!(stored.current_task.as_ref(), Some(task));
    }

    #[test]
    fn restore_keeps_recent_running_task() {
        let mut store = MemoryStore::default();
        let state = PersistedState {
            current_task: Some(Task::begin(at(0))),
            completed_tasks: Vec::new(),
        };
        save_state(&mut store, &state).expect("seed");

        let timer = TimerMachine::restore(store, Settings::default(), at(10));
        assert_eq!(timer.status(), TimerStatus::Running);
        assert_eq!(timer.current_session_elapsed(at(10)), Duration::minutes(10));
    }

    #[test]
    fn edit_applies_validated_span() {
        let mut timer = fresh();
        timer.start(at(0)).expect("start");
        timer.stop(at(60)).expect("stop");

        let seconds = timer
            .edit_completed(0, " Review ", at(0), at(80), at(61))
            .expect("20 minutes of drift is within half of an hour");
        assert_eq!(seconds, 80 * 60);

        let record = &timer.completed_tasks()[0];
        assert_eq!(record.task_name.as_deref(), Some("Review"));
        assert_eq!(record.overall_end_time, format_timestamp(at(80)));
        assert_eq!(record.total_work_time, 80 * 60);
        assert_eq!(record.original_duration, 60 * 60);
        assert_eq!(record.sessions.len(), 1);
    }

    #[test]
    fn rejected_edit_changes_nothing() {
        let mut timer = fresh();
        timer.start(at(0)).expect("start");
        timer.stop(at(10)).expect("stop");
        let before = timer.completed_tasks().to_vec();

        let err = timer
            .edit_completed(0, "Too long", at(0), at(120), at(11))
            .expect_err("drift too large");
        assert_eq!(err, TimerError::Rejected("Duration change too large (110min).".to_string()));
        assert_eq!(timer.completed_tasks(), before.as_slice());
        assert!(timer.active_error(at(11)).is_some());

        let err = timer
            .edit_completed(0, "Backwards", at(10), at(0), at(11))
            .expect_err("end before start");
        assert_eq!(err, TimerError::Rejected("End time must be after start time".to_string()));
        assert_eq!(timer.edit_completed(4, "x", at(0), at(1), at(11)), Err(TimerError::UnknownRecord(5)));
    }

    #[test]
    fn delete_and_inspect_completed_records() {
        let mut timer = fresh();
        timer.start(at(0)).expect("start");
        timer.pause(at(1)).expect("pause");
        timer.stop(at(2)).expect("stop");
        timer.start(at(3)).expect("start");
        timer.stop(at(4)).expect("stop");

        let sessions: &[Session] = timer.completed_sessions(0).expect("sessions");
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].status, SessionStatus::Paused);

        let removed = timer.delete_completed(0, at(5)).expect("delete");
        assert_eq!(removed.overall_start_time, format_timestamp(at(0)));
        assert_eq!(timer.completed_tasks().len(), 1);
        assert!(matches!(timer.delete_completed(3, at(5)), Err(TimerError::UnknownRecord(4))));
        assert!(timer.completed_sessions(3).is_err());
    }

    #[test]
    fn single_flight_admits_one_holder() {
        let guard = SingleFlight::default();
        let permit = guard.try_acquire().expect("first acquire");
        assert!(guard.try_acquire().is_none());
        drop(permit);
        assert!(guard.try_acquire().is_some());
    }
}
