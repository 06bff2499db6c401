mod config;
mod domain;
mod paths;
mod sessions;
mod storage;
mod timer;
mod ui;
mod validate;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::load_settings;
use crate::domain::{
	format_date_time, format_duration, format_time_hms, parse_input_date_time, parse_timestamp,
	TimerStatus,
};
use crate::paths::{resolve_config_path, resolve_state_dir, LOG_FILE};
use crate::storage::{FileStore, KeyValueStore};
use crate::timer::TimerMachine;
use crate::ui::{run_dashboard, session_lines};

#[derive(Debug, Parser)]
#[command(name = "timekeep", about = "Terminal stopwatch for one task at a time")]
struct Cli {
	#[arg(long)]
	state_dir: Option<PathBuf>,
	#[arg(long)]
	config: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Dashboard,
	Start,
	Pause,
	Resume,
	Stop,
	/// Rename the active task.
	Name {
		name: String,
	},
	Status,
	/// List completed tasks, numbered from 1.
	List,
	Sessions {
		number: usize,
	},
	Edit {
		number: usize,
		#[arg(long)]
		name: Option<String>,
		/// Local time, YYYY-MM-DDTHH:MM[:SS].
		#[arg(long)]
		start: Option<String>,
		#[arg(long)]
		end: Option<String>,
	},
	Delete {
		number: usize,
	},
	/// Print the effective settings.
	Config,
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let state_dir = resolve_state_dir(cli.state_dir);
	init_logging(&state_dir);

	let config_path = resolve_config_path(cli.config, &state_dir);
	let settings = load_settings(&config_path)?;
	let store = FileStore::new(&state_dir);
	let mut timer = TimerMachine::restore(store, settings, Utc::now());

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Dashboard => {
			run_dashboard(&mut timer)?;
		}
		Command::Start => {
			timer.start(Utc::now())?;
			println!("started");
		}
		Command::Pause => {
			timer.pause(Utc::now())?;
			println!("paused after {}", format_time_hms(timer.total_work_time().num_milliseconds()));
		}
		Command::Resume => {
			timer.resume(Utc::now())?;
			println!("resumed");
		}
		Command::Stop => match timer.stop(Utc::now())? {
			Some(task) => println!(
				"stopped {} | work {} | pause {}",
				task.display_name(),
				format_duration(task.total_work_time),
				format_duration(task.total_pause_time)
			),
			None => println!("stopped (repeated completion ignored)"),
		},
		Command::Name { name } => {
			if timer.current_task().is_none() {
				println!("no active task");
			} else {
				timer.update_task_name(&name, Utc::now())?;
				println!("renamed active task");
			}
		}
		Command::Status => {
			print_status(&timer);
		}
		Command::List => {
			print_completed(&timer);
		}
		Command::Sessions { number } => {
			let sessions = timer.completed_sessions(record_index(number)?)?;
			for line in session_lines(sessions, Utc::now()) {
				println!("{line}");
			}
		}
		Command::Edit {
			number,
			name,
			start,
			end,
		} => {
			let index = record_index(number)?;
			let record = timer.completed_task(index)?.clone();
			let name = name.unwrap_or_else(|| record.task_name.clone().unwrap_or_default());
			let start = match start {
				Some(raw) => parse_input_date_time(&raw)?,
				None => parse_timestamp(&record.overall_start_time).ok_or("stored start time is unreadable")?,
			};
			let end = match end {
				Some(raw) => parse_input_date_time(&raw)?,
				None => parse_timestamp(&record.overall_end_time).ok_or("stored end time is unreadable")?,
			};

			let seconds = timer.edit_completed(index, &name, start, end, Utc::now())?;
			println!("updated #{number}: work {}", format_duration(seconds));
		}
		Command::Delete { number } => {
			let removed = timer.delete_completed(record_index(number)?, Utc::now())?;
			println!("deleted #{number}: {}", removed.display_name());
		}
		Command::Config => {
			println!("# state dir: {}", state_dir.display());
			println!("# config: {}", config_path.display());
			print!("{}", toml::to_string_pretty(timer.settings())?);
		}
	}

	Ok(())
}

fn init_logging(state_dir: &Path) {
	if let Err(err) = fs::create_dir_all(state_dir) {
		eprintln!("warning: failed to create state dir {}: {err}", state_dir.display());
		return;
	}

	let filter = EnvFilter::try_from_env("TIMEKEEP_LOG").unwrap_or_else(|_| EnvFilter::new("timekeep=info"));
	let appender = tracing_appender::rolling::never(state_dir, LOG_FILE);
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(appender)
		.with_ansi(false)
		.try_init();
}

fn record_index(number: usize) -> Result<usize, Box<dyn Error>> {
	number
		.checked_sub(1)
		.ok_or_else(|| "task numbers start at 1".into())
}

fn print_status<S: KeyValueStore>(timer: &TimerMachine<S>) {
	let now = Utc::now();
	let status = timer.status();
	println!("status: {}", status.label());

	let Some(task) = timer.current_task() else {
		return;
	};

	let session = timer.current_session_elapsed(now);
	println!("task: {}", task.display_name());
	println!("started: {}", format_date_time(&task.overall_start_time));
	if status == TimerStatus::Running {
		println!("session: {}", format_time_hms(session.num_milliseconds()));
	}
	println!("work: {}", format_time_hms((timer.total_work_time() + session).num_milliseconds()));
	println!("pause: {}", format_time_hms(timer.total_pause_time().num_milliseconds()));
}

fn print_completed<S: KeyValueStore>(timer: &TimerMachine<S>) {
	let tasks = timer.completed_tasks();
	if tasks.is_empty() {
		println!("no completed tasks");
		return;
	}

	for (index, task) in tasks.iter().enumerate() {
		println!(
			"{:>3}. {} | {} -> {} | work {} | pause {}",
			index + 1,
			task.display_name(),
			format_date_time(&task.overall_start_time),
			format_date_time(&task.overall_end_time),
			format_duration(task.total_work_time),
			format_duration(task.total_pause_time)
		);
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::{record_index, Cli, Command};

	#[test]
	fn record_numbers_are_one_based() {
		assert_eq!(record_index(1).expect("first record"), 0);
		assert!(record_index(0).is_err());
	}

	#[test]
	fn parses_edit_command() {
		let cli = Cli::try_parse_from([
			"timekeep",
			"--state-dir",
			"/tmp/timekeep",
			"edit",
			"2",
			"--start",
			"2026-01-01T09:00",
		])
		.expect("edit should parse");

		match cli.command {
			Some(Command::Edit { number, start, end, name }) => {
				assert_eq!(number, 2);
				assert_eq!(start.as_deref(), Some("2026-01-01T09:00"));
				assert_eq!(end, None);
				assert_eq!(name, None);
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn no_subcommand_means_dashboard() {
		let cli = Cli::try_parse_from(["timekeep"]).expect("bare invocation should parse");
		assert!(cli.command.is_none());
	}
}
