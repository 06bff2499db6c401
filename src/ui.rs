use std::error::Error;
use std::io;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::domain::{
	format_date_time, format_date_time_for_input, format_duration, format_time_hms, parse_input_date_time,
	parse_timestamp, CompletedTask, Session, SessionStatus, TimerStatus,
};
use crate::storage::KeyValueStore;
use crate::timer::{TimerError, TimerMachine};

const IDLE_POLL: StdDuration = StdDuration::from_secs(30);
const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);

pub fn run_dashboard<S: KeyValueStore>(timer: &mut TimerMachine<S>) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, timer);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop<S: KeyValueStore>(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	timer: &mut TimerMachine<S>,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();

	loop {
		let now = Utc::now();
		let view = build_view(timer, now);
		app.clamp_selection(&view);
		terminal.draw(|frame| draw_dashboard(frame, &app, &view))?;

		if event::poll(next_redraw(timer, now))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, timer),
					InputMode::ConfirmDelete { .. } => handle_confirm_key(&mut app, key.code, timer),
					InputMode::Sessions { .. } => {
						app.mode = InputMode::Normal;
						false
					}
					InputMode::Normal => handle_normal_key(&mut app, key.code, timer, &view),
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

/// How long to wait for input before redrawing: the tick while running,
/// otherwise until the visible error expires or a long idle timeout.
fn next_redraw<S: KeyValueStore>(timer: &TimerMachine<S>, now: DateTime<Utc>) -> StdDuration {
	if let Some(tick) = timer.tick_interval() {
		return tick;
	}

	timer
		.error_deadline()
		.filter(|deadline| *deadline > now)
		.and_then(|deadline| (deadline - now).to_std().ok())
		.map(|remaining| remaining.min(IDLE_POLL))
		.unwrap_or(IDLE_POLL)
}

fn draw_dashboard(frame: &mut Frame, app: &App, view: &ViewModel) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Length(5),
			Constraint::Length(6),
			Constraint::Min(6),
			Constraint::Length(5),
		])
		.split(frame.area());

	render_timer_panel(frame, layout[0], view);
	render_current_task_panel(frame, layout[1], view);
	render_completed_panel(frame, layout[2], app, view);
	render_footer(frame, layout[3], app, view);

	match &app.mode {
		InputMode::Sessions { index } => render_sessions_popup(frame, view, *index),
		InputMode::ConfirmDelete { index } => render_confirm_popup(frame, view, *index),
		InputMode::Normal | InputMode::Prompt(_) => {}
	}
}

fn render_timer_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let status_style = match view.status {
		TimerStatus::Running => Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD),
		TimerStatus::Paused => Style::default().fg(Color::LightYellow).add_modifier(Modifier::BOLD),
		TimerStatus::Stopped => Style::default().fg(Color::DarkGray),
	};

	let lines = vec![
		Line::from(vec![
			Span::raw("Status: "),
			Span::styled(view.status.label().to_uppercase(), status_style),
		]),
		Line::from(format!("Session: {}", format_time_hms(view.session_ms))),
		Line::from(format!("Total:   {}", format_time_hms(view.work_ms))),
	];

	let panel = Paragraph::new(lines).block(
		Block::default()
			.borders(Borders::ALL)
			.title("Timer")
			.border_style(border_style(view.status == TimerStatus::Running)),
	);
	frame.render_widget(panel, area);
}

fn render_current_task_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let lines = match &view.current {
		Some(current) => vec![
			Line::from(format!("Task:    {}", current.name)),
			Line::from(format!("Started: {}", current.started_at)),
			Line::from(format!("Work:    {}", format_time_hms(view.work_ms))),
			Line::from(format!("Pause:   {}", format_time_hms(view.pause_ms))),
		],
		None => vec![Line::from("(no active task, press s to start)")],
	};

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Current Task"));
	frame.render_widget(panel, area);
}

fn render_completed_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let mut items = view
		.rows
		.iter()
		.enumerate()
		.map(|(index, row)| ListItem::new(completed_row_line(index, row)))
		.collect::<Vec<_>>();

	if items.is_empty() {
		items.push(ListItem::new("(no completed tasks)"));
	}

	let mut state = ListState::default();
	if !view.rows.is_empty() {
		state.select(Some(app.selected.min(view.rows.len() - 1)));
	}

	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("Completed Tasks ({})", view.rows.len()))
				.border_style(border_style(matches!(app.mode, InputMode::Normal))),
		)
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn completed_row_line(index: usize, row: &CompletedRow) -> Line<'static> {
	Line::from(vec![
		Span::styled(format!("{:>3}. ", index + 1), Style::default().fg(Color::DarkGray)),
		Span::styled(row.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
		Span::raw(format!(" | {} -> {}", row.start, row.end)),
		Span::raw(format!(" | work {}", format_duration(row.work_seconds))),
		Span::styled(
			format!(" | pause {}", format_duration(row.pause_seconds)),
			Style::default().fg(Color::DarkGray),
		),
	])
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let mut footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from("s start | p pause | r resume | x stop | n name task | q quit"),
			Line::from("j/k select | e edit | d delete | Enter sessions | c dismiss error"),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
		InputMode::ConfirmDelete { .. } => vec![Line::from("y delete | any other key cancel")],
		InputMode::Sessions { .. } => vec![Line::from("any key closes")],
	};

	if let Some(error) = &view.error {
		footer_lines.push(Line::styled(error.clone(), Style::default().fg(Color::LightRed)));
	}

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_sessions_popup(frame: &mut Frame, view: &ViewModel, index: usize) {
	let Some(row) = view.rows.get(index) else {
		return;
	};

	let area = centered_rect(70, 60, frame.area());
	frame.render_widget(Clear, area);

	let mut items = session_lines(&row.sessions, view.now)
		.into_iter()
		.map(ListItem::new)
		.collect::<Vec<_>>();
	if items.is_empty() {
		items.push(ListItem::new("(no sessions recorded)"));
	}

	let list = List::new(items).block(
		Block::default()
			.borders(Borders::ALL)
			.title(format!("Sessions: {}", row.name))
			.border_style(border_style(true)),
	);
	frame.render_widget(list, area);
}

fn render_confirm_popup(frame: &mut Frame, view: &ViewModel, index: usize) {
	let Some(row) = view.rows.get(index) else {
		return;
	};

	let area = centered_rect(50, 20, frame.area());
	frame.render_widget(Clear, area);
	let popup = Paragraph::new(vec![
		Line::from(format!("Delete \"{}\"?", row.name)),
		Line::from(format!("{} -> {}", row.start, row.end)),
	])
	.block(
		Block::default()
			.borders(Borders::ALL)
			.title("Delete task")
			.border_style(border_style(true)),
	);
	frame.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn handle_normal_key<S: KeyValueStore>(
	app: &mut App,
	code: KeyCode,
	timer: &mut TimerMachine<S>,
	view: &ViewModel,
) -> bool {
	let now = Utc::now();
	match code {
		KeyCode::Char('q') | KeyCode::Esc => true,
		KeyCode::Char('s') => {
			app.report(timer.start(now).map(|()| "started".to_string()));
			false
		}
		KeyCode::Char('p') => {
			app.report(timer.pause(now).map(|()| "paused".to_string()));
			false
		}
		KeyCode::Char('r') => {
			app.report(timer.resume(now).map(|()| "resumed".to_string()));
			false
		}
		KeyCode::Char('x') => {
			let result = timer.stop(now).map(|completed| match completed {
				Some(task) => format!(
					"stopped: {} ({} worked)",
					task.display_name(),
					format_duration(task.total_work_time)
				),
				None => "stopped (repeated completion ignored)".to_string(),
			});
			app.report(result);
			false
		}
		KeyCode::Char('n') => {
			match &view.current {
				Some(current) => {
					app.mode = InputMode::Prompt(PromptState::prefilled(
						"Task name",
						current.raw_name.clone(),
						PromptKind::TaskName,
					));
				}
				None => app.status = "Start a task before naming it".to_string(),
			}
			false
		}
		KeyCode::Char('c') => {
			timer.clear_error();
			false
		}
		KeyCode::Up | KeyCode::Char('k') => {
			app.move_selection(-1, view);
			false
		}
		KeyCode::Down | KeyCode::Char('j') => {
			app.move_selection(1, view);
			false
		}
		KeyCode::Char('e') => {
			match view.rows.get(app.selected) {
				Some(row) => {
					app.mode = InputMode::Prompt(PromptState::prefilled(
						"Task name",
						row.raw_name.clone(),
						PromptKind::EditName { index: app.selected },
					));
				}
				None => app.status = "No completed task selected".to_string(),
			}
			false
		}
		KeyCode::Char('d') => {
			if view.rows.get(app.selected).is_some() {
				app.mode = InputMode::ConfirmDelete { index: app.selected };
			} else {
				app.status = "No completed task selected".to_string();
			}
			false
		}
		KeyCode::Enter => {
			if view.rows.get(app.selected).is_some() {
				app.mode = InputMode::Sessions { index: app.selected };
			}
			false
		}
		_ => false,
	}
}

fn handle_prompt_key<S: KeyValueStore>(app: &mut App, code: KeyCode, timer: &mut TimerMachine<S>) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Edit cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				other => {
					app.mode = other;
					return false;
				}
			};

			match submit_prompt(prompt.clone(), timer) {
				Ok(PromptOutcome::NextPrompt(next_prompt)) => app.mode = InputMode::Prompt(next_prompt),
				Ok(PromptOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_confirm_key<S: KeyValueStore>(app: &mut App, code: KeyCode, timer: &mut TimerMachine<S>) -> bool {
	let InputMode::ConfirmDelete { index } = std::mem::replace(&mut app.mode, InputMode::Normal) else {
		return false;
	};

	if code == KeyCode::Char('y') {
		let result = timer
			.delete_completed(index, Utc::now())
			.map(|task| format!("deleted: {}", task.display_name()));
		app.report(result);
	} else {
		app.status = "Delete cancelled".to_string();
	}
	false
}

fn submit_prompt<S: KeyValueStore>(prompt: PromptState, timer: &mut TimerMachine<S>) -> Result<PromptOutcome, String> {
	let now = Utc::now();
	match prompt.kind {
		PromptKind::TaskName => {
			timer
				.update_task_name(&prompt.input, now)
				.map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done("task renamed".to_string()))
		}
		PromptKind::EditName { index } => {
			let record = completed_record(timer, index)?;
			Ok(PromptOutcome::NextPrompt(PromptState::prefilled(
				"Start (YYYY-MM-DDTHH:MM[:SS])",
				format_date_time_for_input(&record.overall_start_time),
				PromptKind::EditStart {
					index,
					name: prompt.input,
				},
			)))
		}
		PromptKind::EditStart { index, name } => {
			let start = parse_input_date_time(&prompt.input)?;
			let record = completed_record(timer, index)?;
			Ok(PromptOutcome::NextPrompt(PromptState::prefilled(
				"End (YYYY-MM-DDTHH:MM[:SS])",
				format_date_time_for_input(&record.overall_end_time),
				PromptKind::EditEnd { index, name, start },
			)))
		}
		PromptKind::EditEnd { index, name, start } => {
			let end = parse_input_date_time(&prompt.input)?;
			let seconds = timer
				.edit_completed(index, &name, start, end, now)
				.map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(format!(
				"updated #{}: work {}",
				index + 1,
				format_duration(seconds)
			)))
		}
	}
}

fn completed_record<S: KeyValueStore>(timer: &TimerMachine<S>, index: usize) -> Result<CompletedTask, String> {
	timer
		.completed_task(index)
		.cloned()
		.map_err(|err| err.to_string())
}

fn build_view<S: KeyValueStore>(timer: &TimerMachine<S>, now: DateTime<Utc>) -> ViewModel {
	let session = timer.current_session_elapsed(now);
	let current = timer.current_task().map(|task| CurrentTaskView {
		name: task.display_name(),
		raw_name: task.task_name.clone().unwrap_or_default(),
		started_at: format_date_time(&task.overall_start_time),
	});

	ViewModel {
		now,
		status: timer.status(),
		current,
		session_ms: session.num_milliseconds(),
		work_ms: (timer.total_work_time() + session).num_milliseconds(),
		pause_ms: timer.total_pause_time().num_milliseconds(),
		rows: timer
			.completed_tasks()
			.iter()
			.map(|task| CompletedRow {
				name: task.display_name(),
				raw_name: task.task_name.clone().unwrap_or_default(),
				start: format_date_time(&task.overall_start_time),
				end: format_date_time(&task.overall_end_time),
				work_seconds: task.total_work_time,
				pause_seconds: task.total_pause_time,
				sessions: task.sessions.clone(),
			})
			.collect(),
		error: timer.active_error(now).map(str::to_string),
	}
}

/// One line per session: status, bounds and length. An open session runs
/// until `now`.
pub fn session_lines(sessions: &[Session], now: DateTime<Utc>) -> Vec<String> {
	sessions
		.iter()
		.enumerate()
		.map(|(index, session)| {
			let label = match session.status {
				SessionStatus::Running => "running",
				SessionStatus::Paused => "paused ",
			};
			let end = session
				.end_time
				.as_deref()
				.map(format_date_time)
				.unwrap_or_else(|| "now".to_string());
			let length = match (&session.end_time, parse_timestamp(&session.start_time)) {
				(Some(_), _) => session.elapsed(),
				(None, Some(start)) => Some(now - start),
				(None, None) => None,
			};
			let length = length
				.map(|duration| format_duration(duration.num_seconds()))
				.unwrap_or_else(|| "?".to_string());
			format!(
				"{:>3}. {label} {} -> {end} ({length})",
				index + 1,
				format_date_time(&session.start_time)
			)
		})
		.collect()
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default().fg(FOCUSED_PANEL_BORDER_COLOR)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

#[derive(Debug, Clone)]
enum PromptOutcome {
	NextPrompt(PromptState),
	Done(String),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn prefilled(title: impl Into<String>, input: String, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input,
			kind,
		}
	}
}

#[derive(Debug, Clone)]
enum PromptKind {
	TaskName,
	EditName {
		index: usize,
	},
	EditStart {
		index: usize,
		name: String,
	},
	EditEnd {
		index: usize,
		name: String,
		start: DateTime<Utc>,
	},
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
	ConfirmDelete { index: usize },
	Sessions { index: usize },
}

struct App {
	selected: usize,
	mode: InputMode,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			selected: 0,
			mode: InputMode::Normal,
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn clamp_selection(&mut self, view: &ViewModel) {
		if view.rows.is_empty() {
			self.selected = 0;
		} else {
			self.selected = self.selected.min(view.rows.len() - 1);
		}
	}

	fn move_selection(&mut self, delta: i32, view: &ViewModel) {
		if view.rows.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(view.rows.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	/// Success messages go to the status line; failures are already shown
	/// through the timer's error line.
	fn report(&mut self, result: Result<String, TimerError>) {
		match result {
			Ok(message) => self.status = message,
			Err(TimerError::Busy) => {}
			Err(_) => self.status = String::new(),
		}
	}
}

struct ViewModel {
	now: DateTime<Utc>,
	status: TimerStatus,
	current: Option<CurrentTaskView>,
	session_ms: i64,
	work_ms: i64,
	pause_ms: i64,
	rows: Vec<CompletedRow>,
	error: Option<String>,
}

struct CurrentTaskView {
	name: String,
	raw_name: String,
	started_at: String,
}

struct CompletedRow {
	name: String,
	raw_name: String,
	start: String,
	end: String,
	work_seconds: i64,
	pause_seconds: i64,
	sessions: Vec<Session>,
}
