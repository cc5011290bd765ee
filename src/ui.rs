use std::error::Error;
use std::io;
use std::time::Duration as StdDuration;

use chrono::{Duration, Local, NaiveDate, Utc};
use crossterm::event::{
	self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEventKind,
	MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::domain::{
	format_hour, format_hour_label, format_time_ago, hour_for_row, CellAssignment, CellKey,
	GridData, TaskList, DAY_HOURS, DAYTIME_START_HOUR,
};
use crate::gesture::{FillGesture, Mark};
use crate::storage::{save_grid, save_tasks, KvStore};

const WINDOW_OFFSETS: [i64; 2] = [0, 14];
const WINDOW_DAYS: i64 = 14;
const GUTTER_WIDTH: u16 = 6;
const HEADER_ROWS: u16 = 2;
const MIN_CELL_WIDTH: u16 = 3;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const FILL_PREVIEW_COLOR: Color = Color::LightBlue;
const TASK_COLORS: [Color; 8] = [
	Color::LightBlue,
	Color::LightGreen,
	Color::LightYellow,
	Color::LightMagenta,
	Color::LightCyan,
	Color::LightRed,
	Color::Blue,
	Color::Green,
];

pub fn run_grid(
	grid: &mut GridData,
	tasks: &mut TaskList,
	store: &mut dyn KvStore,
) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	stdout.execute(EnableMouseCapture)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, grid, tasks, store);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	grid: &mut GridData,
	tasks: &mut TaskList,
	store: &mut dyn KvStore,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();

	loop {
		app.today = Local::now().date_naive();
		app.clamp_task_selection(tasks);
		terminal.draw(|frame| draw_grid_page(frame, &mut app, grid, tasks))?;

		if event::poll(StdDuration::from_millis(250))? {
			match event::read()? {
				CEvent::Key(key) => {
					if key.kind != KeyEventKind::Press {
						continue;
					}

					let should_quit = match &app.mode {
						InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, grid, tasks, store),
						InputMode::Select(_) => handle_select_key(&mut app, key.code, grid, tasks, store),
						InputMode::Normal => handle_normal_key(&mut app, key.code, tasks),
					};

					if should_quit {
						break;
					}
				}
				CEvent::Mouse(mouse) => handle_mouse(&mut app, mouse, grid, tasks, store),
				_ => {}
			}
		}
	}

	Ok(())
}

fn draw_grid_page(frame: &mut Frame, app: &mut App, grid: &GridData, tasks: &TaskList) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(12), Constraint::Length(5)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Length(28), Constraint::Min(40)])
		.split(layout[0]);

	render_task_panel(frame, body[0], app, tasks);
	render_grid_panel(frame, body[1], app, grid);
	render_footer(frame, layout[1], app);

	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select);
	}
}

fn render_task_panel(frame: &mut Frame, area: Rect, app: &mut App, tasks: &TaskList) {
	let title = match app.carried_task.and_then(|id| tasks.task(id)) {
		Some(task) => format!("Tasks | carrying {}", task.name),
		None => format!("Tasks ({})", tasks.len()),
	};
	let block = Block::default().borders(Borders::ALL).title(title);
	let inner = block.inner(area);
	frame.render_widget(block, area);
	app.panel_area = Some(inner);

	let now = Utc::now();
	let items = if tasks.is_empty() {
		vec![ListItem::new("(no tasks yet, press 'a')")]
	} else {
		tasks
			.tasks()
			.iter()
			.map(|task| {
				let carried = app.carried_task == Some(task.id);
				let marker = if carried { "* " } else { "  " };
				ListItem::new(Line::from(vec![
					Span::styled(marker.to_string(), Style::default().fg(Color::Yellow)),
					Span::styled(task.name.clone(), task_style(task.id)),
					Span::styled(
						format!("  {}", format_time_ago(task.created, now)),
						Style::default().fg(Color::DarkGray),
					),
				]))
			})
			.collect::<Vec<_>>()
	};

	if tasks.is_empty() {
		app.task_list_state.select(None);
	} else {
		app.task_list_state.select(Some(app.task_index.min(tasks.len() - 1)));
	}

	let list = List::new(items).highlight_style(
		Style::default()
			.bg(HIGHLIGHT_BACKGROUND_COLOR)
			.add_modifier(Modifier::BOLD),
	);
	// The state lives on App so the scroll offset the list settles on stays
	// available to panel_task_at between frames.
	frame.render_stateful_widget(list, inner, &mut app.task_list_state);
}

fn render_grid_panel(frame: &mut Frame, area: Rect, app: &mut App, grid: &GridData) {
	let offset = WINDOW_OFFSETS[app.window];
	let title = format!(
		"Weeks {}-{} of 4 | {} cells filled",
		app.window * 2 + 1,
		app.window * 2 + 2,
		grid.len()
	);
	let block = Block::default().borders(Borders::ALL).title(title);
	let inner = block.inner(area);
	frame.render_widget(block, area);

	let geometry = GridGeometry::new(inner, app.today, offset);
	let lines = build_grid_lines(&geometry, app, grid);
	frame.render_widget(Paragraph::new(lines), inner);
	app.geometry = Some(geometry);
}

fn build_grid_lines(geometry: &GridGeometry, app: &App, grid: &GridData) -> Vec<Line<'static>> {
	let cell_width = geometry.cell_width;
	let mut lines = Vec::new();

	let mut name_spans = vec![Span::raw(pad("", GUTTER_WIDTH))];
	let mut number_spans = vec![Span::raw(pad("", GUTTER_WIDTH))];
	for day_index in 0..geometry.num_days {
		let day_offset = geometry.start_offset + day_index;
		let date = geometry.today + Duration::days(day_offset);
		let week = day_offset / 7 + 1;
		let day_in_week = day_offset % 7 + 1;
		let style = if day_offset == 0 {
			Style::default()
				.fg(Color::Black)
				.bg(Color::Yellow)
				.add_modifier(Modifier::BOLD)
		} else {
			Style::default().fg(Color::Gray)
		};
		name_spans.push(Span::styled(
			pad(&date.format("%a").to_string(), cell_width),
			style,
		));
		number_spans.push(Span::styled(
			pad(&format!("W{week}D{day_in_week}"), cell_width),
			style,
		));
	}
	lines.push(Line::from(name_spans));
	lines.push(Line::from(number_spans));

	for row in 0..DAY_HOURS {
		let hour = hour_for_row(row);
		let overtime = hour < DAYTIME_START_HOUR;
		let gutter_style = if overtime {
			Style::default().fg(Color::LightRed).add_modifier(Modifier::DIM)
		} else {
			Style::default().fg(Color::DarkGray)
		};

		let mut spans = vec![Span::styled(
			pad(&format_hour_label(hour), GUTTER_WIDTH),
			gutter_style,
		)];
		for day_index in 0..geometry.num_days {
			let date = geometry.today + Duration::days(geometry.start_offset + day_index);
			let key = CellKey::new(date, hour);
			let (text, style) = cell_presentation(&key, grid, app.gesture.as_ref(), overtime);
			spans.push(Span::styled(pad(&text, cell_width), style));
		}
		lines.push(Line::from(spans));
	}

	lines
}

fn cell_presentation(
	key: &CellKey,
	grid: &GridData,
	gesture: Option<&FillGesture>,
	overtime: bool,
) -> (String, Style) {
	if let Some(gesture) = gesture {
		match gesture.mark(key) {
			Some(Mark::Fill) => {
				return (
					gesture.task_name().to_string(),
					Style::default().fg(Color::Black).bg(FILL_PREVIEW_COLOR),
				);
			}
			Some(Mark::Clear) => {
				let name = grid
					.lookup(key)
					.map(|assignment| assignment.task_name.clone())
					.unwrap_or_default();
				return (
					name,
					Style::default()
						.fg(Color::DarkGray)
						.add_modifier(Modifier::CROSSED_OUT | Modifier::DIM),
				);
			}
			None => {}
		}

		if gesture.anchor() == key {
			let name = gesture.task_name().to_string();
			return (name, task_style(anchor_task_id(grid, key)).add_modifier(Modifier::REVERSED));
		}
	}

	match grid.lookup(key) {
		Some(assignment) => {
			let mut style = task_style(assignment.task_id);
			if !assignment.note.is_empty() {
				style = style.add_modifier(Modifier::UNDERLINED);
			}
			if overtime {
				style = style.add_modifier(Modifier::DIM);
			}
			(assignment.task_name.clone(), style)
		}
		None => (
			"·".to_string(),
			Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
		),
	}
}

fn anchor_task_id(grid: &GridData, key: &CellKey) -> i64 {
	grid.lookup(key).map(|assignment| assignment.task_id).unwrap_or_default()
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from("Tab flip weeks | j/k pick task | Enter carry task | a add | d delete | Esc drop | q quit"),
			Line::from("drag from a filled cell to fill or clear | click a filled cell for its note | click an empty cell to assign the carried task"),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines)
		.block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(52, 40, frame.area());
	frame.render_widget(Clear, area);

	let items = if select.options.is_empty() {
		vec![ListItem::new("(no choices)")]
	} else {
		select
			.options
			.iter()
			.map(|option| ListItem::new(option.label.clone()).style(option.style))
			.collect::<Vec<_>>()
	};

	let list = List::new(items)
		.block(Block::default().borders(Borders::ALL).title(select.title.clone()))
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len().saturating_sub(1))));
	}
	frame.render_stateful_widget(list, area, &mut state);
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

fn handle_mouse(
	app: &mut App,
	mouse: MouseEvent,
	grid: &mut GridData,
	tasks: &TaskList,
	store: &mut dyn KvStore,
) {
	// Modal surfaces swallow the pointer; a gesture can neither start nor
	// continue underneath a prompt or select popup.
	if !matches!(app.mode, InputMode::Normal) {
		return;
	}

	match mouse.kind {
		MouseEventKind::Down(MouseButton::Left) => {
			handle_mouse_down(app, mouse.column, mouse.row, grid, tasks, store);
		}
		MouseEventKind::Drag(MouseButton::Left) => {
			if let (Some(gesture), Some(geometry)) = (app.gesture.as_mut(), app.geometry.as_ref()) {
				if let Some(key) = geometry.cell_at(mouse.column, mouse.row) {
					gesture.enter(grid, key);
				}
			}
		}
		MouseEventKind::Up(MouseButton::Left) => handle_mouse_up(app, grid, store),
		_ => {}
	}
}

fn handle_mouse_down(
	app: &mut App,
	column: u16,
	row: u16,
	grid: &mut GridData,
	tasks: &TaskList,
	store: &mut dyn KvStore,
) {
	if let Some(index) = app.panel_task_at(column, row, tasks) {
		app.task_index = index;
		let task = &tasks.tasks()[index];
		app.carried_task = Some(task.id);
		app.status = format!("Carrying {}: click an empty cell to assign", task.name);
		return;
	}

	let Some(key) = app.geometry.as_ref().and_then(|geometry| geometry.cell_at(column, row)) else {
		return;
	};

	if grid.lookup(&key).is_some() {
		app.gesture = FillGesture::begin(grid, key);
		return;
	}

	match app.carried_task.and_then(|id| tasks.task(id)) {
		Some(task) => {
			// Single-cell drop: write-through, no gesture involved.
			grid.assign(key.clone(), CellAssignment::for_task(task));
			app.status = match persist_grid(store, grid) {
				Ok(()) => format!("assigned {} at {key}", task.name),
				Err(err) => format!("error: {err}"),
			};
		}
		None => {
			app.status = "Pick a task first to fill empty cells".to_string();
		}
	}
}

fn handle_mouse_up(app: &mut App, grid: &mut GridData, store: &mut dyn KvStore) {
	let Some(gesture) = app.gesture.take() else {
		return;
	};

	if gesture.is_click() {
		let key = gesture.anchor().clone();
		app.mode = InputMode::Select(build_cell_detail_select(&key, grid));
		return;
	}

	let visited = gesture.visited_count();
	if gesture.finish(grid) {
		app.status = match persist_grid(store, grid) {
			Ok(()) => format!("updated {} cells", visited - 1),
			Err(err) => format!("error: {err}"),
		};
	}
}

fn handle_normal_key(app: &mut App, code: KeyCode, tasks: &TaskList) -> bool {
	match code {
		KeyCode::Char('q') => true,
		KeyCode::Esc => {
			if app.carried_task.is_some() {
				app.carried_task = None;
				app.status = "Dropped carried task".to_string();
				false
			} else {
				true
			}
		}
		KeyCode::Tab | KeyCode::BackTab => {
			app.window = (app.window + 1) % WINDOW_OFFSETS.len();
			app.geometry = None;
			false
		}
		KeyCode::Up | KeyCode::Char('k') => {
			app.move_task_selection(-1, tasks);
			false
		}
		KeyCode::Down | KeyCode::Char('j') => {
			app.move_task_selection(1, tasks);
			false
		}
		KeyCode::Enter | KeyCode::Char(' ') => {
			match tasks.tasks().get(app.task_index) {
				Some(task) => {
					app.carried_task = Some(task.id);
					app.status = format!("Carrying {}: click an empty cell to assign", task.name);
				}
				None => {
					app.status = "No task selected".to_string();
				}
			}
			false
		}
		KeyCode::Char('a') => {
			app.mode = InputMode::Prompt(PromptState::new("Task name", PromptKind::AddTaskName));
			false
		}
		KeyCode::Char('d') => {
			match tasks.tasks().get(app.task_index) {
				Some(task) => {
					app.mode = InputMode::Select(build_delete_task_select(task.id, &task.name));
				}
				None => {
					app.status = "No task selected to delete".to_string();
				}
			}
			false
		}
		_ => false,
	}
}

fn handle_prompt_key(
	app: &mut App,
	code: KeyCode,
	grid: &mut GridData,
	tasks: &mut TaskList,
	store: &mut dyn KvStore,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
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
				InputMode::Normal | InputMode::Select(_) => return false,
			};

			match submit_prompt(prompt.clone(), grid, tasks, store) {
				Ok(message) => {
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

fn handle_select_key(
	app: &mut App,
	code: KeyCode,
	grid: &mut GridData,
	tasks: &mut TaskList,
	store: &mut dyn KvStore,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Select(select) => select,
				_ => return false,
			};

			match submit_select(select.clone(), grid, tasks, store) {
				Ok(SelectOutcome::Prompt(prompt)) => app.mode = InputMode::Prompt(prompt),
				Ok(SelectOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}

			if app
				.carried_task
				.is_some_and(|id| tasks.task(id).is_none())
			{
				app.carried_task = None;
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt(
	prompt: PromptState,
	grid: &mut GridData,
	tasks: &mut TaskList,
	store: &mut dyn KvStore,
) -> Result<String, String> {
	match prompt.kind {
		PromptKind::AddTaskName => {
			let name = required_text(&prompt.input, "task name")?;
			tasks.add_task(name.clone(), Utc::now())?;
			persist_tasks(store, tasks)?;
			Ok(format!("created task: {name}"))
		}
		PromptKind::EditNote { key } => {
			let note = prompt.input.trim().to_string();
			if !grid.set_note(&key, note) {
				return Err(format!("no assignment at {key}"));
			}
			persist_grid(store, grid)?;
			Ok(format!("note saved at {key}"))
		}
	}
}

fn submit_select(
	select: SelectState,
	grid: &mut GridData,
	tasks: &mut TaskList,
	store: &mut dyn KvStore,
) -> Result<SelectOutcome, String> {
	let action = select
		.selected_option()
		.and_then(|option| option.value.clone())
		.ok_or_else(|| "no option selected".to_string())?;

	match select.kind {
		SelectKind::CellDetail { key } => match action.as_str() {
			"note" => {
				let existing = grid
					.lookup(&key)
					.map(|assignment| assignment.note.clone())
					.unwrap_or_default();
				Ok(SelectOutcome::Prompt(PromptState::with_input(
					format!("Note for {}", describe_cell(&key)),
					existing,
					PromptKind::EditNote { key },
				)))
			}
			"clear" => {
				grid.clear(&key).ok_or_else(|| format!("no assignment at {key}"))?;
				persist_grid(store, grid)?;
				Ok(SelectOutcome::Done(format!("cleared {key}")))
			}
			_ => Ok(SelectOutcome::Done("Cancelled".to_string())),
		},
		SelectKind::DeleteTaskConfirm { task_id } => {
			if action == "delete" {
				let task = tasks.delete_task(task_id)?;
				persist_tasks(store, tasks)?;
				Ok(SelectOutcome::Done(format!("deleted task: {}", task.name)))
			} else {
				Ok(SelectOutcome::Done("Delete cancelled".to_string()))
			}
		}
	}
}

fn build_cell_detail_select(key: &CellKey, grid: &GridData) -> SelectState {
	let task_name = grid
		.lookup(key)
		.map(|assignment| assignment.task_name.clone())
		.unwrap_or_else(|| "(empty)".to_string());
	let has_note = grid
		.lookup(key)
		.is_some_and(|assignment| !assignment.note.is_empty());

	let note_label = if has_note { "Edit note" } else { "Add note" };
	let options = vec![
		SelectOption::new(note_label, Some("note".to_string()), Style::default()),
		SelectOption::new(
			"Clear cell",
			Some("clear".to_string()),
			Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
		),
		SelectOption::new("Cancel", Some("cancel".to_string()), Style::default()),
	];

	SelectState::new(
		format!("{task_name} - {}", describe_cell(key)),
		SelectKind::CellDetail { key: key.clone() },
		options,
	)
}

fn build_delete_task_select(task_id: i64, task_name: &str) -> SelectState {
	let options = vec![
		SelectOption::new(
			"Delete",
			Some("delete".to_string()),
			Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
		),
		SelectOption::new("Cancel", Some("cancel".to_string()), Style::default()),
	];

	let mut select = SelectState::new(
		format!("Delete task? {task_name} (past cells keep their copies)"),
		SelectKind::DeleteTaskConfirm { task_id },
		options,
	);
	// Default to cancel to prevent accidental deletions.
	select.selected = 1;
	select
}

fn describe_cell(key: &CellKey) -> String {
	format!("{} {}", format_hour(key.hour()), key.date().format("%a %d %b"))
}

fn persist_grid(store: &mut dyn KvStore, grid: &GridData) -> Result<(), String> {
	save_grid(store, grid).map_err(|err| err.to_string())
}

fn persist_tasks(store: &mut dyn KvStore, tasks: &TaskList) -> Result<(), String> {
	save_tasks(store, tasks).map_err(|err| err.to_string())
}

fn required_text(input: &str, field_name: &str) -> Result<String, String> {
	let value = input.trim();
	if value.is_empty() {
		Err(format!("{field_name} is required"))
	} else {
		Ok(value.to_string())
	}
}

fn task_style(task_id: i64) -> Style {
	let index = task_id.rem_euclid(TASK_COLORS.len() as i64) as usize;
	Style::default().fg(TASK_COLORS[index])
}

fn pad(text: &str, width: u16) -> String {
	let width = width as usize;
	let truncated = text.chars().take(width).collect::<String>();
	format!("{truncated:<width$}")
}

/// Maps terminal coordinates to cell keys for the drawn window. Rebuilt on
/// every draw so resizes and week flips stay consistent with what is on
/// screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridGeometry {
	area: Rect,
	today: NaiveDate,
	start_offset: i64,
	num_days: i64,
	cell_width: u16,
}

impl GridGeometry {
	fn new(area: Rect, today: NaiveDate, start_offset: i64) -> Self {
		let usable = area.width.saturating_sub(GUTTER_WIDTH);
		let cell_width = (usable / WINDOW_DAYS as u16).max(MIN_CELL_WIDTH);
		Self {
			area,
			today,
			start_offset,
			num_days: WINDOW_DAYS,
			cell_width,
		}
	}

	fn cell_at(&self, column: u16, row: u16) -> Option<CellKey> {
		if column < self.area.x + GUTTER_WIDTH
			|| column >= self.area.right()
			|| row < self.area.y + HEADER_ROWS
			|| row >= self.area.bottom()
		{
			return None;
		}

		let day_index = ((column - self.area.x - GUTTER_WIDTH) / self.cell_width) as i64;
		let row_index = (row - self.area.y - HEADER_ROWS) as u32;
		if day_index >= self.num_days || row_index >= DAY_HOURS {
			return None;
		}

		let hour = hour_for_row(row_index);
		let date = self.today + Duration::days(self.start_offset + day_index);
		Some(CellKey::new(date, hour))
	}
}

struct App {
	today: NaiveDate,
	window: usize,
	task_index: usize,
	carried_task: Option<i64>,
	gesture: Option<FillGesture>,
	geometry: Option<GridGeometry>,
	panel_area: Option<Rect>,
	task_list_state: ListState,
	mode: InputMode,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			today: Local::now().date_naive(),
			window: 0,
			task_index: 0,
			carried_task: None,
			gesture: None,
			geometry: None,
			panel_area: None,
			task_list_state: ListState::default(),
			mode: InputMode::Normal,
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn clamp_task_selection(&mut self, tasks: &TaskList) {
		if tasks.is_empty() {
			self.task_index = 0;
		} else {
			self.task_index = self.task_index.min(tasks.len() - 1);
		}
	}

	fn move_task_selection(&mut self, delta: i32, tasks: &TaskList) {
		if tasks.is_empty() {
			self.task_index = 0;
			return;
		}

		if delta > 0 {
			self.task_index = (self.task_index + delta as usize).min(tasks.len() - 1);
		} else {
			self.task_index = self.task_index.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn panel_task_at(&self, column: u16, row: u16, tasks: &TaskList) -> Option<usize> {
		let area = self.panel_area?;
		if column < area.x || column >= area.right() || row < area.y || row >= area.bottom() {
			return None;
		}

		// The list scrolls to keep the selection visible, so the first
		// visible row is not necessarily task zero.
		let index = self.task_list_state.offset() + (row - area.y) as usize;
		if index < tasks.len() {
			Some(index)
		} else {
			None
		}
	}
}

enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

#[derive(Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self::with_input(title, String::new(), kind)
	}

	fn with_input(title: impl Into<String>, input: String, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input,
			kind,
		}
	}
}

#[derive(Clone)]
enum PromptKind {
	AddTaskName,
	EditNote { key: CellKey },
}

#[derive(Clone)]
struct SelectState {
	title: String,
	kind: SelectKind,
	options: Vec<SelectOption>,
	selected: usize,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			kind,
			options,
			selected: 0,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Clone)]
struct SelectOption {
	label: String,
	value: Option<String>,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: Option<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value,
			style,
		}
	}
}

#[derive(Clone)]
enum SelectKind {
	CellDetail { key: CellKey },
	DeleteTaskConfirm { task_id: i64 },
}

enum SelectOutcome {
	Prompt(PromptState),
	Done(String),
}

#[cfg(test)]
mod tests {
	use chrono::NaiveDate;
	use crossterm::event::{KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
	use ratatui::backend::TestBackend;
	use ratatui::layout::Rect;
	use ratatui::Terminal;

	use crate::domain::{CellAssignment, CellKey, GridData, TaskList};
	use crate::storage::{load_grid, KvStore, MemoryKvStore, GRID_KEY};

	use super::{handle_mouse, render_task_panel, App, GridGeometry, GUTTER_WIDTH, HEADER_ROWS};

	fn today() -> NaiveDate {
		NaiveDate::from_ymd_opt(2025, 10, 23).expect("date should be valid")
	}

	fn geometry() -> GridGeometry {
		GridGeometry::new(Rect::new(0, 0, 104, 28), today(), 0)
	}

	fn cell_position(geometry: &GridGeometry, day_index: u16, row_index: u16) -> (u16, u16) {
		(
			geometry.area.x + GUTTER_WIDTH + day_index * geometry.cell_width,
			geometry.area.y + HEADER_ROWS + row_index,
		)
	}

	fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
		MouseEvent {
			kind,
			column,
			row,
			modifiers: KeyModifiers::NONE,
		}
	}

	fn assignment(task_id: i64, task_name: &str) -> CellAssignment {
		CellAssignment {
			task_id,
			task_name: task_name.to_string(),
			note: String::new(),
		}
	}

	fn app_with_geometry() -> App {
		let mut app = App::default();
		app.today = today();
		app.geometry = Some(geometry());
		app.panel_area = None;
		app
	}

	#[test]
	fn geometry_ignores_gutter_and_headers() {
		let geometry = geometry();
		assert!(geometry.cell_at(0, 10).is_none());
		assert!(geometry.cell_at(GUTTER_WIDTH - 1, 10).is_none());
		assert!(geometry.cell_at(GUTTER_WIDTH, 0).is_none());
		assert!(geometry.cell_at(GUTTER_WIDTH, HEADER_ROWS - 1).is_none());
	}

	#[test]
	fn geometry_maps_rows_daytime_first_then_overtime() {
		let geometry = geometry();
		let (column, row) = cell_position(&geometry, 0, 0);
		assert_eq!(
			geometry.cell_at(column, row),
			Some(CellKey::new(today(), 6))
		);

		let (column, row) = cell_position(&geometry, 0, 18);
		assert_eq!(
			geometry.cell_at(column, row),
			Some(CellKey::new(today(), 0))
		);

		let (column, row) = cell_position(&geometry, 0, 23);
		assert_eq!(
			geometry.cell_at(column, row),
			Some(CellKey::new(today(), 5))
		);
	}

	#[test]
	fn geometry_addresses_overtime_with_the_same_date() {
		let geometry = geometry();
		let (daytime_column, daytime_row) = cell_position(&geometry, 4, 3);
		let (overtime_column, overtime_row) = cell_position(&geometry, 4, 20);
		let daytime = geometry
			.cell_at(daytime_column, daytime_row)
			.expect("cell should resolve");
		let overtime = geometry
			.cell_at(overtime_column, overtime_row)
			.expect("cell should resolve");
		assert_eq!(daytime.date(), overtime.date());
	}

	#[test]
	fn geometry_rejects_columns_past_the_window() {
		let shifted = GridGeometry::new(Rect::new(0, 0, 200, 28), today(), 14);
		let (column, row) = cell_position(&shifted, 13, 0);
		assert!(shifted.cell_at(column, row).is_some());
		let past_end = shifted.area.x + GUTTER_WIDTH + 14 * shifted.cell_width;
		assert!(shifted.cell_at(past_end, row).is_none());
	}

	#[test]
	fn drag_across_cells_commits_and_persists_on_release() {
		let mut app = app_with_geometry();
		let geometry = app.geometry.expect("geometry is set");
		let mut grid = GridData::new();
		let tasks = TaskList::new();
		let mut store = MemoryKvStore::new();

		let anchor = CellKey::new(today(), 9);
		grid.assign(anchor.clone(), assignment(1, "Read"));
		grid.assign(CellKey::new(today(), 11), assignment(2, "Chores"));

		let (column, row) = cell_position(&geometry, 0, 3);
		handle_mouse(
			&mut app,
			mouse(MouseEventKind::Down(MouseButton::Left), column, row),
			&mut grid,
			&tasks,
			&mut store,
		);
		assert!(app.gesture.is_some());

		for row_index in [4, 5] {
			let (column, row) = cell_position(&geometry, 0, row_index);
			handle_mouse(
				&mut app,
				mouse(MouseEventKind::Drag(MouseButton::Left), column, row),
				&mut grid,
				&tasks,
				&mut store,
			);
		}

		handle_mouse(
			&mut app,
			mouse(MouseEventKind::Up(MouseButton::Left), 0, 0),
			&mut grid,
			&tasks,
			&mut store,
		);

		assert!(app.gesture.is_none());
		assert_eq!(grid.lookup(&CellKey::new(today(), 10)), Some(&assignment(1, "Read")));
		assert_eq!(grid.lookup(&CellKey::new(today(), 11)), Some(&assignment(1, "Read")));
		assert_eq!(grid.lookup(&anchor), Some(&assignment(1, "Read")));

		let persisted = load_grid(&store).expect("persisted grid should load");
		assert_eq!(persisted.len(), 3);
	}

	#[test]
	fn click_on_filled_cell_opens_detail_instead_of_committing() {
		let mut app = app_with_geometry();
		let geometry = app.geometry.expect("geometry is set");
		let mut grid = GridData::new();
		let tasks = TaskList::new();
		let mut store = MemoryKvStore::new();

		grid.assign(CellKey::new(today(), 9), assignment(1, "Read"));

		let (column, row) = cell_position(&geometry, 0, 3);
		handle_mouse(
			&mut app,
			mouse(MouseEventKind::Down(MouseButton::Left), column, row),
			&mut grid,
			&tasks,
			&mut store,
		);
		handle_mouse(
			&mut app,
			mouse(MouseEventKind::Up(MouseButton::Left), column, row),
			&mut grid,
			&tasks,
			&mut store,
		);

		assert!(matches!(app.mode, super::InputMode::Select(_)));
		assert_eq!(grid.len(), 1);
		assert!(store.get(GRID_KEY).is_none());
	}

	#[test]
	fn press_on_empty_cell_without_carried_task_stays_idle() {
		let mut app = app_with_geometry();
		let geometry = app.geometry.expect("geometry is set");
		let mut grid = GridData::new();
		let tasks = TaskList::new();
		let mut store = MemoryKvStore::new();

		let (column, row) = cell_position(&geometry, 2, 7);
		handle_mouse(
			&mut app,
			mouse(MouseEventKind::Down(MouseButton::Left), column, row),
			&mut grid,
			&tasks,
			&mut store,
		);

		assert!(app.gesture.is_none());
		assert!(grid.is_empty());
	}

	#[test]
	fn panel_click_follows_the_scrolled_task_list() {
		let mut tasks = TaskList::new();
		let now = chrono::Utc::now();
		for index in 0..10 {
			tasks
				.add_task(format!("t{index}"), now)
				.expect("task should be created");
		}

		let backend = TestBackend::new(28, 9);
		let mut terminal = Terminal::new(backend).expect("terminal should build");
		let mut app = App::default();
		app.task_index = 9;
		terminal
			.draw(|frame| render_task_panel(frame, frame.area(), &mut app, &tasks))
			.expect("draw should succeed");

		// Seven visible rows with the selection at the bottom scrolls the
		// first three tasks off the top.
		let area = app.panel_area.expect("panel area is recorded");
		let top = app
			.panel_task_at(area.x, area.y, &tasks)
			.expect("row should map to a task");
		assert_eq!(tasks.tasks()[top].name, "t3");

		let bottom = app
			.panel_task_at(area.x, area.bottom() - 1, &tasks)
			.expect("row should map to a task");
		assert_eq!(tasks.tasks()[bottom].name, "t9");
	}

	#[test]
	fn carried_task_assigns_a_single_empty_cell() {
		let mut app = app_with_geometry();
		let geometry = app.geometry.expect("geometry is set");
		let mut grid = GridData::new();
		let mut tasks = TaskList::new();
		let mut store = MemoryKvStore::new();

		let id = tasks
			.add_task("Read".to_string(), chrono::Utc::now())
			.expect("task should be created");
		app.carried_task = Some(id);

		let (column, row) = cell_position(&geometry, 2, 7);
		handle_mouse(
			&mut app,
			mouse(MouseEventKind::Down(MouseButton::Left), column, row),
			&mut grid,
			&tasks,
			&mut store,
		);

		let key = geometry.cell_at(column, row).expect("cell should resolve");
		assert_eq!(
			grid.lookup(&key).map(|assignment| assignment.task_name.as_str()),
			Some("Read")
		);
		assert!(store.get(GRID_KEY).is_some());
	}
}
