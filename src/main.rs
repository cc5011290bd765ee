mod domain;
mod gesture;
mod storage;
mod ui;

use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};

use crate::domain::{enumerate_cells, format_time_ago, CellAssignment, CellKey, GridData, TaskList};
use crate::storage::{
	load_grid, load_tasks, recent_stores, remember_store, resolve_store_path, save_grid,
	save_tasks, FileKvStore,
};
use crate::ui::run_grid;

#[derive(Debug, Parser)]
#[command(name = "timegrid", about = "Terminal time grid: drag tasks over hour cells")]
struct Cli {
	#[arg(long)]
	store: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	Grid,
	AddTask {
		#[arg(long)]
		name: String,
	},
	DeleteTask {
		#[arg(long)]
		id: i64,
	},
	ListTasks,
	Assign {
		#[arg(long)]
		cell: String,
		#[arg(long)]
		task: i64,
		#[arg(long)]
		note: Option<String>,
	},
	Clear {
		#[arg(long)]
		cell: String,
	},
	Note {
		#[arg(long)]
		cell: String,
		#[arg(long)]
		text: String,
	},
	Cells {
		#[arg(long, default_value_t = 0)]
		offset: i64,
		#[arg(long, default_value_t = 14)]
		days: i64,
	},
	Summary {
		#[arg(long, default_value_t = 28)]
		days: i64,
	},
	Stores {
		#[arg(long, default_value_t = 20)]
		limit: usize,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	if let Some(Command::Stores { limit }) = &cli.command {
		print_recent_stores(*limit)?;
		return Ok(());
	}

	let store_path = resolve_store_path(cli.store)?;
	let mut store = FileKvStore::open(&store_path)?;
	if let Err(err) = remember_store(&store_path) {
		eprintln!("warning: failed to record recent store: {err}");
	}

	// Malformed persisted data is fatal to the load, not to the program:
	// fall back to an empty store rather than attempt partial recovery.
	let mut grid = load_grid(&store).unwrap_or_else(|err| {
		eprintln!("warning: discarding unreadable grid data: {err}");
		GridData::new()
	});
	let mut tasks = load_tasks(&store).unwrap_or_else(|err| {
		eprintln!("warning: discarding unreadable task list: {err}");
		TaskList::new()
	});

	match cli.command.unwrap_or(Command::Grid) {
		Command::Init => {
			save_grid(&mut store, &grid)?;
			save_tasks(&mut store, &tasks)?;
			println!("initialized store at {}", store.path().display());
		}
		Command::Grid => {
			run_grid(&mut grid, &mut tasks, &mut store)?;
		}
		Command::AddTask { name } => {
			let id = tasks.add_task(name, Utc::now())?;
			save_tasks(&mut store, &tasks)?;
			println!("created task {id}");
		}
		Command::DeleteTask { id } => {
			let task = tasks.delete_task(id)?;
			save_tasks(&mut store, &tasks)?;
			println!("deleted task {} ({})", task.id, task.name);
		}
		Command::ListTasks => {
			print_tasks(&tasks);
		}
		Command::Assign { cell, task, note } => {
			let key = CellKey::parse(&cell)?;
			let task = tasks
				.task(task)
				.ok_or_else(|| format!("task not found: {task}"))?;
			let mut assignment = CellAssignment::for_task(task);
			if let Some(note) = note {
				assignment.note = note;
			}
			let task_name = assignment.task_name.clone();
			grid.assign(key.clone(), assignment);
			save_grid(&mut store, &grid)?;
			println!("assigned {task_name} at {key}");
		}
		Command::Clear { cell } => {
			let key = CellKey::parse(&cell)?;
			grid.clear(&key)
				.ok_or_else(|| format!("no assignment at {key}"))?;
			save_grid(&mut store, &grid)?;
			println!("cleared {key}");
		}
		Command::Note { cell, text } => {
			let key = CellKey::parse(&cell)?;
			if !grid.set_note(&key, text) {
				return Err(format!("no assignment at {key}").into());
			}
			save_grid(&mut store, &grid)?;
			println!("note saved at {key}");
		}
		Command::Cells { offset, days } => {
			print_cells(&grid, offset, days);
		}
		Command::Summary { days } => {
			print_summary(&grid, days);
		}
		Command::Stores { .. } => {}
	}

	Ok(())
}

fn print_recent_stores(limit: usize) -> Result<(), Box<dyn Error>> {
	let rows = recent_stores(limit)?;
	if rows.is_empty() {
		println!("no recent stores");
		return Ok(());
	}

	for (index, path) in rows.iter().enumerate() {
		println!("{:>2}. {}", index + 1, path.display());
	}

	Ok(())
}

fn print_tasks(tasks: &TaskList) {
	if tasks.is_empty() {
		println!("no tasks yet");
		return;
	}

	let now = Utc::now();
	for task in tasks.tasks() {
		println!(
			"{} | {} | {}",
			task.id,
			task.name,
			format_time_ago(task.created, now)
		);
	}
}

fn print_cells(grid: &GridData, offset: i64, days: i64) {
	let today = Local::now().date_naive();
	let keys = enumerate_cells(today, offset, days);

	let mut filled = 0usize;
	for key in &keys {
		if let Some(assignment) = grid.lookup(key) {
			filled += 1;
			if assignment.note.is_empty() {
				println!("{} | {}", key, assignment.task_name);
			} else {
				println!("{} | {} | {}", key, assignment.task_name, assignment.note);
			}
		}
	}

	println!("{filled} of {} cells filled in window", keys.len());
}

fn print_summary(grid: &GridData, days: i64) {
	let today = Local::now().date_naive();
	let keys = enumerate_cells(today, 0, days);

	let mut hours_by_task: BTreeMap<String, u64> = BTreeMap::new();
	for key in &keys {
		if let Some(assignment) = grid.lookup(key) {
			*hours_by_task.entry(assignment.task_name.clone()).or_default() += 1;
		}
	}

	if hours_by_task.is_empty() {
		println!("no assigned hours in the next {days} days");
		return;
	}

	let mut rows = hours_by_task.into_iter().collect::<Vec<_>>();
	rows.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));

	let total: u64 = rows.iter().map(|(_, hours)| hours).sum();
	for (name, hours) in &rows {
		println!("{hours:>3}h | {name}");
	}
	println!("{total:>3}h | total");
}
