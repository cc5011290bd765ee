use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DAY_HOURS: u32 = 24;
pub const DAYTIME_START_HOUR: u32 = 6;
pub const DAYTIME_ROWS: u32 = DAY_HOURS - DAYTIME_START_HOUR;

/// One (date, hour) slot, addressed as `YYYY-MM-DDTHH`. Two cells with the
/// same date and hour always collide to the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey(String);

impl CellKey {
    pub fn new(date: NaiveDate, hour: u32) -> Self {
        debug_assert!(hour < DAY_HOURS, "hour {hour} out of range");
        Self(format!("{}T{:02}", date.format("%Y-%m-%d"), hour))
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let (date_part, hour_part) = raw
            .split_once('T')
            .ok_or_else(|| format!("invalid cell key '{raw}', expected YYYY-MM-DDTHH"))?;
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|err| format!("invalid date in cell key '{raw}': {err}"))?;
        if hour_part.len() != 2 || !hour_part.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(format!(
                "invalid hour in cell key '{raw}', expected two digits"
            ));
        }
        let hour = hour_part
            .parse::<u32>()
            .map_err(|err| format!("invalid hour in cell key '{raw}': {err}"))?;
        if hour >= DAY_HOURS {
            return Err(format!("hour out of range in cell key '{raw}'"));
        }
        Ok(Self::new(date, hour))
    }

    pub fn date(&self) -> NaiveDate {
        NaiveDate::parse_from_str(&self.0[..10], "%Y-%m-%d").expect("cell key holds a valid date")
    }

    pub fn hour(&self) -> u32 {
        self.0[11..].parse().expect("cell key holds a valid hour")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CellKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CellKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// The task + note bound to one cell. `task_id`/`task_name` are a
/// denormalized copy of the task at assignment time; deleting or renaming
/// the task later leaves the assignment intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellAssignment {
    pub task_id: i64,
    pub task_name: String,
    #[serde(default)]
    pub note: String,
}

impl CellAssignment {
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            task_name: task.name.clone(),
            note: String::new(),
        }
    }

    pub fn copy_without_note(&self) -> Self {
        Self {
            task_id: self.task_id,
            task_name: self.task_name.clone(),
            note: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn add_task(&mut self, name: String, now: DateTime<Utc>) -> Result<i64, String> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err("task name is required".to_string());
        }

        // Ids are creation-timestamp-derived; bump past collisions so two
        // tasks created in the same millisecond stay distinct.
        let mut id = now.timestamp_millis();
        while self.task(id).is_some() {
            id += 1;
        }

        self.tasks.push(Task { id, name, created: now });
        Ok(id)
    }

    pub fn delete_task(&mut self, id: i64) -> Result<Task, String> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| format!("task not found: {id}"))?;
        Ok(self.tasks.remove(index))
    }
}

/// The CellKey -> CellAssignment mapping, single source of truth for every
/// grid view. Absence of an entry means the hour is unaccounted for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridData {
    cells: BTreeMap<CellKey, CellAssignment>,
}

impl GridData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &CellKey) -> Option<&CellAssignment> {
        self.cells.get(key)
    }

    pub fn assign(&mut self, key: CellKey, assignment: CellAssignment) {
        self.cells.insert(key, assignment);
    }

    pub fn clear(&mut self, key: &CellKey) -> Option<CellAssignment> {
        self.cells.remove(key)
    }

    pub fn set_note(&mut self, key: &CellKey, note: String) -> bool {
        match self.cells.get_mut(key) {
            Some(assignment) => {
                assignment.note = note;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &CellAssignment)> {
        self.cells.iter()
    }
}

/// Hour order of one rendered day column: the daytime block first, then the
/// midnight-overflow block.
pub fn display_hours() -> impl Iterator<Item = u32> {
    (DAYTIME_START_HOUR..DAY_HOURS).chain(0..DAYTIME_START_HOUR)
}

pub fn hour_for_row(row: u32) -> u32 {
    if row < DAYTIME_ROWS {
        row + DAYTIME_START_HOUR
    } else {
        row - DAYTIME_ROWS
    }
}

/// Deterministic cell keys for a day window. Overtime hours (0-5) are
/// addressed with the date of the day that started, never the next calendar
/// day, so staying up past midnight stays attributed to that day.
pub fn enumerate_cells(today: NaiveDate, start_offset: i64, num_days: i64) -> Vec<CellKey> {
    let mut keys = Vec::new();
    for day_index in 0..num_days.max(0) {
        let date = today + Duration::days(start_offset + day_index);
        for hour in display_hours() {
            keys.push(CellKey::new(date, hour));
        }
    }
    keys
}

pub fn format_hour(hour: u32) -> String {
    let meridiem = if hour < 12 { "am" } else { "pm" };
    let display = match hour % 12 {
        0 => 12,
        other => other,
    };
    format!("{display}{meridiem}")
}

pub fn format_hour_label(hour: u32) -> String {
    if hour < DAYTIME_START_HOUR {
        let display = if hour == 0 { 12 } else { hour };
        format!("{display}am+")
    } else {
        format_hour(hour)
    }
}

pub fn format_time_ago(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - created;
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{}d ago", elapsed.num_days())
    } else {
        created.format("%b %d").to_string()
    }
}
