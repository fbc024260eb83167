//src/session.rs
use chrono::{NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const SESSION_HEIGHT: usize = 4;
pub const MAX_SESSION_WIDTH: usize = 20;
pub const MIN_SETS: i64 = 1;
pub const MAX_SETS: i64 = 90;
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
const ACTIVITY_NAME_PREFIX: &str = "Weight training: ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The selected range does not seem a valid session log: height {0} != 4")]
    InvalidHeight(usize),
    #[error("The selected range does not seem a valid session log: width {0} is not in 1..=20")]
    InvalidWidth(usize),
    #[error("Not a valid date: {0}")]
    InvalidDate(String),
    #[error("The session log has no title next to its date")]
    MissingTitle,
    #[error("Not a valid sets counter: {value} (column {column})")]
    InvalidSets { column: usize, value: String },
    #[error("Local midnight does not exist on {0}")]
    NonexistentLocalMidnight(NaiveDate),
}

/// Rejects a range whose dimensions cannot hold a session log.
///
/// # Errors
/// `InvalidHeight` unless `height` is 4, then `InvalidWidth` unless `width` is in 1..=20.
pub fn check_shape(height: usize, width: usize) -> Result<(), ValidationError> {
    if height != SESSION_HEIGHT {
        return Err(ValidationError::InvalidHeight(height));
    }
    if !(1..=MAX_SESSION_WIDTH).contains(&width) {
        return Err(ValidationError::InvalidWidth(width));
    }
    Ok(())
}

/// The typed value of one sheet cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Returns the value as a set counter if it is a whole number in the allowed range.
    pub fn as_set_count(&self) -> Option<u32> {
        match *self {
            CellValue::Number(n)
                if n.fract() == 0.0 && n >= MIN_SETS as f64 && n <= MAX_SETS as f64 =>
            {
                Some(n as u32)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            // Whole numbers print without a trailing ".0", like the sheet shows them.
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A rectangular block of cells, as selected in the log sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionRange {
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

impl SessionRange {
    /// Builds a range from rows, padding shorter rows with empty cells.
    pub fn from_rows(mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, CellValue::Empty);
        }
        Self { rows, width }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    /// Zero-based cell lookup.
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub target_reps: String,
    pub sets: u32,
}

impl Exercise {
    pub fn description_line(&self) -> String {
        format!("{}: {} reps x {} sets", self.name, self.target_reps, self.sets)
    }
}

/// The day-long window used to find the activity to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub day_start: i64,
    pub day_end: i64,
}

impl TimeWindow {
    /// Window from local midnight of `date` (in `tz`) to the last second of that day.
    /// An ambiguous midnight resolves to the earliest instant.
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Result<Self, ValidationError> {
        let midnight = date.and_time(NaiveTime::MIN);
        let day_start = tz
            .from_local_datetime(&midnight)
            .earliest()
            .ok_or(ValidationError::NonexistentLocalMidnight(date))?
            .timestamp();
        Ok(Self {
            day_start,
            day_end: day_start + SECONDS_PER_DAY - 1,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    pub date: NaiveDate,
    pub time_window: TimeWindow,
    pub activity_name: String,
    pub description: String,
    pub exercises: Vec<Exercise>,
}

impl SessionLog {
    /// Validates `range` and derives the session log from it.
    ///
    /// # Errors
    /// Returns the first `ValidationError` found, checking height, width, date,
    /// title and then each set counter from left to right.
    pub fn extract<Tz: TimeZone>(range: &SessionRange, tz: &Tz) -> Result<Self, ValidationError> {
        let width = range.width();
        check_shape(range.height(), width)?;

        let date = match range.cell(0, 0) {
            Some(CellValue::Date(d)) => *d,
            other => {
                return Err(ValidationError::InvalidDate(
                    other.map(ToString::to_string).unwrap_or_default(),
                ))
            }
        };

        let title = range
            .cell(0, 1)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string)
            .ok_or(ValidationError::MissingTitle)?;

        let mut exercises = Vec::with_capacity(width);
        for col in 0..width {
            let sets_cell = range.cell(3, col).cloned().unwrap_or_default();
            let sets = sets_cell
                .as_set_count()
                .ok_or_else(|| ValidationError::InvalidSets {
                    column: col + 1,
                    value: sets_cell.to_string(),
                })?;
            exercises.push(Exercise {
                name: range.cell(1, col).map(ToString::to_string).unwrap_or_default(),
                target_reps: range.cell(2, col).map(ToString::to_string).unwrap_or_default(),
                sets,
            });
        }

        Ok(Self {
            date,
            time_window: TimeWindow::for_date(date, tz)?,
            activity_name: activity_name(&title),
            description: describe(&exercises),
            exercises,
        })
    }

    /// The notice shown before submitting.
    pub fn summary(&self) -> String {
        format!(
            "Timestamps: {} - {}\n\n{}\n\n{}",
            self.time_window.day_start, self.time_window.day_end, self.activity_name, self.description
        )
    }
}

/// "Upper Body" -> "Weight training: upper Body"
pub fn activity_name(title: &str) -> String {
    let mut chars = title.chars();
    let mut name = String::from(ACTIVITY_NAME_PREFIX);
    if let Some(first) = chars.next() {
        name.extend(first.to_lowercase());
        name.push_str(chars.as_str());
    }
    name
}

pub fn describe(exercises: &[Exercise]) -> String {
    exercises
        .iter()
        .map(|e| e.description_line() + "\n")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_display_drops_integral_fraction() {
        assert_eq!(CellValue::Number(10.0).to_string(), "10");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn set_count_bounds() {
        assert_eq!(CellValue::Number(1.0).as_set_count(), Some(1));
        assert_eq!(CellValue::Number(90.0).as_set_count(), Some(90));
        assert_eq!(CellValue::Number(0.0).as_set_count(), None);
        assert_eq!(CellValue::Number(91.0).as_set_count(), None);
        assert_eq!(CellValue::Number(2.5).as_set_count(), None);
        assert_eq!(CellValue::Text("5".into()).as_set_count(), None);
    }

    #[test]
    fn activity_name_handles_non_ascii_and_empty() {
        assert_eq!(activity_name("Ärmel"), "Weight training: ärmel");
        assert_eq!(activity_name(""), "Weight training: ");
    }

    #[test]
    fn ragged_rows_are_padded() {
        let range = SessionRange::from_rows(vec![vec![CellValue::Number(1.0)], vec![]]);
        assert_eq!(range.width(), 1);
        assert_eq!(range.cell(1, 0), Some(&CellValue::Empty));
    }
}
