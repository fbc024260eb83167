//src/sheet.rs
use crate::session::{CellValue, SessionRange};
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("I/O error reading sheet: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse sheet (CSV): {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid range '{0}'. Expected A1 notation like 'B12:F15'.")]
    InvalidRange(String),
}

/// A zero-based, inclusive rectangle parsed from A1 notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A1Range {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl A1Range {
    pub fn parse(s: &str) -> Result<Self, SheetError> {
        let invalid = || SheetError::InvalidRange(s.to_string());
        let mut parts = s.trim().split(':');
        let start = parts.next().and_then(parse_cell_ref).ok_or_else(invalid)?;
        let end = match parts.next() {
            Some(p) => parse_cell_ref(p).ok_or_else(invalid)?,
            None => start,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self {
            first_row: start.0.min(end.0),
            first_col: start.1.min(end.1),
            last_row: start.0.max(end.0),
            last_col: start.1.max(end.1),
        })
    }

    pub const fn height(&self) -> usize {
        self.last_row - self.first_row + 1
    }

    pub const fn width(&self) -> usize {
        self.last_col - self.first_col + 1
    }
}

impl FromStr for A1Range {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// "B12" -> (11, 1)
fn parse_cell_ref(s: &str) -> Option<(usize, usize)> {
    let s = s.trim().to_ascii_uppercase();
    let digits_at = s.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = s.split_at(digits_at);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut col: usize = 0;
    for c in letters.chars() {
        col = col.checked_mul(26)?.checked_add(c as usize - 'A' as usize + 1)?;
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

/// A log sheet loaded from a CSV export, with typed cells.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn from_path(path: &Path, date_formats: &[String]) -> Result<Self, SheetError> {
        let file = File::open(path)?;
        Self::from_reader(file, date_formats)
    }

    pub fn from_reader<R: Read>(reader: R, date_formats: &[String]) -> Result<Self, SheetError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|field| parse_cell(field, date_formats))
                    .collect(),
            );
        }
        debug!("Loaded sheet with {} rows", rows.len());
        Ok(Self { rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, col: usize) -> CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or_default()
    }

    /// Copies exactly the requested rectangle; cells past the data are empty.
    pub fn select(&self, range: &A1Range) -> SessionRange {
        let rows = (range.first_row..=range.last_row)
            .map(|r| {
                (range.first_col..=range.last_col)
                    .map(|c| self.cell(r, c))
                    .collect()
            })
            .collect();
        SessionRange::from_rows(rows)
    }

    /// The last `height` non-empty rows, as wide as the widest of them.
    pub fn trailing_block(&self, height: usize) -> SessionRange {
        let used: Vec<&Vec<CellValue>> = self
            .rows
            .iter()
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .collect();
        let block = &used[used.len().saturating_sub(height)..];
        let width = block.iter().map(|row| used_width(row)).max().unwrap_or(0);
        SessionRange::from_rows(
            block
                .iter()
                .map(|row| row.iter().take(width).cloned().collect())
                .collect(),
        )
    }
}

fn used_width(row: &[CellValue]) -> usize {
    row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1)
}

/// Infers a typed cell from raw text: empty, date, number, then text.
pub fn parse_cell(raw: &str, date_formats: &[String]) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    for format in date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return CellValue::Date(date);
        }
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(trimmed.to_string()),
    }
}
