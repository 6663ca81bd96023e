//! Course list and student roster files.
//!
//! Both are semicolon-separated text exported from the school's systems,
//! with `"` quoting, a header row, and sometimes a UTF-8 BOM.

use std::path::{Path, PathBuf};

use crate::error::{FacturaError, Result};
use crate::model::Course;

/// Default course list file name.
pub const COURSE_LIST_FILE: &str = "cursos.csv";

const SEPARATOR: char = ';';
const STUDENT_ROLE: &str = "student";

/// A parsed delimited file: header plus data rows.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let mut lines = split_records(text)
            .into_iter()
            .filter(|line| !line.trim().is_empty());
        let headers = lines
            .next()
            .map(|line| {
                split_csv_line(line, SEPARATOR)
                    .into_iter()
                    .map(|h| h.trim().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let rows = lines.map(|line| split_csv_line(line, SEPARATOR)).collect();

        Self { headers, rows }
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str, what: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| FacturaError::Roster(format!("{what} has no '{name}' column")))
    }
}

/// Field `idx` of `row`, trimmed; empty when the row is short.
fn field(row: &[String], idx: usize) -> &str {
    row.get(idx).map_or("", |f| f.trim())
}

/// Split text into records on line breaks outside `"` quotes, so a quoted
/// field may span lines. A trailing `\r` is dropped from each record.
fn split_records(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, ch) in text.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => {
                records.push(text.get(start..i).unwrap_or_default());
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < text.len() {
        records.push(text.get(start..).unwrap_or_default());
    }
    records
        .into_iter()
        .map(|r| r.strip_suffix('\r').unwrap_or(r))
        .collect()
}

/// Split one record on `sep`, honouring `"` quoting with `""` escapes.
fn split_csv_line(line: &str, sep: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    // Escaped quote
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == sep {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}

/// Parse a course list (`Siglas`, `Curso`).
///
/// # Errors
/// [`FacturaError::Roster`] when a required column is missing.
pub fn parse_courses(data: &[u8]) -> Result<Vec<Course>> {
    let table = Table::parse(data);
    let code = table.require("Siglas", "course list")?;
    let name = table.require("Curso", "course list")?;

    Ok(table
        .rows
        .iter()
        .filter(|row| !field(row, code).is_empty())
        .map(|row| Course {
            code: field(row, code).to_string(),
            name: field(row, name).to_string(),
        })
        .collect())
}

/// Read and parse a course list file.
///
/// # Errors
/// I/O errors, or see [`parse_courses`].
pub fn load_courses(path: impl AsRef<Path>) -> Result<Vec<Course>> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let courses = parse_courses(&data)?;
    tracing::debug!(path = %path.display(), courses = courses.len(), "loaded course list");
    Ok(courses)
}

/// Parse a roster (`Apellidos`, `Nombre`, optional `Rol`) into display
/// names `"{Apellidos} {Nombre}"`, keeping only students when a role column
/// exists.
///
/// # Errors
/// [`FacturaError::Roster`] when `Apellidos` or `Nombre` is missing.
pub fn parse_roster(data: &[u8]) -> Result<Vec<String>> {
    let table = Table::parse(data);
    let surnames = table.require("Apellidos", "roster")?;
    let names = table.require("Nombre", "roster")?;
    let role = table.column("Rol");

    Ok(table
        .rows
        .iter()
        .filter(|row| role.map_or(true, |r| field(row, r) == STUDENT_ROLE))
        .map(|row| format!("{} {}", field(row, surnames), field(row, names)))
        .map(|full| full.trim().to_string())
        .filter(|full| !full.is_empty())
        .collect())
}

/// Read and parse a roster file.
///
/// # Errors
/// I/O errors, or see [`parse_roster`].
pub fn load_roster(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let students = parse_roster(&data)?;
    tracing::debug!(path = %path.display(), students = students.len(), "loaded roster");
    Ok(students)
}

/// Every `*.csv` in `dir` other than the course list, sorted by name.
///
/// # Errors
/// I/O errors reading the directory.
pub fn discover_rosters(dir: impl AsRef<Path>, course_list: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        let is_csv = path.extension().is_some_and(|ext| ext == "csv");
        let is_course_list = path.file_name().is_some_and(|name| name == course_list);
        if path.is_file() && is_csv && !is_course_list {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Look a course up by its code.
#[must_use]
pub fn find_course<'a>(courses: &'a [Course], code: &str) -> Option<&'a Course> {
    courses.iter().find(|c| c.code == code)
}
