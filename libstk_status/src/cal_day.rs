use std::fmt::Display;
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::Date;

use super::error::{AggregatorError, CalDayError};

/// A calibration day, identified by the date encoded in its directory name (`YYYYMMDD`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalDay {
    date: Date,
}

impl CalDay {
    pub fn new(date: Date) -> Self {
        Self { date }
    }

    /// Parse a directory name of the form `YYYYMMDD`.
    ///
    /// The name must be exactly eight ASCII digits, start with the century prefix and form a
    /// valid calendar date.
    pub fn from_dir_name(name: &str, day_prefix: &str) -> Result<Self, CalDayError> {
        if name.len() != 8 || !name.bytes().all(|b| b.is_ascii_digit()) || !name.starts_with(day_prefix)
        {
            return Err(CalDayError::BadDayName(name.to_string()));
        }
        match Date::parse(name, format_description!("[year][month][day]")) {
            Ok(date) => Ok(Self { date }),
            Err(_) => Err(CalDayError::BadDayName(name.to_string())),
        }
    }

    /// Parse the last component of a path-like string, e.g. a remote listing entry
    pub fn from_path_name(path: &str, day_prefix: &str) -> Result<Self, CalDayError> {
        let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
        Self::from_dir_name(name, day_prefix)
    }

    pub fn date(&self) -> Date {
        self.date
    }

    /// The directory name of this day, the inverse of [`CalDay::from_dir_name`]
    pub fn dir_name(&self) -> String {
        format!(
            "{:04}{:02}{:02}",
            self.date.year(),
            u8::from(self.date.month()),
            self.date.day()
        )
    }
}

impl Display for CalDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Inclusive date window used to select calibration days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Date,
    pub end: Date,
}

impl DateWindow {
    pub fn new(start: Date, end: Date) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, day: &CalDay) -> bool {
        day.date() >= self.start && day.date() <= self.end
    }
}

/// A calibration day together with its local directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalDayDir {
    pub day: CalDay,
    pub path: PathBuf,
}

/// Find the calibration day directories under root, sorted ascending by name.
///
/// Only directories starting with the century prefix are considered. Those whose name is not
/// a valid date are dropped with a warning. If a window is given, days outside of it are dropped.
pub fn find_calibration_days(
    root: &Path,
    day_prefix: &str,
    window: Option<&DateWindow>,
) -> Result<Vec<CalDayDir>, AggregatorError> {
    if !root.exists() {
        return Err(AggregatorError::BadRootPath(root.to_path_buf()));
    }

    let mut names: Vec<String> = Vec::new();
    for item in root.read_dir()? {
        let item = item?;
        if !item.file_type()?.is_dir() {
            continue;
        }
        let name = item.file_name().to_string_lossy().to_string();
        if name.starts_with(day_prefix) {
            names.push(name);
        }
    }
    names.sort();

    let mut days = Vec::with_capacity(names.len());
    for name in names {
        let day = match CalDay::from_dir_name(&name, day_prefix) {
            Ok(day) => day,
            Err(e) => {
                log::warn!("Skipping directory {}: {e}", root.join(&name).display());
                continue;
            }
        };
        if let Some(window) = window {
            if !window.contains(&day) {
                continue;
            }
        }
        days.push(CalDayDir {
            day,
            path: root.join(&name),
        });
    }
    Ok(days)
}
