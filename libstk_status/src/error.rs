use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum CalFileError {
    #[error("Could not open calibration file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Calibration file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration file could not be read as CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Calibration file row on line {line} has {found} columns; expected at least {expected}")]
    TooFewColumns {
        line: u64,
        found: usize,
        expected: usize,
    },
    #[error("Calibration file row on line {line} has a non-numeric value {value:?} in column {column}")]
    BadField {
        line: u64,
        column: usize,
        value: String,
    },
    #[error("Calibration file has {0} data rows; expected {1}")]
    BadRowCount(usize, usize),
}

#[derive(Debug, Error)]
pub enum CalDayError {
    #[error("Calibration day failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Directory name {0:?} is not a calibration day (expected YYYYMMDD)")]
    BadDayName(String),
    #[error("Calibration file {0:?} could not be used: {1}")]
    BadFile(PathBuf, #[source] CalFileError),
    #[error("Board group {0} has no calibration files")]
    EmptyBoardGroup(usize),
    #[error("Calibration day has {0} board groups; expected {1}")]
    BadGroupCount(usize, usize),
    #[error("Board group {group} has {found} calibration files; board group 0 has {expected}")]
    UnevenBoardGroups {
        group: usize,
        found: usize,
        expected: usize,
    },
    #[error("Calibration day {0:?} does not hold the expected number of calibration files")]
    IncompleteDay(PathBuf),
}

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Aggregator failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Aggregator could not read calibration directory {0:?} as it does not exist")]
    BadRootPath(PathBuf),
    #[error("No calibration found matching the selected time window; select a different time interval")]
    NoDataInWindow,
    #[error("All {0} calibration days in the selected time window were skipped; check the log for details")]
    NoUsableDays(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid date {0:04}-{1:02}-{2:02}")]
    InvalidDate(i32, u8, u8),
    #[error("Config start date {0} is after end date {1}")]
    InvertedWindow(String, String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetcher failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Fetcher command `{command}` failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("Fetcher found {1} calibration files in {0:?} after download; expected {2}")]
    IncompleteDay(PathBuf, usize, usize),
    #[error("Fetcher found no complete calibration day in the remote archive for the selected time window")]
    NoRemoteDays,
    #[error("Fetcher failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Clone, Error)]
pub enum HistogramError {
    #[error("Histogram requires at least one bin")]
    NoBins,
    #[error("Histogram range [{0}, {1}) is empty or not finite")]
    BadRange(f64, f64),
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Plotting failed because the time series is empty")]
    NoData,
    #[error("Error from the plotters library while drawing {0}: {1}")]
    Plotters(String, String),
    #[error("Plotting failed due to histogram error: {0}")]
    HistogramError(#[from] HistogramError),
    #[error("Plotting failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[cfg(feature = "hdf5")]
#[derive(Debug, Error)]
pub enum HDF5WriterError {
    #[error("HDF5Writer failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("HDF5Writer could not encode a string attribute: {0}")]
    StringError(#[from] hdf5::types::StringError),
    #[error("HDF5Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("HDF5Writer failed due to histogram error: {0}")]
    HistogramError(#[from] HistogramError),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Fetch error: {0}")]
    FetchError(#[from] FetchError),
    #[error("Processor failed due to Aggregator error: {0}")]
    AggregatorError(#[from] AggregatorError),
    #[error("Processor failed due to Plot error: {0}")]
    PlotError(#[from] PlotError),
    #[cfg(feature = "hdf5")]
    #[error("Processor failed due to HDF5Writer error: {0}")]
    HDFError(#[from] HDF5WriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProcessorError {
    /// True when the pass ended because there was nothing to show for the selected window
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            Self::AggregatorError(AggregatorError::NoDataInWindow)
                | Self::AggregatorError(AggregatorError::NoUsableDays(_))
                | Self::FetchError(FetchError::NoRemoteDays)
        )
    }
}
