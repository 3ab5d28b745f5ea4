use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::{Date, Month};

use super::cal_day::DateWindow;
use super::error::ConfigError;
use super::series::Statistic;

const DEFAULT_REMOTE_ADDRESS: &str = "root://xrootd-dampe.cloud.ba.infn.it//";
const DEFAULT_REMOTE_PATH: &str = "/FM/FlightData/CAL/STK/";
const DEFAULT_BINS: usize = 100;

/// A calendar date as it is written in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl ConfigDate {
    pub fn new(year: i32, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    pub fn to_date(&self) -> Result<Date, ConfigError> {
        let invalid = || ConfigError::InvalidDate(self.year, self.month, self.day);
        let month = Month::try_from(self.month).map_err(|_| invalid())?;
        Date::from_calendar_date(self.year, month, self.day).map_err(|_| invalid())
    }
}

impl From<Date> for ConfigDate {
    fn from(value: Date) -> Self {
        Self {
            year: value.year(),
            month: u8::from(value.month()),
            day: value.day(),
        }
    }
}

/// Range and binning of a distribution histogram
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramRange {
    pub min: f64,
    pub max: f64,
    pub bins: usize,
}

impl HistogramRange {
    pub fn new(min: f64, max: f64, bins: usize) -> Self {
        Self { min, max, bins }
    }
}

/// Plot and histogram options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Spacing of the date labels, in months. 0 lets the plotting library decide.
    pub x_interval_months: u32,
    pub plot_sigma: bool,
    pub plot_pedestal: bool,
    pub plot_common_noise: bool,
    pub sigma_range: HistogramRange,
    pub raw_sigma_range: HistogramRange,
    pub pedestal_range: HistogramRange,
    pub common_noise_range: HistogramRange,
    /// Value bins of the 2D time/value histograms and of the per-day channel histograms
    pub value_bins: usize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            x_interval_months: 1,
            plot_sigma: true,
            plot_pedestal: true,
            plot_common_noise: true,
            sigma_range: HistogramRange::new(2.5, 3.5, DEFAULT_BINS),
            raw_sigma_range: HistogramRange::new(11.0, 12.0, DEFAULT_BINS),
            pedestal_range: HistogramRange::new(221.0, 222.0, DEFAULT_BINS),
            common_noise_range: HistogramRange::new(10.0, 12.0, DEFAULT_BINS),
            value_bins: DEFAULT_BINS,
        }
    }
}

impl PlotConfig {
    /// The distribution range of a statistic, if it has one
    pub fn distribution_range(&self, stat: Statistic) -> Option<HistogramRange> {
        match stat {
            Statistic::Sigma => Some(self.sigma_range),
            Statistic::RawSigma => Some(self.raw_sigma_range),
            Statistic::Pedestal => Some(self.pedestal_range),
            Statistic::CommonNoise => Some(self.common_noise_range),
            _ => None,
        }
    }

    /// Whether plots of a statistic were requested. Channel fractions follow the sigma toggle.
    pub fn is_enabled(&self, stat: Statistic) -> bool {
        match stat {
            Statistic::Pedestal => self.plot_pedestal,
            Statistic::CommonNoise => self.plot_common_noise,
            _ => self.plot_sigma,
        }
    }
}

/// Structure representing the application configuration. Contains remote, pathing and window
/// information. Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub remote_address: String,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub output_path: PathBuf,
    pub fetch_remote: bool,
    pub apply_window: bool,
    pub start_date: ConfigDate,
    pub end_date: ConfigDate,
    pub export_hdf: bool,
    #[serde(default)]
    pub plots: PlotConfig,
}

impl Default for Config {
    /// Generate a new Config object pointing at the flight calibration archive
    fn default() -> Self {
        Self {
            remote_address: String::from(DEFAULT_REMOTE_ADDRESS),
            remote_path: String::from(DEFAULT_REMOTE_PATH),
            local_path: PathBuf::from("cal"),
            output_path: PathBuf::from("plots"),
            fetch_remote: false,
            apply_window: true,
            start_date: ConfigDate::new(2016, 1, 1),
            end_date: ConfigDate::new(2016, 12, 31),
            export_hdf: false,
            plots: PlotConfig::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// The configured date window. The start must not come after the end.
    pub fn window(&self) -> Result<DateWindow, ConfigError> {
        let start = self.start_date.to_date()?;
        let end = self.end_date.to_date()?;
        if start > end {
            return Err(ConfigError::InvertedWindow(start.to_string(), end.to_string()));
        }
        Ok(DateWindow::new(start, end))
    }

    /// The window used to select local calibration days, None if every day should be used
    pub fn selection_window(&self) -> Result<Option<DateWindow>, ConfigError> {
        if self.apply_window {
            Ok(Some(self.window()?))
        } else {
            Ok(None)
        }
    }

    /// Check if the local calibration directory is there
    pub fn has_local_calibrations(&self) -> bool {
        self.local_path.exists()
    }
}
