use hdf5::types::VarLenUnicode;
use hdf5::File;
use std::path::Path;
use std::str::FromStr;

use super::config::PlotConfig;
use super::error::HDF5WriterError;
use super::histogram::{channel_sigma_histograms, ladder_density, Histogram1D, Histogram2D};
use super::series::{Statistic, TimeSeries};

const SERIES_NAME: &str = "series";
const DAYS_NAME: &str = "days";
const CHANNEL_SIGMA_NAME: &str = "channel_sigma";
const TIME_DENSITY_NAME: &str = "time_density";

/// Range of the per-day channel sigma histograms
const CHANNEL_SIGMA_MIN: f64 = 0.0;
const CHANNEL_SIGMA_MAX: f64 = 20.0;

/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file for writing the result of a monitoring pass: the daily time series of
/// every statistic, the per-day channel sigma histograms and the 2D time/value histograms.
#[derive(Debug)]
pub struct HDFWriter {
    file_handle: File,
    series_group: hdf5::Group,
    channel_group: hdf5::Group,
    density_group: hdf5::Group,
}
// Structure
// series - first_day, last_day, n_days, version
// |---- days(dset) YYYYMMDD
// |---- sigma, sigma_raw, pedestal, cn, chfrac_s5, chfrac_s510, chfrac_s10 (dset)
// channel_sigma - min, max, bins
// |---- day_YYYYMMDD(dset) - underflow, overflow
// time_density
// |---- sigma, sigma_raw, pedestal, cn (dset) - x_min, x_max, y_min, y_max

/// Encode a day as the integer YYYYMMDD
fn day_code(date: time::Date) -> u32 {
    date.year() as u32 * 10_000 + u8::from(date.month()) as u32 * 100 + date.day() as u32
}

impl HDFWriter {
    /// Create the writer, opening a file at path and creating the data groups
    pub fn new(path: &Path) -> Result<Self, HDF5WriterError> {
        let file_handle = File::create(path)?;
        let writer_version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);

        let series_group = file_handle.create_group(SERIES_NAME)?;
        series_group
            .new_attr::<VarLenUnicode>()
            .create("version")?
            .write_scalar(&VarLenUnicode::from_str(&writer_version)?)?;
        let channel_group = file_handle.create_group(CHANNEL_SIGMA_NAME)?;
        let density_group = file_handle.create_group(TIME_DENSITY_NAME)?;

        Ok(Self {
            file_handle,
            series_group,
            channel_group,
            density_group,
        })
    }

    /// Write the day codes and the per-day value of every statistic
    pub fn write_series(&self, series: &TimeSeries) -> Result<(), HDF5WriterError> {
        let days: Vec<u32> = series.days().iter().map(|d| day_code(d.date())).collect();
        self.series_group
            .new_dataset_builder()
            .with_data(days.as_slice())
            .create(DAYS_NAME)?;
        for stat in Statistic::ALL {
            self.series_group
                .new_dataset_builder()
                .with_data(series.values(stat))
                .create(stat.name())?;
        }
        self.series_group
            .new_attr::<u32>()
            .create("n_days")?
            .write_scalar(&(series.len() as u32))?;
        self.series_group
            .new_attr::<u32>()
            .create("first_day")?
            .write_scalar(&days.first().copied().unwrap_or(0))?;
        self.series_group
            .new_attr::<u32>()
            .create("last_day")?
            .write_scalar(&days.last().copied().unwrap_or(0))?;
        Ok(())
    }

    /// Write one channel sigma histogram per day, named after the day
    pub fn write_channel_histograms(
        &self,
        series: &TimeSeries,
        histograms: &[Histogram1D],
    ) -> Result<(), HDF5WriterError> {
        let Some(first) = histograms.first() else {
            return Ok(());
        };
        self.channel_group
            .new_attr::<f64>()
            .create("min")?
            .write_scalar(&first.min)?;
        self.channel_group
            .new_attr::<f64>()
            .create("max")?
            .write_scalar(&first.max)?;
        self.channel_group
            .new_attr::<u64>()
            .create("bins")?
            .write_scalar(&(first.n_bins() as u64))?;

        for (day, hist) in series.days().iter().zip(histograms.iter()) {
            let dset = self
                .channel_group
                .new_dataset_builder()
                .with_data(hist.counts.as_slice())
                .create(format!("day_{}", day.dir_name()).as_str())?;
            dset.new_attr::<u64>()
                .create("underflow")?
                .write_scalar(&hist.underflow)?;
            dset.new_attr::<u64>()
                .create("overflow")?
                .write_scalar(&hist.overflow)?;
        }
        Ok(())
    }

    /// Write the 2D time/value histogram of a statistic, x axis in Julian days
    pub fn write_density(
        &self,
        stat: Statistic,
        hist: &Histogram2D,
    ) -> Result<(), HDF5WriterError> {
        let dset = self
            .density_group
            .new_dataset_builder()
            .with_data(&hist.counts)
            .create(stat.name())?;
        for (name, value) in [
            ("x_min", hist.x_min),
            ("x_max", hist.x_max),
            ("y_min", hist.y_min),
            ("y_max", hist.y_max),
        ] {
            dset.new_attr::<f64>().create(name)?.write_scalar(&value)?;
        }
        Ok(())
    }

    /// Flush and close the file, consume the writer
    pub fn close(self) -> Result<(), HDF5WriterError> {
        self.file_handle.flush()?;
        Ok(())
    }
}

/// Export the full result of a pass into a single HDF5 file at path
pub fn export_series(
    path: &Path,
    series: &TimeSeries,
    plots: &PlotConfig,
) -> Result<(), HDF5WriterError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = HDFWriter::new(path)?;
    writer.write_series(series)?;

    let channel_hists = channel_sigma_histograms(
        series,
        CHANNEL_SIGMA_MIN,
        CHANNEL_SIGMA_MAX,
        plots.value_bins,
    )?;
    writer.write_channel_histograms(series, &channel_hists)?;

    for stat in Statistic::LADDER_MEANS {
        if let Some(hist) = ladder_density(series, stat, plots.value_bins)? {
            writer.write_density(stat, &hist)?;
        }
    }
    writer.close()?;
    log::info!("Exported {} days to {}", series.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cal_day::CalDay;
    use crate::reduction::{DayAggregate, LadderValues};
    use time::macros::date;

    #[test]
    fn test_day_code() {
        assert_eq!(day_code(date!(2016 - 03 - 07)), 20160307);
    }

    #[test]
    fn test_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("stk_status.h5");
        let mut series = TimeSeries::new();
        for (i, date) in [date!(2023 - 01 - 01), date!(2023 - 01 - 05)]
            .into_iter()
            .enumerate()
        {
            let values = vec![3.0 + i as f64, 4.0];
            series.push(
                CalDay::new(date),
                DayAggregate {
                    sigma: 3.0 + i as f64,
                    channel_sigmas: values.clone(),
                    ladders: LadderValues {
                        sigma: values.clone(),
                        raw_sigma: values.clone(),
                        pedestal: values.clone(),
                        common_noise: values,
                    },
                    ..Default::default()
                },
            );
        }
        export_series(&path, &series, &PlotConfig::default()).unwrap();

        let file = File::open(&path).unwrap();
        let days = file.dataset("series/days").unwrap().read_raw::<u32>().unwrap();
        assert_eq!(days, vec![20230101, 20230105]);
        let sigma = file.dataset("series/sigma").unwrap().read_raw::<f64>().unwrap();
        assert_eq!(sigma, vec![3.0, 4.0]);
        assert!(file.dataset("channel_sigma/day_20230105").is_ok());
        let density = file.dataset("time_density/cn").unwrap();
        assert_eq!(density.shape(), vec![5, 100]);
    }
}
