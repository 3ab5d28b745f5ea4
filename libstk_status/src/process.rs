use std::path::PathBuf;
use std::sync::mpsc::{SendError, Sender};
use time::Date;

use super::aggregator::{build_time_series, DayProgress};
use super::cal_day::{CalDay, DateWindow};
use super::config::Config;
use super::constants::DetectorGeometry;
use super::error::{FetchError, ProcessorError};
use super::fetcher::{verify_local_tree, ArchiveClient, FetchSummary, Fetcher, XrootdClient};
use super::plot::Plotter;
use super::series::{Statistic, TimeSeries};
use super::worker_status::{Stage, WorkerStatus};

#[cfg(feature = "hdf5")]
const HDF_FILE_NAME: &str = "stk_status.h5";

/// What one monitoring pass produced
#[derive(Debug, Clone, Default)]
pub struct ProcessSummary {
    pub fetch: Option<FetchSummary>,
    pub n_days: usize,
    pub first_day: Option<CalDay>,
    pub last_day: Option<CalDay>,
    /// Mean of every statistic over the days of the series
    pub means: Vec<(Statistic, f64)>,
    pub plots: Vec<PathBuf>,
    pub hdf_path: Option<PathBuf>,
}

impl ProcessSummary {
    fn from_series(series: &TimeSeries) -> Self {
        let means = Statistic::ALL
            .iter()
            .map(|stat| {
                let values = series.values(*stat);
                (*stat, values.iter().sum::<f64>() / values.len() as f64)
            })
            .collect();
        Self {
            n_days: series.len(),
            first_day: series.first_day().copied(),
            last_day: series.last_day().copied(),
            means,
            ..Default::default()
        }
    }
}

/// Forward day progress to the front end. The first send failure is kept and reported
/// once the stage is over.
fn status_forwarder<'a>(
    tx: &'a Sender<WorkerStatus>,
    stage: Stage,
    result: &'a mut Result<(), SendError<WorkerStatus>>,
) -> impl FnMut(&DayProgress) + 'a {
    move |progress| {
        if result.is_ok() {
            *result = tx.send(WorkerStatus::new(
                progress.fraction(),
                stage,
                Some(progress.day.dir_name()),
            ));
        }
    }
}

/// Download the missing days of the window from the remote archive.
///
/// Returns the fetch summary and the local day directories which do not hold a complete day.
fn fetch_remote<C: ArchiveClient>(
    config: &Config,
    client: C,
    geometry: &DetectorGeometry,
    tx: &Sender<WorkerStatus>,
) -> Result<(FetchSummary, Vec<PathBuf>), ProcessorError> {
    let window = match config.selection_window()? {
        Some(window) => window,
        None => DateWindow::new(Date::MIN, Date::MAX),
    };
    let fetcher = Fetcher::new(client, geometry, &config.local_path);
    tx.send(WorkerStatus::new(0.0, Stage::Fetching, None))?;
    let plan = fetcher.plan(&config.remote_path, &window)?;
    if plan.is_empty() {
        return Err(FetchError::NoRemoteDays.into());
    }
    log::info!("{} calibration days to fetch", plan.len());

    let mut sent = Ok(());
    let summary = fetcher.fetch(&plan, status_forwarder(tx, Stage::Fetching, &mut sent))?;
    sent?;

    let bad_days = verify_local_tree(&config.local_path, geometry)?;
    if !bad_days.is_empty() {
        log::warn!(
            "{} local calibration days do not hold {} files and will be skipped",
            bad_days.len(),
            geometry.expected_files_per_day
        );
    }
    Ok((summary, bad_days))
}

/// The main loop of stk_status.
///
/// This takes in a config (and progress monitor) and runs one monitoring pass: fetch the
/// missing days if asked to, aggregate the local calibration days of the window, plot them and
/// optionally export them to HDF5.
pub fn process(config: &Config, tx: &Sender<WorkerStatus>) -> Result<ProcessSummary, ProcessorError> {
    process_with_client(config, XrootdClient::new(&config.remote_address), tx)
}

/// Same as [process] with a caller-supplied archive client
pub fn process_with_client<C: ArchiveClient>(
    config: &Config,
    client: C,
    tx: &Sender<WorkerStatus>,
) -> Result<ProcessSummary, ProcessorError> {
    let geometry = DetectorGeometry::default();
    // Validate the window before doing any work
    let window = config.selection_window()?;

    let (fetch, bad_days) = if config.fetch_remote {
        let (summary, bad_days) = fetch_remote(config, client, &geometry, tx)?;
        (Some(summary), bad_days)
    } else {
        (None, Vec::new())
    };

    log::info!(
        "Aggregating calibration days in {}",
        config.local_path.display()
    );
    tx.send(WorkerStatus::new(0.0, Stage::Aggregating, None))?;
    let mut sent = Ok(());
    let series = build_time_series(
        &config.local_path,
        window.as_ref(),
        &bad_days,
        &geometry,
        status_forwarder(tx, Stage::Aggregating, &mut sent),
    )?;
    sent?;

    let mut summary = ProcessSummary::from_series(&series);
    summary.fetch = fetch;

    tx.send(WorkerStatus::new(0.0, Stage::Plotting, None))?;
    summary.plots = Plotter::new(&config.output_path, &config.plots).plot_all(&series)?;

    if config.export_hdf {
        summary.hdf_path = export_hdf(config, &series)?;
    }

    tx.send(WorkerStatus::new(1.0, Stage::Done, None))?;
    log::info!(
        "Monitoring pass done: {} days from {} to {}",
        summary.n_days,
        summary
            .first_day
            .map(|d| d.to_string())
            .unwrap_or_default(),
        summary.last_day.map(|d| d.to_string()).unwrap_or_default()
    );
    Ok(summary)
}

#[cfg(feature = "hdf5")]
fn export_hdf(config: &Config, series: &TimeSeries) -> Result<Option<PathBuf>, ProcessorError> {
    let path = config.output_path.join(HDF_FILE_NAME);
    super::hdf_writer::export_series(&path, series, &config.plots)?;
    Ok(Some(path))
}

#[cfg(not(feature = "hdf5"))]
fn export_hdf(_config: &Config, _series: &TimeSeries) -> Result<Option<PathBuf>, ProcessorError> {
    log::warn!("HDF5 export requested but stk_status was built without the hdf5 feature");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cal_file::tests::make_cal_text;
    use crate::config::ConfigDate;
    use crate::error::AggregatorError;
    use crate::fetcher::tests::LocalArchive;
    use std::path::Path;
    use std::sync::mpsc::channel;

    /// Archive client that must never be reached
    struct NoArchive;

    impl ArchiveClient for NoArchive {
        fn list(&self, remote_dir: &str) -> Result<Vec<String>, FetchError> {
            panic!("unexpected listing of {remote_dir}")
        }

        fn copy_dir(&self, remote_dir: &str, _local_dir: &Path) -> Result<(), FetchError> {
            panic!("unexpected copy of {remote_dir}")
        }
    }

    /// Archive client with an empty remote root
    struct EmptyArchive;

    impl ArchiveClient for EmptyArchive {
        fn list(&self, _remote_dir: &str) -> Result<Vec<String>, FetchError> {
            Ok(Vec::new())
        }

        fn copy_dir(&self, _remote_dir: &str, _local_dir: &Path) -> Result<(), FetchError> {
            Ok(())
        }
    }

    /// Write `ladders_per_group` calibration files for every board group into day_dir
    fn write_ladders(day_dir: &Path, ladders_per_group: usize) {
        let geometry = DetectorGeometry::default();
        std::fs::create_dir_all(day_dir).unwrap();
        let text = make_cal_text(&geometry, |_| (221.5, 11.5, 3.0));
        for group in 0..geometry.n_board_groups {
            for ladder in 0..ladders_per_group {
                let path = day_dir.join(format!(
                    "{}_ladder{ladder:02}.cal",
                    geometry.board_group_prefix(group)
                ));
                std::fs::write(path, &text).unwrap();
            }
        }
    }

    fn write_full_day(root: &Path, name: &str) {
        write_ladders(&root.join(name), 1);
    }

    fn make_config(root: &Path) -> Config {
        Config {
            local_path: root.join("cal"),
            output_path: root.join("plots"),
            start_date: ConfigDate::new(2023, 1, 1),
            end_date: ConfigDate::new(2023, 1, 31),
            ..Default::default()
        }
    }

    #[test]
    fn test_local_pass() {
        let dir = tempfile::tempdir().unwrap();
        let config = make_config(dir.path());
        write_full_day(&config.local_path, "20230110");
        write_full_day(&config.local_path, "20230111");
        write_full_day(&config.local_path, "20230301");

        let (tx, rx) = channel();
        let summary = process_with_client(&config, NoArchive, &tx).unwrap();
        assert_eq!(summary.n_days, 2);
        assert!(summary.fetch.is_none());
        assert!(!summary.plots.is_empty());
        assert!(summary.plots.iter().all(|p| p.exists()));
        let (_, sigma) = summary.means[0];
        approx::assert_abs_diff_eq!(sigma, 3.0);

        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        assert_eq!(statuses.last().unwrap().stage, Stage::Done);
        assert!(statuses
            .iter()
            .any(|s| s.day.as_deref() == Some("20230111")));
    }

    #[test]
    fn test_empty_window_does_not_plot() {
        let dir = tempfile::tempdir().unwrap();
        let config = make_config(dir.path());
        write_full_day(&config.local_path, "20230301");

        let (tx, _rx) = channel();
        let err = process_with_client(&config, NoArchive, &tx).unwrap_err();
        assert!(err.is_no_data());
        assert!(matches!(
            err,
            ProcessorError::AggregatorError(AggregatorError::NoDataInWindow)
        ));
        assert!(!config.output_path.exists());
    }

    #[test]
    fn test_no_remote_days() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = make_config(dir.path());
        config.fetch_remote = true;

        let (tx, _rx) = channel();
        let err = process_with_client(&config, EmptyArchive, &tx).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::FetchError(FetchError::NoRemoteDays)
        ));
        assert!(err.is_no_data());
    }

    #[test]
    fn test_fetch_skips_incomplete_local_day() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = make_config(dir.path());
        config.fetch_remote = true;
        config.remote_path = String::from("/CAL/STK");
        let geometry = DetectorGeometry::default();
        let ladders_per_group = geometry.expected_files_per_day / geometry.n_board_groups;

        let remote = dir.path().join("remote");
        write_ladders(
            &remote.join("CAL/STK/20230110/STK_CALIB_RAW_001"),
            ladders_per_group,
        );
        // Left half-written by an interrupted pass, but with even board groups
        write_ladders(&config.local_path.join("20230112"), ladders_per_group / 2);

        let (tx, _rx) = channel();
        let summary = process_with_client(&config, LocalArchive { root: remote }, &tx).unwrap();
        let fetch = summary.fetch.unwrap();
        assert_eq!(fetch.downloaded.len(), 1);
        assert_eq!(summary.n_days, 1);
        assert_eq!(summary.first_day.unwrap().dir_name(), "20230110");
        assert_eq!(summary.last_day.unwrap().dir_name(), "20230110");
    }

    #[test]
    fn test_inverted_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = make_config(dir.path());
        config.start_date = ConfigDate::new(2024, 1, 1);
        let (tx, _rx) = channel();
        assert!(matches!(
            process_with_client(&config, NoArchive, &tx),
            Err(ProcessorError::ConfigError(_))
        ));
    }
}
