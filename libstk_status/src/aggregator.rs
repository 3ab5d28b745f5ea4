use std::path::{Path, PathBuf};

use super::cal_day::{find_calibration_days, CalDay, DateWindow};
use super::cal_file::CalFile;
use super::constants::DetectorGeometry;
use super::error::{AggregatorError, CalDayError};
use super::file_set::BoardFileSet;
use super::reduction::DayAggregate;
use super::series::TimeSeries;

/// Reported to the observer once a calibration day has been handled
#[derive(Debug, Clone, PartialEq)]
pub struct DayProgress {
    pub day: CalDay,
    pub processed: usize,
    pub total: usize,
    /// The day could not be used and is missing from the series
    pub skipped: bool,
}

impl DayProgress {
    pub fn fraction(&self) -> f32 {
        self.processed as f32 / self.total as f32
    }
}

/// Read every calibration file of a day directory and reduce them
pub fn aggregate_day(
    day_dir: &Path,
    geometry: &DetectorGeometry,
) -> Result<DayAggregate, CalDayError> {
    let file_set = BoardFileSet::discover(day_dir, geometry)?;
    if let Some(group) = file_set.first_empty_group() {
        return Err(CalDayError::EmptyBoardGroup(group));
    }
    if let Some(group) = file_set.first_uneven_group() {
        return Err(CalDayError::UnevenBoardGroups {
            group,
            found: file_set.groups()[group].len(),
            expected: file_set.groups()[0].len(),
        });
    }

    let mut ladders = Vec::with_capacity(file_set.groups().len());
    for group in file_set.groups() {
        let mut group_stats = Vec::with_capacity(group.len());
        for path in group {
            let cal_file =
                CalFile::read(path, geometry).map_err(|e| CalDayError::BadFile(path.clone(), e))?;
            group_stats.push(cal_file.ladder_stats());
        }
        ladders.push(group_stats);
    }
    DayAggregate::reduce(&ladders, geometry)
}

/// Build the time series of the calibration days found under root.
///
/// Days are handled one at a time in ascending date order. A day that cannot be used (missing
/// or uneven board group, malformed file, listed in `exclude`) is skipped with a warning. The
/// observer is called after every day, skipped or not.
pub fn build_time_series(
    root: &Path,
    window: Option<&DateWindow>,
    exclude: &[PathBuf],
    geometry: &DetectorGeometry,
    mut on_day: impl FnMut(&DayProgress),
) -> Result<TimeSeries, AggregatorError> {
    let days = find_calibration_days(root, &geometry.day_prefix, window)?;
    if days.is_empty() {
        return Err(AggregatorError::NoDataInWindow);
    }
    log::info!(
        "Found {} calibration days in {}",
        days.len(),
        root.display()
    );

    let total = days.len();
    let mut series = TimeSeries::new();
    let mut n_skipped = 0;
    for (idx, day_dir) in days.iter().enumerate() {
        let result = if exclude.contains(&day_dir.path) {
            Err(CalDayError::IncompleteDay(day_dir.path.clone()))
        } else {
            aggregate_day(&day_dir.path, geometry)
        };
        let skipped = match result {
            Ok(aggregate) => {
                log::debug!(
                    "Calibration day {}: sigma {:.4}, common noise {:.4}",
                    day_dir.day,
                    aggregate.sigma,
                    aggregate.common_noise
                );
                series.push(day_dir.day, aggregate);
                false
            }
            Err(e) => {
                log::warn!("Skipping calibration day {}: {e}", day_dir.day);
                n_skipped += 1;
                true
            }
        };
        on_day(&DayProgress {
            day: day_dir.day,
            processed: idx + 1,
            total,
            skipped,
        });
    }

    if series.is_empty() {
        return Err(AggregatorError::NoUsableDays(total));
    }
    log::info!(
        "Aggregated {} calibration days ({} skipped)",
        series.len(),
        n_skipped
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cal_file::tests::make_cal_text;
    use crate::series::Statistic;
    use approx::assert_abs_diff_eq;
    use std::path::PathBuf;
    use time::macros::date;

    fn small_geometry() -> DetectorGeometry {
        DetectorGeometry {
            n_board_groups: 2,
            ..Default::default()
        }
    }

    /// Write a day with `ladders_per_group` files in every group; every channel has the given
    /// (pedestal, raw_sigma, sigma)
    fn write_day(root: &Path, name: &str, ladders_per_group: usize, values: (f64, f64, f64)) -> PathBuf {
        let geometry = small_geometry();
        let day_dir = root.join(name);
        std::fs::create_dir_all(&day_dir).unwrap();
        let text = make_cal_text(&geometry, |_| values);
        for group in 0..geometry.n_board_groups {
            for ladder in 0..ladders_per_group {
                let file_name = format!("{}_ladder{ladder:02}.cal", geometry.board_group_prefix(group));
                std::fs::write(day_dir.join(file_name), &text).unwrap();
            }
        }
        day_dir
    }

    #[test]
    fn test_aggregate_day() {
        let root = tempfile::tempdir().unwrap();
        let day_dir = write_day(root.path(), "20230101", 2, (221.0, 5.0, 3.0));
        let day = aggregate_day(&day_dir, &small_geometry()).unwrap();
        assert_abs_diff_eq!(day.sigma, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(day.raw_sigma, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(day.common_noise, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(day.frac_low_noise, 1.0, epsilon = 1e-12);
        assert_eq!(day.channel_sigmas.len(), 4 * 384);
        assert_eq!(day.ladders.sigma.len(), 4);
    }

    #[test]
    fn test_window_keeps_single_day() {
        let root = tempfile::tempdir().unwrap();
        for name in ["20230101", "20230115", "20230201"] {
            write_day(root.path(), name, 1, (221.0, 5.0, 3.0));
        }
        let window = DateWindow::new(date!(2023 - 01 - 10), date!(2023 - 01 - 31));
        let series = build_time_series(root.path(), Some(&window), &[], &small_geometry(), |_| {}).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.days()[0].dir_name(), "20230115");
        assert_eq!(series.values(Statistic::Sigma).len(), 1);
    }

    #[test]
    fn test_empty_window_short_circuits() {
        let root = tempfile::tempdir().unwrap();
        write_day(root.path(), "20230101", 1, (221.0, 5.0, 3.0));
        let window = DateWindow::new(date!(2024 - 01 - 01), date!(2024 - 12 - 31));
        let mut calls = 0;
        let result = build_time_series(root.path(), Some(&window), &[], &small_geometry(), |_| calls += 1);
        assert!(matches!(result, Err(AggregatorError::NoDataInWindow)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_series_ordered_by_name() {
        let root = tempfile::tempdir().unwrap();
        for (name, sigma) in [("20230301", 3.3), ("20221215", 3.1), ("20230110", 3.2)] {
            write_day(root.path(), name, 1, (221.0, 5.0, sigma));
        }
        let mut progress = Vec::new();
        let series =
            build_time_series(root.path(), None, &[], &small_geometry(), |p| progress.push(p.clone())).unwrap();
        let names: Vec<String> = series.days().iter().map(|d| d.dir_name()).collect();
        assert_eq!(names, vec!["20221215", "20230110", "20230301"]);
        assert!(series.days().windows(2).all(|w| w[0] <= w[1]));
        let sigmas = series.values(Statistic::Sigma);
        assert_abs_diff_eq!(sigmas[0], 3.1, epsilon = 1e-12);
        assert_abs_diff_eq!(sigmas[2], 3.3, epsilon = 1e-12);
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[2].processed, 3);
        assert_abs_diff_eq!(progress[2].fraction(), 1.0);
    }

    #[test]
    fn test_bad_days_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_day(root.path(), "20230101", 1, (221.0, 5.0, 3.0));
        // Malformed file
        let bad = write_day(root.path(), "20230102", 1, (221.0, 5.0, 3.0));
        std::fs::write(bad.join("TRB01_ladder00.cal"), "ch,va\n1,2\n").unwrap();
        // Missing board group
        let incomplete = write_day(root.path(), "20230103", 1, (221.0, 5.0, 3.0));
        std::fs::remove_file(incomplete.join("TRB00_ladder00.cal")).unwrap();

        let mut skipped = Vec::new();
        let series = build_time_series(root.path(), None, &[], &small_geometry(), |p| {
            if p.skipped {
                skipped.push(p.day.dir_name())
            }
        })
        .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(skipped, vec!["20230102", "20230103"]);
    }

    #[test]
    fn test_uneven_day_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_day(root.path(), "20230101", 2, (221.0, 5.0, 3.0));
        // Board group 0 misses a ladder, so the channel fraction would exceed 1
        let short = write_day(root.path(), "20230102", 2, (221.0, 5.0, 3.0));
        std::fs::remove_file(short.join("TRB00_ladder01.cal")).unwrap();

        assert!(matches!(
            aggregate_day(&short, &small_geometry()),
            Err(CalDayError::UnevenBoardGroups {
                group: 1,
                found: 2,
                expected: 1
            })
        ));

        let mut progress = Vec::new();
        let series =
            build_time_series(root.path(), None, &[], &small_geometry(), |p| progress.push(p.clone())).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.days()[0].dir_name(), "20230101");
        assert!(!progress[0].skipped);
        assert!(progress[1].skipped);
        assert!(series.values(Statistic::FracLowNoise).iter().all(|f| *f <= 1.0));
    }

    #[test]
    fn test_excluded_day_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_day(root.path(), "20230101", 1, (221.0, 5.0, 3.0));
        let excluded = write_day(root.path(), "20230102", 1, (221.0, 5.0, 3.0));
        let mut skipped = Vec::new();
        let series = build_time_series(root.path(), None, &[excluded], &small_geometry(), |p| {
            if p.skipped {
                skipped.push(p.day.dir_name())
            }
        })
        .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(skipped, vec!["20230102"]);
    }

    #[test]
    fn test_all_days_bad() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("20230101")).unwrap();
        let result = build_time_series(root.path(), None, &[], &small_geometry(), |_| {});
        assert!(matches!(result, Err(AggregatorError::NoUsableDays(1))));
    }
}
