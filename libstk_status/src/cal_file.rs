use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::constants::{DetectorGeometry, HIGH_NOISE_THRESHOLD, LOW_NOISE_THRESHOLD};
use super::error::CalFileError;

// Column layout of a calibration file
const CHANNEL_COLUMN: usize = 0;
const VA_COLUMN: usize = 1;
const VA_CHANNEL_COLUMN: usize = 2;
const PEDESTAL_COLUMN: usize = 3;
const RAW_SIGMA_COLUMN: usize = 4;
const SIGMA_COLUMN: usize = 5;
const MIN_COLUMNS: usize = super::constants::CONSUMED_COLUMNS;

/// One readout channel of a ladder calibration
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRow {
    pub channel: u32,
    pub va: u32,
    pub va_channel: u32,
    pub pedestal: f64,
    /// Noise before common-mode correction
    pub raw_sigma: f64,
    /// Noise after common-mode correction
    pub sigma: f64,
}

/// The statistics derived from a single ladder calibration file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LadderStats {
    pub sigma_mean: f64,
    pub raw_sigma_mean: f64,
    pub pedestal_mean: f64,
    pub common_noise: f64,
    /// Channels with sigma < 5
    pub n_low_noise: usize,
    /// Channels with 5 <= sigma <= 10
    pub n_mid_noise: usize,
    /// Channels with sigma > 10
    pub n_high_noise: usize,
    pub sigmas: Vec<f64>,
}

/// Common-mode noise estimate of a ladder, sqrt(raw_sigma^2 - sigma^2).
///
/// A negative radicand (raw noise below corrected noise) is clamped to zero.
pub fn common_noise(raw_sigma_mean: f64, sigma_mean: f64) -> f64 {
    (raw_sigma_mean.powi(2) - sigma_mean.powi(2)).max(0.0).sqrt()
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    values.sum::<f64>() / n as f64
}

/// A parsed ladder calibration file with the trailer rows removed
#[derive(Debug, Clone)]
pub struct CalFile {
    path: PathBuf,
    rows: Vec<ChannelRow>,
}

impl CalFile {
    /// Read and parse the calibration file at path
    pub fn read(path: &Path, geometry: &DetectorGeometry) -> Result<Self, CalFileError> {
        if !path.exists() {
            return Err(CalFileError::BadFilePath(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, path, geometry)
    }

    /// Parse calibration data from any reader. The path is only kept for reporting.
    ///
    /// The first line is a header. Exactly `rows_per_file` data rows must follow; the trailer rows
    /// are dropped without looking at their content.
    pub fn from_reader<R: Read>(
        reader: R,
        path: &Path,
        geometry: &DetectorGeometry,
    ) -> Result<Self, CalFileError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows: Vec<ChannelRow> = Vec::with_capacity(geometry.retained_rows());
        let mut n_rows: usize = 0;
        for (idx, record) in csv_reader.records().enumerate() {
            let record = record?;
            n_rows += 1;
            if geometry.trailer_rows.contains(&idx) {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.len() < MIN_COLUMNS {
                return Err(CalFileError::TooFewColumns {
                    line,
                    found: record.len(),
                    expected: MIN_COLUMNS,
                });
            }
            rows.push(ChannelRow {
                channel: parse_field(&record, CHANNEL_COLUMN, line)?,
                va: parse_field(&record, VA_COLUMN, line)?,
                va_channel: parse_field(&record, VA_CHANNEL_COLUMN, line)?,
                pedestal: parse_statistic(&record, PEDESTAL_COLUMN, line)?,
                raw_sigma: parse_statistic(&record, RAW_SIGMA_COLUMN, line)?,
                sigma: parse_statistic(&record, SIGMA_COLUMN, line)?,
            });
        }

        if n_rows != geometry.rows_per_file {
            return Err(CalFileError::BadRowCount(n_rows, geometry.rows_per_file));
        }

        Ok(Self {
            path: path.to_path_buf(),
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[ChannelRow] {
        &self.rows
    }

    /// Compute the per-ladder statistics of this file
    pub fn ladder_stats(&self) -> LadderStats {
        let sigma_mean = mean(self.rows.iter().map(|r| r.sigma));
        let raw_sigma_mean = mean(self.rows.iter().map(|r| r.raw_sigma));
        let pedestal_mean = mean(self.rows.iter().map(|r| r.pedestal));
        if raw_sigma_mean < sigma_mean {
            log::warn!(
                "Ladder {} has raw sigma {raw_sigma_mean:.4} below sigma {sigma_mean:.4}; common noise clamped to 0",
                self.path.display()
            );
        }

        let mut stats = LadderStats {
            sigma_mean,
            raw_sigma_mean,
            pedestal_mean,
            common_noise: common_noise(raw_sigma_mean, sigma_mean),
            sigmas: Vec::with_capacity(self.rows.len()),
            ..Default::default()
        };
        for row in self.rows.iter() {
            if row.sigma < LOW_NOISE_THRESHOLD {
                stats.n_low_noise += 1;
            } else if row.sigma <= HIGH_NOISE_THRESHOLD {
                stats.n_mid_noise += 1;
            } else {
                stats.n_high_noise += 1;
            }
            stats.sigmas.push(row.sigma);
        }
        stats
    }
}

fn parse_field<T: FromStr>(
    record: &csv::StringRecord,
    column: usize,
    line: u64,
) -> Result<T, CalFileError> {
    let value = record.get(column).unwrap_or_default();
    value.parse::<T>().map_err(|_| CalFileError::BadField {
        line,
        column,
        value: value.to_string(),
    })
}

/// Statistic columns must hold finite numbers; `nan` and `inf` parse as f64 but are rejected
fn parse_statistic(record: &csv::StringRecord, column: usize, line: u64) -> Result<f64, CalFileError> {
    let value: f64 = parse_field(record, column, line)?;
    if !value.is_finite() {
        return Err(CalFileError::BadField {
            line,
            column,
            value: record.get(column).unwrap_or_default().to_string(),
        });
    }
    Ok(value)
}

//Unit tests
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Build the text of a calibration file. Every channel gets the values returned by `values`
    /// as (pedestal, raw_sigma, sigma); the trailer rows are filled with junk.
    pub(crate) fn make_cal_text(
        geometry: &DetectorGeometry,
        values: impl Fn(usize) -> (f64, f64, f64),
    ) -> String {
        let mut text = String::from("ch,va,chva,ped,sigma_raw,sigma,status,status_2,status_3\n");
        for idx in 0..geometry.rows_per_file {
            if geometry.trailer_rows.contains(&idx) {
                text.push_str("trailer,not,numeric\n");
                continue;
            }
            let (ped, raw, sigma) = values(idx);
            text.push_str(&format!(
                "{idx}, {}, {}, {ped}, {raw}, {sigma}, 0, 0, 0\n",
                idx / 64,
                idx % 64
            ));
        }
        text
    }

    fn parse(text: &str) -> Result<CalFile, CalFileError> {
        CalFile::from_reader(
            text.as_bytes(),
            Path::new("TRB00_test.cal"),
            &DetectorGeometry::default(),
        )
    }

    #[test]
    fn test_trailer_rows_dropped() {
        let geometry = DetectorGeometry::default();
        let text = make_cal_text(&geometry, |_| (220.0, 11.0, 3.0));
        let file = parse(&text).unwrap();
        assert_eq!(file.rows().len(), 384);
        // Row 386 survives, rows 383-385 do not
        assert_eq!(file.rows()[382].channel, 382);
        assert_eq!(file.rows()[383].channel, 386);
    }

    #[test]
    fn test_trailer_content_ignored() {
        let geometry = DetectorGeometry::default();
        // Trailer rows carrying huge but numeric values must not change the statistics
        let mut text = String::from("header\n");
        for idx in 0..geometry.rows_per_file {
            if geometry.trailer_rows.contains(&idx) {
                text.push_str(&format!("{idx},0,0,99999,99999,99999,0,0,0\n"));
            } else {
                text.push_str(&format!("{idx},0,0,221,5,3,0,0,0\n"));
            }
        }
        let stats = parse(&text).unwrap().ladder_stats();
        assert_abs_diff_eq!(stats.sigma_mean, 3.0);
        assert_abs_diff_eq!(stats.raw_sigma_mean, 5.0);
        assert_abs_diff_eq!(stats.pedestal_mean, 221.0);
        assert_eq!(stats.sigmas.len(), 384);
    }

    #[test]
    fn test_common_noise() {
        assert_abs_diff_eq!(common_noise(5.0, 3.0), 4.0);
        assert_abs_diff_eq!(common_noise(3.0, 5.0), 0.0);
        let geometry = DetectorGeometry::default();
        let text = make_cal_text(&geometry, |_| (221.0, 5.0, 3.0));
        let stats = parse(&text).unwrap().ladder_stats();
        assert_abs_diff_eq!(stats.common_noise, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_channel_counts() {
        let geometry = DetectorGeometry::default();
        let text = make_cal_text(&geometry, |idx| {
            let sigma = match idx % 4 {
                0 => 4.99,
                1 => 5.0,
                2 => 10.0,
                _ => 10.01,
            };
            (221.0, 12.0, sigma)
        });
        let stats = parse(&text).unwrap().ladder_stats();
        assert_eq!(stats.n_low_noise + stats.n_mid_noise + stats.n_high_noise, 384);
        // Row 386 survives the trailer cut, rows 383-385 do not
        assert_eq!(stats.n_low_noise, 96);
        assert_eq!(stats.n_mid_noise, 193);
        assert_eq!(stats.n_high_noise, 95);
    }

    #[test]
    fn test_bad_row_count() {
        let geometry = DetectorGeometry::default();
        let mut text = make_cal_text(&geometry, |_| (221.0, 5.0, 3.0));
        text.push_str("387,6,3,221,5,3,0,0,0\n");
        assert!(matches!(
            parse(&text),
            Err(CalFileError::BadRowCount(388, 387))
        ));
    }

    #[test]
    fn test_bad_field() {
        let geometry = DetectorGeometry::default();
        let text = make_cal_text(&geometry, |_| (221.0, 5.0, 3.0)).replacen(", 221, 5, 3,", ", 221, five, 3,", 1);
        match parse(&text) {
            Err(CalFileError::BadField { column, value, .. }) => {
                assert_eq!(column, RAW_SIGMA_COLUMN);
                assert_eq!(value, "five");
            }
            other => panic!("expected a bad field error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_field() {
        let geometry = DetectorGeometry::default();
        for bad in ["nan", "NaN", "inf", "-inf"] {
            let text = make_cal_text(&geometry, |_| (221.0, 5.0, 3.0))
                .replacen(", 221, 5, 3,", &format!(", 221, 5, {bad},"), 1);
            match parse(&text) {
                Err(CalFileError::BadField { column, value, .. }) => {
                    assert_eq!(column, SIGMA_COLUMN);
                    assert_eq!(value, bad);
                }
                other => panic!("expected a bad field error for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_too_few_columns() {
        let geometry = DetectorGeometry::default();
        let text = make_cal_text(&geometry, |_| (221.0, 5.0, 3.0)).replacen("0, 0, 221, 5, 3, 0, 0, 0", "0, 0, 221", 1);
        assert!(matches!(
            parse(&text),
            Err(CalFileError::TooFewColumns { found: 4, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TRB00_missing.cal");
        assert!(matches!(
            CalFile::read(&path, &DetectorGeometry::default()),
            Err(CalFileError::BadFilePath(_))
        ));
    }
}
