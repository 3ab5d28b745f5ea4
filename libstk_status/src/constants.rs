use std::ops::Range;

/// Number of electronics readout boards (TRB) in the tracker
pub const NUMBER_OF_BOARD_GROUPS: usize = 8;
/// Filename prefix of a board group; the group index follows directly
pub const BOARD_PREFIX: &str = "TRB0";
/// Readout channels on a single ladder
pub const CHANNELS_PER_LADDER: usize = 384;
/// Data rows of a calibration file, excluding the header line
pub const ROWS_PER_CAL_FILE: usize = 387;
/// Zero-indexed rows of a calibration file that never hold channel data
pub const TRAILER_ROWS: Range<usize> = 383..386;
/// Columns of a calibration file that the aggregation consumes
pub const CONSUMED_COLUMNS: usize = 6;
pub const CAL_FILE_EXTENSION: &str = ".cal";
/// Calibration files in one complete calibration day (8 boards x 24 ladders)
pub const EXPECTED_FILES_PER_DAY: usize = 192;
/// Every calibration day directory starts with the century
pub const DAY_PREFIX: &str = "20";
/// Marker in the name of the remote subdirectory holding the raw calibration files
pub const RAW_DIR_MARKER: &str = "RAW";

// Channel quality thresholds on sigma, in ADC counts
pub const LOW_NOISE_THRESHOLD: f64 = 5.0;
pub const HIGH_NOISE_THRESHOLD: f64 = 10.0;

/// Fixed detector layout, handed explicitly to discovery, extraction and reduction.
///
/// The default is the flight layout. Tests (or a different detector) can build their own.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorGeometry {
    pub n_board_groups: usize,
    pub board_prefix: String,
    pub channels_per_ladder: usize,
    pub rows_per_file: usize,
    pub trailer_rows: Range<usize>,
    pub cal_extension: String,
    pub expected_files_per_day: usize,
    pub day_prefix: String,
    pub raw_dir_marker: String,
}

impl Default for DetectorGeometry {
    fn default() -> Self {
        Self {
            n_board_groups: NUMBER_OF_BOARD_GROUPS,
            board_prefix: String::from(BOARD_PREFIX),
            channels_per_ladder: CHANNELS_PER_LADDER,
            rows_per_file: ROWS_PER_CAL_FILE,
            trailer_rows: TRAILER_ROWS,
            cal_extension: String::from(CAL_FILE_EXTENSION),
            expected_files_per_day: EXPECTED_FILES_PER_DAY,
            day_prefix: String::from(DAY_PREFIX),
            raw_dir_marker: String::from(RAW_DIR_MARKER),
        }
    }
}

impl DetectorGeometry {
    /// Filename prefix of a given board group, e.g. `TRB03`
    pub fn board_group_prefix(&self, group: usize) -> String {
        format!("{}{}", self.board_prefix, group)
    }

    /// Rows left in a calibration file once the trailer is removed
    pub fn retained_rows(&self) -> usize {
        self.rows_per_file - self.trailer_rows.len()
    }

    pub fn is_cal_file_name(&self, name: &str) -> bool {
        name.ends_with(&self.cal_extension)
    }
}
