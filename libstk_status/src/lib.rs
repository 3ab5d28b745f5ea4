//! # stk_status
//!
//! stk_status monitors the noise of the silicon tracker (STK), written in Rust. It takes the
//! daily calibration files produced by the STK calibration runs, stored as one directory per
//! day (`YYYYMMDD`) holding one `.cal` file per ladder, and reduces every day to a handful of
//! summary statistics: mean sigma, mean raw sigma, mean pedestal, common noise and the
//! fraction of channels in three noise bands. The evolution of these statistics over a time
//! window is written out as SVG plots and, optionally, as an HDF5 file.
//!
//! ## Installation
//!
//! The only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### XRootD
//!
//! Fetching calibration days from the remote archive uses the XRootD command line tools
//! `xrdfs` and `xrdcp`, which must be in your path. They are not needed when working only
//! with calibration files already on disk.
//!
//! ### HDF5
//!
//! The HDF5 export is behind the `hdf5` cargo feature, which is off by default. To use it,
//! HDF5 must be installed. Typically this will be installed using a package manager
//! (homebrew, apt, etc), and the Rust libraries will auto detect the location of the HDF
//! install. If it is installed to a custom location, write the following snippet into the
//! file `.cargo/config.toml` in the stk_status repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### Building & Install
//!
//! To build and install the GUI use `cargo install --path ./stk_status` from the top level
//! repository, and `cargo install --path ./stk_status_cli` for the CLI. Add
//! `--features hdf5` to either to enable the HDF5 export.
//!
//! ## Configuration
//!
//! A configuration file saved using the UI is compatible with the CLI and vice-versa. The
//! YAML format of a configuration file is as follows:
//!
//! ```yml
//! remote_address: root://xrootd-dampe.cloud.ba.infn.it//
//! remote_path: /FM/FlightData/CAL/STK/
//! local_path: cal
//! output_path: plots
//! fetch_remote: false
//! apply_window: true
//! start_date: { year: 2016, month: 1, day: 1 }
//! end_date: { year: 2016, month: 12, day: 31 }
//! export_hdf: false
//! plots:
//!   x_interval_months: 1
//!   plot_sigma: true
//!   plot_pedestal: true
//!   plot_common_noise: true
//!   sigma_range: { min: 2.5, max: 3.5, bins: 100 }
//!   raw_sigma_range: { min: 11.0, max: 12.0, bins: 100 }
//!   pedestal_range: { min: 221.0, max: 222.0, bins: 100 }
//!   common_noise_range: { min: 10.0, max: 12.0, bins: 100 }
//!   value_bins: 100
//! ```
//!
//! - `fetch_remote`: download the complete calibration days of the window which are missing
//! from `local_path` before aggregating. Days already on disk are never downloaded again.
//! - `apply_window`: restrict the pass to the inclusive window `start_date`..`end_date`. If
//! false, every local calibration day is used.
//! - `plots`: which statistics to plot and the ranges of their distribution histograms. The
//! `plots` section may be omitted, in which case the defaults above are used.
//!
//! ## Calibration Files
//!
//! Every `.cal` file is a comma separated table with a header line followed by 387 data
//! rows. The zero-indexed data rows 383 to 385 are trailer rows and are dropped; row 386 is
//! kept, so 384 channel rows remain. Only the first six columns are used: channel, VA, VA
//! channel, pedestal, raw sigma and sigma. Pedestal and sigma values must be finite numbers.
//!
//! The files of a day are split into eight board groups by their `TRB00` to `TRB07` name
//! prefix. Every board group must hold the same number of files. A day missing a board
//! group, with uneven board groups or holding a malformed file is skipped with a warning.
//!
//! ## Output
//!
//! stk_status writes the SVG plots into `output_path`: the time evolution of every
//! statistic, a combined plot of the channel fractions, the distributions of the four
//! ladder statistics and their 2D time/value histograms. The log file contains the detailed
//! status of the pass, including every skipped day and why.
//!
//! ### HDF5 Data Format
//!
//! ```text
//! stk_status.h5
//! series - first_day, last_day, n_days, version
//! |---- days(dset)
//! |---- sigma, sigma_raw, pedestal, cn, chfrac_s5, chfrac_s510, chfrac_s10 (dset)
//! channel_sigma - min, max, bins
//! |---- day_YYYYMMDD(dset) - underflow, overflow
//! time_density
//! |---- sigma, sigma_raw, pedestal, cn (dset) - x_min, x_max, y_min, y_max
//! ```
pub mod aggregator;
pub mod cal_day;
pub mod cal_file;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod file_set;
#[cfg(feature = "hdf5")]
pub mod hdf_writer;
pub mod histogram;
pub mod plot;
pub mod process;
pub mod reduction;
pub mod series;
pub mod worker_status;
