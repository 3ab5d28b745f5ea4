//! # stk_status
//!
//! Part of the stk_status crate family.
//!
//! This is the dashboard for the STK noise monitoring, with a GUI using
//! [egui](https://github.com/emilk/egui).
//!
//! ## Install
//!
//! Use `cargo install --path ./stk_status`
//!
//! ## Use
//!
//! To launch the application simply invoke it after it is installed
//!
//! ```bash
//! stk_status
//! ```
//!
//! Fill out the configuration fields and click the run button to run a monitoring pass.
//!
//! ## Configuration
//!
//! The following configuration controls are available in the GUI:
//!
//! - Fetch from remote archive: If checked, the calibration days of the window missing from the
//! calibration directory are downloaded over XRootD first.
//!   - Remote address, Remote path: Only available when fetching. The XRootD server and the
//!   archive directory holding the day directories.
//! - Calibration directory: The local directory holding one `YYYYMMDD` directory per day.
//! - Output directory: The directory to which the SVG plots (and the HDF5 export) are written.
//! - Restrict to date window: If checked, only days between Start and End (inclusive) are used.
//! - Date label interval: Spacing of the date labels of the time plots, in months.
//! - Sigma & raw sigma, Pedestal, Common noise: Which statistics to plot. The channel fractions
//! follow the sigma toggle.
//! - Export to HDF5: Requires the `hdf5` feature.
//!
//! Configurations can be saved using File->Save and loaded using File->Open

mod app;
use app::StatusApp;
use std::fs::File;

/// The program entry point
fn main() {
    // Setup logging to a file
    match File::create("./stk_status.log") {
        Ok(file) => {
            if let Err(e) = simplelog::WriteLogger::init(
                simplelog::LevelFilter::Info,
                simplelog::ConfigBuilder::new()
                    .set_thread_level(simplelog::LevelFilter::Info)
                    .build(),
                file,
            ) {
                eprintln!("Could not initialize logging: {e}");
            }
        }
        Err(e) => eprintln!("Could not create log file: {e}"),
    }
    log::info!("Starting STK Status UI");

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("STK Status")
            .with_inner_size(eframe::epaint::vec2(640.0, 640.0))
            .with_min_inner_size(eframe::epaint::vec2(600.0, 400.0)),
        ..Default::default()
    };
    match eframe::run_native(
        "stk_status",
        native_options,
        Box::new(|cc| Ok(Box::new(StatusApp::new(cc)))),
    ) {
        Ok(()) => (),
        Err(e) => log::error!("Eframe error: {}", e),
    }
}
