use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

use eframe::egui::{Color32, DragValue, ProgressBar, RichText};
use native_dialog::FileDialog;

use libstk_status::config::{Config, ConfigDate};
use libstk_status::error::ProcessorError;
use libstk_status::process::{process, ProcessSummary};
use libstk_status::worker_status::{Stage, WorkerStatus};

const LOG_FILE_NAME: &str = "stk_status.log";

fn render_error_dialog(show: &mut bool, message: &str, ctx: &eframe::egui::Context) {
    eframe::egui::Window::new("Error")
        .open(show)
        .show(ctx, |ui| {
            ui.label(message);
            ui.label(format!(
                "Check the log file {LOG_FILE_NAME} for more information."
            ));
        });
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Year, month and day drag values for a date of the window
fn date_row(ui: &mut eframe::egui::Ui, label: &str, date: &mut ConfigDate) {
    ui.label(label);
    ui.horizontal(|ui| {
        ui.add(DragValue::new(&mut date.year).speed(1).range(2000..=2100));
        ui.add(DragValue::new(&mut date.month).speed(1).range(1..=12));
        ui.add(DragValue::new(&mut date.day).speed(1).range(1..=31));
    });
    ui.end_row();
}

/// Pick a directory, starting from the working directory
fn pick_dir() -> Option<PathBuf> {
    match FileDialog::new()
        .set_location(&current_dir())
        .show_open_single_dir()
    {
        Ok(path) => path,
        Err(e) => {
            log::error!("Directory dialog failed: {e}");
            None
        }
    }
}

/// The UI app which inherits the eframe::App trait.
///
/// The parent for all processing.
#[derive(Debug)]
pub struct StatusApp {
    config: Config,
    worker: Option<JoinHandle<Result<ProcessSummary, ProcessorError>>>, //processing thread
    status: WorkerStatus,
    summary: Option<ProcessSummary>,
    show_error_window: bool,
    error_message: String,
    worker_rx: mpsc::Receiver<WorkerStatus>,
    worker_tx: mpsc::Sender<WorkerStatus>,
}

impl StatusApp {
    /// Create the application
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut visuals = eframe::egui::Visuals::dark();
        visuals.override_text_color = Some(Color32::LIGHT_GRAY);
        cc.egui_ctx.set_visuals(visuals);
        let (tx, rx) = mpsc::channel::<WorkerStatus>();
        StatusApp {
            config: Config::default(),
            worker: None,
            status: WorkerStatus::default(),
            summary: None,
            show_error_window: false,
            error_message: String::new(),
            worker_rx: rx,
            worker_tx: tx,
        }
    }

    /// Start a monitoring pass on a worker thread
    fn start_worker(&mut self) {
        // Safety first
        if self.worker.is_none() {
            self.status = WorkerStatus::default();
            self.summary = None;
            let conf = self.config.clone();
            let tx = self.worker_tx.clone();
            self.worker = Some(std::thread::spawn(move || process(&conf, &tx)));
        }
    }

    fn show_error(&mut self, message: String) {
        self.error_message = message;
        self.show_error_window = true;
    }

    /// Collect the result of a finished worker
    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(Ok(summary)) => {
                    log::info!("Monitoring pass complete: {} days", summary.n_days);
                    self.summary = Some(summary);
                }
                Ok(Err(e)) if e.is_no_data() => {
                    log::warn!("{e}");
                    self.show_error(e.to_string());
                }
                Ok(Err(e)) => {
                    log::error!("Processor error: {e}");
                    self.show_error(String::from("The monitoring pass failed."));
                }
                Err(_) => {
                    log::error!("An error occured joining the worker!");
                    self.show_error(String::from("The monitoring pass failed."));
                }
            }
        }
    }

    fn is_worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Write the current Config to a file
    fn write_config(&mut self, path: &Path) {
        if let Err(e) = self.config.write_config_file(path) {
            log::error!("Could not write config to {}: {e}", path.display());
            self.show_error(format!("Could not write config to {}", path.display()));
        }
    }

    /// Read the Config from a file
    fn read_config(&mut self, path: &Path) {
        match Config::read_config_file(path) {
            Ok(conf) => self.config = conf,
            Err(e) => {
                log::error!("{e}");
                self.show_error(e.to_string());
            }
        }
    }

    fn poll_messages(&mut self) {
        // Keep only the latest status
        while let Ok(status) = self.worker_rx.try_recv() {
            self.status = status;
        }
    }

    fn render_summary(&self, ui: &mut eframe::egui::Ui) {
        let Some(summary) = &self.summary else {
            ui.label("No pass run yet");
            return;
        };
        eframe::egui::Grid::new("SummaryGrid")
            .striped(true)
            .show(ui, |ui| {
                ui.label("Calibration days");
                ui.label(summary.n_days.to_string());
                ui.end_row();
                if let (Some(first), Some(last)) = (summary.first_day, summary.last_day) {
                    ui.label("Span");
                    ui.label(format!("{first} to {last}"));
                    ui.end_row();
                }
                if let Some(fetch) = &summary.fetch {
                    ui.label("Downloaded");
                    ui.label(format!(
                        "{} days ({}), {} incomplete",
                        fetch.downloaded.len(),
                        fetch.human_size(),
                        fetch.incomplete.len()
                    ));
                    ui.end_row();
                }
                for (stat, mean) in summary.means.iter() {
                    ui.label(stat.label());
                    ui.label(format!("{mean:.4}"));
                    ui.end_row();
                }
                ui.label("Plots");
                ui.label(format!(
                    "{} in {}",
                    summary.plots.len(),
                    self.config.output_path.display()
                ));
                ui.end_row();
            });
    }
}

impl eframe::App for StatusApp {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        self.poll_messages();
        render_error_dialog(&mut self.show_error_window, &self.error_message, ctx);
        eframe::egui::CentralPanel::default().show(ctx, |ui| {
            //Menus
            ui.menu_button("File", |ui| {
                if ui.button("Open...").clicked() {
                    match FileDialog::new()
                        .set_location(&current_dir())
                        .add_filter("YAML file", &["yaml", "yml"])
                        .show_open_single_file()
                    {
                        Ok(Some(path)) => self.read_config(&path),
                        Ok(None) => (),
                        Err(e) => log::error!("File dialog failed: {e}"),
                    }
                }
                if ui.button("Save...").clicked() {
                    match FileDialog::new()
                        .set_location(&current_dir())
                        .add_filter("YAML file", &["yaml", "yml"])
                        .show_save_single_file()
                    {
                        Ok(Some(path)) => self.write_config(&path),
                        Ok(None) => (),
                        Err(e) => log::error!("File dialog failed: {e}"),
                    }
                }
            });

            //Config
            ui.separator();
            ui.label(
                RichText::new("Configuration")
                    .color(Color32::LIGHT_BLUE)
                    .size(18.0),
            );
            eframe::egui::Grid::new("ConfigGrid").show(ui, |ui| {
                ui.checkbox(&mut self.config.fetch_remote, "Fetch from remote archive");
                ui.end_row();
                if self.config.fetch_remote {
                    ui.label("Remote address:");
                    ui.text_edit_singleline(&mut self.config.remote_address);
                    ui.end_row();
                    ui.label("Remote path:");
                    ui.text_edit_singleline(&mut self.config.remote_path);
                    ui.end_row();
                }

                //Calibration directory
                ui.label(format!(
                    "Calibration directory: {}",
                    self.config.local_path.display()
                ));
                if ui.button("Open...").clicked() {
                    if let Some(path) = pick_dir() {
                        self.config.local_path = path;
                    }
                }
                ui.end_row();

                //Output directory
                ui.label(format!(
                    "Output directory: {}",
                    self.config.output_path.display()
                ));
                if ui.button("Open...").clicked() {
                    if let Some(path) = pick_dir() {
                        self.config.output_path = path;
                    }
                }
                ui.end_row();

                ui.checkbox(&mut self.config.apply_window, "Restrict to date window");
                ui.end_row();
                if self.config.apply_window {
                    date_row(ui, "Start (Y M D)", &mut self.config.start_date);
                    date_row(ui, "End (Y M D)", &mut self.config.end_date);
                }

                ui.label("Date label interval (months)");
                ui.add(
                    DragValue::new(&mut self.config.plots.x_interval_months)
                        .speed(1)
                        .range(0..=24),
                );
                ui.end_row();

                ui.checkbox(&mut self.config.plots.plot_sigma, "Sigma & raw sigma");
                ui.checkbox(&mut self.config.plots.plot_pedestal, "Pedestal");
                ui.checkbox(&mut self.config.plots.plot_common_noise, "Common noise");
                ui.end_row();

                ui.checkbox(&mut self.config.export_hdf, "Export to HDF5");
                ui.end_row();
            });

            //Controls
            // You can only click run if there isn't already someone working
            if ui
                .add_enabled(self.worker.is_none(), eframe::egui::Button::new("Run"))
                .clicked()
            {
                log::info!("Starting monitoring pass...");
                self.start_worker();
            } else if !self.is_worker_alive() {
                self.stop_worker();
            }

            //Progress
            ui.separator();
            ui.label(RichText::new("Progress").color(Color32::LIGHT_BLUE).size(18.0));
            let color = match self.status.stage {
                Stage::Fetching => Color32::DARK_GREEN,
                Stage::Aggregating => Color32::BLUE,
                Stage::Plotting | Stage::Done => Color32::DARK_BLUE,
                Stage::Idle => Color32::GRAY,
            };
            ui.add(
                ProgressBar::new(self.status.progress)
                    .text(format!(
                        "{} {} - {}%",
                        self.status.stage.label(),
                        self.status.day.as_deref().unwrap_or(""),
                        (self.status.progress * 100.0) as i32
                    ))
                    .fill(color),
            );

            //Summary
            ui.separator();
            ui.label(RichText::new("Summary").color(Color32::LIGHT_BLUE).size(18.0));
            self.render_summary(ui);

            ctx.request_repaint_after(std::time::Duration::from_secs(1));
        });
    }
}
