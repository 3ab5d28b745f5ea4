use clap::{Arg, ArgAction, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::channel;

use libstk_status::config::Config;
use libstk_status::error::ConfigError;
use libstk_status::process::{process, ProcessSummary};
use libstk_status::worker_status::Stage;

fn make_template_config(path: &Path) -> Result<(), ConfigError> {
    Config::default().write_config_file(path)
}

fn log_summary(summary: &ProcessSummary) {
    if let Some(fetch) = &summary.fetch {
        log::info!(
            "Fetched {} days ({}), {} already present, {} incomplete",
            fetch.downloaded.len(),
            fetch.human_size(),
            fetch.already_present.len(),
            fetch.incomplete.len()
        );
    }
    if let (Some(first), Some(last)) = (summary.first_day, summary.last_day) {
        log::info!("{} calibration days from {first} to {last}", summary.n_days);
    }
    for (stat, mean) in summary.means.iter() {
        log::info!("{:<28} {mean:.4}", stat.label());
    }
    log::info!("{} plots written", summary.plots.len());
    if let Some(path) = &summary.hdf_path {
        log::info!("HDF5 export written to {}", path.display());
    }
}

fn main() -> ExitCode {
    // Create a cli
    let matches = Command::new("stk_status_cli")
        .about("Daily noise monitoring of the STK calibrations")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("local")
                .short('l')
                .long("local")
                .action(ArgAction::SetTrue)
                .help("Only use calibration days already on disk, never fetch"),
        )
        .arg(
            Arg::new("all-days")
                .long("all-days")
                .action(ArgAction::SetTrue)
                .help("Ignore the configured date window and use every local day"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log every calibration day"),
        )
        .get_matches();

    // Initialize feedback
    let level = if matches.get_flag("verbose") {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let logger = simplelog::TermLogger::new(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return ExitCode::FAILURE;
    }
    log::set_max_level(level);

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required (-p/--path)");
        return ExitCode::FAILURE;
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!("Making a template config at {}...", config_path.display());
        return match make_template_config(&config_path) {
            Ok(()) => {
                log::info!("Done.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.display());
    let mut config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if matches.get_flag("local") {
        config.fetch_remote = false;
    }
    if matches.get_flag("all-days") {
        config.apply_window = false;
    }
    log::info!("Config successfully loaded.");
    log::info!("Local Path: {}", config.local_path.display());
    log::info!("Output Path: {}", config.output_path.display());
    if config.fetch_remote {
        log::info!(
            "Remote: {}{}",
            config.remote_address,
            config.remote_path.trim_start_matches('/')
        );
    }
    if config.apply_window {
        log::info!(
            "Window: {:04}-{:02}-{:02} to {:04}-{:02}-{:02}",
            config.start_date.year,
            config.start_date.month,
            config.start_date.day,
            config.end_date.year,
            config.end_date.month,
            config.end_date.day
        );
    } else {
        log::info!("Window: all local calibration days");
    }

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{prefix:>12} [{bar:40}] {pos:>3}% {msg}") {
        pb.set_style(style);
    }
    let (tx, rx) = channel();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(&config, &tx));

    // The receiver is closed once the worker is done and the sender dropped
    for status in rx.iter() {
        pb.set_prefix(status.stage.label());
        pb.set_position((status.progress * 100.0) as u64);
        if let Some(day) = status.day {
            pb.set_message(day);
        }
        if status.stage == Stage::Done {
            pb.set_message("");
        }
    }
    pb.finish();

    match handle.join() {
        Ok(Ok(summary)) => {
            log_summary(&summary);
            log::info!("Done.");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) if e.is_no_data() => {
            log::warn!("{e}");
            log::warn!("Nothing to plot.");
            ExitCode::FAILURE
        }
        Ok(Err(e)) => {
            log::error!("Monitoring pass failed with error: {e}");
            ExitCode::FAILURE
        }
        Err(_) => {
            log::error!("Failed to join monitoring task!");
            ExitCode::FAILURE
        }
    }
}
