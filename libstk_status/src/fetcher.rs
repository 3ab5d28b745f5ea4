use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::aggregator::DayProgress;
use super::cal_day::{CalDay, DateWindow};
use super::constants::DetectorGeometry;
use super::error::FetchError;

/// Access to the remote calibration archive
pub trait ArchiveClient {
    /// List a remote directory. Entries are returned as full remote paths.
    fn list(&self, remote_dir: &str) -> Result<Vec<String>, FetchError>;

    /// Copy a remote directory, recursively, into the existing local directory. The copy lands
    /// in a subdirectory named after the remote one.
    fn copy_dir(&self, remote_dir: &str, local_dir: &Path) -> Result<(), FetchError>;
}

/// ArchiveClient using the XRootD command line tools (`xrdfs` and `xrdcp`)
#[derive(Debug, Clone)]
pub struct XrootdClient {
    address: String,
}

impl XrootdClient {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
        }
    }

    /// The full XRootD URL of a remote path, e.g. `root://host//path`
    pub fn url(&self, remote_path: &str) -> String {
        format!(
            "{}//{}",
            self.address.trim_end_matches('/'),
            remote_path.trim_start_matches('/')
        )
    }

    fn run(command: &mut Command) -> Result<String, FetchError> {
        log::debug!("Executing {command:?}");
        let output = command.output()?;
        if !output.status.success() {
            return Err(FetchError::CommandFailed {
                command: format!("{command:?}"),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl ArchiveClient for XrootdClient {
    fn list(&self, remote_dir: &str) -> Result<Vec<String>, FetchError> {
        let stdout = Self::run(
            Command::new("xrdfs")
                .arg(&self.address)
                .arg("ls")
                .arg(remote_dir),
        )?;
        Ok(stdout
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn copy_dir(&self, remote_dir: &str, local_dir: &Path) -> Result<(), FetchError> {
        Self::run(
            Command::new("xrdcp")
                .arg("-r")
                .arg(self.url(remote_dir))
                .arg(local_dir),
        )?;
        Ok(())
    }
}

fn entry_name(entry: &str) -> &str {
    entry.trim_end_matches('/').rsplit('/').next().unwrap_or(entry)
}

/// A complete calibration day found in the remote archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDay {
    pub day: CalDay,
    /// The raw-data directory holding the calibration files
    pub remote_dir: String,
    pub n_files: usize,
}

/// Outcome of a fetch pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchSummary {
    pub downloaded: Vec<CalDay>,
    pub already_present: Vec<CalDay>,
    pub incomplete: Vec<CalDay>,
    pub total_bytes: u64,
}

impl FetchSummary {
    /// Size of the downloaded data, e.g. "1.2 GiB"
    pub fn human_size(&self) -> String {
        human_bytes::human_bytes(self.total_bytes as f64)
    }
}

/// Fetcher finds the complete calibration days of the remote archive and copies them into the
/// local calibration tree (`<local_root>/YYYYMMDD/*.cal`).
pub struct Fetcher<'a, C: ArchiveClient> {
    client: C,
    geometry: &'a DetectorGeometry,
    local_root: PathBuf,
}

impl<'a, C: ArchiveClient> Fetcher<'a, C> {
    pub fn new(client: C, geometry: &'a DetectorGeometry, local_root: &Path) -> Self {
        Self {
            client,
            geometry,
            local_root: local_root.to_path_buf(),
        }
    }

    /// Walk the remote archive (root, day, raw-data directory) and find the complete days inside
    /// the window.
    ///
    /// A day is complete when one of its raw-data directories holds exactly the expected number of
    /// calibration files. Incomplete days are skipped with a warning.
    pub fn plan(&self, remote_root: &str, window: &DateWindow) -> Result<Vec<RemoteDay>, FetchError> {
        let mut days: Vec<RemoteDay> = Vec::new();
        let mut files_per_year: BTreeMap<i32, usize> = BTreeMap::new();

        let mut day_entries = self.client.list(remote_root)?;
        day_entries.sort();
        for day_entry in day_entries {
            if !entry_name(&day_entry).starts_with(&self.geometry.day_prefix) {
                continue;
            }
            let day = match CalDay::from_path_name(&day_entry, &self.geometry.day_prefix) {
                Ok(day) => day,
                Err(e) => {
                    log::debug!("Ignoring remote entry {day_entry}: {e}");
                    continue;
                }
            };
            if !window.contains(&day) {
                continue;
            }

            let raw_dirs = match self.client.list(&day_entry) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Skipping calibration day {day}: could not list {day_entry}: {e}");
                    continue;
                }
            };
            let mut found: Option<RemoteDay> = None;
            for raw_dir in raw_dirs
                .iter()
                .filter(|e| entry_name(e).contains(&self.geometry.raw_dir_marker))
            {
                let n_files = match self.client.list(raw_dir) {
                    Ok(files) => files
                        .iter()
                        .filter(|f| self.geometry.is_cal_file_name(f))
                        .count(),
                    Err(e) => {
                        log::warn!("Could not list {raw_dir}: {e}");
                        continue;
                    }
                };
                if n_files == self.geometry.expected_files_per_day {
                    found = Some(RemoteDay {
                        day,
                        remote_dir: raw_dir.clone(),
                        n_files,
                    });
                    break;
                }
                log::debug!(
                    "{raw_dir} holds {n_files} calibration files; expected {}",
                    self.geometry.expected_files_per_day
                );
            }

            match found {
                Some(remote_day) => {
                    *files_per_year.entry(day.date().year()).or_default() += remote_day.n_files;
                    days.push(remote_day);
                }
                None => log::warn!(
                    "Skipping calibration day {day}: no raw-data directory with {} calibration files",
                    self.geometry.expected_files_per_day
                ),
            }
        }

        log::info!(
            "{} calibration files found in the remote archive",
            files_per_year.values().sum::<usize>()
        );
        for (year, count) in files_per_year.iter() {
            log::info!("{count} calibration files found in {year}");
        }
        Ok(days)
    }

    /// Download the planned days which are not already present locally.
    ///
    /// The local root is created if needed. A day directory which already exists is left alone.
    /// A day whose copy fails or comes back incomplete is removed again and reported, the
    /// remaining days are still downloaded.
    pub fn fetch(
        &self,
        plan: &[RemoteDay],
        mut on_day: impl FnMut(&DayProgress),
    ) -> Result<FetchSummary, FetchError> {
        std::fs::create_dir_all(&self.local_root)?;
        let mut summary = FetchSummary::default();
        let total = plan.len();

        for (idx, remote_day) in plan.iter().enumerate() {
            let day_dir = self.local_root.join(remote_day.day.dir_name());
            let mut skipped = false;
            if day_dir.exists() {
                log::info!(
                    "Calibration day {} already present in {}, not downloading",
                    remote_day.day,
                    day_dir.display()
                );
                summary.already_present.push(remote_day.day);
            } else {
                match self.fetch_day(remote_day, &day_dir) {
                    Ok(bytes) => {
                        log::info!(
                            "Downloaded calibration day {} ({})",
                            remote_day.day,
                            human_bytes::human_bytes(bytes as f64)
                        );
                        summary.total_bytes += bytes;
                        summary.downloaded.push(remote_day.day);
                    }
                    Err(e) => {
                        log::warn!("Skipping calibration day {}: {e}", remote_day.day);
                        if day_dir.exists() {
                            std::fs::remove_dir_all(&day_dir)?;
                        }
                        summary.incomplete.push(remote_day.day);
                        skipped = true;
                    }
                }
            }
            on_day(&DayProgress {
                day: remote_day.day,
                processed: idx + 1,
                total,
                skipped,
            });
        }

        log::info!(
            "Downloaded {} calibration days ({}), {} already present, {} incomplete",
            summary.downloaded.len(),
            human_bytes::human_bytes(summary.total_bytes as f64),
            summary.already_present.len(),
            summary.incomplete.len()
        );
        Ok(summary)
    }

    /// Copy one day, flatten the nested raw-data directory and verify the file count
    fn fetch_day(&self, remote_day: &RemoteDay, day_dir: &Path) -> Result<u64, FetchError> {
        std::fs::create_dir_all(day_dir)?;
        self.client.copy_dir(&remote_day.remote_dir, day_dir)?;
        relocate_nested_files(day_dir, self.geometry)?;
        let (n_files, bytes) = count_cal_files(day_dir, self.geometry)?;
        if n_files != self.geometry.expected_files_per_day {
            return Err(FetchError::IncompleteDay(
                day_dir.to_path_buf(),
                n_files,
                self.geometry.expected_files_per_day,
            ));
        }
        Ok(bytes)
    }
}

/// Move the calibration files out of the subdirectories of a day directory and remove them
pub fn relocate_nested_files(day_dir: &Path, geometry: &DetectorGeometry) -> Result<(), FetchError> {
    for item in day_dir.read_dir()? {
        let item = item?;
        let name = item.file_name().to_string_lossy().to_string();
        if !item.file_type()?.is_dir() || name.starts_with('.') {
            continue;
        }
        let nested = item.path();
        for file in nested.read_dir()? {
            let file = file?;
            let file_name = file.file_name();
            if file.file_type()?.is_file() && geometry.is_cal_file_name(&file_name.to_string_lossy()) {
                std::fs::rename(file.path(), day_dir.join(&file_name))?;
            }
        }
        std::fs::remove_dir_all(&nested)?;
    }
    Ok(())
}

/// Count the calibration files (and their total size) directly inside a day directory
pub fn count_cal_files(day_dir: &Path, geometry: &DetectorGeometry) -> Result<(usize, u64), FetchError> {
    let mut count = 0;
    let mut bytes = 0;
    for item in day_dir.read_dir()? {
        let item = item?;
        if item.file_type()?.is_file() && geometry.is_cal_file_name(&item.file_name().to_string_lossy()) {
            count += 1;
            bytes += item.metadata()?.len();
        }
    }
    Ok((count, bytes))
}

/// Check every calibration day under the local root holds the expected number of files.
///
/// Returns the days which do not.
pub fn verify_local_tree(root: &Path, geometry: &DetectorGeometry) -> Result<Vec<PathBuf>, FetchError> {
    let mut bad_days = Vec::new();
    for item in root.read_dir()? {
        let item = item?;
        let name = item.file_name().to_string_lossy().to_string();
        if !item.file_type()?.is_dir() || name.starts_with('.') {
            continue;
        }
        let (n_files, _) = count_cal_files(&item.path(), geometry)?;
        if n_files != geometry.expected_files_per_day {
            log::warn!(
                "Check calibration files in {}: found {n_files}, expected {}",
                item.path().display(),
                geometry.expected_files_per_day
            );
            bad_days.push(item.path());
        }
    }
    bad_days.sort();
    Ok(bad_days)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use time::macros::date;

    /// An archive served from a local directory, standing in for XRootD
    pub(crate) struct LocalArchive {
        pub(crate) root: PathBuf,
    }

    impl LocalArchive {
        fn local(&self, remote: &str) -> PathBuf {
            self.root.join(remote.trim_start_matches('/'))
        }
    }

    impl ArchiveClient for LocalArchive {
        fn list(&self, remote_dir: &str) -> Result<Vec<String>, FetchError> {
            let mut entries = Vec::new();
            for item in self.local(remote_dir).read_dir()? {
                let name = item?.file_name().to_string_lossy().to_string();
                entries.push(format!("{}/{}", remote_dir.trim_end_matches('/'), name));
            }
            Ok(entries)
        }

        fn copy_dir(&self, remote_dir: &str, local_dir: &Path) -> Result<(), FetchError> {
            let src = self.local(remote_dir);
            let dst = local_dir.join(entry_name(remote_dir));
            std::fs::create_dir_all(&dst)?;
            for item in src.read_dir()? {
                let item = item?;
                std::fs::copy(item.path(), dst.join(item.file_name()))?;
            }
            Ok(())
        }
    }

    fn geometry() -> DetectorGeometry {
        DetectorGeometry {
            expected_files_per_day: 4,
            ..Default::default()
        }
    }

    fn make_remote_day(root: &Path, day: &str, raw_dir: &str, n_files: usize) {
        let dir = root.join("CAL/STK").join(day).join(raw_dir);
        std::fs::create_dir_all(&dir).unwrap();
        for idx in 0..n_files {
            std::fs::write(dir.join(format!("TRB0{}_ladder{idx:02}.cal", idx % 8)), "data").unwrap();
        }
        std::fs::write(dir.join("summary.txt"), "not a cal file").unwrap();
    }

    fn window() -> DateWindow {
        DateWindow::new(date!(2023 - 01 - 01), date!(2023 - 01 - 31))
    }

    #[test]
    fn test_plan_selects_complete_days() {
        let remote = tempfile::tempdir().unwrap();
        make_remote_day(remote.path(), "20230105", "STK_CALIB_RAW_001", 4);
        // Incomplete first raw dir, complete second one
        make_remote_day(remote.path(), "20230110", "STK_CALIB_RAW_001", 2);
        make_remote_day(remote.path(), "20230110", "STK_CALIB_RAW_002", 4);
        // Only incomplete
        make_remote_day(remote.path(), "20230112", "STK_CALIB_RAW_001", 3);
        // No raw marker
        make_remote_day(remote.path(), "20230114", "STK_CALIB_PROC", 4);
        // Outside the window
        make_remote_day(remote.path(), "20230205", "STK_CALIB_RAW_001", 4);
        std::fs::create_dir_all(remote.path().join("CAL/STK/README")).unwrap();

        let geometry = geometry();
        let archive = LocalArchive {
            root: remote.path().to_path_buf(),
        };
        let local = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(archive, &geometry, local.path());
        let plan = fetcher.plan("/CAL/STK", &window()).unwrap();
        let names: Vec<String> = plan.iter().map(|d| d.day.dir_name()).collect();
        assert_eq!(names, vec!["20230105", "20230110"]);
        assert!(plan[1].remote_dir.ends_with("STK_CALIB_RAW_002"));
        assert!(plan.iter().all(|d| d.n_files == 4));
    }

    #[test]
    fn test_fetch_flattens_and_skips_present_days() {
        let remote = tempfile::tempdir().unwrap();
        make_remote_day(remote.path(), "20230105", "STK_CALIB_RAW_001", 4);
        make_remote_day(remote.path(), "20230110", "STK_CALIB_RAW_001", 4);

        let geometry = geometry();
        let local = tempfile::tempdir().unwrap();
        let root = local.path().join("cal");
        std::fs::create_dir_all(root.join("20230110")).unwrap();
        std::fs::write(root.join("20230110").join("keep.txt"), "local").unwrap();

        let fetcher = Fetcher::new(
            LocalArchive {
                root: remote.path().to_path_buf(),
            },
            &geometry,
            &root,
        );
        let plan = fetcher.plan("/CAL/STK/", &window()).unwrap();
        let mut progress = Vec::new();
        let summary = fetcher.fetch(&plan, |p| progress.push(p.processed)).unwrap();

        assert_eq!(summary.downloaded.len(), 1);
        assert_eq!(summary.already_present.len(), 1);
        assert!(summary.incomplete.is_empty());
        assert_eq!(summary.total_bytes, 16);
        assert_eq!(progress, vec![1, 2]);

        let day_dir = root.join("20230105");
        assert_eq!(count_cal_files(&day_dir, &geometry).unwrap().0, 4);
        assert!(!day_dir.join("STK_CALIB_RAW_001").exists());
        assert!(root.join("20230110").join("keep.txt").exists());
    }

    #[test]
    fn test_incomplete_download_removed() {
        let remote = tempfile::tempdir().unwrap();
        make_remote_day(remote.path(), "20230105", "STK_CALIB_RAW_001", 4);
        let geometry = geometry();
        let local = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(
            LocalArchive {
                root: remote.path().to_path_buf(),
            },
            &geometry,
            local.path(),
        );
        let plan = fetcher.plan("/CAL/STK", &window()).unwrap();
        // The archive loses a file between listing and copy
        std::fs::remove_file(
            remote
                .path()
                .join("CAL/STK/20230105/STK_CALIB_RAW_001/TRB00_ladder00.cal"),
        )
        .unwrap();
        let summary = fetcher.fetch(&plan, |_| {}).unwrap();
        assert_eq!(summary.incomplete.len(), 1);
        assert!(!local.path().join("20230105").exists());
    }

    #[test]
    fn test_verify_local_tree() {
        let geometry = geometry();
        let local = tempfile::tempdir().unwrap();
        for (day, n_files) in [("20230101", 4), ("20230102", 3)] {
            let dir = local.path().join(day);
            std::fs::create_dir_all(&dir).unwrap();
            for idx in 0..n_files {
                std::fs::write(dir.join(format!("TRB00_{idx}.cal")), "x").unwrap();
            }
        }
        std::fs::create_dir_all(local.path().join(".cache")).unwrap();
        let bad = verify_local_tree(local.path(), &geometry).unwrap();
        assert_eq!(bad, vec![local.path().join("20230102")]);
    }

    #[test]
    fn test_xrootd_url() {
        let client = XrootdClient::new("root://xrootd-dampe.cloud.ba.infn.it//");
        assert_eq!(
            client.url("/FM/FlightData/CAL/STK/20230105/STK_CALIB_RAW_001"),
            "root://xrootd-dampe.cloud.ba.infn.it//FM/FlightData/CAL/STK/20230105/STK_CALIB_RAW_001"
        );
    }
}
