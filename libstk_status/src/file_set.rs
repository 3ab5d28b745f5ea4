use std::path::{Path, PathBuf};

use super::constants::DetectorGeometry;
use super::error::CalDayError;

/// The calibration files of one day, partitioned by board group.
///
/// Within a group, files are sorted by name; the position of a file is its ladder slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardFileSet {
    groups: Vec<Vec<PathBuf>>,
}

impl BoardFileSet {
    /// Discover the calibration files in a day directory.
    ///
    /// Files not belonging to any board group are ignored. A group with no files is returned
    /// empty; it is up to the reduction to refuse it.
    pub fn discover(day_dir: &Path, geometry: &DetectorGeometry) -> Result<Self, CalDayError> {
        let mut names: Vec<String> = Vec::new();
        for item in day_dir.read_dir()? {
            let item = item?;
            if !item.file_type()?.is_file() {
                continue;
            }
            let name = item.file_name().to_string_lossy().to_string();
            if geometry.is_cal_file_name(&name) {
                names.push(name);
            }
        }

        let mut groups: Vec<Vec<PathBuf>> = Vec::with_capacity(geometry.n_board_groups);
        for group in 0..geometry.n_board_groups {
            let prefix = geometry.board_group_prefix(group);
            let mut group_names: Vec<&String> =
                names.iter().filter(|n| n.starts_with(&prefix)).collect();
            group_names.sort();
            groups.push(group_names.iter().map(|n| day_dir.join(n)).collect());
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[Vec<PathBuf>] {
        &self.groups
    }

    pub fn n_files(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    /// Index of the first board group without any files
    pub fn first_empty_group(&self) -> Option<usize> {
        self.groups.iter().position(|g| g.is_empty())
    }

    /// Index of the first board group whose file count differs from board group 0
    pub fn first_uneven_group(&self) -> Option<usize> {
        let expected = self.groups.first()?.len();
        self.groups.iter().position(|g| g.len() != expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_partitions_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let names = [
            "TRB01_ladder_b.cal",
            "TRB00_ladder_c.cal",
            "TRB00_ladder_a.cal",
            "TRB01_ladder_a.cal",
            "TRB00_ladder_b.cal",
            "TRB00_notes.txt",
            "README.cal.bak",
            "XYZ00_ladder_a.cal",
        ];
        for name in names {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("TRB01_dir.cal")).unwrap();

        let geometry = DetectorGeometry {
            n_board_groups: 3,
            ..Default::default()
        };
        let set = BoardFileSet::discover(dir.path(), &geometry).unwrap();
        assert_eq!(set.groups().len(), 3);
        let file_names = |group: usize| -> Vec<String> {
            set.groups()[group]
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
                .collect()
        };
        assert_eq!(
            file_names(0),
            vec!["TRB00_ladder_a.cal", "TRB00_ladder_b.cal", "TRB00_ladder_c.cal"]
        );
        assert_eq!(file_names(1), vec!["TRB01_ladder_a.cal", "TRB01_ladder_b.cal"]);
        assert!(set.groups()[2].is_empty());
        assert_eq!(set.n_files(), 5);
        assert_eq!(set.first_empty_group(), Some(2));
        assert_eq!(set.first_uneven_group(), Some(1));
    }
}
