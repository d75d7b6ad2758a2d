//! Source file discovery.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use panel_model::FileType;
use regex::Regex;

use crate::error::{IngestError, Result};

static FILE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(19|20)\d{2}").expect("valid year regex"));

/// Lists CSV files in a directory, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = std::fs::read_dir(dir).map_err(|source| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// First `19xx`/`20xx` run in a file name.
pub fn year_from_file_name(file_name: &str) -> Option<i32> {
    FILE_YEAR
        .find(file_name)
        .and_then(|m| m.as_str().parse().ok())
}

/// Module and year encoded in a source file name.
pub fn classify_file(path: &Path) -> Option<(FileType, i32)> {
    let name = path.file_name()?.to_str()?;
    Some((FileType::from_file_name(name)?, year_from_file_name(name)?))
}

/// Groups source files by year, keeping only selected modules and years.
pub fn gather_files(
    dir: &Path,
    modules: &BTreeSet<FileType>,
    years: Option<&BTreeSet<i32>>,
) -> Result<BTreeMap<i32, Vec<PathBuf>>> {
    let mut grouped: BTreeMap<i32, Vec<PathBuf>> = BTreeMap::new();
    for path in list_csv_files(dir)? {
        let Some((module, year)) = classify_file(&path) else {
            tracing::debug!(path = %path.display(), "skipping unrecognized file");
            continue;
        };
        if !modules.contains(&module) || years.is_some_and(|y| !y.contains(&year)) {
            continue;
        }
        grouped.entry(year).or_default().push(path);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_year_from_file_name() {
        assert_eq!(year_from_file_name("FAM1999ER.csv"), Some(1999));
        assert_eq!(year_from_file_name("wlth_2001.csv"), Some(2001));
        assert_eq!(year_from_file_name("FAM.csv"), None);
    }

    #[test]
    fn test_gather_files_groups_by_year() {
        let dir = TempDir::new().unwrap();
        for name in ["WLTH1999.csv", "FAM1999.csv", "fam2001.csv", "IND2001.csv", "notes.txt"] {
            std::fs::write(dir.path().join(name), "A\n").unwrap();
        }
        let modules = BTreeSet::from(FileType::ALL);
        let grouped = gather_files(dir.path(), &modules, None).unwrap();

        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![1999, 2001]);
        let names: Vec<_> = grouped[&1999]
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["FAM1999.csv", "WLTH1999.csv"]);
        assert_eq!(grouped[&2001].len(), 1);

        let years = BTreeSet::from([2001]);
        let only_wlth = BTreeSet::from([FileType::Wlth]);
        assert!(gather_files(dir.path(), &only_wlth, Some(&years)).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let result = list_csv_files(Path::new("/nonexistent/panel/data"));
        assert!(matches!(result, Err(IngestError::DirectoryNotFound { .. })));
    }
}
