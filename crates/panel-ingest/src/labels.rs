//! Label-row harvesting for the mapping dictionary.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use panel_model::FileType;

use crate::discovery::{classify_file, list_csv_files};
use crate::error::Result;
use crate::header::read_label_row;

/// Collects source-file labels keyed by `(module, year, var_code)`.
///
/// Files that fail to read are skipped with a warning. Only codes in `wanted`
/// are kept when it is given.
pub fn collect_labels(
    dir: &Path,
    wanted: Option<&BTreeSet<(FileType, i32, String)>>,
) -> Result<BTreeMap<(FileType, i32, String), String>> {
    let mut labels = BTreeMap::new();
    for path in list_csv_files(dir)? {
        let Some((module, year)) = classify_file(&path) else {
            continue;
        };
        let row = match read_label_row(&path) {
            Ok(Some(row)) => row,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                continue;
            }
        };
        for (code, label) in row {
            if label.is_empty() {
                continue;
            }
            let key = (module, year, code);
            if wanted.is_none_or(|w| w.contains(&key)) {
                labels.entry(key).or_insert(label);
            }
        }
    }
    tracing::debug!(labels = labels.len(), "collected label rows");
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_labels() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("FAM1999.csv"), "ER1,ER2\nTotal income,\n1,2\n").unwrap();
        std::fs::write(dir.path().join("WLTH1999.csv"), "S1\n").unwrap();
        std::fs::write(dir.path().join("readme.csv"), "A\nB\n").unwrap();

        let labels = collect_labels(dir.path(), None).unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(
            labels.get(&(FileType::Fam, 1999, "ER1".to_string())).map(String::as_str),
            Some("Total income")
        );

        let wanted = BTreeSet::from([(FileType::Fam, 1999, "ER2".to_string())]);
        assert!(collect_labels(dir.path(), Some(&wanted)).unwrap().is_empty());
    }
}
