//! Label dictionary grouping variable codes by their human label.

use std::collections::{BTreeMap, BTreeSet};

use panel_model::{FileType, MappingRow};
use serde::Serialize;

/// Label text found in a source file's label row, keyed by module, year and code.
pub type LabelLookup = BTreeMap<(FileType, i32, String), String>;

const MISSING_MARKERS: &[&str] = &["", "nan", "None"];

/// One dictionary line per distinct label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DictionaryEntry {
    pub label_en: String,
    pub module_any: String,
    pub example_var_code: String,
    pub canonical_list: String,
    pub tokens: String,
    pub category: String,
    pub dtype: String,
    pub required_any: u8,
    pub years_present: String,
    #[serde(skip)]
    pub codes_by_year: BTreeMap<i32, String>,
}

#[derive(Debug, Clone, Default)]
pub struct MappingDictionary {
    pub years: Vec<i32>,
    pub entries: Vec<DictionaryEntry>,
    /// Rows that fell back to `Unknown <var_code>`.
    pub unknown_labels: usize,
}

const SHARED_COLUMNS: &[&str] = &[
    "label_en",
    "module_any",
    "example_var_code",
    "canonical_list",
    "tokens",
    "category",
    "dtype",
    "required_any",
];

impl MappingDictionary {
    pub fn wide_header(&self) -> Vec<String> {
        let mut header: Vec<String> = SHARED_COLUMNS.iter().map(ToString::to_string).collect();
        header.push("years_present".to_string());
        header.extend(self.years.iter().map(ToString::to_string));
        header
    }

    pub fn wide_records(&self) -> Vec<Vec<String>> {
        self.entries
            .iter()
            .map(|entry| {
                let mut record = shared_fields(entry);
                record.push(entry.years_present.clone());
                record.extend(
                    self.years
                        .iter()
                        .map(|year| entry.codes_by_year.get(year).cloned().unwrap_or_default()),
                );
                record
            })
            .collect()
    }

    pub fn long_header(&self) -> Vec<String> {
        let mut header: Vec<String> = SHARED_COLUMNS.iter().map(ToString::to_string).collect();
        header.push("codes_by_year".to_string());
        header
    }

    pub fn long_records(&self) -> Vec<Vec<String>> {
        self.entries
            .iter()
            .map(|entry| {
                let mut record = shared_fields(entry);
                let pieces: Vec<String> = entry
                    .codes_by_year
                    .iter()
                    .map(|(year, codes)| {
                        if codes.is_empty() {
                            format!("{year}:")
                        } else {
                            format!("{year}: {codes}")
                        }
                    })
                    .collect();
                record.push(pieces.join("; "));
                record
            })
            .collect()
    }
}

fn shared_fields(entry: &DictionaryEntry) -> Vec<String> {
    vec![
        entry.label_en.clone(),
        entry.module_any.clone(),
        entry.example_var_code.clone(),
        entry.canonical_list.clone(),
        entry.tokens.clone(),
        entry.category.clone(),
        entry.dtype.clone(),
        entry.required_any.to_string(),
    ]
}

fn is_missing(value: &str) -> bool {
    MISSING_MARKERS.contains(&value)
}

/// Best available label: the file's label row, then the mapping label,
/// then `Unknown <var_code>`.
pub fn resolve_label(row: &MappingRow, lookup: &LabelLookup) -> Option<String> {
    let from_file = lookup
        .get(&(row.file_type, row.year, row.var_code.clone()))
        .map(|label| label.trim())
        .filter(|label| !is_missing(label));
    let fallback = Some(row.label.trim()).filter(|label| !is_missing(label));
    from_file.or(fallback).map(str::to_string)
}

fn first_non_empty<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

pub fn build_dictionary(rows: &[MappingRow], lookup: &LabelLookup) -> MappingDictionary {
    let mut unknown_labels = 0;
    let mut labeled: Vec<(String, &MappingRow)> = rows
        .iter()
        .map(|row| {
            let label = resolve_label(row, lookup).unwrap_or_else(|| {
                unknown_labels += 1;
                format!("Unknown {}", row.var_code)
            });
            (label, row)
        })
        .collect();
    labeled.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(a.1.year.cmp(&b.1.year))
            .then_with(|| a.1.var_code.cmp(&b.1.var_code))
    });

    let mut grouped: BTreeMap<&str, Vec<&MappingRow>> = BTreeMap::new();
    for (label, row) in &labeled {
        grouped.entry(label.as_str()).or_default().push(*row);
    }

    let years: BTreeSet<i32> = rows.iter().map(|row| row.year).collect();
    let entries = grouped
        .into_iter()
        .map(|(label, group)| {
            let canonicals: BTreeSet<&str> = group
                .iter()
                .map(|row| row.canonical.as_str())
                .filter(|c| !c.is_empty())
                .collect();
            let codes: BTreeSet<&str> = group
                .iter()
                .map(|row| row.var_code.as_str())
                .filter(|c| !c.is_empty())
                .collect();
            let modules: BTreeSet<FileType> = group.iter().map(|row| row.file_type).collect();
            let mut codes_by_year: BTreeMap<i32, BTreeSet<&str>> = BTreeMap::new();
            for row in &group {
                let entry = codes_by_year.entry(row.year).or_default();
                if !row.var_code.is_empty() {
                    entry.insert(row.var_code.as_str());
                }
            }
            DictionaryEntry {
                label_en: label.to_string(),
                module_any: match modules.len() {
                    0 => String::new(),
                    1 => modules.iter().next().map(ToString::to_string).unwrap_or_default(),
                    _ => "Multiple".to_string(),
                },
                example_var_code: codes.iter().next().map(ToString::to_string).unwrap_or_default(),
                canonical_list: canonicals.into_iter().collect::<Vec<_>>().join(" | "),
                tokens: label.split_whitespace().collect::<Vec<_>>().join(" "),
                category: first_non_empty(group.iter().map(|row| row.category.as_str())),
                dtype: first_non_empty(group.iter().map(|row| row.dtype.map_or("", |d| d.as_str()))),
                required_any: u8::from(group.iter().any(|row| row.required)),
                years_present: codes_by_year
                    .keys()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
                codes_by_year: codes_by_year
                    .into_iter()
                    .map(|(year, codes)| (year, codes.into_iter().collect::<Vec<_>>().join(" | ")))
                    .collect(),
            }
        })
        .collect();

    MappingDictionary {
        years: years.into_iter().collect(),
        entries,
        unknown_labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::ColumnDtype;

    #[test]
    fn groups_codes_by_file_label() {
        let rows = vec![
            MappingRow::new("income", 1999, FileType::Fam, "ER1").with_label("TOT INC"),
            MappingRow::new("income", 2001, FileType::Fam, "ER9")
                .with_label("TOT INC")
                .with_category("Income")
                .with_dtype(Some(ColumnDtype::Float64)),
            MappingRow::new("wealth", 1999, FileType::Wlth, "S1").with_required(false),
            MappingRow::new("debt", 2001, FileType::Wlth, "S7"),
        ];
        let mut lookup = LabelLookup::new();
        lookup.insert((FileType::Wlth, 1999, "S1".to_string()), "  Net   worth ".to_string());

        let dictionary = build_dictionary(&rows, &lookup);
        assert_eq!(dictionary.years, vec![1999, 2001]);
        assert_eq!(dictionary.unknown_labels, 1);
        let labels: Vec<&str> = dictionary.entries.iter().map(|e| e.label_en.as_str()).collect();
        assert_eq!(labels, ["Net   worth", "TOT INC", "Unknown S7"]);

        let income = &dictionary.entries[1];
        assert_eq!(income.example_var_code, "ER1");
        assert_eq!(income.category, "Income");
        assert_eq!(income.dtype, "float64");
        assert_eq!(income.years_present, "1999; 2001");
        assert_eq!(income.module_any, "FAM");

        let wide = dictionary.wide_records();
        assert_eq!(wide[0][4], "Net worth");
        assert_eq!(wide[0][7], "0");
        assert_eq!(wide[1][9..], ["ER1".to_string(), "ER9".to_string()]);
        let long = dictionary.long_records();
        assert_eq!(long[1][8], "1999: ER1; 2001: ER9");
    }
}
