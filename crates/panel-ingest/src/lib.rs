//! Source ingestion for panel extraction: mapping tables, file discovery and
//! column reads.

pub mod discovery;
pub mod error;
pub mod filters;
pub mod header;
pub mod labels;
pub mod mapping;
pub mod reader;

pub use discovery::{classify_file, gather_files, list_csv_files, year_from_file_name};
pub use error::{IngestError, Result};
pub use filters::{MappingFilter, parse_year_filter};
pub use header::{CsvHeader, normalize_header, read_header, read_label_row};
pub use labels::collect_labels;
pub use mapping::{MAPPING_COLUMNS, parse_mapping, read_mapping};
pub use reader::{ColumnLoad, load_columns};
