pub mod audit;
pub mod error;
pub mod issue;
pub mod mapping;
pub mod options;

pub use audit::AuditRow;
pub use error::{PanelError, Result};
pub use issue::{Diagnostics, Issue, Severity};
pub use mapping::{ColumnDtype, FileType, MappingRow};
pub use options::{ExtractionOptions, RunMode};
