//! Per-canonical transform language and column resolution.
//!
//! Transform cells are parsed once into [`TransformSpec`] values when canonical
//! metadata is built; extraction then only executes the typed operations.

pub mod dsl;
pub mod dtype;
pub mod execute;
pub mod parse;
pub mod resolve;
pub mod values;

pub use dsl::{DuplicateStrategy, NaCode, StrategyConflict, TransformOperation, TransformSpec};
pub use dtype::coerce_dtype;
pub use execute::{apply_operation, apply_operations, quantile};
pub use parse::parse_transform;
pub use resolve::{Resolution, resolve_duplicates};
pub use values::{ColumnValues, float_text, parse_number};
