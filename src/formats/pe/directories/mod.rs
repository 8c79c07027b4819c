//! Data directory parsers

pub mod export;

pub use export::{parse_exports, ExportTable};
