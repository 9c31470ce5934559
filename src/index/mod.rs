//! On-disk index engine: header, tag table, index region and relayout.

pub mod arena;
pub mod file;
pub mod format;
pub mod header;
pub mod payload;
mod relayout;
pub mod tag_table;

pub use file::{IndexFile, IndexInfo};
pub use header::Header;
pub use tag_table::{TagDescriptor, TagTable};
