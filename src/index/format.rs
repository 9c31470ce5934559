//! Binary index file format.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ HEADER (32 bytes + data folder name)         │
//! │   0  magic: [u8; 4] = b".TIS"                │
//! │   4  tag_count: i32 BE                       │
//! │   8  file_count: i32 BE                      │
//! │  12  tag_table_offset: i32 BE                │
//! │  16  tag_table_length: i32 BE                │
//! │  20  index_region_offset: i32 BE             │
//! │  24  index_region_length: i32 BE             │
//! │  28  data_folder_len: i32 BE                 │
//! │  32  data_folder: [u8; data_folder_len]      │
//! ├──────────────────────────────────────────────┤
//! │ TAG TABLE (tag_count entries, table order)   │
//! │  block_offset: i32 BE (0 = no block yet)     │
//! │  name_len: i32 BE                            │
//! │  name: [u8; name_len]                        │
//! ├──────────────────────────────────────────────┤
//! │ INDEX REGION (one block per allocated tag,   │
//! │ physically in tag table order)               │
//! │  block_len: i32 BE                           │
//! │  payload: filenames, no delimiter            │
//! └──────────────────────────────────────────────┘
//! ```

/// Magic bytes identifying a tis index file.
pub const MAGIC: &[u8; 4] = b".TIS";

/// Size of the fixed part of the header, up to the data folder name.
pub const FIXED_HEADER_SIZE: u32 = 32;

/// Default name of the directory holding the stored images.
pub const DEFAULT_DATA_FOLDER: &str = "data";

/// Default index file name, relative to the working directory.
pub const DEFAULT_INDEX_FILE: &str = "index.tis";

/// Bytes preceding the name in a tag descriptor (offset + name length).
pub const DESCRIPTOR_PREFIX: u32 = 8;

/// Bytes of the length prefix of a filename block.
pub const BLOCK_PREFIX: u32 = 4;

/// Block offset of a tag that owns no block yet.
pub const NO_BLOCK: u32 = 0;

/// Offset of the tag table offset field (fixed after initialization).
pub const TAG_TABLE_OFFSET_AT: u32 = 12;

/// Offset of the data folder name length field.
pub const DATA_FOLDER_LENGTH_AT: u32 = 28;

/// Header fields that change as the index grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    TagCount,
    FileCount,
    TagTableLength,
    IndexRegionOffset,
    IndexRegionLength,
}

impl Field {
    /// Absolute byte offset of the field.
    pub fn offset(self) -> u32 {
        match self {
            Self::TagCount => 4,
            Self::FileCount => 8,
            Self::TagTableLength => 16,
            Self::IndexRegionOffset => 20,
            Self::IndexRegionLength => 24,
        }
    }
}
