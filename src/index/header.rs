//! Index header: decoding, validation and write-through field updates.

use std::io::{Read, Seek, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, TisError};
use crate::index::arena::Arena;
use crate::index::format::{
    Field, DATA_FOLDER_LENGTH_AT, FIXED_HEADER_SIZE, MAGIC, TAG_TABLE_OFFSET_AT,
};

/// In-memory copy of the index header.
///
/// The copy is authoritative for the lifetime of an open [`IndexFile`]; every
/// change goes through [`Header::set`], which writes the field back at once.
///
/// [`IndexFile`]: crate::index::IndexFile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Number of tag descriptors in the tag table.
    pub tag_count: u32,
    /// Number of add-file operations performed so far.
    pub file_count: u32,
    /// Absolute offset of the tag table (end of the header, never changes).
    pub tag_table_offset: u32,
    /// Byte length of the tag table.
    pub tag_table_length: u32,
    /// Absolute offset of the index region.
    pub index_region_offset: u32,
    /// Byte length of the index region.
    pub index_region_length: u32,
    /// Directory that holds the stored images.
    pub data_folder: String,
}

impl Header {
    /// Header of a freshly initialized, empty index.
    pub fn new(data_folder: &str) -> Result<Self> {
        let folder_len = u32::try_from(data_folder.len()).map_err(|_| TisError::Overflow)?;
        let table_offset = crate::error::offset_add(FIXED_HEADER_SIZE, folder_len)?;
        Ok(Self {
            tag_count: 0,
            file_count: 0,
            tag_table_offset: table_offset,
            tag_table_length: 0,
            index_region_offset: table_offset,
            index_region_length: 0,
            data_folder: data_folder.to_string(),
        })
    }

    /// Serialize the full header, data folder name included.
    pub fn encode(&self) -> Vec<u8> {
        let fixed = FIXED_HEADER_SIZE as usize;
        let mut buf = vec![0u8; fixed + self.data_folder.len()];
        buf[..MAGIC.len()].copy_from_slice(MAGIC);
        for (i, value) in [
            self.tag_count,
            self.file_count,
            self.tag_table_offset,
            self.tag_table_length,
            self.index_region_offset,
            self.index_region_length,
            self.data_folder.len() as u32,
        ]
        .into_iter()
        .enumerate()
        {
            let at = MAGIC.len() + 4 * i;
            BigEndian::write_u32(&mut buf[at..at + 4], value);
        }
        buf[fixed..].copy_from_slice(self.data_folder.as_bytes());
        buf
    }

    /// Decode and validate the header of an existing index.
    pub fn read_from<S: Read + Write + Seek>(arena: &mut Arena<S>) -> Result<Self> {
        let magic = arena.read_bytes_at(0, MAGIC.len() as u32)?;
        if magic != MAGIC {
            return Err(TisError::format(0u32, "invalid magic bytes"));
        }

        let folder_len = arena.read_u32_at(DATA_FOLDER_LENGTH_AT)?;
        if u64::from(FIXED_HEADER_SIZE) + u64::from(folder_len) > arena.len()? {
            return Err(TisError::format(
                DATA_FOLDER_LENGTH_AT,
                format!("data folder length {folder_len} runs past the end of the file"),
            ));
        }
        let folder = arena.read_bytes_at(FIXED_HEADER_SIZE, folder_len)?;
        let data_folder = String::from_utf8(folder)
            .map_err(|_| TisError::format(FIXED_HEADER_SIZE, "data folder name is not UTF-8"))?;

        let header = Self {
            tag_count: arena.read_u32_at(Field::TagCount.offset())?,
            file_count: arena.read_u32_at(Field::FileCount.offset())?,
            tag_table_offset: arena.read_u32_at(TAG_TABLE_OFFSET_AT)?,
            tag_table_length: arena.read_u32_at(Field::TagTableLength.offset())?,
            index_region_offset: arena.read_u32_at(Field::IndexRegionOffset.offset())?,
            index_region_length: arena.read_u32_at(Field::IndexRegionLength.offset())?,
            data_folder,
        };
        header.validate(arena.len()?)?;
        Ok(header)
    }

    /// Check the layout invariants against the actual storage length.
    fn validate(&self, storage_len: u64) -> Result<()> {
        let header_end = u64::from(FIXED_HEADER_SIZE) + self.data_folder.len() as u64;
        if u64::from(self.tag_table_offset) != header_end {
            return Err(TisError::format(
                TAG_TABLE_OFFSET_AT,
                format!(
                    "tag table offset {} does not follow the header (expected {header_end})",
                    self.tag_table_offset
                ),
            ));
        }
        let table_end = u64::from(self.tag_table_offset) + u64::from(self.tag_table_length);
        if u64::from(self.index_region_offset) != table_end {
            return Err(TisError::format(
                Field::IndexRegionOffset.offset(),
                format!(
                    "index region offset {} does not follow the tag table (expected {table_end})",
                    self.index_region_offset
                ),
            ));
        }
        let region_end = table_end + u64::from(self.index_region_length);
        if region_end > storage_len {
            return Err(TisError::format(
                Field::IndexRegionLength.offset(),
                format!("index region ends at {region_end}, file is {storage_len} bytes"),
            ));
        }
        Ok(())
    }

    /// Update an integer field in memory and on disk.
    pub fn set<S: Read + Write + Seek>(
        &mut self,
        arena: &mut Arena<S>,
        field: Field,
        value: u32,
    ) -> Result<()> {
        arena.write_u32_at(field.offset(), value)?;
        match field {
            Field::TagCount => self.tag_count = value,
            Field::FileCount => self.file_count = value,
            Field::TagTableLength => self.tag_table_length = value,
            Field::IndexRegionOffset => self.index_region_offset = value,
            Field::IndexRegionLength => self.index_region_length = value,
        }
        Ok(())
    }

    /// Absolute offset one past the last byte of the index region.
    pub fn index_region_end(&self) -> u32 {
        self.index_region_offset + self.index_region_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn arena_with(bytes: Vec<u8>) -> Arena<Cursor<Vec<u8>>> {
        Arena::new("<memory>", Cursor::new(bytes))
    }

    #[test]
    fn test_default_header_layout() {
        let bytes = Header::new("data").unwrap().encode();
        assert_eq!(
            bytes,
            vec![
                0x2E, 0x54, 0x49, 0x53, // magic
                0, 0, 0, 0, // tag count
                0, 0, 0, 0, // file count
                0, 0, 0, 0x24, // tag table offset
                0, 0, 0, 0, // tag table length
                0, 0, 0, 0x24, // index region offset
                0, 0, 0, 0, // index region length
                0, 0, 0, 4, // data folder length
                b'd', b'a', b't', b'a',
            ]
        );
    }

    #[test]
    fn test_encode_places_every_field() {
        let header = Header {
            tag_count: 1,
            file_count: 0x0102_0304,
            tag_table_offset: 33,
            tag_table_length: 11,
            index_region_offset: 44,
            index_region_length: 0x7FFF_FFFF,
            data_folder: "x".to_string(),
        };
        let bytes = header.encode();
        assert_eq!(bytes.len(), 33);
        assert_eq!(&bytes[..4], b".TIS");
        assert_eq!(&bytes[4..8], &[0, 0, 0, 1]);
        assert_eq!(&bytes[8..12], &[1, 2, 3, 4]);
        assert_eq!(&bytes[24..28], &[0x7F, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&bytes[28..], &[0, 0, 0, 1, b'x']);
    }

    #[test]
    fn test_read_back_encoded_header() {
        let header = Header::new("images").unwrap();
        let mut arena = arena_with(header.encode());
        let read = Header::read_from(&mut arena).unwrap();
        assert_eq!(read, header);
        assert_eq!(read.tag_table_offset, 38);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = Header::new("data").unwrap().encode();
        bytes[0] = b'X';
        let err = Header::read_from(&mut arena_with(bytes)).unwrap_err();
        assert!(matches!(err, TisError::Format { offset: 0, .. }));
    }

    #[test]
    fn test_region_past_end_rejected() {
        let mut header = Header::new("data").unwrap();
        header.index_region_length = 10;
        let err = Header::read_from(&mut arena_with(header.encode())).unwrap_err();
        assert!(matches!(err, TisError::Format { offset: 24, .. }));
    }

    #[test]
    fn test_detached_index_region_rejected() {
        let mut header = Header::new("data").unwrap();
        header.index_region_offset = 0;
        let err = Header::read_from(&mut arena_with(header.encode())).unwrap_err();
        assert!(matches!(err, TisError::Format { offset: 20, .. }));
    }

    #[test]
    fn test_folder_length_past_end_rejected() {
        let mut bytes = Header::new("data").unwrap().encode();
        bytes[28..32].copy_from_slice(&[0x10, 0, 0, 0]);
        let err = Header::read_from(&mut arena_with(bytes)).unwrap_err();
        assert!(matches!(err, TisError::Format { offset: 28, .. }));
    }

    #[test]
    fn test_set_writes_through() {
        let mut header = Header::new("data").unwrap();
        let mut arena = arena_with(header.encode());
        header.set(&mut arena, Field::FileCount, 7).unwrap();
        assert_eq!(header.file_count, 7);
        assert_eq!(arena.read_u32_at(8).unwrap(), 7);
    }
}
