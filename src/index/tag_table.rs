//! Tag table: the ordered list of tag descriptors that follows the header.

use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, Write};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use crate::error::{Result, TisError};
use crate::index::arena::Arena;
use crate::index::format::{BLOCK_PREFIX, DESCRIPTOR_PREFIX, NO_BLOCK};
use crate::index::header::Header;

/// One tag and the location of its filename block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDescriptor {
    name: String,
    block_offset: u32,
    entry_offset: u32,
}

impl TagDescriptor {
    /// Tag name (case-sensitive).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute offset of the filename block, [`NO_BLOCK`] if none yet.
    pub fn block_offset(&self) -> u32 {
        self.block_offset
    }

    /// Whether a block has been allocated for this tag.
    pub fn has_block(&self) -> bool {
        self.block_offset != NO_BLOCK
    }

    /// Absolute offset of this descriptor's `block_offset` field.
    pub(crate) fn entry_offset(&self) -> u32 {
        self.entry_offset
    }

    pub(crate) fn set_block_offset(&mut self, offset: u32) {
        self.block_offset = offset;
    }
}

/// Number of bytes a new descriptor for `name` occupies.
pub fn encoded_len(name: &str) -> u32 {
    DESCRIPTOR_PREFIX + name.len() as u32
}

/// Serialize descriptors for `names`, all without a block.
pub fn encode_new(names: &[&str]) -> Vec<u8> {
    let mut buf = vec![0u8; names.iter().map(|n| encoded_len(n) as usize).sum()];
    let mut at = 0;
    for name in names {
        BigEndian::write_u32(&mut buf[at..], NO_BLOCK);
        BigEndian::write_u32(&mut buf[at + 4..], name.len() as u32);
        at += DESCRIPTOR_PREFIX as usize;
        buf[at..at + name.len()].copy_from_slice(name.as_bytes());
        at += name.len();
    }
    buf
}

/// The tag descriptors of an index, in table order.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    descriptors: Vec<TagDescriptor>,
}

impl TagTable {
    /// Parse the tag table described by `header`.
    ///
    /// Fails with a format error when an entry runs past the table, the
    /// table holds trailing bytes, a name repeats, or an allocated block lies
    /// outside the index region or out of table order.
    pub fn load<S: Read + Write + Seek>(arena: &mut Arena<S>, header: &Header) -> Result<Self> {
        let base = header.tag_table_offset;
        let bytes = arena.read_bytes_at(base, header.tag_table_length)?;
        let mut cursor = Cursor::new(bytes.as_slice());
        let mut descriptors = Vec::with_capacity(header.tag_count as usize);
        let mut seen = HashSet::new();

        for i in 0..header.tag_count {
            let entry_offset = base + cursor.position() as u32;
            let truncated =
                |_| TisError::format(entry_offset, format!("tag entry {i} is truncated"));
            let block_offset = read_u32(&mut cursor).map_err(truncated)?;
            let name_len = read_u32(&mut cursor).map_err(truncated)?;

            let remaining = bytes.len() as u64 - cursor.position();
            if u64::from(name_len) > remaining {
                return Err(TisError::format(
                    entry_offset,
                    format!("tag name length {name_len} runs past the tag table"),
                ));
            }
            let mut name = vec![0u8; name_len as usize];
            cursor.read_exact(&mut name).map_err(truncated)?;
            let name = String::from_utf8(name)
                .map_err(|_| TisError::format(entry_offset, "tag name is not UTF-8"))?;
            if !seen.insert(name.clone()) {
                return Err(TisError::format(
                    entry_offset,
                    format!("duplicate tag '{name}'"),
                ));
            }

            descriptors.push(TagDescriptor {
                name,
                block_offset,
                entry_offset,
            });
        }

        if cursor.position() != bytes.len() as u64 {
            return Err(TisError::format(
                base + cursor.position() as u32,
                format!(
                    "tag table declares {} bytes but {} entries use {}",
                    bytes.len(),
                    header.tag_count,
                    cursor.position()
                ),
            ));
        }

        let table = Self { descriptors };
        table.check_blocks(header)?;
        Ok(table)
    }

    /// Allocated blocks must lie inside the region, in table order.
    fn check_blocks(&self, header: &Header) -> Result<()> {
        let region_start = u64::from(header.index_region_offset);
        let region_end = u64::from(header.index_region_end());
        let mut previous: Option<u32> = None;
        for desc in self.descriptors.iter().filter(|d| d.has_block()) {
            let offset = u64::from(desc.block_offset);
            if offset < region_start || offset + u64::from(BLOCK_PREFIX) > region_end {
                return Err(TisError::format(
                    desc.entry_offset,
                    format!(
                        "block of tag '{}' at {offset} lies outside the index region",
                        desc.name
                    ),
                ));
            }
            if previous.is_some_and(|p| p >= desc.block_offset) {
                return Err(TisError::format(
                    desc.entry_offset,
                    format!("block of tag '{}' is out of table order", desc.name),
                ));
            }
            previous = Some(desc.block_offset);
        }
        Ok(())
    }

    /// Find a descriptor by exact name.
    pub fn lookup(&self, name: &str) -> Option<&TagDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Table position of the tag called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.name == name)
    }

    /// Descriptor at a table position.
    pub fn get(&self, index: usize) -> Option<&TagDescriptor> {
        self.descriptors.get(index)
    }

    /// All descriptors in table order.
    pub fn iter(&self) -> impl Iterator<Item = &TagDescriptor> {
        self.descriptors.iter()
    }

    /// All tag names in table order.
    pub fn names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.clone()).collect()
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the table holds no tags.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Names from `names` not yet in the table, first occurrence only.
    pub fn missing<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        let mut out: Vec<&'a str> = Vec::new();
        for name in names {
            if self.lookup(name).is_none() && !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        out
    }

    pub(crate) fn descriptors_mut(&mut self) -> &mut [TagDescriptor] {
        &mut self.descriptors
    }

    /// Record freshly written descriptors, laid out from `entry_offset` on.
    pub(crate) fn push_new(&mut self, names: &[&str], mut entry_offset: u32) {
        for name in names {
            self.descriptors.push(TagDescriptor {
                name: (*name).to_string(),
                block_offset: NO_BLOCK,
                entry_offset,
            });
            entry_offset += encoded_len(name);
        }
    }
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> std::io::Result<u32> {
    let value = cursor.read_i32::<BigEndian>()?;
    u32::try_from(value).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "negative value")
    })
}
