//! Relayout: the only code that moves index bytes or rewrites offsets.
//!
//! The tag table and the index region point at each other by absolute
//! offset, so every byte inserted in front of a block has to be matched by a
//! patch of the descriptors that point behind it. Both growth paths
//! ([`Relayout::grow_tags`] and [`Relayout::append_filename`]) follow the
//! same pattern: save everything after the insertion point, write the new
//! bytes, write the saved bytes back shifted, then patch the header and every
//! displaced descriptor.
//!
//! After each call the header satisfies
//! `index_region_offset == tag_table_offset + tag_table_length`, and allocated
//! blocks are physically ordered like their descriptors.

use std::io::{Read, Seek, Write};

use tracing::{debug, trace};

use crate::error::{offset_add, Result, TisError};
use crate::index::arena::Arena;
use crate::index::format::{Field, BLOCK_PREFIX, NO_BLOCK};
use crate::index::header::Header;
use crate::index::tag_table::{self, TagTable};

/// Mutable view over one index while it is being relaid out.
pub(crate) struct Relayout<'a, S> {
    arena: &'a mut Arena<S>,
    header: &'a mut Header,
    tags: &'a mut TagTable,
}

impl<'a, S: Read + Write + Seek> Relayout<'a, S> {
    pub(crate) fn new(
        arena: &'a mut Arena<S>,
        header: &'a mut Header,
        tags: &'a mut TagTable,
    ) -> Self {
        Self {
            arena,
            header,
            tags,
        }
    }

    /// Append descriptors for `names` (none of which may exist yet) to the
    /// tag table, moving the whole index region back to make room.
    ///
    /// Returns the number of bytes inserted; zero means nothing changed.
    pub(crate) fn grow_tags(&mut self, names: &[&str]) -> Result<u32> {
        let new_bytes = tag_table::encode_new(names);
        if new_bytes.is_empty() {
            return Ok(0);
        }
        let inserted = u32::try_from(new_bytes.len()).map_err(|_| TisError::Overflow)?;
        let insert_at = self.header.index_region_offset;
        let new_region_offset = offset_add(insert_at, inserted)?;
        offset_add(new_region_offset, self.header.index_region_length)?;

        let region = self
            .arena
            .read_bytes_at(insert_at, self.header.index_region_length)?;
        self.arena.write_bytes_at(insert_at, &new_bytes)?;
        self.arena.write_bytes_at(new_region_offset, &region)?;

        let existing = self.tags.len();
        self.shift_blocks(0, existing, inserted)?;
        self.tags.push_new(names, insert_at);

        let tag_count = offset_add(self.header.tag_count, names.len() as u32)?;
        let table_len = offset_add(self.header.tag_table_length, inserted)?;
        self.header.set(self.arena, Field::TagCount, tag_count)?;
        self.header.set(self.arena, Field::TagTableLength, table_len)?;
        self.header
            .set(self.arena, Field::IndexRegionOffset, new_region_offset)?;

        debug!(
            tags = ?names,
            inserted,
            index_region_offset = new_region_offset,
            "Grew tag table"
        );
        Ok(inserted)
    }

    /// Append `filename` to the block of the tag at table position `index`,
    /// allocating the block on first use.
    pub(crate) fn append_filename(&mut self, index: usize, filename: &str) -> Result<()> {
        let table_offset = self.header.tag_table_offset;
        let desc = self
            .tags
            .get(index)
            .ok_or_else(|| TisError::format(table_offset, "tag index out of range"))?;
        let fresh = !desc.has_block();
        let current = desc.block_offset();
        let added = u32::try_from(filename.len()).map_err(|_| TisError::Overflow)?;
        let region_end = self.header.index_region_end();

        let (block_offset, block_len) = if fresh {
            (self.fresh_block_offset(index), 0)
        } else {
            (current, self.arena.read_u32_at(current)?)
        };
        let payload_end = offset_add(offset_add(block_offset, BLOCK_PREFIX)?, block_len)?;
        // A fresh block pushes back everything from its own start.
        let tail_start = if fresh { block_offset } else { payload_end };
        if tail_start > region_end {
            return Err(TisError::format(
                block_offset,
                format!("block of {block_len} bytes runs past the index region"),
            ));
        }
        let shift = if fresh { added + BLOCK_PREFIX } else { added };
        offset_add(region_end, shift)?;

        let tail = self
            .arena
            .read_bytes_at(tail_start, region_end - tail_start)?;
        self.arena
            .write_u32_at(block_offset, offset_add(block_len, added)?)?;
        self.arena.write_bytes_at(payload_end, filename.as_bytes())?;
        self.arena.write_bytes_at(payload_end + added, &tail)?;

        let region_len = offset_add(self.header.index_region_length, shift)?;
        self.header
            .set(self.arena, Field::IndexRegionLength, region_len)?;

        if fresh {
            self.set_block_offset(index, block_offset)?;
        }
        let end = self.tags.len();
        self.shift_blocks(index + 1, end, shift)?;

        trace!(
            tag = %self.tags.get(index).map(|d| d.name()).unwrap_or_default(),
            filename,
            block_offset,
            fresh,
            shift,
            "Appended filename"
        );
        Ok(())
    }

    /// Where a new block for the tag at `index` has to go: in front of the
    /// first later tag that already owns a block, else at the region's end.
    fn fresh_block_offset(&self, index: usize) -> u32 {
        self.tags
            .iter()
            .skip(index + 1)
            .find(|d| d.has_block())
            .map(|d| d.block_offset())
            .unwrap_or_else(|| self.header.index_region_end())
    }

    /// Move the stored offset of every allocated descriptor in
    /// `from..to` back by `delta` bytes.
    fn shift_blocks(&mut self, from: usize, to: usize, delta: u32) -> Result<()> {
        for desc in &mut self.tags.descriptors_mut()[from..to] {
            if desc.block_offset() == NO_BLOCK {
                continue;
            }
            let moved = offset_add(desc.block_offset(), delta)?;
            self.arena.write_u32_at(desc.entry_offset(), moved)?;
            desc.set_block_offset(moved);
        }
        Ok(())
    }

    fn set_block_offset(&mut self, index: usize, offset: u32) -> Result<()> {
        let desc = &mut self.tags.descriptors_mut()[index];
        self.arena.write_u32_at(desc.entry_offset(), offset)?;
        desc.set_block_offset(offset);
        Ok(())
    }
}
