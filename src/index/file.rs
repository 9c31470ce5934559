//! Open index handle and the operations collaborators call.

use std::fs::{File, OpenOptions};
use std::io::{Cursor, ErrorKind, Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{offset_add, Result, TisError};
use crate::index::arena::Arena;
use crate::index::format::{Field, BLOCK_PREFIX};
use crate::index::header::Header;
use crate::index::payload;
use crate::index::relayout::Relayout;
use crate::index::tag_table::TagTable;

/// Summary returned by [`IndexFile::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    /// Directory holding the stored images.
    pub data_folder: String,
    /// Number of tags.
    pub tag_count: u32,
    /// Number of add-file operations.
    pub file_count: u32,
    /// Tag names in table order.
    pub tags: Vec<String>,
}

/// An open index: the backing storage plus its decoded header and tag table.
///
/// Storage is anything seekable, so tests can run against a
/// `Cursor<Vec<u8>>` while the CLI uses a [`File`].
pub struct IndexFile<S> {
    arena: Arena<S>,
    header: Header,
    tags: TagTable,
}

impl IndexFile<File> {
    /// Create a new, empty index at `path`.
    ///
    /// Fails with [`TisError::IndexExists`] if anything already exists there.
    pub fn create(path: impl AsRef<Path>, data_folder: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    TisError::IndexExists(path.to_path_buf())
                } else {
                    TisError::io(path, e)
                }
            })?;
        info!(path = %path.display(), data_folder, "Creating index");
        Self::initialize(path, file, data_folder)
    }

    /// Open an existing index for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    TisError::IndexNotFound(path.to_path_buf())
                } else {
                    TisError::io(path, e)
                }
            })?;
        Self::load(path, file)
    }
}

impl IndexFile<Cursor<Vec<u8>>> {
    /// A new, empty index held entirely in memory.
    pub fn in_memory(data_folder: &str) -> Result<Self> {
        Self::initialize("<memory>", Cursor::new(Vec::new()), data_folder)
    }
}

impl<S: Read + Write + Seek> IndexFile<S> {
    /// Write an empty index into `storage`.
    pub fn initialize(path: impl Into<PathBuf>, storage: S, data_folder: &str) -> Result<Self> {
        let header = Header::new(data_folder)?;
        let mut arena = Arena::new(path, storage);
        arena.write_bytes_at(0, &header.encode())?;
        arena.flush()?;
        Ok(Self {
            arena,
            header,
            tags: TagTable::default(),
        })
    }

    /// Decode the header and tag table already present in `storage`.
    pub fn load(path: impl Into<PathBuf>, storage: S) -> Result<Self> {
        let mut arena = Arena::new(path, storage);
        let header = Header::read_from(&mut arena)?;
        let tags = TagTable::load(&mut arena, &header)?;
        debug!(
            path = %arena.path().display(),
            tags = header.tag_count,
            files = header.file_count,
            "Opened index"
        );
        Ok(Self {
            arena,
            header,
            tags,
        })
    }

    /// Path the index was opened from.
    pub fn path(&self) -> &Path {
        self.arena.path()
    }

    /// Decoded header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Tag descriptors in table order.
    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    /// Name of the directory holding the stored images.
    pub fn data_folder(&self) -> &str {
        &self.header.data_folder
    }

    /// Read-only summary of the index.
    pub fn info(&self) -> IndexInfo {
        IndexInfo {
            data_folder: self.header.data_folder.clone(),
            tag_count: self.header.tag_count,
            file_count: self.header.file_count,
            tags: self.tags.names(),
        }
    }

    /// Record `filename` under every tag in `tags`.
    ///
    /// Unknown tags are created first; repeated tags are only applied once.
    /// The file counter goes up by one per call.
    pub fn add_file(&mut self, filename: &str, tags: &[String]) -> Result<()> {
        payload::validate_filename(filename)?;
        let mut unique: Vec<&str> = Vec::with_capacity(tags.len());
        for tag in tags.iter().filter(|t| !t.is_empty()) {
            if !unique.contains(&tag.as_str()) {
                unique.push(tag);
            }
        }
        if unique.is_empty() {
            return Err(TisError::NoTags);
        }

        let missing = self.tags.missing(tags);
        let missing: Vec<&str> = missing.into_iter().filter(|t| !t.is_empty()).collect();
        let mut relayout = Relayout::new(&mut self.arena, &mut self.header, &mut self.tags);
        relayout.grow_tags(&missing)?;

        for tag in &unique {
            let index = self.tags.position(tag).ok_or_else(|| {
                TisError::format(
                    self.header.tag_table_offset,
                    format!("tag '{tag}' missing after growth"),
                )
            })?;
            Relayout::new(&mut self.arena, &mut self.header, &mut self.tags)
                .append_filename(index, filename)?;
        }

        let file_count = offset_add(self.header.file_count, 1)?;
        self.header
            .set(&mut self.arena, Field::FileCount, file_count)?;
        self.arena.flush()?;

        info!(filename, tags = ?unique, "Added file to index");
        Ok(())
    }

    /// Filenames stored under `tag`, oldest first. Unknown tags and tags
    /// without a block yield an empty list.
    pub fn filenames(&mut self, tag: &str) -> Result<Vec<String>> {
        let Some(desc) = self.tags.lookup(tag) else {
            return Ok(Vec::new());
        };
        if !desc.has_block() {
            return Ok(Vec::new());
        }
        let offset = desc.block_offset();
        let len = self.arena.read_u32_at(offset)?;
        let payload_start = offset + BLOCK_PREFIX;
        if u64::from(payload_start) + u64::from(len) > u64::from(self.header.index_region_end()) {
            return Err(TisError::format(
                offset,
                format!("block of tag '{tag}' ({len} bytes) runs past the index region"),
            ));
        }
        let payload = self.arena.read_bytes_at(payload_start, len)?;
        Ok(payload::split_filenames(&payload))
    }

    /// Flush and give back the backing storage.
    pub fn into_inner(mut self) -> Result<S> {
        self.arena.flush()?;
        Ok(self.arena.into_inner())
    }
}
