//! Moving added images into the data folder.
//!
//! The index only records names; this module decides the stored name and
//! puts the file where later lookups expect it.

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{Result, TisError};
use crate::index::payload::{self, STEM_CHARS};

/// Name requested through `--file-name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredName {
    /// Keep the source file name.
    Original,
    /// Use this exact name.
    Explicit(String),
    /// Random stem of the given length, source extension kept (`--file-name=*`).
    Random(usize),
}

/// What to do with the source file.
#[derive(Debug, Clone)]
pub struct MovePlan {
    pub source: PathBuf,
    pub name: StoredName,
    /// Move into the data folder; otherwise only rename in place.
    pub move_file: bool,
}

/// Result of [`place`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placed {
    /// Name to record in the index.
    pub filename: String,
    /// Where the file now lives.
    pub path: PathBuf,
}

/// Random stem drawn from the characters allowed in stored names.
pub fn random_stem<R: Rng + ?Sized>(len: usize, rng: &mut R) -> String {
    let chars = STEM_CHARS.as_bytes();
    (0..len)
        .map(|_| chars[rng.gen_range(0..chars.len())] as char)
        .collect()
}

/// Resolve the name the file will be stored under.
pub fn stored_name<R: Rng + ?Sized>(source: &Path, name: &StoredName, rng: &mut R) -> String {
    match name {
        StoredName::Original => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        StoredName::Explicit(n) => n.clone(),
        StoredName::Random(len) => {
            let stem = random_stem(*len, rng);
            match source.extension() {
                Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
                None => stem,
            }
        }
    }
}

/// Put the source file in place and return the name to index.
///
/// `data_dir` is created when missing. Nothing on disk changes when the name
/// is invalid or the target already exists.
pub fn place<R: Rng + ?Sized>(plan: &MovePlan, data_dir: &Path, rng: &mut R) -> Result<Placed> {
    let filename = stored_name(&plan.source, &plan.name, rng);
    payload::validate_filename(&filename)?;

    if !plan.source.is_file() {
        return Err(TisError::SourceNotFound(plan.source.clone()));
    }

    let target = if plan.move_file {
        data_dir.join(&filename)
    } else if plan.name != StoredName::Original {
        plan.source.with_file_name(&filename)
    } else {
        debug!(source = %plan.source.display(), "Leaving file in place");
        return Ok(Placed {
            filename,
            path: plan.source.clone(),
        });
    };

    if target.exists() {
        return Err(TisError::DataFileExists(target));
    }
    if plan.move_file && !data_dir.is_dir() {
        info!(path = %data_dir.display(), "Creating data folder");
        std::fs::create_dir_all(data_dir).map_err(|e| TisError::io(data_dir, e))?;
    }

    std::fs::rename(&plan.source, &target).map_err(|e| TisError::io(&plan.source, e))?;
    debug!(
        source = %plan.source.display(),
        target = %target.display(),
        "Moved file"
    );
    Ok(Placed {
        filename,
        path: target,
    })
}

/// Undo a [`place`] whose index write failed, moving the file back to its
/// source.
pub fn restore(plan: &MovePlan, placed: &Placed) -> Result<()> {
    if placed.path == plan.source {
        return Ok(());
    }
    match std::fs::rename(&placed.path, &plan.source) {
        Ok(()) => {
            info!(
                source = %plan.source.display(),
                "Moved file back after failed index update"
            );
            Ok(())
        }
        Err(e) => {
            warn!(
                path = %placed.path.display(),
                error = %e,
                "File was placed but is not in the index"
            );
            Err(TisError::io(&placed.path, e))
        }
    }
}
