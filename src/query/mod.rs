//! Query engine: resolve tag expressions into filename lists.
//!
//! All operations are read-only. Resolution keeps duplicates (a file stored
//! under two queried tags appears twice); exclusive mode and random picks
//! work on distinct filenames.

pub mod tags;

use std::collections::HashSet;
use std::io::{Read, Seek, Write};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::{Result, TisError};
use crate::index::IndexFile;

pub use self::tags::parse_tags;

/// Read-only view of an index for answering tag queries.
pub struct QueryEngine<'a, S> {
    index: &'a mut IndexFile<S>,
}

impl<'a, S: Read + Write + Seek> QueryEngine<'a, S> {
    pub fn new(index: &'a mut IndexFile<S>) -> Self {
        Self { index }
    }

    /// Filenames of every tag in `tags`, concatenated in query order.
    ///
    /// Unknown tags contribute nothing; duplicates are kept.
    pub fn resolve(&mut self, tags: &[String]) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for tag in tags {
            files.extend(self.index.filenames(tag)?);
        }
        Ok(files)
    }

    /// Filenames stored under every one of `tags`, each listed once in the
    /// order they first appear under the first tag.
    pub fn exclusive(&mut self, tags: &[String]) -> Result<Vec<String>> {
        let mut distinct: Vec<&String> = Vec::new();
        for tag in tags {
            if !distinct.contains(&tag) {
                distinct.push(tag);
            }
        }
        let Some((first, rest)) = distinct.split_first() else {
            return Ok(Vec::new());
        };

        let mut others: Vec<HashSet<String>> = Vec::with_capacity(rest.len());
        for tag in rest {
            others.push(self.index.filenames(tag)?.into_iter().collect());
        }

        let mut seen = HashSet::new();
        Ok(self
            .index
            .filenames(first)?
            .into_iter()
            .filter(|f| others.iter().all(|set| set.contains(f)))
            .filter(|f| seen.insert(f.clone()))
            .collect())
    }

    /// `base` without any filename stored under one of `exclude`.
    pub fn excluding(&mut self, base: Vec<String>, exclude: &[String]) -> Result<Vec<String>> {
        if exclude.is_empty() {
            return Ok(base);
        }
        let excluded: HashSet<String> = self.resolve(exclude)?.into_iter().collect();
        Ok(base.into_iter().filter(|f| !excluded.contains(f)).collect())
    }

    /// Filenames matching `tags` (any of them, or all of them in exclusive
    /// mode), minus those stored under `exclude`.
    pub fn list_by_tags(
        &mut self,
        tags: &[String],
        exclude: &[String],
        exclusive: bool,
    ) -> Result<Vec<String>> {
        let base = if exclusive {
            self.exclusive(tags)?
        } else {
            self.resolve(tags)?
        };
        let files = self.excluding(base, exclude)?;
        debug!(?tags, ?exclude, exclusive, found = files.len(), "Listed files");
        Ok(files)
    }

    /// One random filename matching any of `tags` (every tag when empty)
    /// and none of `exclude`.
    pub fn random_by_tags<R: Rng + ?Sized>(
        &mut self,
        tags: &[String],
        exclude: &[String],
        rng: &mut R,
    ) -> Result<String> {
        let all;
        let tags: &[String] = if tags.is_empty() {
            all = self.index.tags().names();
            &all
        } else {
            tags
        };
        let candidates = self.resolve(tags)?;
        let found = candidates.len();
        let candidates = self.excluding(candidates, exclude)?;
        debug!(found, remaining = candidates.len(), "Random pick candidates");
        random_pick(&candidates, rng)
    }
}

/// Uniform pick over the distinct entries of `candidates`.
pub fn random_pick<R: Rng + ?Sized>(candidates: &[String], rng: &mut R) -> Result<String> {
    let mut seen = HashSet::new();
    let unique: Vec<&String> = candidates
        .iter()
        .filter(|f| seen.insert(f.as_str()))
        .collect();
    unique
        .choose(rng)
        .map(|f| (*f).clone())
        .ok_or(TisError::EmptyResult)
}
