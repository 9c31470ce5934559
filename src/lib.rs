//! `tis`: Tagged Image Storage.
//!
//! This crate provides the single-file tag index (`index.tis`), the queries
//! that resolve tag lists into filenames, and the helpers that move images
//! into the data folder next to the index.

pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod store;
