//! Image storage next to the index.

pub mod mover;
