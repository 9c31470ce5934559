//! Filename block payloads.
//!
//! Filenames inside a block are stored back to back with no separator and are
//! recovered by scanning for `stem.ext` runs. That only round-trips for names
//! the scanner can find again, so [`validate_filename`] rejects everything
//! else before it reaches the index.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, TisError};

/// Extensions accepted for stored images.
pub const EXTENSIONS: &[&str] = &["jpg", "png", "gif", "jpeg", "webp"];

/// Characters allowed in a filename stem.
pub const STEM_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-";

fn scanner() -> &'static Regex {
    static SCANNER: OnceLock<Regex> = OnceLock::new();
    SCANNER.get_or_init(|| {
        Regex::new(&format!(r"[a-zA-Z0-9-]+\.({})", EXTENSIONS.join("|")))
            .unwrap_or_else(|e| panic!("filename scanner pattern is invalid: {e}"))
    })
}

fn exact() -> &'static Regex {
    static EXACT: OnceLock<Regex> = OnceLock::new();
    EXACT.get_or_init(|| {
        Regex::new(&format!(r"^[a-zA-Z0-9-]+\.({})$", EXTENSIONS.join("|")))
            .unwrap_or_else(|e| panic!("filename pattern is invalid: {e}"))
    })
}

/// Check that `name` can be stored and later recovered unchanged.
pub fn validate_filename(name: &str) -> Result<()> {
    if exact().is_match(name) {
        Ok(())
    } else {
        Err(TisError::InvalidFilename(name.to_string()))
    }
}

/// Split a block payload back into filenames, oldest first.
///
/// Bytes that do not form a recognizable filename are skipped.
pub fn split_filenames(payload: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(payload);
    scanner()
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_concatenated_names() {
        assert_eq!(
            split_filenames(b"a.pngb.jpgc-1.webp"),
            vec!["a.png", "b.jpg", "c-1.webp"]
        );
    }

    #[test]
    fn test_split_jpeg_and_jpg_neighbours() {
        assert_eq!(
            split_filenames(b"x.jpegeg.jpgy.gif"),
            vec!["x.jpeg", "eg.jpg", "y.gif"]
        );
    }

    #[test]
    fn test_split_empty_payload() {
        assert!(split_filenames(b"").is_empty());
    }

    #[test]
    fn test_validate_accepts_pattern_names() {
        for name in ["a.png", "IMG-0001.jpeg", "x.webp", "cat.gif", "9.jpg"] {
            assert!(validate_filename(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_validate_rejects_unrecoverable_names() {
        for name in [
            "",
            ".png",
            "a b.png",
            "a.b.png",
            "photo.PNG",
            "notes.txt",
            "dir/a.png",
            "a.png.bak",
        ] {
            assert!(
                matches!(validate_filename(name), Err(TisError::InvalidFilename(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_stem_chars_match_pattern() {
        let name = format!("{STEM_CHARS}.png");
        assert!(validate_filename(&name).is_ok());
    }
}
