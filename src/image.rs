//! LC-3 object image loader.
//!
//! An image is a sequence of big-endian 16-bit words:
//! - Word 0: origin, the address the program is loaded at
//! - Words 1..N: program contents, stored consecutively from the origin
//!
//! There is no length field or checksum. Words that would run past the end
//! of the address space are discarded, as is a trailing odd byte.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::cpu::memory::{Memory, MEMORY_SIZE};

/// Summary of a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedImage {
    /// Address the first program word was stored at.
    pub origin: u16,
    /// Number of words stored.
    pub words: usize,
    /// Whether input was dropped at the end of the address space.
    pub truncated: bool,
}

/// Load an image from a byte stream into memory.
///
/// Later loads overwrite earlier ones wherever they overlap.
pub fn load_image<R: Read>(mut reader: R, mem: &mut Memory) -> Result<LoadedImage, ImageError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    if bytes.len() < 2 {
        return Err(ImageError::MissingOrigin { len: bytes.len() });
    }

    let origin = u16::from_be_bytes([bytes[0], bytes[1]]);
    let capacity = MEMORY_SIZE - origin as usize;

    let words: Vec<u16> = bytes[2..]
        .chunks_exact(2)
        .take(capacity)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    let stored = mem.load_words(origin, &words);
    let truncated = (bytes.len() - 2) / 2 > capacity;

    Ok(LoadedImage {
        origin,
        words: stored,
        truncated,
    })
}

/// Load an image file into memory.
pub fn load_image_file<P: AsRef<Path>>(path: P, mem: &mut Memory) -> Result<LoadedImage, ImageError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|source| ImageError::Io { path: path.to_path_buf(), source })?;

    let loaded = load_image(io::BufReader::new(file), mem).map_err(|e| match e {
        ImageError::Read(source) => ImageError::Io { path: path.to_path_buf(), source },
        other => other,
    })?;

    log::debug!(
        "loaded {} words from {} at {:#06x}{}",
        loaded.words,
        path.display(),
        loaded.origin,
        if loaded.truncated { " (truncated)" } else { "" },
    );

    Ok(loaded)
}

/// Errors that can occur while loading an image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("read error: {0}")]
    Read(#[from] io::Error),

    #[error("image is {len} bytes, too short to hold an origin")]
    MissingOrigin { len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn image_bytes(origin: u16, words: &[u16]) -> Vec<u8> {
        std::iter::once(origin)
            .chain(words.iter().copied())
            .flat_map(u16::to_be_bytes)
            .collect()
    }

    #[test]
    fn test_load_halt_program() {
        let mut mem = Memory::new();
        let loaded = load_image(&[0x30, 0x00, 0xF0, 0x25][..], &mut mem).unwrap();

        assert_eq!(loaded, LoadedImage { origin: 0x3000, words: 1, truncated: false });
        assert_eq!(mem.peek(0x3000), 0xF025);
    }

    #[test]
    fn test_origin_only() {
        let mut mem = Memory::new();
        let loaded = load_image(&[0x40, 0x00][..], &mut mem).unwrap();
        assert_eq!(loaded.words, 0);
        assert_eq!(loaded.origin, 0x4000);
    }

    #[test]
    fn test_missing_origin() {
        let mut mem = Memory::new();
        assert!(matches!(
            load_image(&[0x30][..], &mut mem),
            Err(ImageError::MissingOrigin { len: 1 })
        ));
        assert!(matches!(
            load_image(io::empty(), &mut mem),
            Err(ImageError::MissingOrigin { len: 0 })
        ));
    }

    #[test]
    fn test_trailing_odd_byte_ignored() {
        let mut mem = Memory::new();
        let loaded = load_image(&[0x30, 0x00, 0x12, 0x34, 0x56][..], &mut mem).unwrap();

        assert_eq!(loaded.words, 1);
        assert_eq!(mem.peek(0x3000), 0x1234);
        assert_eq!(mem.peek(0x3001), 0);
    }

    #[test]
    fn test_truncated_at_end_of_memory() {
        let mut mem = Memory::new();
        let bytes = image_bytes(0xFFFE, &[1, 2, 3]);
        let loaded = load_image(&bytes[..], &mut mem).unwrap();

        assert_eq!(loaded, LoadedImage { origin: 0xFFFE, words: 2, truncated: true });
        assert_eq!(mem.peek(0xFFFF), 2);
        assert_eq!(mem.peek(0x0000), 0);
    }

    #[test]
    fn test_later_load_overwrites() {
        let mut mem = Memory::new();
        load_image(&image_bytes(0x3000, &[1, 2, 3])[..], &mut mem).unwrap();
        load_image(&image_bytes(0x3001, &[9])[..], &mut mem).unwrap();

        assert_eq!(mem.dump(0x3000, 3), vec![(0x3000, 1), (0x3001, 9), (0x3002, 3)]);
    }

    #[test]
    fn test_missing_file_names_path() {
        let mut mem = Memory::new();
        let err = load_image_file("/nonexistent/program.obj", &mut mem).unwrap_err();

        match err {
            ImageError::Io { path, .. } => assert_eq!(path, Path::new("/nonexistent/program.obj")),
            other => panic!("unexpected error: {}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_words_land_in_order(
            origin in 0u16..0xF000,
            words in proptest::collection::vec(any::<u16>(), 0..256),
        ) {
            let mut mem = Memory::new();
            let loaded = load_image(&image_bytes(origin, &words)[..], &mut mem).unwrap();

            prop_assert_eq!(loaded.words, words.len());
            for (i, &word) in words.iter().enumerate() {
                prop_assert_eq!(mem.peek(origin + i as u16), word);
            }
        }
    }
}
