//! Whole-image 8-bit checksum
//!
//! The bytes of a valid image sum to zero modulo 256.  Byte 15 of the
//! header exists to make that true.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use log::{debug, info};
use memmap::MmapOptions;

use crate::img::error::ImgError;
use crate::img::image::BLOCK_SIZE;

/// Byte patched to bring the checksum to zero.
pub const CHECKSUM_OFFSET: usize = 15;

/// Running two's-complement sum over the buffer, one block at a time.  A
/// trailing partial block is summed as-is.
pub fn sum(bytes: &[u8]) -> u8 {
    bytes.chunks(BLOCK_SIZE).fold(0u8, |total, chunk| {
        chunk.iter().fold(total, |total, &b| total.wrapping_add(b))
    })
}

/// Compute the checksum of a whole file.
pub fn compute<P: AsRef<Path>>(path: P) -> io::Result<u8> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(0);
    }
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    Ok(sum(&mmap))
}

/// The outcome of `fix`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Patch {
    /// Checksum before patching.
    pub sum: u8,
    /// Old and new value of the checksum byte, if it had to change.
    pub changed: Option<(u8, u8)>,
}

/// The value the checksum byte needs so that a buffer summing to `sum`
/// sums to zero instead.
#[inline]
pub fn correction(sum: u8, current: u8) -> u8 {
    current.wrapping_sub(sum)
}

/// Patch the checksum byte of `bytes` in place.
pub fn fix_bytes(bytes: &mut [u8]) -> io::Result<Patch> {
    let total = sum(bytes);
    if total == 0 {
        return Ok(Patch {
            sum: 0,
            changed: None,
        });
    }
    if bytes.len() <= CHECKSUM_OFFSET {
        return Err(ImgError::InvalidOffset.into());
    }
    let old = bytes[CHECKSUM_OFFSET];
    let new = correction(total, old);
    bytes[CHECKSUM_OFFSET] = new;
    Ok(Patch {
        sum: total,
        changed: Some((old, new)),
    })
}

/// Bring the checksum of the file at `path` to zero by rewriting byte 15.
/// Running it again on the result changes nothing.
pub fn fix<P: AsRef<Path>>(path: P) -> io::Result<Patch> {
    let path = path.as_ref();
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    if file.metadata()?.len() == 0 {
        debug!("{} is empty", path.display());
        return Ok(Patch {
            sum: 0,
            changed: None,
        });
    }
    let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    let patch = fix_bytes(&mut mmap)?;
    if let Some((old, new)) = patch.changed {
        mmap.flush()?;
        info!(
            "{}: checksum 0x{:02x}, byte {} 0x{:02x} -> 0x{:02x}",
            path.display(),
            patch.sum,
            CHECKSUM_OFFSET,
            old,
            new
        );
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::process;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("imgblk-checksum-{}-{}", process::id(), name))
    }

    #[test]
    fn test_sum() {
        assert_eq!(sum(&[]), 0);
        assert_eq!(sum(&[1, 2, 3]), 6);
        assert_eq!(sum(&[0xff, 0x02]), 0x01);
        // Partial trailing block.
        let bytes = vec![1u8; BLOCK_SIZE + 3];
        assert_eq!(sum(&bytes), ((BLOCK_SIZE + 3) % 256) as u8);
    }

    #[test]
    fn test_fix_bytes() {
        let mut bytes: Vec<u8> = (0..1000u32).map(|i| (i * 7) as u8).collect();
        let before = sum(&bytes);
        assert_ne!(before, 0);
        let patch = fix_bytes(&mut bytes).unwrap();
        assert_eq!(patch.sum, before);
        assert!(patch.changed.is_some());
        assert_eq!(sum(&bytes), 0);

        let again = fix_bytes(&mut bytes).unwrap();
        assert_eq!(again, Patch { sum: 0, changed: None });
    }

    #[test]
    fn test_fix_too_short() {
        let mut bytes = vec![1u8; CHECKSUM_OFFSET];
        assert!(fix_bytes(&mut bytes).unwrap_err() == ImgError::InvalidOffset);

        // A zero sum needs no patch, however short the buffer.
        let mut zeros = vec![0u8; 3];
        assert_eq!(fix_bytes(&mut zeros).unwrap().changed, None);
    }

    #[test]
    fn test_fix_file() {
        let path = temp_path("fix");
        let contents: Vec<u8> = (0..(3 * BLOCK_SIZE + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &contents).unwrap();

        let patch = fix(&path).unwrap();
        assert_eq!(patch.sum, sum(&contents));
        assert_eq!(compute(&path).unwrap(), 0);

        let patched = fs::read(&path).unwrap();
        assert_eq!(patched.len(), contents.len());
        for (i, (a, b)) in contents.iter().zip(patched.iter()).enumerate() {
            if i != CHECKSUM_OFFSET {
                assert_eq!(a, b);
            }
        }

        let second = fix(&path).unwrap();
        assert_eq!(second.changed, None);
        assert_eq!(fs::read(&path).unwrap(), patched);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_empty_file() {
        let path = temp_path("empty");
        fs::write(&path, b"").unwrap();
        assert_eq!(compute(&path).unwrap(), 0);
        assert_eq!(fix(&path).unwrap().changed, None);
        fs::remove_file(&path).unwrap();
    }
}
