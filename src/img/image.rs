use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::mem;
use std::ops::Range;
use std::path::Path;

use log::{debug, trace};

use crate::img::error::ImgError;

pub const BLOCK_SIZE: usize = 512;

/// Backing storage (file or memory) for an image.
enum Backing {
    File(File),
    Memory(Vec<u8>),
    Closed,
}

/// A flat file treated as a zero-indexed array of `BLOCK_SIZE` blocks.
///
/// All access is block aligned: callers name a block index and never a byte
/// offset.  The backing store sits in a `RefCell` so that directory entries
/// can hold a shared reference to the image and still write through it.
pub struct Image {
    backing: RefCell<Backing>,
}

impl Image {
    /// Open an existing image for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Image> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!("opened image {}", path.display());
        Ok(Image {
            backing: RefCell::new(Backing::File(file)),
        })
    }

    /// Create a zero-filled image of `blocks` blocks.
    pub fn create<P: AsRef<Path>>(path: P, blocks: usize, create_new: bool) -> io::Result<Image> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .create_new(create_new)
            .open(path)?;
        file.set_len(Self::offset(blocks)?)?;
        debug!("created image {} with {} blocks", path.display(), blocks);
        Ok(Image {
            backing: RefCell::new(Backing::File(file)),
        })
    }

    pub fn open_memory(blocks: usize) -> Image {
        Image {
            backing: RefCell::new(Backing::Memory(vec![0; blocks * BLOCK_SIZE])),
        }
    }

    fn offset(index: usize) -> io::Result<u64> {
        (index as u64)
            .checked_mul(BLOCK_SIZE as u64)
            .ok_or_else(|| ImgError::InvalidOffset.into())
    }

    /// Byte range of a block in a memory backing, or `None` when it cannot
    /// be addressed on this target.
    fn memory_range(offset: u64) -> Option<Range<usize>> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(BLOCK_SIZE)?;
        Some(start..end)
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.backing.borrow(), Backing::Closed)
    }

    /// Length of the image in bytes.
    pub fn len(&self) -> io::Result<u64> {
        match *self.backing.borrow() {
            Backing::File(ref file) => Ok(file.metadata()?.len()),
            Backing::Memory(ref bytes) => Ok(bytes.len() as u64),
            Backing::Closed => Err(ImgError::Closed.into()),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of whole blocks in the image.  A trailing partial block is
    /// not counted.
    pub fn block_count(&self) -> io::Result<usize> {
        Ok((self.len()? / BLOCK_SIZE as u64) as usize)
    }

    /// Read exactly one block.  An image that ends before the end of the
    /// block yields `ImgError::ShortRead`.
    pub fn read_block(&self, index: usize) -> io::Result<Vec<u8>> {
        let offset = Self::offset(index)?;
        trace!("read block {} @ 0x{:x}", index, offset);
        let mut block = vec![0u8; BLOCK_SIZE];
        match *self.backing.borrow_mut() {
            Backing::File(ref mut file) => {
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut block).map_err(|e| match e.kind() {
                    io::ErrorKind::UnexpectedEof => ImgError::ShortRead.into(),
                    _ => e,
                })?;
            }
            Backing::Memory(ref bytes) => {
                let range = match Self::memory_range(offset) {
                    Some(range) if range.end <= bytes.len() => range,
                    _ => return Err(ImgError::ShortRead.into()),
                };
                block.copy_from_slice(&bytes[range]);
            }
            Backing::Closed => return Err(ImgError::Closed.into()),
        }
        Ok(block)
    }

    /// Overwrite one block in place.  `data` must be exactly one block long;
    /// anything else is rejected before the image is touched.  Writing past
    /// the current end extends the image.
    pub fn write_block(&self, index: usize, data: &[u8]) -> io::Result<()> {
        if data.len() != BLOCK_SIZE {
            return Err(ImgError::InvalidBlockLength.into());
        }
        let offset = Self::offset(index)?;
        trace!("write block {} @ 0x{:x}", index, offset);
        match *self.backing.borrow_mut() {
            Backing::File(ref mut file) => {
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(data)?;
            }
            Backing::Memory(ref mut bytes) => {
                let range = Self::memory_range(offset).ok_or(ImgError::InvalidOffset)?;
                if range.end > bytes.len() {
                    bytes
                        .try_reserve(range.end - bytes.len())
                        .map_err(|_| ImgError::InvalidOffset)?;
                    bytes.resize(range.end, 0);
                }
                bytes[range].copy_from_slice(data);
            }
            Backing::Closed => return Err(ImgError::Closed.into()),
        }
        Ok(())
    }

    pub fn flush(&self) -> io::Result<()> {
        match *self.backing.borrow_mut() {
            Backing::File(ref mut file) => file.flush(),
            Backing::Memory(_) => Ok(()),
            Backing::Closed => Err(ImgError::Closed.into()),
        }
    }

    /// Sync and release the underlying handle.  Every later operation,
    /// including a second `close`, fails with `ImgError::Closed`.
    pub fn close(&mut self) -> io::Result<()> {
        match mem::replace(self.backing.get_mut(), Backing::Closed) {
            Backing::File(file) => {
                file.sync_all()?;
                debug!("closed image");
                Ok(())
            }
            Backing::Memory(_) => Ok(()),
            Backing::Closed => Err(ImgError::Closed.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::process;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("imgblk-image-{}-{}", process::id(), name))
    }

    fn pattern(seed: u8) -> Vec<u8> {
        (0..BLOCK_SIZE).map(|i| (i as u8).wrapping_mul(seed)).collect()
    }

    #[test]
    fn test_memory_round_trip() {
        let image = Image::open_memory(4);
        image.write_block(3, &pattern(7)).unwrap();
        assert_eq!(image.read_block(3).unwrap(), pattern(7));
        assert_eq!(image.read_block(0).unwrap(), vec![0u8; BLOCK_SIZE]);
    }

    #[test]
    fn test_file_round_trip() {
        let path = temp_path("round-trip");
        {
            let mut image = Image::create(&path, 8, false).unwrap();
            assert_eq!(image.block_count().unwrap(), 8);
            image.write_block(5, &pattern(3)).unwrap();
            image.close().unwrap();
        }
        let image = Image::open(&path).unwrap();
        assert_eq!(image.read_block(5).unwrap(), pattern(3));
        drop(image);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_missing_file() {
        let e = Image::open(temp_path("does-not-exist")).err().unwrap();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_short_read() {
        let path = temp_path("short-read");
        fs::write(&path, vec![0xaau8; BLOCK_SIZE + 100]).unwrap();
        let image = Image::open(&path).unwrap();
        assert_eq!(image.block_count().unwrap(), 1);
        assert!(image.read_block(0).is_ok());
        let e = image.read_block(1).unwrap_err();
        assert!(e == ImgError::ShortRead);
        assert!(image.read_block(2).unwrap_err() == ImgError::ShortRead);
        drop(image);
        fs::remove_file(&path).unwrap();

        let memory = Image::open_memory(1);
        assert!(memory.read_block(1).unwrap_err() == ImgError::ShortRead);
    }

    #[test]
    fn test_wrong_length_write_has_no_side_effect() {
        let path = temp_path("wrong-length");
        let original = pattern(5);
        fs::write(&path, &original).unwrap();
        let image = Image::open(&path).unwrap();
        for len in &[0, 1, BLOCK_SIZE - 1, BLOCK_SIZE + 1] {
            let e = image.write_block(0, &vec![0xffu8; *len]).unwrap_err();
            assert!(e == ImgError::InvalidBlockLength);
            // Writing past the end would have grown the file.
            let e = image.write_block(4, &vec![0xffu8; *len]).unwrap_err();
            assert!(e == ImgError::InvalidBlockLength);
        }
        drop(image);
        assert_eq!(fs::read(&path).unwrap(), original);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_extends_image() {
        let image = Image::open_memory(1);
        image.write_block(3, &pattern(9)).unwrap();
        assert_eq!(image.block_count().unwrap(), 4);
        assert_eq!(image.read_block(2).unwrap(), vec![0u8; BLOCK_SIZE]);
        assert_eq!(image.read_block(3).unwrap(), pattern(9));
    }

    #[test]
    fn test_unaddressable_memory_block() {
        let image = Image::open_memory(1);
        let index = (u64::MAX / BLOCK_SIZE as u64) as usize;
        assert!(image.read_block(index).unwrap_err() == ImgError::ShortRead);
        assert!(image.write_block(index, &pattern(2)).unwrap_err() == ImgError::InvalidOffset);
        let index = isize::MAX as usize / BLOCK_SIZE + 1;
        assert!(image.read_block(index).unwrap_err() == ImgError::ShortRead);
        assert!(image.write_block(index, &pattern(2)).unwrap_err() == ImgError::InvalidOffset);
        assert_eq!(image.block_count().unwrap(), 1);
    }

    #[test]
    fn test_close() {
        let path = temp_path("close");
        let mut image = Image::create(&path, 2, false).unwrap();
        image.close().unwrap();
        assert!(image.is_closed());
        assert!(image.read_block(0).unwrap_err() == ImgError::Closed);
        assert!(image.write_block(0, &pattern(1)).unwrap_err() == ImgError::Closed);
        assert!(image.len().unwrap_err() == ImgError::Closed);
        assert!(image.flush().unwrap_err() == ImgError::Closed);
        assert!(image.close().unwrap_err() == ImgError::Closed);
        fs::remove_file(&path).unwrap();
    }
}
