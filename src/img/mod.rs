//! Block-level access to map image containers.
//!
//! An image is a flat file of 512-byte blocks.  A handful of blocks near the
//! start of the image are directory blocks; each names a sub-file with a
//! three byte type tag and carries a table translating the sub-file's
//! logical block numbers into physical block numbers of the image.

mod error;
mod image;

pub mod checksum;
pub mod directory;
pub mod header;

use std::io;
use std::path::Path;

use log::debug;

pub use self::directory::{
    directory, entries, find_entry, parse_tag, Directory, DirectoryEntry, Tag,
};
pub use self::error::ImgError;
pub use self::header::ImgHeader;
pub use self::image::{Image, BLOCK_SIZE};

/// Open an image for reading and writing.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Image> {
    Image::open(path)
}

/// Copy logical block `lbn` of the sub-file tagged `tag` from one image to
/// the same logical block of the same sub-file in another image.  Returns
/// the physical block numbers read from and written to.
pub fn copy_logical_block(
    source: &Image,
    target: &Image,
    tag: &Tag,
    lbn: usize,
) -> io::Result<(u16, u16)> {
    let source_entry = find_entry(source, tag)?.ok_or(ImgError::EntryNotFound)?;
    let target_entry = find_entry(target, tag)?.ok_or(ImgError::EntryNotFound)?;
    let data = source_entry.read_logical_block(lbn)?;
    target_entry.write_logical_block(lbn, &data)?;
    let from = source_entry.resolve_block(lbn)?;
    let to = target_entry.resolve_block(lbn)?;
    debug!(
        "copied {} logical block {}: physical {} -> {}",
        String::from_utf8_lossy(tag),
        lbn,
        from,
        to
    );
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::directory::tests::directory_block;

    #[test]
    fn test_copy_logical_block() {
        let source = Image::open_memory(16);
        let target = Image::open_memory(16);
        source
            .write_block(3, &directory_block("SRC", b"RGN", 0, &[12, 13]))
            .unwrap();
        target
            .write_block(8, &directory_block("DST", b"RGN", 0, &[14, 15]))
            .unwrap();
        let payload: Vec<u8> = (0..BLOCK_SIZE).map(|i| (i % 13) as u8).collect();
        source.write_block(13, &payload).unwrap();

        assert_eq!(copy_logical_block(&source, &target, b"RGN", 1).unwrap(), (13, 15));
        assert_eq!(target.read_block(15).unwrap(), payload);
        assert_eq!(target.read_block(14).unwrap(), vec![0u8; BLOCK_SIZE]);
    }

    #[test]
    fn test_copy_missing_entry() {
        let source = Image::open_memory(16);
        let target = Image::open_memory(16);
        source
            .write_block(3, &directory_block("SRC", b"RGN", 0, &[12]))
            .unwrap();
        let e = copy_logical_block(&source, &target, b"RGN", 0).unwrap_err();
        assert!(e == ImgError::EntryNotFound);
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }
}
