//! Directory blocks and logical to physical block translation

use std::fmt;
use std::io;
use std::ops::RangeInclusive;

use log::{debug, trace};

use crate::img::error::ImgError;
use crate::img::image::{Image, BLOCK_SIZE};
use crate::util;

/// Physical blocks that may hold directory entries.  Inferred from sample
/// images; the header's own directory start block is not consulted.
pub const DIRECTORY_BLOCKS: RangeInclusive<usize> = 2..=11;

pub const TAG_SIZE: usize = 3;

const ENTRY_USED_OFFSET: usize = 0x00;
const ENTRY_NAME_OFFSET: usize = 0x01;
const ENTRY_NAME_SIZE: usize = 8;
const ENTRY_TAG_OFFSET: usize = 0x09;
const ENTRY_SIZE_OFFSET: usize = 0x0c;
const ENTRY_FLAG_OFFSET: usize = 0x10;
const ENTRY_PART_OFFSET: usize = 0x11;
const BLOCK_TABLE_OFFSET: usize = 0x20;

const ENTRY_USED: u8 = 0x01;
const ENTRY_FLAG_SPECIAL: u8 = 0x03;

/// Number of slots in a directory block's block table.
pub const BLOCK_TABLE_ENTRIES: usize = (BLOCK_SIZE - BLOCK_TABLE_OFFSET) / 2;

/// Block table value of a slot with no physical block behind it.
pub const UNMAPPED_BLOCK: u16 = 0xffff;

/// A three byte sub-file type such as `TRE`, `RGN` or `LBL`.
pub type Tag = [u8; TAG_SIZE];

/// Parse a command-line style tag.  Exactly three ASCII characters are
/// accepted, and case is preserved.
pub fn parse_tag(string: &str) -> io::Result<Tag> {
    let bytes = string.as_bytes();
    if bytes.len() != TAG_SIZE || !string.is_ascii() {
        return Err(ImgError::InvalidTag.into());
    }
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(bytes);
    Ok(tag)
}

fn le16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn le32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// One logical sub-file of an image, as described by a directory block.
///
/// The entry keeps a copy of the directory block taken when it was located
/// and borrows the image it came from.  Rewriting the directory block on disk
/// leaves the copy stale until `reload` is called.
pub struct DirectoryEntry<'a> {
    image: &'a Image,
    block: Vec<u8>,
    dir_block_num: usize,
}

impl<'a> DirectoryEntry<'a> {
    fn new(image: &'a Image, block: Vec<u8>, dir_block_num: usize) -> DirectoryEntry<'a> {
        DirectoryEntry {
            image,
            block,
            dir_block_num,
        }
    }

    #[inline]
    pub fn image(&self) -> &'a Image {
        self.image
    }

    /// Physical block number of the directory block itself.
    #[inline]
    pub fn dir_block_num(&self) -> usize {
        self.dir_block_num
    }

    /// Raw directory block contents.
    #[inline]
    pub fn block(&self) -> &[u8] {
        &self.block
    }

    pub fn tag(&self) -> Tag {
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&self.block[ENTRY_TAG_OFFSET..ENTRY_TAG_OFFSET + TAG_SIZE]);
        tag
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        &self.block[ENTRY_TAG_OFFSET..ENTRY_TAG_OFFSET + TAG_SIZE] == tag
    }

    /// Sub-file name with its space padding removed.
    pub fn name(&self) -> String {
        let name = &self.block[ENTRY_NAME_OFFSET..ENTRY_NAME_OFFSET + ENTRY_NAME_SIZE];
        String::from_utf8_lossy(name).trim_end().to_string()
    }

    pub fn is_used(&self) -> bool {
        self.block[ENTRY_USED_OFFSET] == ENTRY_USED
    }

    /// The special entry covers the image header and the directory itself.
    pub fn is_special(&self) -> bool {
        self.block[ENTRY_FLAG_OFFSET] == ENTRY_FLAG_SPECIAL
    }

    /// Sub-file size in bytes.  Only the first part of a sub-file carries it.
    pub fn size(&self) -> u32 {
        le32(&self.block, ENTRY_SIZE_OFFSET)
    }

    pub fn part(&self) -> u16 {
        le16(&self.block, ENTRY_PART_OFFSET)
    }

    /// Translate a logical block number into a physical block number using
    /// the block table at offset 0x20.  The raw table value is returned, so
    /// an unused slot yields `UNMAPPED_BLOCK`.
    pub fn resolve_block(&self, lbn: usize) -> io::Result<u16> {
        if lbn >= BLOCK_TABLE_ENTRIES {
            return Err(ImgError::InvalidLogicalBlock.into());
        }
        Ok(le16(&self.block, BLOCK_TABLE_OFFSET + 2 * lbn))
    }

    fn resolve_mapped(&self, lbn: usize) -> io::Result<usize> {
        match self.resolve_block(lbn)? {
            UNMAPPED_BLOCK => Err(ImgError::UnmappedBlock.into()),
            block => {
                trace!(
                    "{}: logical block {} -> physical block {}",
                    self.dir_block_num,
                    lbn,
                    block
                );
                Ok(block as usize)
            }
        }
    }

    /// The mapped prefix of the block table.
    pub fn physical_blocks(&self) -> Vec<u16> {
        (0..BLOCK_TABLE_ENTRIES)
            .map(|lbn| le16(&self.block, BLOCK_TABLE_OFFSET + 2 * lbn))
            .take_while(|&block| block != UNMAPPED_BLOCK)
            .collect()
    }

    pub fn read_logical_block(&self, lbn: usize) -> io::Result<Vec<u8>> {
        let block = self.resolve_mapped(lbn)?;
        self.image.read_block(block)
    }

    pub fn write_logical_block(&self, lbn: usize, data: &[u8]) -> io::Result<()> {
        if data.len() != BLOCK_SIZE {
            return Err(ImgError::InvalidBlockLength.into());
        }
        let block = self.resolve_mapped(lbn)?;
        self.image.write_block(block, data)
    }

    /// Re-read the directory block from the image.
    pub fn reload(&mut self) -> io::Result<()> {
        self.block = self.image.read_block(self.dir_block_num)?;
        Ok(())
    }
}

impl<'a> fmt::Display for DirectoryEntry<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:<3} {:<8}.{} {:>9} part {}",
            self.dir_block_num,
            self.name(),
            String::from_utf8_lossy(&self.tag()),
            self.size(),
            self.part(),
        )?;
        if f.alternate() {
            writeln!(f)?;
            util::hexdump(f, "    ", &self.block)?;
        }
        Ok(())
    }
}

impl<'a> fmt::Debug for DirectoryEntry<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DirectoryEntry")
            .field("dir_block_num", &self.dir_block_num)
            .field("tag", &String::from_utf8_lossy(&self.tag()))
            .field("name", &self.name())
            .finish()
    }
}

/// Iterate over every block of the directory region, used or not.  Blocks
/// of the region that lie past the end of the image are skipped.
pub struct Directory<'a> {
    image: &'a Image,
    blocks: RangeInclusive<usize>,
}

impl<'a> Iterator for Directory<'a> {
    type Item = io::Result<DirectoryEntry<'a>>;

    fn next(&mut self) -> Option<io::Result<DirectoryEntry<'a>>> {
        let index = self.blocks.next()?;
        Some(
            self.image
                .read_block(index)
                .map(|block| DirectoryEntry::new(self.image, block, index)),
        )
    }
}

pub fn directory(image: &Image) -> io::Result<Directory> {
    let block_count = image.block_count()?;
    // Empty when the image ends before the first directory block.
    let last = (*DIRECTORY_BLOCKS.end()).min(block_count.saturating_sub(1));
    let blocks = *DIRECTORY_BLOCKS.start()..=last;
    if block_count <= *DIRECTORY_BLOCKS.end() {
        debug!(
            "image has {} blocks; directory scan stops early",
            block_count
        );
    }
    Ok(Directory { image, blocks })
}

/// All directory entries marked as used.
pub fn entries(image: &Image) -> io::Result<Vec<DirectoryEntry>> {
    let mut entries = vec![];
    for entry in directory(image)? {
        let entry = entry?;
        if entry.is_used() {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Find the first directory block whose type tag matches.  A missing entry
/// is an ordinary outcome and is reported as `Ok(None)`.
pub fn find_entry<'a>(image: &'a Image, tag: &Tag) -> io::Result<Option<DirectoryEntry<'a>>> {
    for entry in directory(image)? {
        let entry = entry?;
        if entry.has_tag(tag) {
            debug!(
                "found {} at block {}",
                String::from_utf8_lossy(tag),
                entry.dir_block_num
            );
            return Ok(Some(entry));
        }
    }
    debug!("no directory entry for {}", String::from_utf8_lossy(tag));
    Ok(None)
}
