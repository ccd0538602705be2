use std::fmt;
use std::io;

use crate::img::error::ImgError;
use crate::img::image::{Image, BLOCK_SIZE};

const HEADER_BLOCK: usize = 0;

// offsets
const OFF_XOR: usize = 0x00;
const OFF_UPDATE_MONTH: usize = 0x0a;
const OFF_UPDATE_YEAR: usize = 0x0b;
const OFF_CHECKSUM: usize = 0x0f;
const OFF_SIGNATURE: usize = 0x10;
const OFF_DIRECTORY_START_BLOCK: usize = 0x40;
const OFF_FILE_ID: usize = 0x41;
const OFF_DESCRIPTION: usize = 0x49;
const OFF_BLOCK_SIZE_EXPONENT1: usize = 0x61;
const OFF_BLOCK_SIZE_EXPONENT2: usize = 0x62;
const OFF_DESCRIPTION_CONT: usize = 0x65;

const LEN_DESCRIPTION: usize = 20;
const LEN_DESCRIPTION_CONT: usize = 30;

const SIGNATURE: &[u8] = b"DSKIMG\0";
const FILE_ID: &[u8] = b"GARMIN\0";

/// The image header found in block 0.  Only the fields needed to sanity
/// check the fixed format constants are interpreted.
#[derive(Clone, Debug, PartialEq)]
pub struct ImgHeader {
    /// Non-zero when the rest of the image is XOR scrambled with this byte.
    pub xor: u8,
    pub checksum: u8,
    pub update_year: u16,
    pub update_month: u8,
    pub directory_start_block: u8,
    pub block_size: usize,
    pub description: String,
    /// Whether the `GARMIN` identifier is present.  The `DSKIMG` signature
    /// is required, this one is not.
    pub has_file_id: bool,
}

impl ImgHeader {
    pub fn read(image: &Image) -> io::Result<ImgHeader> {
        let block = image.read_block(HEADER_BLOCK)?;
        ImgHeader::from_bytes(&block)
    }

    /// Parse a header block.  Anything shorter than a block is rejected.
    pub fn from_bytes(block: &[u8]) -> io::Result<ImgHeader> {
        if block.len() < BLOCK_SIZE {
            return Err(ImgError::InvalidHeader.into());
        }
        if &block[OFF_SIGNATURE..OFF_SIGNATURE + SIGNATURE.len()] != SIGNATURE {
            return Err(ImgError::InvalidHeader.into());
        }

        let exponent = block[OFF_BLOCK_SIZE_EXPONENT1] as u32 + block[OFF_BLOCK_SIZE_EXPONENT2] as u32;
        let block_size = 1usize
            .checked_shl(exponent)
            .ok_or_else(|| ImgError::InvalidHeader.to_io_error())?;

        let mut description = String::new();
        description.push_str(&text(
            &block[OFF_DESCRIPTION..OFF_DESCRIPTION + LEN_DESCRIPTION],
        ));
        description.push_str(&text(
            &block[OFF_DESCRIPTION_CONT..OFF_DESCRIPTION_CONT + LEN_DESCRIPTION_CONT],
        ));

        Ok(ImgHeader {
            xor: block[OFF_XOR],
            checksum: block[OFF_CHECKSUM],
            update_year: 1900 + block[OFF_UPDATE_YEAR] as u16,
            update_month: block[OFF_UPDATE_MONTH],
            directory_start_block: block[OFF_DIRECTORY_START_BLOCK],
            block_size,
            description: description.trim().to_string(),
            has_file_id: &block[OFF_FILE_ID..OFF_FILE_ID + FILE_ID.len()] == FILE_ID,
        })
    }
}

/// Header text fields are space padded and sometimes NUL terminated.
fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl fmt::Display for ImgHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "description: {:?}", self.description)?;
        writeln!(
            f,
            "updated: {:04}-{:02}",
            self.update_year, self.update_month
        )?;
        writeln!(
            f,
            "block size: {} directory start: {}",
            self.block_size, self.directory_start_block
        )?;
        write!(f, "checksum byte: 0x{:02x}", self.checksum)?;
        if self.xor != 0 {
            write!(f, " xor: 0x{:02x}", self.xor)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_block(description: &str, exponent2: u8) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE];
        block[OFF_SIGNATURE..OFF_SIGNATURE + SIGNATURE.len()].copy_from_slice(SIGNATURE);
        block[OFF_FILE_ID..OFF_FILE_ID + FILE_ID.len()].copy_from_slice(FILE_ID);
        block[OFF_UPDATE_YEAR] = 126;
        block[OFF_UPDATE_MONTH] = 10;
        block[OFF_DIRECTORY_START_BLOCK] = 2;
        block[OFF_BLOCK_SIZE_EXPONENT1] = 9;
        block[OFF_BLOCK_SIZE_EXPONENT2] = exponent2;
        for b in &mut block[OFF_DESCRIPTION..OFF_DESCRIPTION + LEN_DESCRIPTION] {
            *b = b' ';
        }
        for b in &mut block[OFF_DESCRIPTION_CONT..OFF_DESCRIPTION_CONT + LEN_DESCRIPTION_CONT] {
            *b = b' ';
        }
        let bytes = description.as_bytes();
        let (first, rest) = bytes.split_at(bytes.len().min(LEN_DESCRIPTION));
        block[OFF_DESCRIPTION..OFF_DESCRIPTION + first.len()].copy_from_slice(first);
        block[OFF_DESCRIPTION_CONT..OFF_DESCRIPTION_CONT + rest.len()].copy_from_slice(rest);
        block
    }

    #[test]
    fn test_read_header() {
        let image = Image::open_memory(1);
        image
            .write_block(0, &header_block("OSM street map of somewhere", 0))
            .unwrap();
        let header = ImgHeader::read(&image).unwrap();
        assert_eq!(header.description, "OSM street map of somewhere");
        assert_eq!(header.block_size, 512);
        assert_eq!(header.directory_start_block, 2);
        assert_eq!(header.update_year, 2026);
        assert_eq!(header.update_month, 10);
        assert_eq!(header.xor, 0);
        assert!(header.has_file_id);
    }

    #[test]
    fn test_larger_block_size() {
        let header = ImgHeader::from_bytes(&header_block("map", 3)).unwrap();
        assert_eq!(header.block_size, 4096);
        assert_eq!(header.description, "map");
    }

    #[test]
    fn test_missing_signature() {
        let e = ImgHeader::from_bytes(&vec![0u8; BLOCK_SIZE]).unwrap_err();
        assert!(e == ImgError::InvalidHeader);
    }

    #[test]
    fn test_truncated_header() {
        let e = ImgHeader::from_bytes(&[0u8; 16]).unwrap_err();
        assert!(e == ImgError::InvalidHeader);
        let block = header_block("map", 0);
        let e = ImgHeader::from_bytes(&block[..BLOCK_SIZE - 1]).unwrap_err();
        assert!(e == ImgError::InvalidHeader);
    }
}
