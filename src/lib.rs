//! This is a Rust library for poking at the block-structured map image
//! containers used by Garmin GPS units, plus a few small text utilities that
//! are handy when reverse engineering them.
//!
//! Features:
//!
//! * Random access to the 512-byte blocks of an image file.
//! * Locate a sub-file's directory block by its three byte type tag (`TRE`,
//!   `RGN`, `LBL`, ...).
//! * Translate a sub-file's logical block numbers into physical blocks, and
//!   read or write through that mapping.
//! * Parse the image header.
//! * Compute and patch the whole-image checksum.
//! * Join pipe-delimited tables (or an XML rule tree) on a composite key.
//! * Reflow an indented plain-text option list into wiki markup.
//! * A sample `imgtool` program that exposes all of the above.
//!
//! # Example
//!
//! Read the first block of the label sub-file:
//!
//! ```no_run
//! use std::io;
//! use imgblk::img;
//! # fn first_label_block() -> io::Result<()> {
//!
//! let image = img::open("/tmp/gmapsupp.img")?;
//! match img::find_entry(&image, b"LBL")? {
//!     Some(entry) => {
//!         let block = entry.read_logical_block(0)?;
//!         println!("{} -> {} bytes", entry, block.len());
//!     }
//!     None => println!("no LBL sub-file"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design of image access
//!
//! 1. `Image` provides block access to the underlying storage, either an
//!    image file or an in-memory buffer.  It can be closed explicitly, after
//!    which every operation fails; dropping it closes it as well.
//! 2. `DirectoryEntry` is a snapshot of one directory block plus a shared
//!    borrow of its `Image`, so an entry can never outlive the image it came
//!    from.  Because entries only hold `&Image`, `Image` keeps its storage in
//!    a `RefCell` and writes go through a shared reference.
//! 3. Looking up a tag that is not present is not an error: `find_entry`
//!    returns `Ok(None)`.  Bad arguments (wrong block length, a logical block
//!    number beyond the block table) are errors, and are checked before the
//!    image is touched.
//!
//! The directory scan range (blocks 2 through 11) and the checksum byte
//! (offset 15) are fixed.  They were worked out from sample images and may
//! not hold for every variant of the format; `imgtool namesum` warns when
//! the header disagrees.

pub mod img;
pub mod logger;
pub mod table;
pub mod wiki;

mod util;

pub use crate::util::{hex, Hex};
