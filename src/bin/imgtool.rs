extern crate clap;
extern crate imgblk;

use clap::{App, AppSettings, Arg, SubCommand};
use log::warn;
use std::env;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::process;

use imgblk::img::checksum;
use imgblk::img::directory::DIRECTORY_BLOCKS;
use imgblk::img::{self, ImgError, ImgHeader, BLOCK_SIZE};
use imgblk::logger;
use imgblk::table::{self, rules, JoinKind, Table};
use imgblk::wiki;

// Possible exit codes
static _EXIT_SUCCESS: i32 = 0;
static EXIT_FAILURE: i32 = 1;

/// If a dash is specified for an input filename, read standard input.
static STDIN_PSEUDOFILENAME: &str = "-";

const DEFAULT_TAG: &str = "TRE";

fn main() {
    logger::init(env::var(logger::LOG_LEVEL_VARIABLE).ok().as_deref());

    // Parse command-line arguments
    let app = App::new("Map Image Utility")
        .version("0.1.0")
        .about("Inspect and patch block-structured map images; join and reflow text tables.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("checksum")
                .about("Patch byte 15 so that the image's bytes sum to zero.")
                .arg(Arg::with_name("image").required(true)),
        )
        .subcommand(
            SubCommand::with_name("namesum")
                .about("Show the image header and a summary of each directory entry.")
                .arg(Arg::with_name("image").required(true)),
        )
        .subcommand(
            SubCommand::with_name("blkcopy")
                .about("Copy one logical block of a sub-file from one image to another.")
                .arg(Arg::with_name("source").required(true))
                .arg(Arg::with_name("target").required(true))
                .arg(
                    Arg::with_name("tag")
                        .validator(tag_validator)
                        .default_value(DEFAULT_TAG),
                )
                .arg(Arg::with_name("lbn").validator(lbn_validator).default_value("0")),
        )
        .subcommand(
            SubCommand::with_name("dump")
                .about("Provide a hex dump of one logical block of a sub-file.")
                .arg(Arg::with_name("image").required(true))
                .arg(Arg::with_name("tag").validator(tag_validator).required(true))
                .arg(Arg::with_name("lbn").validator(lbn_validator).default_value("0")),
        )
        .subcommand(
            SubCommand::with_name("join")
                .about("Inner join of two pipe-delimited tables on their first two fields.")
                .arg(Arg::with_name("left").required(true))
                .arg(Arg::with_name("right").required(true)),
        )
        .subcommand(
            SubCommand::with_name("leftjoin")
                .about("Left join of two pipe-delimited tables on their first two fields.")
                .arg(Arg::with_name("left").required(true))
                .arg(Arg::with_name("right").required(true)),
        )
        .subcommand(
            SubCommand::with_name("rulejoin")
                .about("Join the rules of an XML rule tree with a pipe-delimited table.")
                .arg(Arg::with_name("rules").required(true))
                .arg(Arg::with_name("table").required(true)),
        )
        .subcommand(
            SubCommand::with_name("wiki")
                .about("Convert an indented option list into wiki markup.")
                .arg(Arg::with_name("input").required(true)),
        );

    let matches = app.get_matches();

    let result = match matches.subcommand() {
        ("checksum", Some(m)) => cmd_checksum(m.value_of("image").unwrap()),
        ("namesum", Some(m)) => cmd_namesum(m.value_of("image").unwrap()),
        ("blkcopy", Some(m)) => cmd_blkcopy(
            m.value_of("source").unwrap(),
            m.value_of("target").unwrap(),
            m.value_of("tag").unwrap_or(DEFAULT_TAG),
            lbn_parser(m.value_of("lbn")),
        ),
        ("dump", Some(m)) => cmd_dump(
            m.value_of("image").unwrap(),
            m.value_of("tag").unwrap(),
            lbn_parser(m.value_of("lbn")),
        ),
        ("join", Some(m)) => cmd_join(
            m.value_of("left").unwrap(),
            m.value_of("right").unwrap(),
            JoinKind::Inner,
        ),
        ("leftjoin", Some(m)) => cmd_join(
            m.value_of("left").unwrap(),
            m.value_of("right").unwrap(),
            JoinKind::Left,
        ),
        ("rulejoin", Some(m)) => {
            cmd_rulejoin(m.value_of("rules").unwrap(), m.value_of("table").unwrap())
        }
        ("wiki", Some(m)) => cmd_wiki(m.value_of("input").unwrap()),
        _ => unreachable!(),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(EXIT_FAILURE);
    }
}

/// Require a tag argument to be three ASCII characters.
fn tag_validator(v: String) -> Result<(), String> {
    match img::parse_tag(&v) {
        Ok(_) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

/// Require a logical block number to be a non-negative integer.
fn lbn_validator(v: String) -> Result<(), String> {
    match v.parse::<usize>() {
        Ok(_) => Ok(()),
        Err(_) => Err("Expected a logical block number.".to_string()),
    }
}

fn lbn_parser(v: Option<&str>) -> usize {
    v.and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Open a file for reading
fn open_fs_reader(filename: &str) -> io::Result<Box<dyn BufRead>> {
    if filename == STDIN_PSEUDOFILENAME {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(fs::File::open(filename)?)))
    }
}

fn cmd_checksum(imagefile: &str) -> io::Result<()> {
    let patch = checksum::fix(imagefile)?;
    match patch.changed {
        Some((old, new)) => println!(
            "checksum 0x{:02x}: byte {} 0x{:02x} -> 0x{:02x}",
            patch.sum,
            checksum::CHECKSUM_OFFSET,
            old,
            new
        ),
        None => println!("checksum ok"),
    }
    Ok(())
}

fn cmd_namesum(imagefile: &str) -> io::Result<()> {
    let mut image = img::open(imagefile)?;
    match ImgHeader::read(&image) {
        Ok(header) => {
            println!("{}", header);
            if header.block_size != BLOCK_SIZE {
                warn!(
                    "header block size {} is not {}; block numbers may be wrong",
                    header.block_size, BLOCK_SIZE
                );
            }
            if header.directory_start_block as usize != *DIRECTORY_BLOCKS.start() {
                warn!(
                    "header directory start block {} is not {}",
                    header.directory_start_block,
                    DIRECTORY_BLOCKS.start()
                );
            }
            if header.xor != 0 {
                warn!("image is scrambled with xor 0x{:02x}", header.xor);
            }
        }
        Err(ref e) if *e == ImgError::InvalidHeader => {
            warn!("{}: no image header signature", imagefile)
        }
        Err(e) => return Err(e),
    }
    println!();
    for entry in img::entries(&image)? {
        let blocks = entry.physical_blocks();
        let (first, sum) = match blocks.first() {
            Some(first) => (
                first.to_string(),
                format!("0x{:02x}", checksum::sum(&entry.read_logical_block(0)?)),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{} blocks {:>3} first {:>5} sum {}",
            entry,
            blocks.len(),
            first,
            sum
        );
    }
    image.close()
}

fn cmd_blkcopy(source: &str, target: &str, tag: &str, lbn: usize) -> io::Result<()> {
    let tag = img::parse_tag(tag)?;
    let mut source_image = img::open(source)?;
    let mut target_image = img::open(target)?;
    let (from, to) = img::copy_logical_block(&source_image, &target_image, &tag, lbn)?;
    println!(
        "{} logical block {}: {} block {} -> {} block {}",
        String::from_utf8_lossy(&tag),
        lbn,
        source,
        from,
        target,
        to
    );
    target_image.close()?;
    source_image.close()
}

fn cmd_dump(imagefile: &str, tag: &str, lbn: usize) -> io::Result<()> {
    let tag = img::parse_tag(tag)?;
    let image = img::open(imagefile)?;
    let entry = img::find_entry(&image, &tag)?.ok_or(ImgError::EntryNotFound)?;
    println!("{}", entry);
    println!(
        "logical block {} (physical {}):",
        lbn,
        entry.resolve_block(lbn)?
    );
    println!("{}", imgblk::hex(&entry.read_logical_block(lbn)?));
    io::stdout().flush()?;
    Ok(())
}

fn write_join(left: &Table, right: &Table, kind: JoinKind) -> io::Result<()> {
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut diag = stderr.lock();
    table::join(left, right, kind, &mut out, &mut diag)?;
    out.flush()
}

fn cmd_join(left: &str, right: &str, kind: JoinKind) -> io::Result<()> {
    let left = Table::open(left)?;
    let right = Table::open(right)?;
    write_join(&left, &right, kind)
}

fn cmd_rulejoin(rulesfile: &str, tablefile: &str) -> io::Result<()> {
    let rules = rules::open(rulesfile)?;
    let table = Table::open(tablefile)?;
    write_join(&rules, &table, JoinKind::Inner)
}

fn cmd_wiki(input: &str) -> io::Result<()> {
    let reader = open_fs_reader(input)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    wiki::convert(reader, &mut out)?;
    out.flush()
}
