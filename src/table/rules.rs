//! Flatten an XML rule tree into a joinable table.
//!
//! ```xml
//! <rules>
//!   <rule type="0x2f" name="Services">
//!     <rule subtype="0x01" name="Fuel"/>
//!     <rule subtype="0x02"/>
//!   </rule>
//! </rules>
//! ```
//!
//! Nested rules inherit their ancestors' attributes.  Every rule that ends
//! up with both a `type` and a `subtype` becomes the row
//! `type|subtype|name`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::table::{Row, Table};

const RULE_ELEMENT: &[u8] = b"rule";
const TYPE_ATTRIBUTE: &str = "type";
const SUBTYPE_ATTRIBUTE: &str = "subtype";
const NAME_ATTRIBUTE: &str = "name";

type Attributes = BTreeMap<String, String>;

fn xml_error<E: std::fmt::Display>(position: usize, error: E) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("xml error at byte {}: {}", position, error),
    )
}

/// Merge a rule's own attributes over the inherited ones.
fn inherit(parent: &Attributes, element: &BytesStart, position: usize) -> io::Result<Attributes> {
    let mut attributes = parent.clone();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| xml_error(position, e))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| xml_error(position, e))?
            .trim()
            .to_string();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

fn push_rule(table: &mut Table, attributes: &Attributes, line: usize) {
    match (
        attributes.get(TYPE_ATTRIBUTE),
        attributes.get(SUBTYPE_ATTRIBUTE),
    ) {
        (Some(kind), Some(subtype)) => {
            let name = attributes.get(NAME_ATTRIBUTE).cloned().unwrap_or_default();
            table.push(Row {
                line,
                fields: vec![kind.clone(), subtype.clone(), name],
            });
        }
        _ => debug!("line {}: rule has no complete key; skipped", line),
    }
}

/// Counts lines up to a byte position, scanning forward only.
struct LineCounter<'t> {
    text: &'t str,
    position: usize,
    line: usize,
}

impl<'t> LineCounter<'t> {
    fn new(text: &'t str) -> LineCounter<'t> {
        LineCounter {
            text,
            position: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, position: usize) -> usize {
        let position = position.min(self.text.len());
        if position > self.position {
            self.line += self.text.as_bytes()[self.position..position]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.position = position;
        }
        self.line
    }
}

/// Parse a rule tree.  Each row records the line its rule starts on.
pub fn parse(text: &str) -> io::Result<Table> {
    let mut reader = Reader::from_str(text);
    let mut lines = LineCounter::new(text);
    let mut table = Table::new();
    let mut stack: Vec<Attributes> = vec![Attributes::new()];
    let mut rules = 0;
    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == RULE_ELEMENT => {
                rules += 1;
                let attributes = inherit(stack.last().unwrap_or(&Attributes::new()), e, position)?;
                push_rule(&mut table, &attributes, lines.line_at(position));
                stack.push(attributes);
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == RULE_ELEMENT => {
                rules += 1;
                let attributes = inherit(stack.last().unwrap_or(&Attributes::new()), e, position)?;
                push_rule(&mut table, &attributes, lines.line_at(position));
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == RULE_ELEMENT => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(xml_error(position, e)),
        }
    }
    debug!("{} rules, {} rows", rules, table.len());
    Ok(table)
}

pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Table> {
    parse(&fs::read_to_string(path)?)
}
