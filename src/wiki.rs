//! Convert an indented plain-text option list into wiki markup.
//!
//! Option lines start in column 0 with `-` and become `;` definition terms.
//! The indented text under an option becomes `:` definitions, one per
//! paragraph.  Text indented deeper than the first description line is kept
//! verbatim inside `<pre>`.  Anything else in column 0 is copied through.

use std::io::{self, BufRead, Write};

const TAB_WIDTH: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Plain text between options.
    Outside,
    /// Just after an option line, before its description.
    Option,
    /// Inside an option's description.
    Description,
}

/// Width of the leading whitespace, with tabs advancing to the next tab stop,
/// and the text after it.
fn indentation(line: &str) -> (usize, &str) {
    let mut width = 0;
    for (i, c) in line.char_indices() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
            _ => return (width, &line[i..]),
        }
    }
    (width, "")
}

/// Line-at-a-time converter state.
#[derive(Debug)]
pub struct Reflow {
    mode: Mode,
    preserve: bool,
    base_indent: usize,
    paragraph: Vec<String>,
    pending_blanks: usize,
}

impl Default for Reflow {
    fn default() -> Reflow {
        Reflow::new()
    }
}

impl Reflow {
    pub fn new() -> Reflow {
        Reflow {
            mode: Mode::Outside,
            preserve: false,
            base_indent: 0,
            paragraph: vec![],
            pending_blanks: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn preserving(&self) -> bool {
        self.preserve
    }

    fn flush_paragraph<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        if !self.paragraph.is_empty() {
            writeln!(out, ":{}", self.paragraph.join(" "))?;
            self.paragraph.clear();
        }
        Ok(())
    }

    fn close_preserve<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        if self.preserve {
            writeln!(out, "</pre>")?;
            self.preserve = false;
        }
        // Blank lines at the end of a preserved block are dropped.
        self.pending_blanks = 0;
        Ok(())
    }

    fn end_description<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        self.flush_paragraph(out)?;
        self.close_preserve(out)
    }

    fn blank<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        match self.mode {
            Mode::Outside => writeln!(out),
            Mode::Option => Ok(()),
            Mode::Description if self.preserve => {
                self.pending_blanks += 1;
                Ok(())
            }
            Mode::Description => self.flush_paragraph(out),
        }
    }

    fn description<W: Write + ?Sized>(
        &mut self,
        indent: usize,
        text: &str,
        out: &mut W,
    ) -> io::Result<()> {
        if indent > self.base_indent {
            if self.preserve {
                for _ in 0..self.pending_blanks {
                    writeln!(out)?;
                }
                self.pending_blanks = 0;
            } else {
                self.flush_paragraph(out)?;
                writeln!(out, "<pre>")?;
                self.preserve = true;
            }
            writeln!(out, "{}{}", " ".repeat(indent - self.base_indent), text)
        } else {
            self.close_preserve(out)?;
            self.base_indent = indent;
            self.paragraph.push(text.to_string());
            Ok(())
        }
    }

    /// Feed one input line (without its line terminator).
    pub fn line<W: Write + ?Sized>(&mut self, line: &str, out: &mut W) -> io::Result<()> {
        let line = line.trim_end();
        if line.is_empty() {
            return self.blank(out);
        }
        let (indent, text) = indentation(line);
        if indent == 0 {
            self.end_description(out)?;
            if text.starts_with('-') {
                writeln!(out, ";{}", text)?;
                self.mode = Mode::Option;
            } else {
                writeln!(out, "{}", text)?;
                self.mode = Mode::Outside;
            }
            return Ok(());
        }
        match self.mode {
            Mode::Outside => writeln!(out, "{}", line),
            Mode::Option => {
                self.mode = Mode::Description;
                self.base_indent = indent;
                self.paragraph.push(text.to_string());
                Ok(())
            }
            Mode::Description => self.description(indent, text, out),
        }
    }

    /// Flush whatever is still open at the end of the input.
    pub fn finish<W: Write + ?Sized>(mut self, out: &mut W) -> io::Result<()> {
        self.end_description(out)
    }
}

pub fn convert<R: BufRead, W: Write + ?Sized>(input: R, out: &mut W) -> io::Result<()> {
    let mut reflow = Reflow::new();
    for line in input.lines() {
        reflow.line(&line?, out)?;
    }
    reflow.finish(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> String {
        let mut out = Vec::new();
        convert(input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_indentation() {
        assert_eq!(indentation("abc"), (0, "abc"));
        assert_eq!(indentation("   abc"), (3, "abc"));
        assert_eq!(indentation("\tabc"), (8, "abc"));
        assert_eq!(indentation("  \t abc"), (9, "abc"));
        assert_eq!(indentation("    "), (4, ""));
    }

    #[test]
    fn test_convert() {
        let input = "\
Options for the map compiler.

--output-dir=dir
    Write output files to dir. The
    directory must exist.

    Second paragraph.
        example --output-dir=/tmp

        more example

    After the example.
--help
Trailer
";
        let expected = "\
Options for the map compiler.

;--output-dir=dir
:Write output files to dir. The directory must exist.
:Second paragraph.
<pre>
    example --output-dir=/tmp

    more example
</pre>
:After the example.
;--help
Trailer
";
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_unterminated_blocks() {
        assert_eq!(
            run("-a\n\tone\n\t\ttwo"),
            ";-a\n:one\n<pre>\n        two\n</pre>\n"
        );
    }

    #[test]
    fn test_outside_indented_text() {
        assert_eq!(run("Intro\n   indented\n-x\n"), "Intro\n   indented\n;-x\n");
    }

    #[test]
    fn test_modes() {
        let mut reflow = Reflow::new();
        let mut out = Vec::new();
        assert_eq!(reflow.mode(), Mode::Outside);
        reflow.line("--opt", &mut out).unwrap();
        assert_eq!(reflow.mode(), Mode::Option);
        reflow.line("  text", &mut out).unwrap();
        assert_eq!(reflow.mode(), Mode::Description);
        reflow.line("    code", &mut out).unwrap();
        assert!(reflow.preserving());
        reflow.line("  text", &mut out).unwrap();
        assert!(!reflow.preserving());
        reflow.line("plain", &mut out).unwrap();
        assert_eq!(reflow.mode(), Mode::Outside);
    }
}
