//! Source snippets around a frame's line

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::trace;

/// Write lines `line - context ..= line + context` of `path`, marking
/// `line` with `>`. Non-printable characters are dropped.
///
/// Returns `Ok(false)` when the file cannot be read; debug info often
/// names build-machine paths that do not exist here.
pub fn write_snippet<W: fmt::Write>(out: &mut W, path: impl AsRef<Path>, line: u32, context: u32) -> Result<bool, fmt::Error> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            trace!(file = %path.display(), error = %e, "Source not available");
            return Ok(false);
        }
    };

    let first = line.saturating_sub(context).max(1);
    let last = line.saturating_add(context);
    for (number, text) in (1u32..).zip(BufReader::new(file).split(b'\n')) {
        if number > last {
            break;
        }
        let Ok(text) = text else {
            break;
        };
        if number < first {
            continue;
        }

        if number == line {
            write!(out, ">{number:5}: ")?;
        } else {
            write!(out, "{number:6}: ")?;
        }
        for &b in &text {
            if b == b' ' || b.is_ascii_graphic() {
                out.write_char(char::from(b))?;
            }
        }
        writeln!(out)?;
    }
    Ok(true)
}
