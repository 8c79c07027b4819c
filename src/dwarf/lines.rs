//! Line-number program decoding and search

use std::collections::HashMap;

use gimli::{Dwarf, FileEntry, LineProgramHeader, Unit};

use super::{attr_to_string, Reader};
use crate::error::Result;

/// One decoded row of a line-number program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRow {
    pub address: u64,
    pub line: u32,
    /// Index into `LineTable::files`
    pub file: usize,
    pub end_sequence: bool,
}

/// Source location covering a queried address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub file: String,
    pub line: u32,
    /// Address of the matched row
    pub address: u64,
    pub displacement: u64,
}

/// Rows of one compilation unit, in program order
#[derive(Debug, Clone, Default)]
pub struct LineTable {
    rows: Vec<LineRow>,
    files: Vec<String>,
}

impl LineTable {
    pub fn new(rows: Vec<LineRow>, files: Vec<String>) -> Self {
        Self { rows, files }
    }

    pub fn rows(&self) -> &[LineRow] {
        &self.rows
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn find(&self, address: u64) -> Option<LineMatch> {
        let row = nearest_row(&self.rows, address)?;
        Some(LineMatch {
            file: self.files.get(row.file)?.clone(),
            line: row.line,
            address: row.address,
            displacement: address - row.address,
        })
    }
}

/// The row covering `address`: an exact address match, otherwise the last
/// row at or before `address` whose successor starts after it.
///
/// Rows at address 0 never match and do not bound their neighbours. The
/// row before an end-of-sequence marker covers up to the marker.
pub fn nearest_row(rows: &[LineRow], address: u64) -> Option<&LineRow> {
    let mut prev: Option<&LineRow> = None;
    for row in rows {
        if row.address == 0 {
            continue;
        }
        if let Some(p) = prev {
            if p.address < address && address < row.address {
                return Some(p);
            }
        }
        if row.end_sequence {
            prev = None;
            continue;
        }
        if row.address == address {
            return Some(row);
        }
        prev = Some(row);
    }
    None
}

fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with(['/', '\\']) || (bytes.len() > 2 && bytes[1] == b':' && matches!(bytes[2], b'/' | b'\\'))
}

fn file_path(
    dwarf: &Dwarf<Reader>,
    unit: &Unit<Reader>,
    header: &LineProgramHeader<Reader>,
    file: &FileEntry<Reader>,
) -> Result<String> {
    let name = attr_to_string(dwarf, unit, file.path_name())?;
    if is_absolute(&name) {
        return Ok(name);
    }
    let Some(dir) = file.directory(header) else {
        return Ok(name);
    };
    let dir = attr_to_string(dwarf, unit, dir)?;
    if dir.is_empty() {
        return Ok(name);
    }

    let sep = if dir.contains('\\') { '\\' } else { '/' };
    Ok(format!("{}{}{}", dir.trim_end_matches(['/', '\\']), sep, name))
}

/// Decode the line program of `unit`.
///
/// Sequences that start at address 0 are dropped entirely; some linkers
/// emit them for discarded link-once sections.
pub(crate) fn build_line_table(dwarf: &Dwarf<Reader>, unit: &Unit<Reader>) -> Result<LineTable> {
    let Some(program) = unit.line_program.clone() else {
        return Ok(LineTable::default());
    };

    let mut table = LineTable::default();
    let mut slots: HashMap<u64, usize> = HashMap::new();
    let mut sequence_start = true;
    let mut discarding = false;

    let mut rows = program.rows();
    while let Some((header, row)) = rows.next_row()? {
        if sequence_start {
            discarding = row.address() == 0;
            sequence_start = false;
        }
        if row.end_sequence() {
            sequence_start = true;
        }
        if discarding {
            continue;
        }

        let file = match slots.get(&row.file_index()) {
            Some(&slot) => slot,
            None => {
                let path = match row.file(header) {
                    Some(entry) => file_path(dwarf, unit, header, entry)?,
                    None => super::function::UNKNOWN_NAME.to_string(),
                };
                table.files.push(path);
                slots.insert(row.file_index(), table.files.len() - 1);
                table.files.len() - 1
            }
        };

        table.rows.push(LineRow {
            address: row.address(),
            line: row.line().map_or(0, |l| l.get() as u32),
            file,
            end_sequence: row.end_sequence(),
        });
    }

    Ok(table)
}
