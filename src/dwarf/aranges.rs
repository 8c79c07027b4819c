//! Address-range index over compilation units

use std::collections::HashSet;

use gimli::{DebugInfoOffset, Dwarf, UnitHeader};
use tracing::{debug, warn};

use super::Reader;
use crate::error::Result;

/// `[begin, end)` covered by the unit at `unit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arange {
    pub begin: u64,
    pub end: u64,
    pub unit: DebugInfoOffset,
}

impl Arange {
    pub fn contains(&self, address: u64) -> bool {
        self.begin <= address && address < self.end
    }
}

/// Ranges in build order: `.debug_aranges` first, then ranges taken from
/// the units that table does not list.
#[derive(Debug, Clone, Default)]
pub struct ArangeIndex {
    entries: Vec<Arange>,
}

impl ArangeIndex {
    pub fn new(entries: Vec<Arange>) -> Self {
        Self { entries }
    }

    /// First range containing `address`.
    ///
    /// Overlapping ranges (identical-code folding) resolve to the earliest
    /// entry.
    pub fn lookup(&self, address: u64) -> Option<&Arange> {
        self.entries.iter().find(|a| a.contains(address))
    }

    pub fn entries(&self) -> &[Arange] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_debug_aranges(dwarf: &Dwarf<Reader>, entries: &mut Vec<Arange>) -> Result<()> {
    let mut headers = dwarf.debug_aranges.headers();
    while let Some(header) = headers.next()? {
        let unit = header.debug_info_offset();
        let mut iter = header.entries();
        while let Some(entry) = iter.next()? {
            let begin = entry.address();
            let end = begin.saturating_add(entry.length());
            if begin < end {
                entries.push(Arange { begin, end, unit });
            }
        }
    }
    Ok(())
}

fn unit_aranges(dwarf: &Dwarf<Reader>, header: UnitHeader<Reader>, offset: DebugInfoOffset) -> Result<Vec<Arange>> {
    let unit = dwarf.unit(header)?;
    let mut entries = Vec::new();
    let mut ranges = dwarf.unit_ranges(&unit)?;
    while let Some(range) = ranges.next()? {
        if range.begin < range.end {
            entries.push(Arange {
                begin: range.begin,
                end: range.end,
                unit: offset,
            });
        }
    }
    Ok(entries)
}

/// Build the index for one image.
///
/// A corrupt `.debug_aranges` is discarded and every unit is indexed from
/// its own `DW_AT_low_pc`/`DW_AT_high_pc`/`DW_AT_ranges` instead. Units
/// whose ranges cannot be read are left out; the rest stay indexed.
pub fn build_arange_index(dwarf: &Dwarf<Reader>) -> Result<ArangeIndex> {
    let mut entries = Vec::new();
    if let Err(e) = read_debug_aranges(dwarf, &mut entries) {
        warn!(error = %e, "Ignoring malformed .debug_aranges");
        entries.clear();
    }
    let listed: HashSet<usize> = entries.iter().map(|a| a.unit.0).collect();

    let mut units = dwarf.units();
    loop {
        let header = match units.next() {
            Ok(Some(header)) => header,
            Ok(None) => break,
            Err(e) => {
                // Unit lengths chain the headers; nothing after a bad one is reachable
                warn!(error = %e, "Stopping at malformed unit header");
                break;
            }
        };
        let Some(offset) = header.offset().as_debug_info_offset() else {
            continue;
        };
        if listed.contains(&offset.0) {
            continue;
        }

        match unit_aranges(dwarf, header, offset) {
            Ok(ranges) => entries.extend(ranges),
            Err(e) => debug!(unit = offset.0, error = %e, "Skipping unit with unreadable ranges"),
        }
    }

    Ok(ArangeIndex::new(entries))
}
