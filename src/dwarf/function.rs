//! Subprogram search inside one compilation unit

use gimli::{constants, AttributeValue, DebugInfoOffset, DebuggingInformationEntry, Dwarf, Unit};

use super::{attr_to_string, DwarfReader, Reader};
use crate::error::Result;

/// Placeholder for subprograms that carry no usable name
pub const UNKNOWN_NAME: &str = "??";

// Bounds specification/abstract-origin chains
const MAX_NAME_DEPTH: usize = 8;

/// A subprogram covering the queried address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionMatch {
    pub name: String,
    /// Entry address of the subprogram
    pub start: u64,
    pub displacement: u64,
    /// Owning compilation unit
    pub unit: DebugInfoOffset,
}

type Entry<'abbrev, 'unit> = DebuggingInformationEntry<'abbrev, 'unit, Reader>;

/// `[low_pc, high_pc)` of an entry.
///
/// An address-class `DW_AT_high_pc` is absolute; a constant-class one is
/// the length of the range.
fn pc_bounds(dwarf: &Dwarf<Reader>, unit: &Unit<Reader>, entry: &Entry) -> Result<Option<(u64, u64)>> {
    let Some(low) = entry.attr_value(constants::DW_AT_low_pc)? else {
        return Ok(None);
    };
    let Some(low) = dwarf.attr_address(unit, low)? else {
        return Ok(None);
    };
    let Some(high) = entry.attr_value(constants::DW_AT_high_pc)? else {
        return Ok(None);
    };

    let high = match dwarf.attr_address(unit, high.clone())? {
        Some(address) => address,
        None => match high.udata_value() {
            Some(length) => low.wrapping_add(length),
            None => return Ok(None),
        },
    };
    Ok(Some((low, high)))
}

/// Entry address of the subprogram when its code covers `address`.
fn covering_start(
    dwarf: &Dwarf<Reader>,
    unit: &Unit<Reader>,
    entry: &Entry,
    address: u64,
) -> Result<Option<u64>> {
    if let Some((low, high)) = pc_bounds(dwarf, unit, entry)? {
        return Ok((low <= address && address < high).then_some(low));
    }
    if entry.attr_value(constants::DW_AT_ranges)?.is_none() {
        return Ok(None);
    }

    // Non-contiguous code: the lowest range start is the entry point
    let mut ranges = dwarf.die_ranges(unit, entry)?;
    let mut start: Option<u64> = None;
    let mut covered = false;
    while let Some(range) = ranges.next()? {
        if range.begin >= range.end {
            continue;
        }
        start = Some(start.map_or(range.begin, |s| s.min(range.begin)));
        covered |= range.begin <= address && address < range.end;
    }
    Ok(if covered { start } else { None })
}

fn entry_name(reader: &DwarfReader, unit: &Unit<Reader>, entry: &Entry, depth: usize) -> Result<Option<String>> {
    for attr in [
        constants::DW_AT_name,
        constants::DW_AT_linkage_name,
        constants::DW_AT_MIPS_linkage_name,
    ] {
        if let Some(value) = entry.attr_value(attr)? {
            return attr_to_string(&reader.dwarf, unit, value).map(Some);
        }
    }

    if depth >= MAX_NAME_DEPTH {
        return Ok(None);
    }
    for attr in [constants::DW_AT_specification, constants::DW_AT_abstract_origin] {
        match entry.attr_value(attr)? {
            Some(AttributeValue::UnitRef(offset)) => {
                let target = unit.entry(offset)?;
                return entry_name(reader, unit, &target, depth + 1);
            }
            // DW_FORM_ref_addr, possibly into another unit
            Some(AttributeValue::DebugInfoRef(offset)) => {
                let Some((target_unit, local)) = reader.unit_containing(offset)? else {
                    return Ok(None);
                };
                let target = target_unit.entry(local)?;
                return entry_name(reader, &target_unit, &target, depth + 1);
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Depth-first search of `unit` for the subprogram covering `address`.
pub(crate) fn search(
    reader: &DwarfReader,
    unit: &Unit<Reader>,
    unit_offset: DebugInfoOffset,
    address: u64,
) -> Result<Option<FunctionMatch>> {
    let mut entries = unit.entries();
    while let Some((_, entry)) = entries.next_dfs()? {
        if entry.tag() != constants::DW_TAG_subprogram {
            continue;
        }
        let Some(start) = covering_start(&reader.dwarf, unit, entry, address)? else {
            continue;
        };

        let name = entry_name(reader, unit, entry, 0)?.unwrap_or_else(|| UNKNOWN_NAME.to_string());
        return Ok(Some(FunctionMatch {
            name,
            start,
            displacement: address - start,
            unit: unit_offset,
        }));
    }
    Ok(None)
}
