//! Export table parsing

use std::collections::HashMap;

use crate::formats::pe::sections::SectionTable;
use crate::formats::pe::types::*;
use crate::formats::pe::utils::{read_cstring, ReadExt};

/// Export table containing all exports, sorted by RVA
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    pub dll_name: Option<String>,
    pub ordinal_base: u32,
    pub exports: Vec<ExportEntry>,
}

impl ExportTable {
    /// Get export by name
    pub fn get_by_name(&self, name: &str) -> Option<&ExportEntry> {
        self.exports.iter().find(|e| e.name.as_deref() == Some(name))
    }

    /// Count of exports
    pub fn count(&self) -> usize {
        self.exports.len()
    }

    /// Closest preceding named, non-forwarded export for `rva`.
    ///
    /// Returns the export and the displacement from its start.
    pub fn nearest(&self, rva: u32) -> Option<(&ExportEntry, u32)> {
        let idx = self.exports.partition_point(|e| e.rva <= rva);
        self.exports[..idx]
            .iter()
            .rev()
            .find(|e| e.name.is_some() && e.forwarder.is_none())
            .map(|e| (e, rva - e.rva))
    }
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.read_u32_le_at(offset)
        .ok_or(PeError::InvalidOffset { offset })
}

/// Parse export table from PE data
pub fn parse_exports(
    data: &[u8],
    sections: &SectionTable,
    export_dir: &DataDirectory,
    options: &ParseOptions,
) -> Result<ExportTable> {
    if !export_dir.is_present() {
        return Ok(ExportTable::default());
    }

    let rva_to_offset = |rva: u32| sections.rva_to_offset(rva).ok_or(PeError::InvalidRva { rva });

    let dir_offset = rva_to_offset(export_dir.virtual_address)?;
    if dir_offset.saturating_add(40) > data.len() {
        return Err(PeError::MalformedExportTable);
    }

    let name_rva = read_u32(data, dir_offset + 12)?;
    let ordinal_base = read_u32(data, dir_offset + 16)?;
    let number_of_functions = read_u32(data, dir_offset + 20)?.min(options.max_exports as u32);
    let number_of_names = read_u32(data, dir_offset + 24)?.min(options.max_exports as u32);
    let address_table_rva = read_u32(data, dir_offset + 28)?;
    let name_table_rva = read_u32(data, dir_offset + 32)?;
    let ordinal_table_rva = read_u32(data, dir_offset + 36)?;

    let dll_name = match name_rva {
        0 => None,
        rva => read_cstring(data, rva_to_offset(rva)?, 256)
            .ok()
            .map(str::to_string),
    };

    let addr_offset = rva_to_offset(address_table_rva)?;
    let addresses: Vec<u32> = (0..number_of_functions as usize)
        .map_while(|i| data.read_u32_le_at(addr_offset + i * 4))
        .collect();

    // Function index -> name
    let mut names: HashMap<usize, String> = HashMap::new();
    if number_of_names > 0 && name_table_rva != 0 && ordinal_table_rva != 0 {
        let name_offset = rva_to_offset(name_table_rva)?;
        let ord_offset = rva_to_offset(ordinal_table_rva)?;

        for i in 0..number_of_names as usize {
            let (Some(name_rva), Some(index)) = (
                data.read_u32_le_at(name_offset + i * 4),
                data.read_u16_le_at(ord_offset + i * 2),
            ) else {
                break;
            };
            let Some(off) = sections.rva_to_offset(name_rva) else {
                continue;
            };
            if let Ok(name) = read_cstring(data, off, 512) {
                names.insert(index as usize, name.to_string());
            }
        }
    }

    let mut exports: Vec<ExportEntry> = addresses
        .iter()
        .enumerate()
        .filter(|(_, rva)| **rva != 0)
        .map(|(i, &rva)| {
            // An RVA inside the export directory is a forwarder string
            let forwarder = export_dir
                .contains_rva(rva)
                .then(|| sections.rva_to_offset(rva))
                .flatten()
                .and_then(|off| read_cstring(data, off, 256).ok())
                .map(str::to_string);
            ExportEntry {
                name: names.remove(&i),
                ordinal: ordinal_base.wrapping_add(i as u32),
                rva,
                forwarder,
            }
        })
        .collect();
    exports.sort_by_key(|e| e.rva);

    Ok(ExportTable {
        dll_name,
        ordinal_base,
        exports,
    })
}
