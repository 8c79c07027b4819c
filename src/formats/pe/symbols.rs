//! COFF symbol table access
//!
//! GNU toolchains leave the COFF symbol table in linked images; it is the
//! cheapest source of function names for MinGW-built modules.

use std::ops::Range;

use crate::formats::pe::sections::SectionTable;
use crate::formats::pe::types::*;
use crate::formats::pe::utils::{check_table, ReadExt};

/// Validated location of the symbol table and its trailing string table
#[derive(Debug, Clone)]
pub struct CoffSymbolTable {
    offset: usize,
    count: usize,
    strings: Range<usize>,
}

impl CoffSymbolTable {
    /// Locate the symbol table described by the COFF header.
    ///
    /// Returns `Ok(None)` for images without one, and `TruncatedTable` when
    /// either table would extend beyond the image.
    pub fn locate(data: &[u8], header: &CoffHeader, options: &ParseOptions) -> Result<Option<Self>> {
        if header.pointer_to_symbol_table == 0 || header.number_of_symbols == 0 {
            return Ok(None);
        }

        let offset = header.pointer_to_symbol_table as usize;
        let count = header.number_of_symbols as usize;
        let table_size = count
            .checked_mul(COFF_SYMBOL_SIZE)
            .ok_or(PeError::TruncatedTable {
                table: "symbol table",
                expected: usize::MAX,
                actual: data.len(),
            })?;
        check_table("symbol table", offset, table_size, data.len())?;

        let strings_at = offset + table_size;
        check_table("string table", strings_at, 4, data.len())?;
        let strings_size = data.read_u32_le_at(strings_at).unwrap_or(0) as usize;
        // The size field counts itself; anything smaller means "empty"
        let strings_size = strings_size.max(4);
        check_table("string table", strings_at, strings_size, data.len())?;

        Ok(Some(Self {
            offset,
            count: count.min(options.max_symbols),
            strings: strings_at..strings_at + strings_size,
        }))
    }

    /// The COFF string table bytes, including the leading size field
    pub fn string_table<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        data.get(self.strings.clone()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn symbol_name(&self, data: &[u8], record: &[u8]) -> Option<String> {
        let short = record.get(0..8)?;
        if short[..4] == [0, 0, 0, 0] {
            let off = record.read_u32_le_at(4)? as usize;
            return self
                .string_table(data)
                .read_cstring_at(off, 1024)
                .map(str::to_string);
        }
        let end = short.iter().position(|&b| b == 0).unwrap_or(8);
        Some(String::from_utf8_lossy(&short[..end]).into_owned())
    }

    /// Iterate the function-typed symbols, skipping auxiliary records.
    pub fn functions<'a>(
        &'a self,
        data: &'a [u8],
        sections: &'a SectionTable,
        image_base: u64,
    ) -> impl Iterator<Item = CoffSymbol> + 'a {
        let mut index = 0usize;
        std::iter::from_fn(move || {
            while index < self.count {
                let at = self.offset + index * COFF_SYMBOL_SIZE;
                let record = data.read_slice_at(at, COFF_SYMBOL_SIZE)?;
                let aux = record[17] as usize;
                index += 1 + aux;

                let sym_type = record.read_u16_le_at(14)?;
                if sym_type & IMAGE_SYM_DTYPE_MASK != IMAGE_SYM_DTYPE_FUNCTION {
                    continue;
                }
                let section_number = record.read_i16_le_at(12)?;
                let Some(section) = sections.section_by_number(section_number) else {
                    continue;
                };
                let Some(name) = self.symbol_name(data, record) else {
                    continue;
                };
                let value = record.read_u32_le_at(8)? as u64;

                return Some(CoffSymbol {
                    name,
                    address: image_base + section.header.virtual_address as u64 + value,
                    section_number,
                    storage_class: record[16],
                });
            }
            None
        })
    }

    /// Nearest function symbol at or before `address` (an address in the
    /// image's preferred address space).
    ///
    /// Names starting with `.` are section labels and never match. When
    /// `strip_underscore` is set (32-bit x86), one leading `_` is removed.
    /// Symbols left without a name are skipped.
    pub fn find_nearest(
        &self,
        data: &[u8],
        sections: &SectionTable,
        image_base: u64,
        strip_underscore: bool,
        address: u64,
    ) -> Option<SymbolMatch> {
        let mut best: Option<CoffSymbol> = None;
        for mut symbol in self.functions(data, sections, image_base) {
            if symbol.address > address || symbol.name.starts_with('.') {
                continue;
            }
            if strip_underscore && symbol.name.starts_with('_') {
                symbol.name.remove(0);
            }
            if symbol.name.is_empty() {
                continue;
            }
            let closer = best
                .as_ref()
                .map_or(true, |b| address - symbol.address < address - b.address);
            if closer {
                best = Some(symbol);
            }
        }

        best.map(|symbol| SymbolMatch {
            name: symbol.name,
            address: symbol.address,
            displacement: address - symbol.address,
        })
    }
}
