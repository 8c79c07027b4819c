//! Section management for PE files

use crate::formats::pe::types::*;
use crate::formats::pe::utils::{check_table, field, ReadExt};

/// Section table for efficient RVA resolution
#[derive(Debug, Clone)]
pub struct SectionTable {
    sections: Vec<Section>,
    layout: ImageLayout,
}

impl SectionTable {
    /// Create a new section table
    pub fn new(sections: Vec<Section>, layout: ImageLayout) -> Self {
        // Sort by virtual address for binary search
        let mut sections = sections;
        sections.sort_by_key(|s| s.header.virtual_address);
        Self { sections, layout }
    }

    /// Get all sections
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Find section by its resolved (possibly long) name
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Find section containing RVA
    pub fn section_containing_rva(&self, rva: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.header.contains_rva(rva))
    }

    /// Find the section a 1-based COFF section number refers to.
    /// Section numbers follow header order, not address order.
    pub fn section_by_number(&self, number: i16) -> Option<&Section> {
        if number <= 0 {
            return None;
        }
        let index = (number - 1) as usize;
        self.sections.iter().find(|s| s.index == index)
    }

    /// Convert RVA to buffer offset - O(log n) with binary search
    #[inline]
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        if self.layout == ImageLayout::Memory {
            return Some(rva as usize);
        }

        let idx = self
            .sections
            .binary_search_by(|s| {
                let size = s.header.virtual_size.max(s.header.size_of_raw_data);
                if rva < s.header.virtual_address {
                    std::cmp::Ordering::Greater
                } else if rva - s.header.virtual_address >= size {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()?;

        let section = &self.sections[idx];
        let delta = rva - section.header.virtual_address;
        if delta >= section.header.size_of_raw_data {
            // Zero-fill tail; no bytes in the file
            return None;
        }
        Some(section.header.pointer_to_raw_data as usize + delta as usize)
    }
}

/// Parse section headers from data
pub fn parse_section_headers(data: &[u8], offset: usize, count: u16) -> Result<Vec<SectionHeader>> {
    check_table(
        "section table",
        offset,
        count as usize * SECTION_HEADER_SIZE,
        data.len(),
    )?;

    let len = data.len();
    (0..count as usize)
        .map(|i| {
            let at = offset + i * SECTION_HEADER_SIZE;
            let end = at + SECTION_HEADER_SIZE;

            let mut name = [0u8; 8];
            name.copy_from_slice(field(data.read_slice_at(at, 8), end, len)?);

            Ok(SectionHeader {
                name,
                virtual_size: field(data.read_u32_le_at(at + 8), end, len)?,
                virtual_address: field(data.read_u32_le_at(at + 12), end, len)?,
                size_of_raw_data: field(data.read_u32_le_at(at + 16), end, len)?,
                pointer_to_raw_data: field(data.read_u32_le_at(at + 20), end, len)?,
                characteristics: field(data.read_u32_le_at(at + 36), end, len)?,
            })
        })
        .collect()
}

/// Create section objects with resolved names and data ranges.
///
/// `string_table` is the COFF string table (if any); names of the form
/// `/<offset>` are looked up in it, as MinGW does for `.debug_*` sections.
pub fn create_sections(
    headers: Vec<SectionHeader>,
    string_table: Option<&[u8]>,
    layout: ImageLayout,
) -> Vec<Section> {
    headers
        .into_iter()
        .enumerate()
        .map(|(index, header)| {
            let name = header
                .long_name_offset()
                .and_then(|off| string_table?.read_cstring_at(off, 256))
                .map(str::to_string)
                .unwrap_or_else(|| header.short_name());

            let data = match layout {
                ImageLayout::File => {
                    let start = header.pointer_to_raw_data as usize;
                    // Raw data is padded to FileAlignment; VirtualSize is the real size
                    let size = match header.virtual_size {
                        0 => header.size_of_raw_data,
                        vs => vs.min(header.size_of_raw_data),
                    };
                    start..start + size as usize
                }
                ImageLayout::Memory => {
                    let start = header.virtual_address as usize;
                    let size = header.virtual_size.max(header.size_of_raw_data);
                    start..start + size as usize
                }
            };

            Section {
                name,
                index,
                header,
                data,
            }
        })
        .collect()
}

impl Section {
    /// Get section bytes from the image, if they lie within it
    pub fn data<'a>(&self, image: &'a [u8]) -> Option<&'a [u8]> {
        image.get(self.data.clone())
    }
}
