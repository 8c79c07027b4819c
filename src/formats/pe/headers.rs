//! PE header parsing

use crate::formats::pe::types::*;
use crate::formats::pe::utils::{field, ReadExt};

/// Parse DOS header from data
pub fn parse_dos_header(data: &[u8]) -> Result<DosHeader> {
    if data.len() < 64 {
        return Err(PeError::TruncatedHeader {
            expected: 64,
            actual: data.len(),
        });
    }

    let e_magic = field(data.read_u16_le_at(0), 2, data.len())?;
    if e_magic != DOS_SIGNATURE {
        return Err(PeError::InvalidDosSignature);
    }

    Ok(DosHeader {
        e_magic,
        e_lfanew: field(data.read_u32_le_at(0x3c), 0x40, data.len())?,
    })
}

/// Parse COFF header from data at offset
pub fn parse_coff_header(data: &[u8], offset: usize) -> Result<CoffHeader> {
    let end = offset.saturating_add(COFF_HEADER_SIZE);
    if end > data.len() {
        return Err(PeError::TruncatedHeader {
            expected: end,
            actual: data.len(),
        });
    }

    let len = data.len();
    Ok(CoffHeader {
        machine: Machine::from(field(data.read_u16_le_at(offset), end, len)?),
        number_of_sections: field(data.read_u16_le_at(offset + 2), end, len)?,
        time_date_stamp: field(data.read_u32_le_at(offset + 4), end, len)?,
        pointer_to_symbol_table: field(data.read_u32_le_at(offset + 8), end, len)?,
        number_of_symbols: field(data.read_u32_le_at(offset + 12), end, len)?,
        size_of_optional_header: field(data.read_u16_le_at(offset + 16), end, len)?,
        characteristics: field(data.read_u16_le_at(offset + 18), end, len)?,
    })
}

/// Parse optional header from data at offset.
///
/// PE32 keeps a 32-bit ImageBase at +28 (after BaseOfData); PE32+ widens it
/// to 64 bits at +24. Everything from +32 up to the size fields lines up.
pub fn parse_optional_header(data: &[u8], offset: usize, size: u16) -> Result<OptionalHeader> {
    let end = offset.saturating_add(size as usize);
    if size < 2 || end > data.len() {
        return Err(PeError::TruncatedHeader {
            expected: end.max(offset + 2),
            actual: data.len(),
        });
    }

    let len = data.len();
    let magic = field(data.read_u16_le_at(offset), end, len)?;
    let (min_size, rva_count_at) = match magic {
        PE32_MAGIC => (96, 92),
        PE32PLUS_MAGIC => (112, 108),
        _ => return Err(PeError::InvalidMagic(magic)),
    };
    if (size as usize) < min_size {
        return Err(PeError::TruncatedHeader {
            expected: offset + min_size,
            actual: end,
        });
    }

    let image_base = if magic == PE32_MAGIC {
        field(data.read_u32_le_at(offset + 28), end, len)? as u64
    } else {
        field(data.read_u64_le_at(offset + 24), end, len)?
    };

    let fields = OptionalHeaderFields {
        magic,
        address_of_entry_point: field(data.read_u32_le_at(offset + 16), end, len)?,
        image_base,
        section_alignment: field(data.read_u32_le_at(offset + 32), end, len)?,
        file_alignment: field(data.read_u32_le_at(offset + 36), end, len)?,
        size_of_image: field(data.read_u32_le_at(offset + 56), end, len)?,
        size_of_headers: field(data.read_u32_le_at(offset + 60), end, len)?,
        number_of_rva_and_sizes: field(data.read_u32_le_at(offset + rva_count_at), end, len)?,
    };

    Ok(if magic == PE32_MAGIC {
        OptionalHeader::Pe32(fields)
    } else {
        OptionalHeader::Pe32Plus(fields)
    })
}

/// Parse data directories; missing trailing entries read as empty.
pub fn parse_data_directories(data: &[u8], offset: usize, count: u32) -> Vec<DataDirectory> {
    let count = count.min(16) as usize;
    let mut directories: Vec<DataDirectory> = (0..count)
        .map_while(|i| {
            let dir_offset = offset + i * 8;
            Some(DataDirectory {
                virtual_address: data.read_u32_le_at(dir_offset)?,
                size: data.read_u32_le_at(dir_offset + 4)?,
            })
        })
        .collect();

    directories.resize(16, DataDirectory::default());
    directories
}

/// Parse NT headers (PE signature + COFF + Optional)
pub fn parse_nt_headers(data: &[u8], offset: usize) -> Result<(NtHeaders, Vec<DataDirectory>)> {
    let signature = data
        .read_slice_at(offset, 4)
        .ok_or(PeError::TruncatedHeader {
            expected: offset.saturating_add(4),
            actual: data.len(),
        })?;

    if signature != PE_SIGNATURE {
        return Err(PeError::InvalidPeSignature);
    }

    let file_header = parse_coff_header(data, offset + 4)?;

    let opt_offset = offset + 4 + COFF_HEADER_SIZE;
    let optional_header = parse_optional_header(data, opt_offset, file_header.size_of_optional_header)?;

    let fixed = if optional_header.is_64bit() { 112 } else { 96 };
    let directories = parse_data_directories(
        data,
        opt_offset + fixed,
        optional_header.number_of_rva_and_sizes(),
    );

    Ok((
        NtHeaders {
            file_header,
            optional_header,
        },
        directories,
    ))
}
