//! Core PE data types and structures

use std::ops::Range;

use thiserror::Error;

// PE constants
pub const DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;

pub const COFF_HEADER_SIZE: usize = 20;
pub const SECTION_HEADER_SIZE: usize = 40;
pub const COFF_SYMBOL_SIZE: usize = 18;

// Data directory indices
pub const IMAGE_DIRECTORY_ENTRY_EXPORT: usize = 0;

// COFF symbol fields
pub const IMAGE_SYM_DTYPE_FUNCTION: u16 = 0x20;
pub const IMAGE_SYM_DTYPE_MASK: u16 = 0x30;

/// Why an image could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeError {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("invalid DOS signature")]
    InvalidDosSignature,
    #[error("invalid PE signature")]
    InvalidPeSignature,
    #[error("invalid optional header magic: 0x{0:04x}")]
    InvalidMagic(u16),
    #[error("truncated header: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },
    #[error("truncated {table}: expected {expected} bytes, got {actual}")]
    TruncatedTable {
        table: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("RVA 0x{rva:08x} is not inside any section")]
    InvalidRva { rva: u32 },
    #[error("file offset 0x{offset:x} is outside the image")]
    InvalidOffset { offset: usize },
    #[error("malformed export directory")]
    MalformedExportTable,
    #[error("invalid string encoding")]
    InvalidString,
    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, PeError>;

/// Machine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Unknown,
    I386,   // 0x014c
    X86_64, // 0x8664
    Arm64,  // 0xaa64
    Other(u16),
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x014c => Self::I386,
            0x8664 => Self::X86_64,
            0xaa64 => Self::Arm64,
            0 => Self::Unknown,
            other => Self::Other(other),
        }
    }
}

/// The fields of the DOS header the loader needs
#[derive(Debug, Clone, Copy)]
pub struct DosHeader {
    pub e_magic: u16,
    pub e_lfanew: u32, // File address of PE header
}

/// COFF header (20 bytes)
#[derive(Debug, Clone, Copy)]
pub struct CoffHeader {
    pub machine: Machine,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

/// Data directory entry
#[derive(Debug, Clone, Copy, Default)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size != 0
    }

    pub fn contains_rva(&self, rva: u32) -> bool {
        rva >= self.virtual_address && (rva - self.virtual_address) < self.size
    }
}

/// Optional header fields shared by both variants, plus the variant's
/// image base.
#[derive(Debug, Clone)]
pub struct OptionalHeaderFields {
    pub magic: u16,
    pub address_of_entry_point: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub number_of_rva_and_sizes: u32,
}

/// Optional header, discriminated by its magic
#[derive(Debug, Clone)]
pub enum OptionalHeader {
    Pe32(OptionalHeaderFields),
    Pe32Plus(OptionalHeaderFields),
}

impl OptionalHeader {
    fn fields(&self) -> &OptionalHeaderFields {
        match self {
            Self::Pe32(h) | Self::Pe32Plus(h) => h,
        }
    }

    pub fn magic(&self) -> u16 {
        self.fields().magic
    }

    pub fn entry_point(&self) -> u32 {
        self.fields().address_of_entry_point
    }

    pub fn image_base(&self) -> u64 {
        self.fields().image_base
    }

    pub fn size_of_image(&self) -> u32 {
        self.fields().size_of_image
    }

    pub fn size_of_headers(&self) -> u32 {
        self.fields().size_of_headers
    }

    pub fn number_of_rva_and_sizes(&self) -> u32 {
        self.fields().number_of_rva_and_sizes
    }

    pub fn is_64bit(&self) -> bool {
        matches!(self, Self::Pe32Plus(_))
    }
}

/// NT headers (PE signature + COFF + Optional)
#[derive(Debug, Clone)]
pub struct NtHeaders {
    pub file_header: CoffHeader,
    pub optional_header: OptionalHeader,
}

/// Section header
#[derive(Debug, Clone)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionHeader {
    /// The raw 8-byte name. Long names appear here as `/<offset>`.
    pub fn short_name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).to_string()
    }

    /// String table offset of a `/<decimal>` long name.
    pub fn long_name_offset(&self) -> Option<usize> {
        let short = self.short_name();
        let digits = short.strip_prefix('/')?;
        digits.parse().ok()
    }

    pub fn contains_rva(&self, rva: u32) -> bool {
        let size = self.virtual_size.max(self.size_of_raw_data);
        rva >= self.virtual_address && (rva - self.virtual_address) < size
    }
}

/// Section with resolved name and file range
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    /// Position in the header table (COFF section number - 1)
    pub index: usize,
    pub header: SectionHeader,
    pub data: Range<usize>, // Range in file
}

/// Public summary of one section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub name: String,
    pub virtual_address: u32,
    pub raw_size: u32,
    pub virtual_size: u32,
}

impl From<&Section> for SectionInfo {
    fn from(s: &Section) -> Self {
        Self {
            name: s.name.clone(),
            virtual_address: s.header.virtual_address,
            raw_size: s.header.size_of_raw_data,
            virtual_size: s.header.virtual_size,
        }
    }
}

/// Export entry
#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub name: Option<String>,
    pub ordinal: u32,
    pub rva: u32,
    pub forwarder: Option<String>,
}

/// One function-typed record from the COFF symbol table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoffSymbol {
    pub name: String,
    /// Absolute address (image base + section RVA + value)
    pub address: u64,
    pub section_number: i16,
    pub storage_class: u8,
}

/// Result of a nearest-preceding symbol scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatch {
    pub name: String,
    /// Address of the symbol start in the image's preferred address space
    pub address: u64,
    pub displacement: u64,
}

/// Where section bytes live inside the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageLayout {
    /// On-disk layout: sections at `PointerToRawData`
    #[default]
    File,
    /// Loader layout, as read from a live process: sections at their RVA
    Memory,
}

/// Parse options
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub layout: ImageLayout,
    pub max_symbols: usize,
    pub max_exports: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            layout: ImageLayout::File,
            max_symbols: 4_000_000,
            max_exports: 65536,
        }
    }
}
