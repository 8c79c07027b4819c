//! PE image loader
//!
//! `PeImage` owns the byte view of one image (a read-only file mapping, or
//! a buffer captured from a live process) together with the parsed headers.
//! All table accesses are bounds-checked against that view; a malformed
//! image fails to open rather than being read out of bounds later.

use once_cell::sync::OnceCell;
use std::fs::File;
use std::path::Path;
use tracing::{debug, trace};

pub mod directories;
pub mod headers;
pub mod sections;
pub mod symbols;
pub mod types;
pub mod utils;

use crate::io::{IOLimits, MappedImage};
use directories::*;
use headers::*;
use sections::*;
pub use symbols::CoffSymbolTable;
pub use types::*;

/// A parsed PE image
pub struct PeImage {
    image: MappedImage,
    dos_header: DosHeader,
    nt_headers: NtHeaders,
    data_directories: Vec<DataDirectory>,
    section_table: SectionTable,
    symbol_table: Option<CoffSymbolTable>,
    options: ParseOptions,

    // Lazy-loaded data
    exports: OnceCell<ExportTable>,
}

impl PeImage {
    /// Open and map an image file.
    ///
    /// Fails with `NotFound` when the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, limits: &IOLimits) -> Result<Self> {
        let path = path.as_ref();
        let image = MappedImage::open(path, limits).map_err(|e| match e {
            crate::io::error::IoError::StdIo(_) if !path.is_file() => {
                PeError::NotFound(path.display().to_string())
            }
            other => PeError::IoError(other.to_string()),
        })?;
        debug!(path = %path.display(), size = image.len(), "Opened PE image");
        Self::with_options(image, ParseOptions::default())
    }

    /// Map an image from an already-open file handle.
    pub fn from_file(file: &File, limits: &IOLimits) -> Result<Self> {
        let image =
            MappedImage::from_file(file, limits).map_err(|e| PeError::IoError(e.to_string()))?;
        Self::with_options(image, ParseOptions::default())
    }

    /// Parse an on-disk image held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::with_options(MappedImage::from_vec(data), ParseOptions::default())
    }

    /// Parse an image copied out of a live process (loader layout).
    pub fn from_loaded_image(data: Vec<u8>) -> Result<Self> {
        Self::with_options(
            MappedImage::from_vec(data),
            ParseOptions {
                layout: ImageLayout::Memory,
                ..ParseOptions::default()
            },
        )
    }

    /// Create image with custom options
    pub fn with_options(image: MappedImage, options: ParseOptions) -> Result<Self> {
        let data = image.as_bytes();

        let dos_header = parse_dos_header(data)?;
        let (nt_headers, data_directories) = parse_nt_headers(data, dos_header.e_lfanew as usize)?;

        let section_offset = dos_header.e_lfanew as usize
            + 4
            + COFF_HEADER_SIZE
            + nt_headers.file_header.size_of_optional_header as usize;
        let section_headers = parse_section_headers(
            data,
            section_offset,
            nt_headers.file_header.number_of_sections,
        )?;

        // The symbol table is not mapped by the loader
        let symbol_table = match options.layout {
            ImageLayout::File => CoffSymbolTable::locate(data, &nt_headers.file_header, &options)?,
            ImageLayout::Memory => None,
        };

        let sections = create_sections(
            section_headers,
            symbol_table.as_ref().map(|t| t.string_table(data)),
            options.layout,
        );
        let section_table = SectionTable::new(sections, options.layout);

        trace!(
            sections = section_table.sections().len(),
            symbols = symbol_table.as_ref().map_or(0, |t| t.len()),
            "Parsed PE headers"
        );

        Ok(Self {
            image,
            dos_header,
            nt_headers,
            data_directories,
            section_table,
            symbol_table,
            options,
            exports: OnceCell::new(),
        })
    }

    // Header access methods

    /// Path the image was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.image.path()
    }

    /// Raw image bytes
    pub fn data(&self) -> &[u8] {
        self.image.as_bytes()
    }

    pub fn dos_header(&self) -> &DosHeader {
        &self.dos_header
    }

    pub fn nt_headers(&self) -> &NtHeaders {
        &self.nt_headers
    }

    pub fn layout(&self) -> ImageLayout {
        self.options.layout
    }

    /// Check if PE is 64-bit
    pub fn is_64bit(&self) -> bool {
        self.nt_headers.optional_header.is_64bit()
    }

    pub fn machine(&self) -> Machine {
        self.nt_headers.file_header.machine
    }

    /// Preferred load address from the optional header
    pub fn image_base(&self) -> u64 {
        self.nt_headers.optional_header.image_base()
    }

    pub fn size_of_image(&self) -> u32 {
        self.nt_headers.optional_header.size_of_image()
    }

    // Section access methods

    /// Summaries of all sections, in address order
    pub fn sections(&self) -> Vec<SectionInfo> {
        self.section_table
            .sections()
            .iter()
            .map(SectionInfo::from)
            .collect()
    }

    /// Find section by name (long names resolved)
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.section_table.section_by_name(name)
    }

    /// Bytes of a named section, if present and inside the image
    pub fn section_data(&self, name: &str) -> Option<&[u8]> {
        self.section_by_name(name)?.data(self.data())
    }

    /// Convert RVA to buffer offset
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        self.section_table.rva_to_offset(rva)
    }

    // Symbol access methods

    pub fn has_symbol_table(&self) -> bool {
        self.symbol_table.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// All function-typed COFF symbols
    pub fn coff_functions(&self) -> Vec<CoffSymbol> {
        match &self.symbol_table {
            Some(table) => table
                .functions(self.data(), &self.section_table, self.image_base())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Nearest COFF function symbol at or before `address`, given in the
    /// image's preferred address space.
    pub fn find_coff_symbol(&self, address: u64) -> Option<SymbolMatch> {
        self.symbol_table.as_ref()?.find_nearest(
            self.data(),
            &self.section_table,
            self.image_base(),
            !self.is_64bit(),
            address,
        )
    }

    /// Get data directory by index
    pub fn data_directory(&self, index: usize) -> Option<&DataDirectory> {
        self.data_directories.get(index)
    }

    /// Get exports (lazy-loaded)
    pub fn exports(&self) -> Result<&ExportTable> {
        self.exports.get_or_try_init(|| {
            let export_dir = self
                .data_directory(IMAGE_DIRECTORY_ENTRY_EXPORT)
                .copied()
                .unwrap_or_default();
            parse_exports(self.data(), &self.section_table, &export_dir, &self.options)
        })
    }

    /// Nearest exported function at or before `address`.
    pub fn find_export(&self, address: u64) -> Option<SymbolMatch> {
        let rva = u32::try_from(address.checked_sub(self.image_base())?).ok()?;
        let exports = self.exports().ok()?;
        let (entry, displacement) = exports.nearest(rva)?;
        Some(SymbolMatch {
            name: entry.name.clone()?,
            address: self.image_base() + entry.rva as u64,
            displacement: displacement as u64,
        })
    }

    /// Closest preceding function from the export directory or the COFF
    /// symbol table, whichever is nearer.
    pub fn find_export_symbol(&self, address: u64) -> Option<SymbolMatch> {
        match (self.find_export(address), self.find_coff_symbol(address)) {
            (Some(e), Some(c)) if c.displacement < e.displacement => Some(c),
            (Some(e), _) => Some(e),
            (None, c) => c,
        }
    }
}

impl std::fmt::Debug for PeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeImage")
            .field("image", &self.image)
            .field("machine", &self.machine())
            .field("image_base", &format_args!("{:#x}", self.image_base()))
            .finish()
    }
}
