//! DWARF debug information embedded in PE images.
//!
//! MinGW and clang keep `.debug_*` sections in the linked image. The reader
//! copies them out of the PE byte view once, indexes compilation units by
//! address range, and answers function and line queries against that index.
//! Units and line tables are decoded on first use and kept for the lifetime
//! of the reader.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use gimli::Reader as _;
use gimli::{DebugInfoOffset, Dwarf, EndianArcSlice, RunTimeEndian, SectionId, Unit, UnitOffset};
use tracing::{debug, trace};

pub mod aranges;
pub mod function;
pub mod lines;

use crate::error::{Result, SymbolError};
use crate::formats::pe::PeImage;
pub use aranges::{build_arange_index, Arange, ArangeIndex};
pub use function::FunctionMatch;
pub use lines::{nearest_row, LineMatch, LineRow, LineTable};

/// Reader type shared by every section of one image
pub type Reader = EndianArcSlice<RunTimeEndian>;

/// Debug information of one module
pub struct DwarfReader {
    dwarf: Dwarf<Reader>,
    aranges: ArangeIndex,
    units: Mutex<HashMap<usize, Arc<Unit<Reader>>>>,
    lines: Mutex<HashMap<usize, Arc<LineTable>>>,
}

impl DwarfReader {
    /// Load the debug sections of `pe` and build the address index.
    ///
    /// Returns `Ok(None)` when the image carries no `.debug_info`.
    pub fn load(pe: &PeImage) -> Result<Option<Self>> {
        if pe.section_data(".debug_info").is_none() {
            return Ok(None);
        }

        let dwarf = Dwarf::load(|id| Ok::<_, gimli::Error>(section_reader(pe, id)))?;

        let aranges = build_arange_index(&dwarf)?;
        debug!(
            module = ?pe.path(),
            ranges = aranges.len(),
            "Built DWARF address index"
        );

        Ok(Some(Self {
            dwarf,
            aranges,
            units: Mutex::new(HashMap::new()),
            lines: Mutex::new(HashMap::new()),
        }))
    }

    pub fn aranges(&self) -> &ArangeIndex {
        &self.aranges
    }

    fn unit(&self, offset: DebugInfoOffset) -> Result<Arc<Unit<Reader>>> {
        let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(unit) = units.get(&offset.0) {
            return Ok(Arc::clone(unit));
        }
        let header = self.dwarf.debug_info.header_from_offset(offset)?;
        let unit = Arc::new(self.dwarf.unit(header)?);
        units.insert(offset.0, Arc::clone(&unit));
        Ok(unit)
    }

    /// The unit holding the entry at section offset `offset`, and the
    /// entry's offset within it.
    fn unit_containing(&self, offset: DebugInfoOffset) -> Result<Option<(Arc<Unit<Reader>>, UnitOffset)>> {
        let mut headers = self.dwarf.units();
        while let Some(header) = headers.next()? {
            let (Some(start), Some(local)) = (header.offset().as_debug_info_offset(), offset.to_unit_offset(&header))
            else {
                continue;
            };
            return Ok(Some((self.unit(start)?, local)));
        }
        Ok(None)
    }

    fn line_table(&self, offset: DebugInfoOffset) -> Result<Arc<LineTable>> {
        if let Some(table) = self
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&offset.0)
        {
            return Ok(Arc::clone(table));
        }

        let unit = self.unit(offset)?;
        let table = Arc::new(lines::build_line_table(&self.dwarf, &unit)?);
        trace!(unit = offset.0, rows = table.rows().len(), "Decoded line table");

        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(lines.entry(offset.0).or_insert(table)))
    }

    /// Find the subprogram whose code range contains `address`.
    ///
    /// `address` is in the image's preferred address space. Fails with
    /// `NotFound` when no compilation unit or subprogram covers it.
    pub fn find_function(&self, address: u64) -> Result<FunctionMatch> {
        let arange = self.aranges.lookup(address).ok_or(SymbolError::NotFound)?;
        let unit = self.unit(arange.unit)?;
        function::search(self, &unit, arange.unit, address)?.ok_or(SymbolError::NotFound)
    }

    /// Find the source line covering `address`.
    ///
    /// Only addresses inside some function are looked up.
    pub fn find_line(&self, address: u64) -> Result<LineMatch> {
        let function = self.find_function(address)?;
        self.line_table(function.unit)?
            .find(address)
            .ok_or(SymbolError::NotFound)
    }
}

impl std::fmt::Debug for DwarfReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DwarfReader")
            .field("aranges", &self.aranges.len())
            .finish()
    }
}

// PE images are always little-endian
fn section_reader(pe: &PeImage, id: SectionId) -> Reader {
    let data: Arc<[u8]> = match pe.section_data(id.name()) {
        Some(bytes) => Arc::from(bytes),
        None => Arc::from(Vec::new()),
    };
    EndianArcSlice::new(data, RunTimeEndian::Little)
}

/// Decode a string-class attribute into an owned string.
pub(crate) fn attr_to_string(
    dwarf: &Dwarf<Reader>,
    unit: &Unit<Reader>,
    value: gimli::AttributeValue<Reader>,
) -> Result<String> {
    let reader = dwarf.attr_string(unit, value)?;
    Ok(reader.to_string_lossy()?.into_owned())
}
