//! Names from the export directory

use super::{SourceSymbol, SymbolQuery, SymbolSource};
use crate::error::Result;

/// Nearest preceding named export; the last resort for stripped DLLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportSource;

impl SymbolSource for ExportSource {
    fn name(&self) -> &'static str {
        "export"
    }

    fn find_symbol(&self, query: &SymbolQuery<'_>) -> Result<Option<SourceSymbol>> {
        let (Some(pe), Some(offset)) = (query.image.pe.as_ref(), query.runtime_offset()) else {
            return Ok(None);
        };
        // A malformed export directory is a failure of this source only
        pe.exports()?;
        Ok(pe.find_export(offset).map(|m| SourceSymbol {
            name: m.name,
            displacement: m.displacement,
        }))
    }
}
