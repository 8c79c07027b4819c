//! Names from the PE/COFF symbol table

use super::{SourceSymbol, SymbolQuery, SymbolSource};
use crate::error::Result;

/// Nearest preceding function symbol in the COFF table
#[derive(Debug, Clone, Copy, Default)]
pub struct CoffSource;

impl SymbolSource for CoffSource {
    fn name(&self) -> &'static str {
        "coff"
    }

    fn find_symbol(&self, query: &SymbolQuery<'_>) -> Result<Option<SourceSymbol>> {
        let (Some(pe), Some(offset)) = (query.image.pe.as_ref(), query.runtime_offset()) else {
            return Ok(None);
        };
        Ok(pe.find_coff_symbol(offset).map(|m| SourceSymbol {
            name: m.name,
            displacement: m.displacement,
        }))
    }
}
