//! Names and lines from embedded DWARF

use super::{SourceLine, SourceSymbol, SymbolQuery, SymbolSource};
use crate::dwarf::DwarfReader;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct DwarfSource;

fn reader_and_offset<'a>(query: &SymbolQuery<'a>) -> Option<(&'a DwarfReader, u64)> {
    Some((query.image.dwarf.as_ref()?, query.runtime_offset()?))
}

// NotFound is the ordinary "no answer", not a failure worth logging
fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

impl SymbolSource for DwarfSource {
    fn name(&self) -> &'static str {
        "dwarf"
    }

    fn find_symbol(&self, query: &SymbolQuery<'_>) -> Result<Option<SourceSymbol>> {
        let Some((reader, offset)) = reader_and_offset(query) else {
            return Ok(None);
        };
        Ok(found(reader.find_function(offset))?.map(|f| SourceSymbol {
            name: f.name,
            displacement: f.displacement,
        }))
    }

    fn find_line(&self, query: &SymbolQuery<'_>) -> Result<Option<SourceLine>> {
        let Some((reader, offset)) = reader_and_offset(query) else {
            return Ok(None);
        };
        Ok(found(reader.find_line(offset))?.map(|l| SourceLine {
            file: l.file,
            line: l.line,
            displacement: l.displacement,
        }))
    }
}
