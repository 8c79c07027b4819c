//! Delegation to the platform symbol engine

use std::sync::Arc;

use super::{SourceLine, SourceSymbol, SymbolQuery, SymbolSource};
use crate::error::Result;
use crate::platform::NativeSymbolizer;

/// Asks the OS-native engine with the live address; it needs no image.
#[derive(Clone)]
pub struct NativeSource {
    native: Arc<dyn NativeSymbolizer>,
}

impl NativeSource {
    pub fn new(native: Arc<dyn NativeSymbolizer>) -> Self {
        Self { native }
    }
}

impl SymbolSource for NativeSource {
    fn name(&self) -> &'static str {
        "native"
    }

    fn find_symbol(&self, query: &SymbolQuery<'_>) -> Result<Option<SourceSymbol>> {
        Ok(self
            .native
            .resolve_name(query.process, query.address)
            .filter(|s| !s.name.is_empty())
            .map(|s| SourceSymbol {
                name: s.name,
                displacement: s.displacement,
            }))
    }

    fn find_line(&self, query: &SymbolQuery<'_>) -> Result<Option<SourceLine>> {
        Ok(self
            .native
            .resolve_line(query.process, query.address)
            .map(|l| SourceLine {
                file: l.file,
                line: l.line,
                displacement: l.displacement,
            }))
    }
}
