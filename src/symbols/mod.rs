//! # Symbol Sources
//!
//! Every place a name or source line can come from implements
//! [`SymbolSource`]. The [`FallbackChain`] asks its sources in order and
//! stops at the first that supplies a name; a failing source is logged and
//! skipped, never reported.
//!
//! Standard order: COFF symbol table, DWARF, the OS-native engine (when the
//! platform provides one), then the export directory.

use std::sync::Arc;

use crate::cache::ModuleImage;
use crate::error::Result;
use crate::log_recovered;
use crate::platform::{NativeSymbolizer, ProcessId};

pub mod coff;
pub mod dwarf;
pub mod export;
pub mod native;

pub use coff::CoffSource;
pub use dwarf::DwarfSource;
pub use export::ExportSource;
pub use native::NativeSource;

/// One address to resolve, with the module it falls into
#[derive(Debug, Clone, Copy)]
pub struct SymbolQuery<'a> {
    pub process: ProcessId,
    /// Live address in the target process
    pub address: u64,
    pub module_base: u64,
    pub image: &'a ModuleImage,
}

impl SymbolQuery<'_> {
    /// `address` translated into the image's preferred address space
    pub fn runtime_offset(&self) -> Option<u64> {
        self.image.runtime_offset(self.module_base, self.address)
    }
}

/// A name found by one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSymbol {
    pub name: String,
    /// Distance from the start of the symbol this source matched
    pub displacement: u64,
}

/// A source location found by one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub file: String,
    pub line: u32,
    /// Distance from the start of the matched line entry
    pub displacement: u64,
}

/// A provider of symbol names and, optionally, source lines.
pub trait SymbolSource: Send + Sync {
    /// Short label used in logs and results
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this source simply has nothing for the address.
    fn find_symbol(&self, query: &SymbolQuery<'_>) -> Result<Option<SourceSymbol>>;

    fn find_line(&self, query: &SymbolQuery<'_>) -> Result<Option<SourceLine>> {
        let _ = query;
        Ok(None)
    }
}

/// Combined answer of a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResult {
    pub symbol: SourceSymbol,
    /// Source that supplied the name
    pub source: &'static str,
    pub line: Option<SourceLine>,
}

/// Ordered list of symbol sources
#[derive(Default)]
pub struct FallbackChain {
    sources: Vec<Box<dyn SymbolSource>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// COFF, DWARF, native (if present), exports.
    pub fn standard(native: Option<Arc<dyn NativeSymbolizer>>) -> Self {
        let mut chain = Self::new().with(CoffSource).with(DwarfSource);
        if let Some(native) = native {
            chain.push(NativeSource::new(native));
        }
        chain.with(ExportSource)
    }

    pub fn push(&mut self, source: impl SymbolSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn with(mut self, source: impl SymbolSource + 'static) -> Self {
        self.push(source);
        self
    }

    /// Labels of the sources, in query order
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// The first non-empty name any source supplies, plus the first line
    /// any source supplies. `None` when no source has a name.
    pub fn resolve(&self, query: &SymbolQuery<'_>) -> Option<ChainResult> {
        let (source, symbol) = self.sources.iter().find_map(|source| {
            match source.find_symbol(query) {
                Ok(Some(symbol)) if !symbol.name.is_empty() => Some((source.name(), symbol)),
                Ok(_) => None,
                Err(e) => {
                    log_recovered!(source.name(), e);
                    None
                }
            }
        })?;

        let line = self.sources.iter().find_map(|source| match source.find_line(query) {
            Ok(line) => line,
            Err(e) => {
                log_recovered!(source.name(), e);
                None
            }
        });

        Some(ChainResult { symbol, source, line })
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.source_names()).finish()
    }
}
