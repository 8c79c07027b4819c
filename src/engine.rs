//! Symbol engine: the public entry point for address resolution.
//!
//! One engine serves one debug session. It owns the module cache and the
//! fallback chain, and is told about process and module lifetime by the
//! session's event loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, trace};

use crate::cache::{CacheStats, ModuleCache, ModuleRecord};
use crate::config::EngineConfig;
use crate::demangle;
use crate::error::{Result, SymbolError};
use crate::platform::{NativeSymbolizer, ProcessId, ProcessInspector, StaticModuleMap};
use crate::symbols::{FallbackChain, SymbolQuery, SymbolSource};

/// A resolved address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolInfo {
    /// Display name, demangled when enabled
    pub name: String,
    /// Name as the source reported it
    pub raw_name: String,
    pub displacement: u64,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub module_base: u64,
    pub module_path: Option<PathBuf>,
    /// Label of the source that supplied the name
    pub source: &'static str,
}

pub struct SymbolEngine {
    config: EngineConfig,
    inspector: Arc<dyn ProcessInspector>,
    native: Option<Arc<dyn NativeSymbolizer>>,
    chain: FallbackChain,
    cache: ModuleCache,
    offline: OnceCell<Box<OfflineImages>>,
}

/// Image files resolved without a live process.
///
/// Each path gets its own pseudo-process with the image at base 0, so an
/// address is its RVA and every file is mapped and indexed once.
struct OfflineImages {
    map: Arc<StaticModuleMap>,
    engine: SymbolEngine,
    processes: Mutex<HashMap<PathBuf, ProcessId>>,
}

impl OfflineImages {
    fn new(config: EngineConfig) -> Self {
        let map = Arc::new(StaticModuleMap::new());
        Self {
            engine: SymbolEngine::new(config, map.clone(), None),
            map,
            processes: Mutex::new(HashMap::new()),
        }
    }

    fn process_for(&self, path: &Path) -> ProcessId {
        let mut processes = self.processes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&process) = processes.get(path) {
            return process;
        }

        let process = ProcessId(processes.len() as u64);
        self.map
            .add_module(process, 0, u64::from(u32::MAX) + 1, Some(path.to_path_buf()));
        self.engine.attach(process);
        processes.insert(path.to_path_buf(), process);
        process
    }
}

impl SymbolEngine {
    /// Build an engine with the standard source order.
    ///
    /// `native` is the platform symbol engine, if this platform has one.
    pub fn new(
        config: EngineConfig,
        inspector: Arc<dyn ProcessInspector>,
        native: Option<Arc<dyn NativeSymbolizer>>,
    ) -> Self {
        let chain = FallbackChain::standard(native.clone());
        Self::with_chain(config, inspector, native, chain)
    }

    pub fn with_chain(
        config: EngineConfig,
        inspector: Arc<dyn ProcessInspector>,
        native: Option<Arc<dyn NativeSymbolizer>>,
        chain: FallbackChain,
    ) -> Self {
        debug!(sources = ?chain.source_names(), "Symbol engine ready");
        Self {
            config,
            inspector,
            native,
            chain,
            cache: ModuleCache::new(),
            offline: OnceCell::new(),
        }
    }

    /// Append a source after the configured ones.
    pub fn push_source(&mut self, source: impl SymbolSource + 'static) {
        self.chain.push(source);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_demangle(&mut self, demangle: bool) {
        self.config.demangle = demangle;
        if let Some(offline) = self.offline.get_mut() {
            offline.engine.set_demangle(demangle);
        }
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Counters of the images opened by `resolve_image_offset`
    pub fn offline_stats(&self) -> CacheStats {
        self.offline.get().map(|o| o.engine.stats()).unwrap_or_default()
    }

    // Lifecycle

    pub fn attach(&self, process: ProcessId) {
        self.cache.attach(process);
    }

    pub fn detach(&self, process: ProcessId) -> bool {
        self.cache.detach(process)
    }

    /// Record a module load; nothing is mapped until it is queried.
    pub fn module_loaded(&self, process: ProcessId, base: u64) -> Result<()> {
        let path = self.inspector.module_path(process, base);
        self.cache.module_loaded(process, base, path).map(drop)
    }

    pub fn module_unloaded(&self, process: ProcessId, base: u64) -> bool {
        self.cache.module_unloaded(process, base)
    }

    /// Module record containing `address`
    pub fn lookup_module(&self, process: ProcessId, address: u64) -> Result<Arc<ModuleRecord>> {
        self.cache.lookup_module(process, address, self.inspector.as_ref())
    }

    // Resolution

    fn display_name(&self, raw: &str) -> String {
        if !self.config.demangle {
            return raw.to_string();
        }
        demangle::demangle(raw, self.config.demangle_style)
            .or_else(|| self.native.as_ref()?.undecorate(raw))
            .unwrap_or_else(|| raw.to_string())
    }

    fn info(&self, module: &ModuleRecord, raw_name: String, displacement: u64, source: &'static str) -> SymbolInfo {
        SymbolInfo {
            name: self.display_name(&raw_name),
            raw_name,
            displacement,
            file: None,
            line: None,
            module_base: module.base(),
            module_path: module.path().map(Path::to_path_buf),
            source,
        }
    }

    /// Resolve a live address through the fallback chain.
    ///
    /// Fails with `UnknownProcess`, `NoModule`, or `NotFound`; every other
    /// failure is recovered inside the chain.
    pub fn resolve(&self, process: ProcessId, address: u64) -> Result<SymbolInfo> {
        let module = self.lookup_module(process, address)?;
        let limits = self.config.io.limits();
        let image = self
            .cache
            .image(&module, process, self.inspector.as_ref(), &limits);

        let query = SymbolQuery {
            process,
            address,
            module_base: module.base(),
            image,
        };
        let Some(found) = self.chain.resolve(&query) else {
            trace!(%process, address = format_args!("{address:#x}"), "No symbol");
            return Err(SymbolError::NotFound);
        };

        let mut info = self.info(&module, found.symbol.name, found.symbol.displacement, found.source);
        if let Some(line) = found.line {
            info.file = Some(line.file);
            info.line = Some(line.line);
        }
        trace!(
            %process,
            address = format_args!("{address:#x}"),
            name = %info.name,
            source = info.source,
            "Resolved"
        );
        Ok(info)
    }

    /// Export-table level lookup: the nearest export or COFF function,
    /// without consulting DWARF or the native engine.
    pub fn lookup_export(&self, process: ProcessId, address: u64) -> Result<SymbolInfo> {
        let module = self.lookup_module(process, address)?;
        let limits = self.config.io.limits();
        let image = self
            .cache
            .image(&module, process, self.inspector.as_ref(), &limits);

        let pe = image.pe.as_ref().ok_or(SymbolError::NotFound)?;
        let offset = image
            .runtime_offset(module.base(), address)
            .ok_or(SymbolError::NotFound)?;
        let found = pe.find_export_symbol(offset).ok_or(SymbolError::NotFound)?;
        Ok(self.info(&module, found.name, found.displacement, "export"))
    }

    /// Resolve `rva` inside the image file at `path`, without a live process.
    ///
    /// Uses this engine's configuration; the native engine is not consulted.
    /// The image stays mapped for later lookups in the same file.
    pub fn resolve_image_offset(&self, path: impl AsRef<Path>, rva: u64) -> Result<SymbolInfo> {
        let offline = self
            .offline
            .get_or_init(|| Box::new(OfflineImages::new(self.config.clone())));
        let process = offline.process_for(path.as_ref());
        offline.engine.resolve(process, rva)
    }
}

impl std::fmt::Debug for SymbolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolEngine")
            .field("config", &self.config)
            .field("chain", &self.chain)
            .field("native", &self.native.is_some())
            .finish()
    }
}
