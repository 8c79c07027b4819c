//! Module/process cache.
//!
//! Maps each attached process to the modules seen in it. A module record is
//! cheap to create; its image mapping and DWARF index are only built the
//! first time a query needs them, and are released with the record.
//!
//! All mutation of the process table goes through one mutex, so lazy
//! creation is never a check-then-create race.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

mod module;

pub use module::{ModuleImage, ModuleRecord};

use crate::dwarf::DwarfReader;
use crate::error::{Result, SymbolError};
use crate::formats::pe::{ImageLayout, PeImage};
use crate::io::IOLimits;
use crate::platform::{ProcessId, ProcessInspector};

/// Snapshot of the cache's build counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// PE images mapped (from disk or process memory)
    pub images_opened: u64,
    /// DWARF address indexes built
    pub indexes_built: u64,
    /// Module records created
    pub modules_created: u64,
}

#[derive(Debug, Default)]
struct Counters {
    images_opened: AtomicU64,
    indexes_built: AtomicU64,
    modules_created: AtomicU64,
}

/// Modules of one attached process
#[derive(Debug, Default)]
pub struct ProcessRecord {
    modules: BTreeMap<u64, Arc<ModuleRecord>>,
}

impl ProcessRecord {
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleRecord>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ModuleCache {
    processes: Mutex<HashMap<ProcessId, ProcessRecord>>,
    counters: Counters,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProcessId, ProcessRecord>> {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking `process`. Attaching twice keeps the existing record.
    pub fn attach(&self, process: ProcessId) {
        let mut processes = self.lock();
        if processes.contains_key(&process) {
            return;
        }
        processes.insert(process, ProcessRecord::default());
        info!(%process, "Attached process");
    }

    /// Drop `process` and every module record it owns.
    pub fn detach(&self, process: ProcessId) -> bool {
        // Records are released after the lock is dropped
        let removed = self.lock().remove(&process);
        match removed {
            Some(record) => {
                info!(%process, modules = record.len(), "Detached process");
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self, process: ProcessId) -> bool {
        self.lock().contains_key(&process)
    }

    /// Number of module records held for `process`
    pub fn module_count(&self, process: ProcessId) -> Option<usize> {
        self.lock().get(&process).map(ProcessRecord::len)
    }

    /// The record for `base`, created if absent.
    pub fn module_loaded(&self, process: ProcessId, base: u64, path: Option<PathBuf>) -> Result<Arc<ModuleRecord>> {
        let mut processes = self.lock();
        let record = processes
            .get_mut(&process)
            .ok_or(SymbolError::UnknownProcess(process))?;

        if let Some(existing) = record.modules.get(&base) {
            return Ok(Arc::clone(existing));
        }
        let module = Arc::new(ModuleRecord::new(base, path));
        record.modules.insert(base, Arc::clone(&module));
        self.counters.modules_created.fetch_add(1, Ordering::Relaxed);
        debug!(
            %process,
            base = format_args!("{base:#x}"),
            path = ?module.path(),
            "Created module record"
        );
        Ok(module)
    }

    /// Forget the module at `base`.
    pub fn module_unloaded(&self, process: ProcessId, base: u64) -> bool {
        let removed = self
            .lock()
            .get_mut(&process)
            .and_then(|record| record.modules.remove(&base));
        removed.is_some()
    }

    /// Cached record of the module containing `address`.
    pub fn get(&self, process: ProcessId, base: u64) -> Option<Arc<ModuleRecord>> {
        self.lock().get(&process)?.modules.get(&base).cloned()
    }

    /// Resolve `address` to its module through the live-region query and
    /// return the cached record, creating it if absent.
    pub fn lookup_module(
        &self,
        process: ProcessId,
        address: u64,
        inspector: &dyn ProcessInspector,
    ) -> Result<Arc<ModuleRecord>> {
        if !self.is_attached(process) {
            return Err(SymbolError::UnknownProcess(process));
        }
        let base = inspector
            .module_base(process, address)
            .ok_or(SymbolError::NoModule { address })?;
        if let Some(existing) = self.get(process, base) {
            return Ok(existing);
        }

        // The path query may be slow; creation re-checks under the lock
        let path = inspector.module_path(process, base);
        self.module_loaded(process, base, path)
    }

    /// The module's image, mapping it and indexing its DWARF on first use.
    ///
    /// Failures are logged and leave the corresponding part absent.
    pub fn image<'a>(
        &self,
        module: &'a ModuleRecord,
        process: ProcessId,
        inspector: &dyn ProcessInspector,
        limits: &IOLimits,
    ) -> &'a ModuleImage {
        module.image_or_init(|| self.build_image(module, process, inspector, limits))
    }

    fn build_image(
        &self,
        module: &ModuleRecord,
        process: ProcessId,
        inspector: &dyn ProcessInspector,
        limits: &IOLimits,
    ) -> ModuleImage {
        let base = module.base();
        let from_disk = module.path().map(|path| {
            PeImage::open(path, limits).inspect_err(|e| {
                debug!(module = %path.display(), error = %e, "Cannot open module image");
            })
        });

        let pe = match from_disk {
            Some(Ok(pe)) => Some(pe),
            _ => module::read_loaded_image(inspector, process, base, limits)
                .inspect_err(|e| {
                    debug!(base = format_args!("{base:#x}"), error = %e, "Cannot read loaded image");
                })
                .ok(),
        };
        if pe.is_some() {
            self.counters.images_opened.fetch_add(1, Ordering::Relaxed);
        }

        // The loader rewrites ImageBase when it relocates an image, while
        // DWARF keeps the linked addresses; memory copies get no DWARF.
        let dwarf = pe.as_ref().and_then(|pe| {
            if pe.layout() == ImageLayout::Memory {
                debug!(base = format_args!("{base:#x}"), "Skipping DWARF of in-memory image");
                return None;
            }
            match DwarfReader::load(pe) {
                Ok(Some(reader)) => {
                    self.counters.indexes_built.fetch_add(1, Ordering::Relaxed);
                    Some(reader)
                }
                Ok(None) => None,
                Err(e) => {
                    debug!(base = format_args!("{base:#x}"), error = %e, "Ignoring unreadable DWARF");
                    None
                }
            }
        });

        ModuleImage { pe, dwarf }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            images_opened: self.counters.images_opened.load(Ordering::Relaxed),
            indexes_built: self.counters.indexes_built.load(Ordering::Relaxed),
            modules_created: self.counters.modules_created.load(Ordering::Relaxed),
        }
    }
}
