//! In-memory module map.
//!
//! Stands in for the live-process region query when symbolizing offline
//! (image file plus relative address) and in tests.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use super::{ProcessId, ProcessInspector};

#[derive(Debug, Clone)]
struct StaticModule {
    size: u64,
    path: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct ProcessLayout {
    modules: BTreeMap<u64, StaticModule>,
    memory: BTreeMap<u64, Vec<u8>>,
}

/// Thread-safe table of (base, size, path) per process
#[derive(Debug, Default)]
pub struct StaticModuleMap {
    processes: RwLock<HashMap<ProcessId, ProcessLayout>>,
}

impl StaticModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module mapped at `base` spanning `size` bytes.
    pub fn add_module(&self, process: ProcessId, base: u64, size: u64, path: Option<PathBuf>) {
        let mut processes = self.processes.write().unwrap_or_else(PoisonError::into_inner);
        processes
            .entry(process)
            .or_default()
            .modules
            .insert(base, StaticModule { size, path });
    }

    pub fn remove_module(&self, process: ProcessId, base: u64) -> bool {
        let mut processes = self.processes.write().unwrap_or_else(PoisonError::into_inner);
        processes
            .get_mut(&process)
            .and_then(|p| p.modules.remove(&base))
            .is_some()
    }

    /// Provide readable memory starting at `address`.
    pub fn add_memory(&self, process: ProcessId, address: u64, bytes: Vec<u8>) {
        let mut processes = self.processes.write().unwrap_or_else(PoisonError::into_inner);
        processes
            .entry(process)
            .or_default()
            .memory
            .insert(address, bytes);
    }
}

impl ProcessInspector for StaticModuleMap {
    fn module_base(&self, process: ProcessId, address: u64) -> Option<u64> {
        let processes = self.processes.read().unwrap_or_else(PoisonError::into_inner);
        let (&base, module) = processes.get(&process)?.modules.range(..=address).next_back()?;
        (address - base < module.size).then_some(base)
    }

    fn module_path(&self, process: ProcessId, base: u64) -> Option<PathBuf> {
        let processes = self.processes.read().unwrap_or_else(PoisonError::into_inner);
        processes.get(&process)?.modules.get(&base)?.path.clone()
    }

    fn read_memory(&self, process: ProcessId, address: u64, buf: &mut [u8]) -> io::Result<usize> {
        let processes = self.processes.read().unwrap_or_else(PoisonError::into_inner);
        let unreadable = || io::Error::new(io::ErrorKind::InvalidInput, format!("{address:#x} is not readable"));

        let layout = processes.get(&process).ok_or_else(unreadable)?;
        let (&start, bytes) = layout.memory.range(..=address).next_back().ok_or_else(unreadable)?;
        let skip = usize::try_from(address - start).map_err(|_| unreadable())?;
        let available = bytes.get(skip..).filter(|b| !b.is_empty()).ok_or_else(unreadable)?;

        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}
