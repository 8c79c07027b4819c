//! Inbound collaborators: the OS facilities the engine consumes.
//!
//! The debug session owns the real process handles; the engine only needs
//! to ask which module contains an address, where that module lives on disk,
//! and to read raw memory. The OS-native symbol engine is an optional
//! capability supplied once, when the engine is built.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

mod static_map;

pub use static_map::StaticModuleMap;

/// Opaque identity of a target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for ProcessId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Live-process queries supplied by the debug session.
pub trait ProcessInspector: Send + Sync {
    /// Base address of the module whose mapping contains `address`.
    fn module_base(&self, process: ProcessId, address: u64) -> Option<u64>;

    /// On-disk image of the module loaded at `base`, when it can be resolved.
    fn module_path(&self, process: ProcessId, base: u64) -> Option<PathBuf>;

    /// Read up to `buf.len()` bytes of target memory at `address`.
    fn read_memory(&self, process: ProcessId, address: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// A name reported by the OS-native symbol engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSymbol {
    pub name: String,
    /// Distance of the queried address from the symbol start
    pub displacement: u64,
}

/// A source location reported by the OS-native symbol engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeLine {
    pub file: String,
    pub line: u32,
    pub displacement: u64,
}

/// The platform symbol engine (PDB files, symbol servers).
///
/// Calls may block on network I/O while symbols are downloaded.
pub trait NativeSymbolizer: Send + Sync {
    fn resolve_name(&self, process: ProcessId, address: u64) -> Option<NativeSymbol>;

    fn resolve_line(&self, process: ProcessId, address: u64) -> Option<NativeLine>;

    /// Undecorate a name the crate's own demangler did not recognise.
    fn undecorate(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }
}
