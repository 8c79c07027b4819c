//! Post-mortem symbolication for Windows PE crash reports.
//!
//! A [`SymbolEngine`] tracks the modules of each debugged process and turns
//! raw addresses into `module!function+0xdisp [file @ line]` by walking a
//! fallback chain: COFF symbol table, DWARF debug info, the platform's
//! native symbolizer, then the export directory. The [`render`] module
//! formats whole crash logs on top of it.

/// Error types
pub mod error;

/// Tracing setup
pub mod logging;

/// Engine configuration
pub mod config;

/// Bounded file mapping
pub mod io;

/// Symbol name demangling
pub mod demangle;

/// Binary container parsers
pub mod formats;

/// DWARF function and line lookup
pub mod dwarf;

/// Symbol sources and the fallback chain
pub mod symbols;

/// Per-process module cache
pub mod cache;

/// Debugger-side process access
pub mod platform;

/// Public symbolication API
pub mod engine;

/// Crash log rendering
pub mod render;

pub use cache::{CacheStats, ModuleCache};
pub use config::EngineConfig;
pub use dwarf::DwarfReader;
pub use engine::{SymbolEngine, SymbolInfo};
pub use error::{Result, SymbolError};
pub use formats::pe::PeImage;
pub use platform::{NativeSymbolizer, ProcessId, ProcessInspector, StaticModuleMap};
pub use render::Renderer;
pub use symbols::{FallbackChain, SymbolSource};
