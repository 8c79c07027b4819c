//! Human-readable crash reports.
//!
//! The renderer turns what the debug session hands over (exception record,
//! register context, raw stack frames, module list) into the text of a crash
//! log, resolving every address through a [`SymbolEngine`]. Output goes to
//! any `fmt::Write` sink so the caller decides where the log ends up.

use std::fmt;

use crate::config::RenderConfig;
use crate::engine::SymbolEngine;
use crate::platform::ProcessId;

pub mod context;
pub mod exception;
pub mod frame;
pub mod modules;
pub mod source;

pub use context::{Amd64Context, Arm64Context, ContextFlags, RegisterContext, X86Context};
pub use exception::{exception_string, fast_fail_name, ExceptionRecord};
pub use frame::StackFrame;
pub use modules::ModuleEntry;

/// Pointer width of the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    X86,
    X64,
    Arm64,
}

impl Architecture {
    /// Hex digits in a full-width address
    pub fn address_digits(self) -> usize {
        match self {
            Architecture::X86 => 8,
            Architecture::X64 | Architecture::Arm64 => 16,
        }
    }

    /// Truncate to the target's pointer size.
    pub fn mask(self, value: u64) -> u64 {
        match self {
            Architecture::X86 => value & 0xffff_ffff,
            Architecture::X64 | Architecture::Arm64 => value,
        }
    }

    /// Zero-padded upper-case address
    pub fn format_address(self, value: u64) -> String {
        format!("{:0width$X}", self.mask(value), width = self.address_digits())
    }
}

/// File name component of a Windows or POSIX path
pub fn base_name(path: &str) -> &str {
    path.rfind(['\\', '/', ':']).map_or(path, |i| &path[i + 1..])
}

/// Writes crash-log sections for one engine.
pub struct Renderer<'a> {
    engine: &'a SymbolEngine,
    config: RenderConfig,
}

impl<'a> Renderer<'a> {
    pub fn new(engine: &'a SymbolEngine) -> Self {
        Self {
            engine,
            config: engine.config().render.clone(),
        }
    }

    pub fn with_config(engine: &'a SymbolEngine, config: RenderConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// File name of the module containing `address`, when its path is known
    fn module_name(&self, process: ProcessId, address: u64) -> Option<(u64, String)> {
        let module = self.engine.lookup_module(process, address).ok()?;
        let path = module.path()?.to_string_lossy().into_owned();
        Some((module.base(), base_name(&path).to_string()))
    }

    /// Register dump followed by the symbolized backtrace.
    pub fn crash_report<W: fmt::Write>(
        &self,
        out: &mut W,
        process: ProcessId,
        context: &RegisterContext,
        frames: &[StackFrame],
    ) -> fmt::Result {
        context::write_context(out, context)?;
        self.stack(out, process, context.architecture(), frames)
    }
}
