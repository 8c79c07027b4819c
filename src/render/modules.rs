//! Loaded-module listing

use std::fmt;

use super::{base_name, Architecture, Renderer};

/// A module as enumerated by the debug session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    pub base: u64,
    pub size: u64,
    pub path: String,
}

impl Renderer<'_> {
    /// `start-end name` per module, then a blank line. Nothing for an
    /// empty list.
    pub fn modules<W: fmt::Write>(&self, out: &mut W, arch: Architecture, modules: &[ModuleEntry]) -> fmt::Result {
        for module in modules {
            writeln!(
                out,
                "{}-{} {}",
                arch.format_address(module.base),
                arch.format_address(module.base.wrapping_add(module.size)),
                base_name(&module.path)
            )?;
        }
        if !modules.is_empty() {
            writeln!(out)?;
        }
        Ok(())
    }
}
