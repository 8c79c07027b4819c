//! Backtrace lines

use std::fmt;

use super::{source, Architecture, Renderer};
use crate::platform::ProcessId;

/// One physical frame as produced by the stack walker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackFrame {
    /// Instruction pointer (return address for caller frames)
    pub pc: u64,
    /// First three stack parameters
    pub params: [u64; 3],
}

impl StackFrame {
    pub fn new(pc: u64) -> Self {
        Self { pc, params: [0; 3] }
    }
}

impl Renderer<'_> {
    pub fn stack_header<W: fmt::Write>(&self, out: &mut W, arch: Architecture) -> fmt::Result {
        match arch {
            Architecture::X86 => writeln!(out, "AddrPC   Params"),
            Architecture::X64 | Architecture::Arm64 => writeln!(out, "AddrPC           Params"),
        }
    }

    /// Header, one line per frame, and a closing blank line.
    ///
    /// Every frame after the first is a caller frame.
    pub fn stack<W: fmt::Write>(
        &self,
        out: &mut W,
        process: ProcessId,
        arch: Architecture,
        frames: &[StackFrame],
    ) -> fmt::Result {
        self.stack_header(out, arch)?;
        for (index, frame) in frames.iter().enumerate() {
            self.frame(out, process, arch, frame, index > 0)?;
        }
        writeln!(out)
    }

    /// `PC P0 P1 P2  module!symbol+0xdisp  [file @ line]`, then the source
    /// snippet when the line is known.
    ///
    /// A caller frame's pc is a return address, which may already belong to
    /// the next statement or another function, so it is looked up one byte
    /// earlier. The printed displacement is still relative to the pc itself.
    pub fn frame<W: fmt::Write>(
        &self,
        out: &mut W,
        process: ProcessId,
        arch: Architecture,
        frame: &StackFrame,
        caller: bool,
    ) -> fmt::Result {
        write!(
            out,
            "{} {} {} {}",
            arch.format_address(frame.pc),
            arch.format_address(frame.params[0]),
            arch.format_address(frame.params[1]),
            arch.format_address(frame.params[2]),
        )?;

        let nudge = u64::from(caller && self.config.nudge_return_addresses);
        let mut location = None;
        if let Some((base, module)) = self.module_name(process, frame.pc) {
            write!(out, "  {module}")?;
            match self.engine.resolve(process, frame.pc.wrapping_sub(nudge)) {
                Ok(info) => {
                    write!(out, "!{}+0x{:x}", info.name, info.displacement + nudge)?;
                    if let (Some(file), Some(line)) = (info.file, info.line) {
                        write!(out, "  [{file} @ {line}]")?;
                        location = Some((file, line));
                    }
                }
                Err(_) => write!(out, "!0x{:x}", frame.pc.wrapping_sub(base))?,
            }
        }
        writeln!(out)?;

        if let Some((file, line)) = location {
            if self.config.show_source {
                source::write_snippet(out, &file, line, self.config.source_context_lines)?;
            }
        }
        Ok(())
    }
}
