//! Register dumps

use std::fmt;

use super::Architecture;

/// Which register groups of a context are valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextFlags {
    pub integer: bool,
    pub control: bool,
    pub segments: bool,
}

impl Default for ContextFlags {
    fn default() -> Self {
        Self {
            integer: true,
            control: true,
            segments: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct X86Context {
    pub flags: ContextFlags,
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub eip: u32,
    pub esp: u32,
    pub ebp: u32,
    pub eflags: u32,
    pub cs: u16,
    pub ss: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Amd64Context {
    pub flags: ContextFlags,
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub rsp: u64,
    pub rbp: u64,
    pub eflags: u32,
    pub cs: u16,
    pub ss: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arm64Context {
    pub flags: ContextFlags,
    /// X0..X28
    pub x: [u64; 29],
    pub pc: u64,
    pub sp: u64,
    pub fp: u64,
}

/// Thread context captured at the exception
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterContext {
    X86(X86Context),
    Amd64(Amd64Context),
    Arm64(Arm64Context),
}

impl RegisterContext {
    pub fn architecture(&self) -> Architecture {
        match self {
            RegisterContext::X86(_) => Architecture::X86,
            RegisterContext::Amd64(_) => Architecture::X64,
            RegisterContext::Arm64(_) => Architecture::Arm64,
        }
    }

    /// Instruction pointer of the faulting frame
    pub fn pc(&self) -> u64 {
        match self {
            RegisterContext::X86(c) => c.eip as u64,
            RegisterContext::Amd64(c) => c.rip,
            RegisterContext::Arm64(c) => c.pc,
        }
    }
}

/// `iopl=N` and the flag mnemonics
pub fn eflags_mnemonics(eflags: u32) -> String {
    let bit = |mask: u32, set: &'static str, clear: &'static str| if eflags & mask != 0 { set } else { clear };
    format!(
        "iopl={:1x} {} {} {} {} {} {} {} {} {} {}",
        (eflags >> 12) & 3,
        bit(0x0010_0000, "vip", "   "),
        bit(0x0008_0000, "vif", "   "),
        bit(0x0000_0800, "ov", "nv"),
        bit(0x0000_0400, "dn", "up"),
        bit(0x0000_0200, "ei", "di"),
        bit(0x0000_0080, "ng", "pl"),
        bit(0x0000_0040, "zr", "nz"),
        bit(0x0000_0010, "ac", "na"),
        bit(0x0000_0004, "po", "pe"),
        bit(0x0000_0001, "cy", "nc"),
    )
}

fn write_segments<W: fmt::Write>(
    out: &mut W,
    flags: ContextFlags,
    segments: [u16; 6],
    eflags: u32,
) -> fmt::Result {
    let [cs, ss, ds, es, fs, gs] = segments;
    if flags.segments {
        write!(
            out,
            "cs={cs:04x}  ss={ss:04x}  ds={ds:04x}  es={es:04x}  fs={fs:04x}  gs={gs:04x}"
        )?;
        if flags.control {
            write!(out, "             efl={eflags:08x}")?;
        }
    } else if flags.control {
        write!(out, "{:71}efl={eflags:08x}", "")?;
    }
    Ok(())
}

fn write_x86<W: fmt::Write>(out: &mut W, c: &X86Context) -> fmt::Result {
    if c.flags.integer {
        writeln!(
            out,
            "eax={:08x} ebx={:08x} ecx={:08x} edx={:08x} esi={:08x} edi={:08x}",
            c.eax, c.ebx, c.ecx, c.edx, c.esi, c.edi
        )?;
    }
    if c.flags.control {
        writeln!(
            out,
            "eip={:08x} esp={:08x} ebp={:08x} {}",
            c.eip,
            c.esp,
            c.ebp,
            eflags_mnemonics(c.eflags)
        )?;
    }
    write_segments(out, c.flags, [c.cs, c.ss, c.ds, c.es, c.fs, c.gs], c.eflags)
}

fn write_amd64<W: fmt::Write>(out: &mut W, c: &Amd64Context) -> fmt::Result {
    if c.flags.integer {
        writeln!(out, "rax={:016x} rbx={:016x} rcx={:016x}", c.rax, c.rbx, c.rcx)?;
        writeln!(out, "rdx={:016x} rsi={:016x} rdi={:016x}", c.rdx, c.rsi, c.rdi)?;
    }
    if c.flags.control {
        writeln!(out, "rip={:016x} rsp={:016x} rbp={:016x}", c.rip, c.rsp, c.rbp)?;
    }
    if c.flags.integer {
        writeln!(out, " r8={:016x}  r9={:016x} r10={:016x}", c.r8, c.r9, c.r10)?;
        writeln!(out, "r11={:016x} r12={:016x} r13={:016x}", c.r11, c.r12, c.r13)?;
        write!(out, "r14={:016x} r15={:016x}", c.r14, c.r15)?;
        if c.flags.control {
            write!(out, " {}", eflags_mnemonics(c.eflags))?;
        }
        writeln!(out)?;
    } else if c.flags.control {
        writeln!(out, "{}", eflags_mnemonics(c.eflags))?;
    }
    write_segments(out, c.flags, [c.cs, c.ss, c.ds, c.es, c.fs, c.gs], c.eflags)
}

fn write_arm64<W: fmt::Write>(out: &mut W, c: &Arm64Context) -> fmt::Result {
    if c.flags.integer {
        for i in (0..28).step_by(4) {
            writeln!(
                out,
                "X{}={:016X} X{}={:016X} X{}={:016X} X{}={:016X}",
                i,
                c.x[i],
                i + 1,
                c.x[i + 1],
                i + 2,
                c.x[i + 2],
                i + 3,
                c.x[i + 3]
            )?;
        }
        writeln!(out, "X28={:016X}", c.x[28])?;
    }
    if c.flags.control {
        writeln!(out, "pc={:016X} sp={:016X} fp={:016X} ", c.pc, c.sp, c.fp)?;
    }
    Ok(())
}

/// `Registers:` block, terminated by a blank line.
pub fn write_context<W: fmt::Write>(out: &mut W, context: &RegisterContext) -> fmt::Result {
    writeln!(out, "Registers:")?;
    match context {
        RegisterContext::X86(c) => write_x86(out, c)?,
        RegisterContext::Amd64(c) => write_amd64(out, c)?,
        RegisterContext::Arm64(c) => write_arm64(out, c)?,
    }
    write!(out, "\n\n")
}
