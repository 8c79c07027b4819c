//! Exception description line

use std::fmt;

use super::{base_name, Architecture, Renderer};
use crate::platform::ProcessId;

pub const EXCEPTION_ACCESS_VIOLATION: u32 = 0xC000_0005;
pub const EXCEPTION_IN_PAGE_ERROR: u32 = 0xC000_0006;
pub const STATUS_STACK_BUFFER_OVERRUN: u32 = 0xC000_0409;

/// Exception record reported by the debug session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRecord {
    pub code: u32,
    pub address: u64,
    /// ExceptionInformation parameters
    pub information: Vec<u64>,
}

/// Readable name of an NTSTATUS exception code
pub fn exception_string(code: u32) -> Option<&'static str> {
    let text = match code {
        0xC000_0005 => "Access Violation",
        0xC000_0006 => "In Page Error",
        0xC000_0008 => "Invalid Handle",
        0xC000_001D => "Illegal Instruction",
        0xC000_0025 => "Cannot Continue",
        0xC000_0026 => "Invalid Disposition",
        0xC000_008C => "Array bounds exceeded",
        0xC000_008D => "Floating-point denormal operand",
        0xC000_008E => "Floating-point division by zero",
        0xC000_008F => "Floating-point inexact result",
        0xC000_0090 => "Floating-point invalid operation",
        0xC000_0091 => "Floating-point overflow",
        0xC000_0092 => "Floating-point stack check",
        0xC000_0093 => "Floating-point underflow",
        0xC000_0094 => "Integer division by zero",
        0xC000_0095 => "Integer overflow",
        0xC000_0096 => "Privileged instruction",
        0xC000_00FD => "Stack Overflow",
        0xC000_0194 => "Possible deadlock condition",
        0xC000_0409 => "Fast Fail",
        0xC000_041D => "Fatal User Callback Exception",
        0xC000_0420 => "Assertion failure",

        0xE043_4F4D => "CLR exception",
        0xE06D_7363 => "C++ exception handling exception",

        0x8000_0001 => "Guard Page Exception",
        0x8000_0002 => "Alignment Fault",
        0x8000_0003 => "Breakpoint",
        0x8000_0004 => "Single Step",

        0x4000_001F => "Breakpoint",
        0x4000_0015 => "Fast Application Exit",
        0x4001_0003 => "Terminate Thread",
        0x4001_0004 => "Terminate Process",
        0x4001_0005 => "Control+C",
        0x4001_0008 => "Control+Break",
        0x406D_1388 => "Thread Name Exception",

        // RPC_S_UNKNOWN_IF, RPC_S_SERVER_UNAVAILABLE
        1717 => "Unknown Interface",
        1722 => "Server Unavailable",

        _ => return None,
    };
    Some(text)
}

const FAST_FAIL_CODES: [&str; 10] = [
    "LEGACY_GS_VIOLATION",
    "VTGUARD_CHECK_FAILURE",
    "STACK_COOKIE_CHECK_FAILURE",
    "CORRUPT_LIST_ENTRY",
    "INCORRECT_STACK",
    "INVALID_ARG",
    "GS_COOKIE_INIT",
    "FATAL_APP_EXIT",
    "RANGE_CHECK_FAILURE",
    "UNSAFE_REGISTRY_ACCESS",
];

/// Name of a `__fastfail` code
pub fn fast_fail_name(code: u32) -> &'static str {
    FAST_FAIL_CODES
        .get(code as usize)
        .copied()
        .unwrap_or("INVALID_FAST_FAIL_CODE")
}

fn article(text: &str) -> &'static str {
    match text.as_bytes().first() {
        Some(b'A' | b'E' | b'I' | b'O' | b'U') => "an",
        _ => "a",
    }
}

fn access_verb(kind: u64) -> &'static str {
    match kind {
        0 => "Reading from",
        1 => "Writing to",
        8 => "DEP violation at",
        _ => "Accessing",
    }
}

impl Renderer<'_> {
    /// `app.exe caused an Access Violation at location 0040100A in module
    /// app.exe Reading from location 00000000.` followed by a blank line.
    pub fn exception<W: fmt::Write>(
        &self,
        out: &mut W,
        process: ProcessId,
        process_image: Option<&str>,
        arch: Architecture,
        record: &ExceptionRecord,
    ) -> fmt::Result {
        write!(out, "{} caused", process_image.map_or("Application", base_name))?;
        match exception_string(record.code) {
            Some(text) => write!(out, " {} {}", article(text), text)?,
            None => write!(out, " an Unknown [0x{:X}] Exception", record.code)?,
        }

        write!(out, " at location {}", arch.format_address(record.address))?;
        if let Some((_, module)) = self.module_name(process, record.address) {
            write!(out, " in module {module}")?;
        }

        let info = &record.information;
        if matches!(record.code, EXCEPTION_ACCESS_VIOLATION | EXCEPTION_IN_PAGE_ERROR) && info.len() >= 2 {
            write!(out, " {} location {}", access_verb(info[0]), arch.format_address(info[1]))?;
        }
        if record.code == STATUS_STACK_BUFFER_OVERRUN {
            if let Some(&code) = info.first() {
                let code = code as u32;
                write!(out, " with code {} ({})", code, fast_fail_name(code))?;
            }
        }

        write!(out, ".\n\n")
    }
}
