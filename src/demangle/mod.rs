//! Demangler helpers for C++ (Itanium and MSVC) and Rust symbols.
//!
//! Each convention is gated by a cheap prefix check before the real
//! demangler runs, so plain C names are never misread. Names such as
//! `_ZwTerminateProcess@8` pass the Itanium gate but fail to parse; they come
//! back unchanged from [`demangle_or_original`].

use serde::{Deserialize, Serialize};

/// How much detail the demangled output carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemangleStyle {
    /// Just the qualified function name
    #[default]
    NameOnly,
    /// Full signature with parameter types
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFlavor {
    Rust,
    Itanium,
    Msvc,
    Unknown,
}

pub fn detect_flavor(s: &str) -> SymbolFlavor {
    if s.starts_with("_R") || (s.starts_with("_ZN") && s.ends_with('E') && rustc_hash(s)) {
        return SymbolFlavor::Rust;
    }
    if s.starts_with("_Z") {
        return SymbolFlavor::Itanium;
    }
    if s.starts_with('?') {
        return SymbolFlavor::Msvc;
    }
    SymbolFlavor::Unknown
}

// Legacy Rust symbols end in a 17h<16 hex digits>E hash segment.
fn rustc_hash(s: &str) -> bool {
    let Some(body) = s.strip_suffix('E') else {
        return false;
    };
    body.len() > 19
        && body.as_bytes()[body.len() - 19..body.len() - 16] == *b"17h"
        && body[body.len() - 16..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Attempt to demangle a single symbol. Returns None when not recognized
/// or when the name fails to parse.
pub fn demangle(s: &str, style: DemangleStyle) -> Option<String> {
    match detect_flavor(s) {
        SymbolFlavor::Rust => {
            let dm = rustc_demangle::try_demangle(s).ok()?;
            Some(match style {
                // Alternate formatting drops the hash suffix
                DemangleStyle::NameOnly => format!("{:#}", dm),
                DemangleStyle::Complete => dm.to_string(),
            })
        }
        SymbolFlavor::Itanium => {
            let sym = cpp_demangle::Symbol::new(s).ok()?;
            let options = match style {
                DemangleStyle::NameOnly => cpp_demangle::DemangleOptions::new()
                    .no_params()
                    .no_return_type(),
                DemangleStyle::Complete => cpp_demangle::DemangleOptions::new(),
            };
            sym.demangle(&options).ok()
        }
        SymbolFlavor::Msvc => {
            let flags = match style {
                DemangleStyle::NameOnly => msvc_demangler::DemangleFlags::NAME_ONLY,
                DemangleStyle::Complete => msvc_demangler::DemangleFlags::COMPLETE,
            };
            msvc_demangler::demangle(s, flags).ok()
        }
        SymbolFlavor::Unknown => None,
    }
}

/// Demangle, keeping the input verbatim when it is not a mangled name.
pub fn demangle_or_original(s: &str, style: DemangleStyle) -> String {
    demangle(s, style).unwrap_or_else(|| s.to_string())
}
