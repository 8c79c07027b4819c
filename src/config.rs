//! Configuration for the symbol engine.
//!
//! Every field has a default, so a partial JSON document only overrides
//! what it names.

use serde::{Deserialize, Serialize};

use crate::demangle::DemangleStyle;
use crate::io::IOLimits;

/// Master configuration for the engine and renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Demangle resolved names (default: true).
    pub demangle: bool,
    /// Detail of demangled names (default: name only).
    pub demangle_style: DemangleStyle,
    /// Image mapping configuration.
    pub io: IoConfig,
    /// Backtrace rendering configuration.
    pub render: RenderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            demangle: true,
            demangle_style: DemangleStyle::NameOnly,
            io: IoConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Image mapping configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Largest image that will be mapped (default: 1073741824 = 1GB).
    pub max_image_size: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_image_size: IOLimits::default().max_file_size,
        }
    }
}

impl IoConfig {
    pub fn limits(&self) -> IOLimits {
        IOLimits {
            max_file_size: self.max_image_size,
        }
    }
}

/// Backtrace rendering configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Source lines printed above and below the frame's line (default: 2).
    pub source_context_lines: u32,
    /// Print source snippets when the file is readable (default: true).
    pub show_source: bool,
    /// Look up caller frames one byte before the return address (default: true).
    pub nudge_return_addresses: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            source_context_lines: 2,
            show_source: true,
            nudge_return_addresses: true,
        }
    }
}
