//! Bounded read-only access to image bytes.
//!
//! `MappedImage` is the byte view every image parser works from. Files are
//! memory-mapped read-only; images captured from a live process are held in
//! an owned buffer. Either way the mapping is released when the value drops,
//! including on early error returns during parsing.

pub mod error;

use crate::io::error::{IoError, Result};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Defines the resource limits for image mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IOLimits {
    /// The absolute maximum image size that will be mapped.
    pub max_file_size: u64,
}

impl Default for IOLimits {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

enum ImageBytes {
    // memmap cannot map empty files
    Empty,
    Mapped(Mmap),
    Owned(Vec<u8>),
}

/// A read-only view of a whole image.
pub struct MappedImage {
    path: Option<PathBuf>,
    bytes: ImageBytes,
}

impl MappedImage {
    /// Opens a file and memory-maps it.
    ///
    /// This function will fail if the file size exceeds `limits.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, limits: &IOLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut image = Self::from_file(&file, limits)?;
        image.path = Some(path.to_path_buf());
        Ok(image)
    }

    /// Maps an already-open file handle.
    pub fn from_file(file: &File, limits: &IOLimits) -> Result<Self> {
        let file_size = file.metadata()?.len();

        if file_size > limits.max_file_size {
            warn!(
                size = file_size,
                limit = limits.max_file_size,
                "Image is too large to map"
            );
            return Err(IoError::FileTooLarge {
                limit: limits.max_file_size,
                found: file_size,
            });
        }

        let bytes = if file_size == 0 {
            ImageBytes::Empty
        } else {
            // Safety: read-only map of a regular file; callers only ever
            // take shared slices of it.
            ImageBytes::Mapped(unsafe { Mmap::map(file)? })
        };

        debug!(size = file_size, "Mapped image");
        Ok(Self { path: None, bytes })
    }

    /// Wraps bytes that are already in memory.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            path: None,
            bytes: ImageBytes::Owned(data),
        }
    }

    /// Path the image was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.bytes {
            ImageBytes::Empty => &[],
            ImageBytes::Mapped(m) => m,
            ImageBytes::Owned(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MappedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedImage")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}
