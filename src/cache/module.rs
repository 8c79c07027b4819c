//! Per-module state: the mapped image and its debug information

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::dwarf::DwarfReader;
use crate::error::Result;
use crate::formats::pe::PeImage;
use crate::io::error::IoError;
use crate::io::IOLimits;
use crate::platform::{ProcessId, ProcessInspector};

const PAGE_SIZE: usize = 0x1000;

/// Parsed image and debug info of one loaded module.
///
/// Either part may be absent: the file may not be openable, and most
/// images carry no DWARF.
#[derive(Debug, Default)]
pub struct ModuleImage {
    pub pe: Option<PeImage>,
    pub dwarf: Option<DwarfReader>,
}

impl ModuleImage {
    /// Translate a live address into the image's preferred address space.
    pub fn runtime_offset(&self, module_base: u64, address: u64) -> Option<u64> {
        let pe = self.pe.as_ref()?;
        Some(pe.image_base().wrapping_add(address.checked_sub(module_base)?))
    }
}

/// One module loaded into a process, keyed by its live base address.
#[derive(Debug)]
pub struct ModuleRecord {
    base: u64,
    path: Option<PathBuf>,
    image: OnceCell<ModuleImage>,
}

impl ModuleRecord {
    pub(crate) fn new(base: u64, path: Option<PathBuf>) -> Self {
        Self {
            base,
            path,
            image: OnceCell::new(),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the image has been opened yet
    pub fn is_loaded(&self) -> bool {
        self.image.get().is_some()
    }

    /// The module image, built by `build` on first use.
    ///
    /// Concurrent callers wait for the single build in flight.
    pub(crate) fn image_or_init(&self, build: impl FnOnce() -> ModuleImage) -> &ModuleImage {
        self.image.get_or_init(build)
    }
}

/// Copy a loaded image out of the target, page by page.
///
/// Unreadable pages are left zeroed.
pub(crate) fn read_loaded_image(
    inspector: &dyn ProcessInspector,
    process: ProcessId,
    base: u64,
    limits: &IOLimits,
) -> Result<PeImage> {
    let mut headers = vec![0u8; PAGE_SIZE];
    let read = inspector.read_memory(process, base, &mut headers)?;
    headers.truncate(read);
    let size = PeImage::from_loaded_image(headers)?.size_of_image() as u64;
    if size > limits.max_file_size {
        return Err(IoError::FileTooLarge {
            limit: limits.max_file_size,
            found: size,
        }
        .into());
    }

    let mut image = vec![0u8; size as usize];
    for (index, page) in image.chunks_mut(PAGE_SIZE).enumerate() {
        let address = base + (index * PAGE_SIZE) as u64;
        if let Err(e) = inspector.read_memory(process, address, page) {
            debug!(address = format_args!("{address:#x}"), error = %e, "Unreadable image page");
        }
    }
    Ok(PeImage::from_loaded_image(image)?)
}
