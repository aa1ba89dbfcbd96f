use std::io;
use std::path::{Path, PathBuf};

use ocdforge_core::artifact::layout::LayoutValidationError;
use ocdforge_core::artifact::ArchiveKind;
use thiserror::Error;

mod common;
pub mod archive;
pub mod staging;
pub mod tar;
pub mod zip;

pub use archive::{create_archive, packer_for};
pub use common::{entries_from_dir, ArchiveEntry, EntrySource};
pub use staging::{copy_licenses, prepare_package_root, validate_package, write_build_info};
pub use tar::TarGzPacker;
pub use zip::ZipPacker;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackRequest {
    pub kind: ArchiveKind,
    /// Package tree to archive.
    pub source_dir: PathBuf,
    /// Top level folder every entry is placed under.
    pub archive_root: String,
    pub output_dir: PathBuf,
    pub archive_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackResult {
    pub kind: ArchiveKind,
    pub archive_path: PathBuf,
    pub checksum_path: PathBuf,
    pub digest: String,
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid pack request: {message}")]
    InvalidRequest { message: String },
    #[error("pack i/o error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("zip error: {0}")]
    Zip(#[from] ::zip::result::ZipError),
    #[error("license file '{}' of {component} is missing", path.display())]
    MissingLicense { component: String, path: PathBuf },
    #[error(transparent)]
    Layout(#[from] LayoutValidationError),
}

impl PackError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        PackError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub trait PackExecutor {
    /// Writes the archive for `request` to `output`, which may be a
    /// temporary file that is renamed into place afterwards.
    fn write(&self, request: &PackRequest, output: &Path) -> Result<(), PackError>;

    fn kind(&self) -> ArchiveKind;
}
