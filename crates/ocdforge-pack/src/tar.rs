use std::path::Path;

use ocdforge_core::artifact::ArchiveKind;

use crate::common::{entries_from_dir, write_tar_gz};
use crate::{PackError, PackExecutor, PackRequest};

/// Gzip-compressed tarball, used for the linux and darwin packages.
pub struct TarGzPacker;

impl PackExecutor for TarGzPacker {
    fn write(&self, request: &PackRequest, output: &Path) -> Result<(), PackError> {
        if request.kind != ArchiveKind::TarGz {
            return Err(PackError::InvalidRequest {
                message: "tar.gz packer only supports ArchiveKind::TarGz".to_string(),
            });
        }
        let entries = entries_from_dir(&request.source_dir, Some(&request.archive_root))?;
        write_tar_gz(output, &entries)
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::TarGz
    }
}
