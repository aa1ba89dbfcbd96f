use std::path::Path;

use ocdforge_core::artifact::ArchiveKind;

use crate::common::{entries_from_dir, write_zip};
use crate::{PackError, PackExecutor, PackRequest};

pub struct ZipPacker;

impl PackExecutor for ZipPacker {
    fn write(&self, request: &PackRequest, output: &Path) -> Result<(), PackError> {
        if request.kind != ArchiveKind::Zip {
            return Err(PackError::InvalidRequest {
                message: "zip packer only supports ArchiveKind::Zip".to_string(),
            });
        }
        let entries = entries_from_dir(&request.source_dir, Some(&request.archive_root))?;
        write_zip(output, &entries)
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Zip
    }
}
