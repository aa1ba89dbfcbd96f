use std::fs;

use ocdforge_core::artifact::checksum::{render_checksum_line, sha256_file, ChecksumEntry};
use ocdforge_core::artifact::{checksum_name, ArchiveKind};
use tracing::info;

use crate::{PackError, PackExecutor, PackRequest, PackResult, TarGzPacker, ZipPacker};

pub fn packer_for(kind: ArchiveKind) -> Box<dyn PackExecutor> {
    match kind {
        ArchiveKind::TarGz => Box::new(TarGzPacker),
        ArchiveKind::Zip => Box::new(ZipPacker),
    }
}

/// Writes the archive and its `.sha` sidecar into `request.output_dir`.
///
/// The archive is written to a temporary file first so an interrupted run
/// never leaves a truncated archive under the final name.
pub fn create_archive(request: &PackRequest) -> Result<PackResult, PackError> {
    let extension = format!(".{}", request.kind.extension());
    if !request.archive_name.ends_with(&extension) {
        return Err(PackError::InvalidRequest {
            message: format!(
                "archive name '{}' does not end with '{}'",
                request.archive_name, extension
            ),
        });
    }
    if request.output_dir.starts_with(&request.source_dir) {
        return Err(PackError::InvalidRequest {
            message: "output directory must be outside the packaged tree".to_string(),
        });
    }
    fs::create_dir_all(&request.output_dir)
        .map_err(|err| PackError::io(&request.output_dir, err))?;

    let archive_path = request.output_dir.join(&request.archive_name);
    let temp = tempfile::Builder::new()
        .prefix(".ocdforge-")
        .tempfile_in(&request.output_dir)
        .map_err(|err| PackError::io(&request.output_dir, err))?;
    packer_for(request.kind).write(request, temp.path())?;
    temp.persist(&archive_path)
        .map_err(|err| PackError::io(&archive_path, err.error))?;

    let digest = sha256_file(&archive_path).map_err(|err| PackError::io(&archive_path, err))?;
    let entry = ChecksumEntry::new(digest.clone(), request.archive_name.clone()).map_err(
        |err| PackError::InvalidRequest {
            message: err.to_string(),
        },
    )?;
    let checksum_path = request.output_dir.join(checksum_name(&request.archive_name));
    fs::write(&checksum_path, render_checksum_line(&entry))
        .map_err(|err| PackError::io(&checksum_path, err))?;

    info!(
        archive = %archive_path.display(),
        sha256 = %digest,
        "archive created"
    );
    Ok(PackResult {
        kind: request.kind,
        archive_path,
        checksum_path,
        digest,
    })
}
