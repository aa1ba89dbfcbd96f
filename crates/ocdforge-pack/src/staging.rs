//! Package tree assembly ahead of archiving.

use std::fs;
use std::path::{Path, PathBuf};

use ocdforge_core::artifact::layout::{license_dir, validate_package_entries};
use ocdforge_core::artifact::BUILD_INFO_FILE_NAME;
use ocdforge_core::platform::TargetPlatform;
use ocdforge_core::provenance::BuildInfo;
use tracing::{debug, info};

use crate::common::entries_from_dir;
use crate::PackError;

/// Empties the package tree unless `keep` is set, then makes sure it exists.
pub fn prepare_package_root(package_root: &Path, keep: bool) -> Result<(), PackError> {
    if !keep && package_root.exists() {
        info!(path = %package_root.display(), "removing previous package tree");
        fs::remove_dir_all(package_root).map_err(|err| PackError::io(package_root, err))?;
    }
    fs::create_dir_all(package_root).map_err(|err| PackError::io(package_root, err))
}

/// Copies each license file of a component into
/// `licenses/<name>-<version>/`. Every listed file must exist.
pub fn copy_licenses(
    source_dir: &Path,
    component: &str,
    version: &str,
    files: &[&str],
    package_root: &Path,
) -> Result<Vec<PathBuf>, PackError> {
    let destination = package_root.join(license_dir(component, version));
    fs::create_dir_all(&destination).map_err(|err| PackError::io(&destination, err))?;
    let mut copied = Vec::with_capacity(files.len());
    for file in files {
        let source = source_dir.join(file);
        if !source.is_file() {
            return Err(PackError::MissingLicense {
                component: component.to_string(),
                path: source,
            });
        }
        let target = destination.join(file);
        fs::copy(&source, &target).map_err(|err| PackError::io(&source, err))?;
        debug!(component, file, "copied license");
        copied.push(target);
    }
    Ok(copied)
}

pub fn write_build_info(package_root: &Path, info: &BuildInfo) -> Result<PathBuf, PackError> {
    let path = package_root.join(BUILD_INFO_FILE_NAME);
    let json = info.to_pretty_json().map_err(|err| PackError::InvalidRequest {
        message: format!("cannot serialize build info: {}", err),
    })?;
    fs::write(&path, json).map_err(|err| PackError::io(&path, err))?;
    Ok(path)
}

/// Checks the finished tree has the provenance document, every executable
/// and at least one license.
pub fn validate_package(
    package_root: &Path,
    platform: TargetPlatform,
    executables: &[&str],
) -> Result<(), PackError> {
    let entries = entries_from_dir(package_root, None)?;
    validate_package_entries(
        platform,
        executables,
        entries.iter().map(|entry| entry.archive_path.as_str()),
    )?;
    Ok(())
}
