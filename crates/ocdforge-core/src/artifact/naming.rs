use thiserror::Error;

use crate::platform::{TargetBits, TargetPlatform};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::Zip => "zip",
        }
    }
}

pub const CHECKSUM_EXTENSION: &str = "sha";

/// `<distro>-<app>-<version>-<platform>-<arch>.<ext>`, the name of the
/// distributable archive.
pub fn archive_name(
    distro: &str,
    app: &str,
    version: &str,
    platform: TargetPlatform,
    bits: TargetBits,
) -> Result<String, ArtifactNameError> {
    validate_component("distro", distro)?;
    validate_component("app", app)?;
    validate_version(version)?;
    Ok(format!(
        "{}-{}-{}-{}-{}.{}",
        distro,
        app,
        version,
        platform,
        bits.arch_label(),
        platform.archive_kind().extension()
    ))
}

/// Top level folder inside the archive.
pub fn package_folder_name(app: &str, version: &str) -> String {
    format!("{}-{}", app, version)
}

pub fn checksum_name(archive_name: &str) -> String {
    format!("{}.{}", archive_name, CHECKSUM_EXTENSION)
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArtifactNameError {
    #[error("invalid {field} value '{value}'")]
    InvalidComponent { field: &'static str, value: String },
    #[error("release version '{value}' must look like <upstream>-<revision>")]
    InvalidVersion { value: String },
}

fn validate_component(field: &'static str, value: &str) -> Result<(), ArtifactNameError> {
    if value.is_empty() || !is_canonical_component(value) {
        return Err(ArtifactNameError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_version(value: &str) -> Result<(), ArtifactNameError> {
    if is_release_version(value) {
        return Ok(());
    }
    Err(ArtifactNameError::InvalidVersion {
        value: value.to_string(),
    })
}

fn is_canonical_component(value: &str) -> bool {
    value
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

fn is_release_version(value: &str) -> bool {
    let Some((upstream, revision)) = value.rsplit_once('-') else {
        return false;
    };
    let upstream_ok = !upstream.is_empty()
        && upstream.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit())
        });
    let revision_ok = !revision.is_empty() && revision.chars().all(|ch| ch.is_ascii_digit());
    upstream_ok && revision_ok
}
