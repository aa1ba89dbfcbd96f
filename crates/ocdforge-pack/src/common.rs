use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::PackError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub archive_path: String,
    pub mode: u32,
    pub source: EntrySource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntrySource {
    File(PathBuf),
    Symlink(PathBuf),
}

/// Every file and symlink under `root`, sorted by archive path and placed
/// under `prefix` when one is given.
pub fn entries_from_dir(root: &Path, prefix: Option<&str>) -> Result<Vec<ArchiveEntry>, PackError> {
    if !root.is_dir() {
        return Err(PackError::InvalidRequest {
            message: format!("missing directory '{}'", root.display()),
        });
    }
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|err| PackError::io(root, io::Error::from(err)))?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|err| PackError::InvalidRequest {
                message: err.to_string(),
            })?;
        let relative = path_to_archive_path(relative);
        let archive_path = match prefix {
            Some(prefix) => join_archive_path(prefix, &relative),
            None => relative,
        };
        let source = if file_type.is_symlink() {
            let target =
                fs::read_link(entry.path()).map_err(|err| PackError::io(entry.path(), err))?;
            EntrySource::Symlink(target)
        } else {
            EntrySource::File(entry.path().to_path_buf())
        };
        let metadata = fs::symlink_metadata(entry.path())
            .map_err(|err| PackError::io(entry.path(), err))?;
        entries.push(ArchiveEntry {
            mode: entry_mode(&metadata, &archive_path),
            archive_path,
            source,
        });
    }
    entries.sort_by(|left, right| left.archive_path.cmp(&right.archive_path));
    Ok(entries)
}

pub fn write_zip(path: &Path, entries: &[ArchiveEntry]) -> Result<(), PackError> {
    let file = fs::File::create(path).map_err(|err| PackError::io(path, err))?;
    let mut writer = ::zip::ZipWriter::new(file);
    let timestamp = ::zip::DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0).map_err(|_| {
        PackError::InvalidRequest {
            message: "invalid zip timestamp".to_string(),
        }
    })?;
    for entry in entries {
        let options = ::zip::write::FileOptions::<()>::default()
            .compression_method(::zip::CompressionMethod::Deflated)
            .last_modified_time(timestamp)
            .unix_permissions(entry.mode);
        match &entry.source {
            EntrySource::File(source) => {
                writer.start_file(entry.archive_path.as_str(), options)?;
                let mut input = fs::File::open(source).map_err(|err| PackError::io(source, err))?;
                io::copy(&mut input, &mut writer).map_err(|err| PackError::io(path, err))?;
            }
            EntrySource::Symlink(target) => {
                writer.add_symlink(
                    entry.archive_path.as_str(),
                    path_to_archive_path(target),
                    options,
                )?;
            }
        }
    }
    writer.finish()?;
    Ok(())
}

pub fn write_tar_gz(path: &Path, entries: &[ArchiveEntry]) -> Result<(), PackError> {
    let file = fs::File::create(path).map_err(|err| PackError::io(path, err))?;
    let encoder = flate2::GzBuilder::new()
        .mtime(0)
        .write(file, flate2::Compression::default());
    let mut builder = ::tar::Builder::new(encoder);
    for entry in entries {
        let mut header = ::tar::Header::new_gnu();
        header.set_mode(entry.mode);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(0);
        match &entry.source {
            EntrySource::File(source) => {
                let metadata = fs::metadata(source).map_err(|err| PackError::io(source, err))?;
                header.set_size(metadata.len());
                header.set_entry_type(::tar::EntryType::Regular);
                let mut input = fs::File::open(source).map_err(|err| PackError::io(source, err))?;
                builder
                    .append_data(&mut header, &entry.archive_path, &mut input)
                    .map_err(|err| PackError::io(path, err))?;
            }
            EntrySource::Symlink(target) => {
                header.set_size(0);
                header.set_entry_type(::tar::EntryType::Symlink);
                builder
                    .append_link(&mut header, &entry.archive_path, target)
                    .map_err(|err| PackError::io(path, err))?;
            }
        }
    }
    builder.finish().map_err(|err| PackError::io(path, err))?;
    builder
        .into_inner()
        .map_err(|err| PackError::io(path, err))?
        .finish()
        .map_err(|err| PackError::io(path, err))?;
    Ok(())
}

#[cfg(unix)]
fn entry_mode(metadata: &fs::Metadata, _archive_path: &str) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn entry_mode(metadata: &fs::Metadata, archive_path: &str) -> u32 {
    if metadata.file_type().is_symlink() {
        return 0o777;
    }
    let executable = [".exe", ".dll", ".so", ".dylib"]
        .iter()
        .any(|suffix| archive_path.ends_with(suffix))
        || archive_path.contains("/bin/");
    if executable {
        0o755
    } else {
        0o644
    }
}

fn path_to_archive_path(path: &Path) -> String {
    let mut components = Vec::new();
    for component in path.components() {
        components.push(component.as_os_str().to_string_lossy().into_owned());
    }
    components.join("/")
}

fn join_archive_path(prefix: &str, suffix: &str) -> String {
    if prefix.ends_with('/') {
        format!("{}{}", prefix, suffix)
    } else {
        format!("{}/{}", prefix, suffix)
    }
}
