//! Makes packaged executables relocatable and self-contained.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ocdforge_core::artifact::{package_layout, PackageLayout};
use ocdforge_core::platform::TargetPlatform;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::inspect::{BinaryInspector, InspectError};

#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error(transparent)]
    Inspect(#[from] InspectError),
    #[error(
        "library '{library}' needed by '{}' was not found in any search directory",
        needed_by.display()
    )]
    UnresolvedLibrary { library: String, needed_by: PathBuf },
    #[error("i/o error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("package is missing shared libraries: {}", render_missing(missing))]
    MissingDependencies { missing: Vec<MissingDependency> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingDependency {
    pub binary: PathBuf,
    pub library: String,
}

fn render_missing(missing: &[MissingDependency]) -> String {
    missing
        .iter()
        .map(|entry| format!("{} (needed by {})", entry.library, entry.binary.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PostProcessError + '_ {
    move |source| PostProcessError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Transitive non-system dependencies: library file name to the file it was
/// resolved to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyClosure {
    libraries: BTreeMap<String, PathBuf>,
}

impl DependencyClosure {
    pub fn names(&self) -> BTreeSet<&str> {
        self.libraries.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.libraries.get(name).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.libraries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

/// Finds library files by name in an ordered list of directories.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LibraryResolver {
    search_dirs: Vec<PathBuf>,
}

impl LibraryResolver {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let direct = Path::new(reference);
        if direct.is_absolute() && direct.is_file() {
            return Some(direct.to_path_buf());
        }
        let name = library_file_name(reference);
        self.search_dirs
            .iter()
            .map(|dir| dir.join(&name))
            .find(|candidate| candidate.is_file())
    }
}

/// Last component of a library reference (`@rpath/libx.dylib` -> `libx.dylib`).
pub fn library_file_name(reference: &str) -> String {
    reference
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(reference)
        .to_string()
}

const LINUX_SYSTEM_LIBRARIES: &[&str] = &[
    "linux-vdso.so",
    "linux-gate.so",
    "ld-linux",
    "libc.so",
    "libm.so",
    "libdl.so",
    "libpthread.so",
    "librt.so",
    "libresolv.so",
    "libutil.so",
    "libudev.so",
];

const WINDOWS_SYSTEM_DLLS: &[&str] = &[
    "advapi32.dll",
    "cfgmgr32.dll",
    "gdi32.dll",
    "hid.dll",
    "kernel32.dll",
    "msvcrt.dll",
    "ole32.dll",
    "oleaut32.dll",
    "setupapi.dll",
    "shell32.dll",
    "user32.dll",
    "winmm.dll",
    "ws2_32.dll",
];

/// Libraries every target machine provides; these are never copied.
pub fn is_system_library(platform: TargetPlatform, reference: &str) -> bool {
    match platform {
        TargetPlatform::Linux => {
            let name = library_file_name(reference);
            LINUX_SYSTEM_LIBRARIES
                .iter()
                .any(|system| name.starts_with(system))
        }
        TargetPlatform::Darwin => {
            reference.starts_with("/usr/lib/") || reference.starts_with("/System/Library/")
        }
        TargetPlatform::Win32 => {
            let name = library_file_name(reference).to_ascii_lowercase();
            name.starts_with("api-ms-win-") || WINDOWS_SYSTEM_DLLS.contains(&name.as_str())
        }
    }
}

/// Walks the dependency graph from `roots` until no new library turns up.
/// Each library is inspected once, so cycles terminate.
pub fn discover_closure(
    inspector: &dyn BinaryInspector,
    platform: TargetPlatform,
    roots: &[PathBuf],
    resolver: &LibraryResolver,
) -> Result<DependencyClosure, PostProcessError> {
    let mut closure = DependencyClosure::default();
    let mut worklist: VecDeque<PathBuf> = roots.iter().cloned().collect();
    while let Some(binary) = worklist.pop_front() {
        for reference in inspector.list_shared_libraries(&binary)? {
            if is_system_library(platform, &reference) {
                continue;
            }
            let name = library_file_name(&reference);
            if closure.libraries.contains_key(&name) {
                continue;
            }
            let resolved = resolver.resolve(&reference).ok_or_else(|| {
                PostProcessError::UnresolvedLibrary {
                    library: reference.clone(),
                    needed_by: binary.clone(),
                }
            })?;
            debug!(library = %name, path = %resolved.display(), "resolved dependency");
            closure.libraries.insert(name, resolved.clone());
            worklist.push_back(resolved);
        }
    }
    Ok(closure)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinishReport {
    pub executable: PathBuf,
    pub libraries: Vec<String>,
    pub strip_warnings: Vec<String>,
}

pub struct PostProcessor<'a> {
    inspector: &'a dyn BinaryInspector,
    platform: TargetPlatform,
    layout: PackageLayout,
    package_root: PathBuf,
    resolver: LibraryResolver,
    strip: bool,
}

impl<'a> PostProcessor<'a> {
    pub fn new(
        inspector: &'a dyn BinaryInspector,
        platform: TargetPlatform,
        package_root: &Path,
        resolver: LibraryResolver,
        strip: bool,
    ) -> Self {
        Self {
            inspector,
            platform,
            layout: package_layout(platform),
            package_root: package_root.to_path_buf(),
            resolver,
            strip,
        }
    }

    pub fn library_dir(&self) -> PathBuf {
        self.package_root.join(self.layout.library_dir)
    }

    /// Strips, makes the executable look for libraries in the package, and
    /// copies every non-system library it needs, directly or not, next to
    /// it. Strip failures are only warnings.
    pub fn finish_binary(&self, executable: &Path) -> Result<FinishReport, PostProcessError> {
        let mut strip_warnings = Vec::new();
        self.strip_best_effort(executable, &mut strip_warnings);
        if let Some(search_path) = self.layout.executable_search_path {
            self.inspector.rewrite_search_path(executable, search_path)?;
        }

        let closure = discover_closure(
            self.inspector,
            self.platform,
            &[executable.to_path_buf()],
            &self.resolver,
        )?;
        self.relink_references(executable)?;

        let library_dir = self.library_dir();
        fs::create_dir_all(&library_dir).map_err(io_error(&library_dir))?;
        for (name, source) in closure.iter() {
            let destination = library_dir.join(name);
            if destination != source {
                copy_library(source, &destination)?;
                info!(library = name, from = %source.display(), "copied library into package");
            }
            // Strip before patchelf/install_name_tool touch the file.
            self.strip_best_effort(&destination, &mut strip_warnings);
            if let Some(search_path) = self.layout.library_search_path {
                self.inspector.rewrite_search_path(&destination, search_path)?;
            }
            if let Some(prefix) = self.layout.relink_prefix {
                self.inspector
                    .set_library_id(&destination, &format!("{}{}", prefix, name))?;
            }
            self.relink_references(&destination)?;
        }

        Ok(FinishReport {
            executable: executable.to_path_buf(),
            libraries: closure.names().into_iter().map(str::to_string).collect(),
            strip_warnings,
        })
    }

    fn relink_references(&self, binary: &Path) -> Result<(), PostProcessError> {
        let Some(prefix) = self.layout.relink_prefix else {
            return Ok(());
        };
        for reference in self.inspector.list_shared_libraries(binary)? {
            if is_system_library(self.platform, &reference) || reference.starts_with(prefix) {
                continue;
            }
            let relinked = format!("{}{}", prefix, library_file_name(&reference));
            self.inspector
                .relink_dependency(binary, &reference, &relinked)?;
        }
        Ok(())
    }

    fn strip_best_effort(&self, path: &Path, warnings: &mut Vec<String>) {
        if !self.strip {
            return;
        }
        if let Err(error) = self.inspector.strip_symbols(path) {
            warn!(path = %path.display(), %error, "strip failed, keeping symbols");
            warnings.push(error.to_string());
        }
    }
}

fn copy_library(source: &Path, destination: &Path) -> Result<(), PostProcessError> {
    // fs::copy follows symlinks, so versioned links become real files.
    fs::copy(source, destination).map_err(io_error(source))?;
    let mut permissions = fs::metadata(destination)
        .map_err(io_error(destination))?
        .permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(destination, permissions).map_err(io_error(destination))?;
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyReport {
    pub binaries: Vec<PathBuf>,
}

/// Lists every binary in the package again and fails if any of them needs
/// a non-system library the package does not carry.
pub fn verify_package(
    inspector: &dyn BinaryInspector,
    platform: TargetPlatform,
    package_root: &Path,
) -> Result<VerifyReport, PostProcessError> {
    let layout = package_layout(platform);
    let mut binaries = Vec::new();
    let mut available = BTreeSet::new();
    let mut dirs = vec![layout.executable_dir, layout.library_dir];
    dirs.dedup();
    for dir in dirs {
        let dir = package_root.join(dir);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|err| PostProcessError::Io {
                path: dir.clone(),
                source: io::Error::from(err),
            })?;
            if !entry.file_type().is_file() && !entry.file_type().is_symlink() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            available.insert(name.clone());
            if is_binary_name(platform, &name, dir.ends_with(layout.executable_dir)) {
                binaries.push(entry.path().to_path_buf());
            }
        }
    }
    binaries.sort();
    binaries.dedup();

    let mut missing = Vec::new();
    for binary in &binaries {
        for reference in inspector.list_shared_libraries(binary)? {
            if is_system_library(platform, &reference) {
                continue;
            }
            let name = library_file_name(&reference);
            if !available.contains(&name) {
                missing.push(MissingDependency {
                    binary: binary.clone(),
                    library: reference,
                });
            }
        }
    }
    if !missing.is_empty() {
        return Err(PostProcessError::MissingDependencies { missing });
    }
    Ok(VerifyReport { binaries })
}

fn is_binary_name(platform: TargetPlatform, name: &str, in_executable_dir: bool) -> bool {
    match platform {
        TargetPlatform::Win32 => {
            let lower = name.to_ascii_lowercase();
            lower.ends_with(".exe") || lower.ends_with(".dll")
        }
        TargetPlatform::Linux => in_executable_dir || name.contains(".so"),
        TargetPlatform::Darwin => in_executable_dir || name.ends_with(".dylib"),
    }
}
