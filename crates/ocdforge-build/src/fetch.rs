//! Source acquisition. A destination folder only ever appears complete:
//! work happens in a temporary sibling that is renamed into place last.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ocdforge_core::component::{BuildTarget, SourceLocation};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::runner::{CommandRunner, Invocation};
use crate::stage::{run_stage, BuildError, LogMode, StageKind, StageSpec};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("i/o error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("download of {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Git(#[from] BuildError),
    #[error("unsupported archive format '{0}'")]
    UnsupportedArchive(String),
    #[error("archive '{archive}' has no top level folder '{folder}'")]
    MissingFolder { archive: String, folder: String },
    #[error("cannot read zip archive '{}': {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl FetchError {
    fn io(path: &Path, source: io::Error) -> Self {
        FetchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyPresent,
    Fetched,
}

pub trait Downloader {
    fn download(&self, url: &str, destination: &Path) -> Result<(), FetchError>;
}

pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("ocdforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Http {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        let http_error = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(http_error)?;
        let mut file =
            fs::File::create(destination).map_err(|err| FetchError::io(destination, err))?;
        response.copy_to(&mut file).map_err(http_error)?;
        Ok(())
    }
}

pub struct Fetcher<'a> {
    runner: &'a dyn CommandRunner,
    downloader: &'a dyn Downloader,
    cache_dir: PathBuf,
    logs_dir: PathBuf,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        downloader: &'a dyn Downloader,
        cache_dir: &Path,
        logs_dir: &Path,
    ) -> Self {
        Self {
            runner,
            downloader,
            cache_dir: cache_dir.to_path_buf(),
            logs_dir: logs_dir.to_path_buf(),
        }
    }

    /// Makes sure `dest` holds the sources of `target`. An existing `dest`
    /// is trusted and left untouched.
    pub fn ensure_source(
        &self,
        target: &BuildTarget,
        dest: &Path,
    ) -> Result<FetchOutcome, FetchError> {
        if dest.exists() {
            info!(component = %target.name, path = %dest.display(), "sources already present");
            return Ok(FetchOutcome::AlreadyPresent);
        }
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|err| FetchError::io(parent, err))?;
        let staging = staging_dir(dest);
        if staging.exists() {
            debug!(path = %staging.display(), "removing leftover staging folder");
            fs::remove_dir_all(&staging).map_err(|err| FetchError::io(&staging, err))?;
        }

        let result = match &target.source {
            SourceLocation::Git {
                url,
                branch,
                commit,
            } => self.clone_git(target, url, branch, commit, &staging),
            SourceLocation::Archive {
                url,
                file_name,
                folder_name,
            } => self.unpack_archive(url, file_name, folder_name, &staging),
        };
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(error) => {
                if staging.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&staging) {
                        warn!(
                            path = %staging.display(),
                            error = %cleanup,
                            "cannot remove staging folder"
                        );
                    }
                }
                return Err(error);
            }
        };
        fs::rename(&fetched, dest).map_err(|err| FetchError::io(dest, err))?;
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|err| FetchError::io(&staging, err))?;
        }
        info!(component = %target.name, path = %dest.display(), "sources fetched");
        Ok(FetchOutcome::Fetched)
    }

    fn clone_git(
        &self,
        target: &BuildTarget,
        url: &str,
        branch: &str,
        commit: &str,
        staging: &Path,
    ) -> Result<PathBuf, FetchError> {
        let parent = staging.parent().unwrap_or_else(|| Path::new("."));
        let clone = Invocation::new("git", parent)
            .args(["clone", "--branch", branch, url])
            .arg(staging.display().to_string());
        self.git(target, clone, LogMode::Truncate)?;
        self.git(
            target,
            Invocation::new("git", staging).args(["checkout", "-qf", commit]),
            LogMode::Append,
        )?;
        self.git(
            target,
            Invocation::new("git", staging)
                .args(["submodule", "update", "--init", "--recursive"]),
            LogMode::Append,
        )?;
        Ok(staging.to_path_buf())
    }

    fn git(
        &self,
        target: &BuildTarget,
        invocation: Invocation,
        log_mode: LogMode,
    ) -> Result<(), FetchError> {
        let mut spec = StageSpec::new(&target.name, StageKind::Fetch, invocation, &self.logs_dir);
        spec.log_mode = log_mode;
        run_stage(self.runner, &spec)?;
        Ok(())
    }

    fn unpack_archive(
        &self,
        url: &str,
        file_name: &str,
        folder_name: &str,
        staging: &Path,
    ) -> Result<PathBuf, FetchError> {
        let archive = self.cached_download(url, file_name)?;
        fs::create_dir_all(staging).map_err(|err| FetchError::io(staging, err))?;
        extract(&archive, staging)?;
        let unpacked = staging.join(folder_name);
        if !unpacked.is_dir() {
            return Err(FetchError::MissingFolder {
                archive: file_name.to_string(),
                folder: folder_name.to_string(),
            });
        }
        Ok(unpacked)
    }

    fn cached_download(&self, url: &str, file_name: &str) -> Result<PathBuf, FetchError> {
        let cached = self.cache_dir.join(file_name);
        if cached.is_file() {
            debug!(path = %cached.display(), "using cached download");
            return Ok(cached);
        }
        fs::create_dir_all(&self.cache_dir).map_err(|err| FetchError::io(&self.cache_dir, err))?;
        let partial = self.cache_dir.join(format!("{}.partial", file_name));
        info!(url, "downloading");
        if let Err(error) = self.downloader.download(url, &partial) {
            let _ = fs::remove_file(&partial);
            return Err(error);
        }
        fs::rename(&partial, &cached).map_err(|err| FetchError::io(&cached, err))?;
        Ok(cached)
    }
}

fn staging_dir(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.partial", name))
}

/// Unpacks a `.tar.gz`/`.tgz` or `.zip` archive into `into`.
pub fn extract(archive: &Path, into: &Path) -> Result<(), FetchError> {
    let name = archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = fs::File::open(archive).map_err(|err| FetchError::io(archive, err))?;
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let mut tarball = tar::Archive::new(flate2::read::GzDecoder::new(file));
        tarball
            .unpack(into)
            .map_err(|err| FetchError::io(archive, err))?;
        Ok(())
    } else if name.ends_with(".zip") {
        let mut zipped = zip::ZipArchive::new(file).map_err(|source| FetchError::Zip {
            path: archive.to_path_buf(),
            source,
        })?;
        zipped.extract(into).map_err(|source| FetchError::Zip {
            path: archive.to_path_buf(),
            source,
        })
    } else {
        Err(FetchError::UnsupportedArchive(name))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::io::Write;

    use super::*;
    use crate::runner::{CapturedOutput, StageStatus};

    #[derive(Default)]
    struct GitRunner {
        calls: RefCell<Vec<Invocation>>,
        fail_checkout: bool,
    }

    impl CommandRunner for GitRunner {
        fn run(&self, invocation: &Invocation, sink: &mut dyn Write) -> io::Result<StageStatus> {
            self.calls.borrow_mut().push(invocation.clone());
            if invocation.args.first().map(String::as_str) == Some("clone") {
                let target = PathBuf::from(invocation.args.last().expect("clone target"));
                fs::create_dir_all(&target)?;
                fs::write(target.join("configure.ac"), "AC_INIT\n")?;
            }
            if self.fail_checkout && invocation.args.first().map(String::as_str) == Some("checkout")
            {
                writeln!(sink, "fatal: reference is not a tree")?;
                return Ok(StageStatus::exit(128));
            }
            Ok(StageStatus::success())
        }

        fn capture(&self, _invocation: &Invocation) -> io::Result<CapturedOutput> {
            unreachable!("fetch never captures")
        }
    }

    struct NoDownloads;

    impl Downloader for NoDownloads {
        fn download(&self, url: &str, _destination: &Path) -> Result<(), FetchError> {
            panic!("unexpected download of {url}")
        }
    }

    struct TarballDownloader {
        count: Cell<usize>,
    }

    impl Downloader for TarballDownloader {
        fn download(&self, _url: &str, destination: &Path) -> Result<(), FetchError> {
            self.count.set(self.count.get() + 1);
            let file =
                fs::File::create(destination).map_err(|err| FetchError::io(destination, err))?;
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let contents = b"GNU LGPL\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "libiconv-1.16/COPYING.LIB", &contents[..])
                .map_err(|err| FetchError::io(destination, err))?;
            builder
                .into_inner()
                .and_then(|encoder| encoder.finish())
                .map_err(|err| FetchError::io(destination, err))?;
            Ok(())
        }
    }

    fn fetcher<'a>(
        runner: &'a dyn CommandRunner,
        downloader: &'a dyn Downloader,
        root: &Path,
    ) -> Fetcher<'a> {
        Fetcher::new(runner, downloader, &root.join("cache"), &root.join("logs"))
    }

    fn git_target() -> BuildTarget {
        BuildTarget {
            name: "libusb".to_string(),
            version: "1.0.24".to_string(),
            source: SourceLocation::Git {
                url: "https://github.com/libusb/libusb.git".to_string(),
                branch: "master".to_string(),
                commit: "v1.0.24".to_string(),
            },
            output_folder: PathBuf::from("unused"),
        }
    }

    #[test]
    fn second_fetch_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = GitRunner::default();
        let fetcher = fetcher(&runner, &NoDownloads, dir.path());
        let dest = dir.path().join("sources/libusb-1.0.24");

        assert_eq!(
            fetcher.ensure_source(&git_target(), &dest).expect("first"),
            FetchOutcome::Fetched
        );
        assert_eq!(runner.calls.borrow().len(), 3);
        assert!(dest.join("configure.ac").is_file());

        assert_eq!(
            fetcher.ensure_source(&git_target(), &dest).expect("second"),
            FetchOutcome::AlreadyPresent
        );
        assert_eq!(runner.calls.borrow().len(), 3);
        let clones = runner
            .calls
            .borrow()
            .iter()
            .filter(|call| call.args.first().map(String::as_str) == Some("clone"))
            .count();
        assert_eq!(clones, 1);
    }

    #[test]
    fn failed_checkout_leaves_no_destination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = GitRunner {
            fail_checkout: true,
            ..GitRunner::default()
        };
        let fetcher = fetcher(&runner, &NoDownloads, dir.path());
        let dest = dir.path().join("sources/libusb-1.0.24");

        let error = fetcher.ensure_source(&git_target(), &dest).expect_err("fail");
        assert!(matches!(error, FetchError::Git(BuildError::StageFailed { .. })));
        assert!(!dest.exists());
        assert!(!staging_dir(&dest).exists());
        let log =
            fs::read_to_string(dir.path().join("logs/fetch-libusb-output.txt")).expect("log");
        assert!(log.contains("reference is not a tree"));
    }

    #[test]
    fn archive_is_downloaded_once_and_unpacked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = GitRunner::default();
        let downloader = TarballDownloader { count: Cell::new(0) };
        let fetcher = fetcher(&runner, &downloader, dir.path());
        let target = BuildTarget {
            name: "libiconv".to_string(),
            version: "1.16".to_string(),
            source: SourceLocation::Archive {
                url: "https://ftp.gnu.org/pub/gnu/libiconv/libiconv-1.16.tar.gz".to_string(),
                file_name: "libiconv-1.16.tar.gz".to_string(),
                folder_name: "libiconv-1.16".to_string(),
            },
            output_folder: PathBuf::from("unused"),
        };

        let first = dir.path().join("sources/libiconv-1.16");
        fetcher.ensure_source(&target, &first).expect("fetch");
        assert!(first.join("COPYING.LIB").is_file());
        assert!(dir.path().join("cache/libiconv-1.16.tar.gz").is_file());

        fs::remove_dir_all(&first).expect("remove");
        fetcher.ensure_source(&target, &first).expect("refetch");
        assert_eq!(downloader.count.get(), 1);
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn unknown_archive_format_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("libfoo.tar.bz2");
        fs::write(&archive, b"BZh").expect("write");
        assert!(matches!(
            extract(&archive, dir.path()),
            Err(FetchError::UnsupportedArchive(_))
        ));
    }
}
