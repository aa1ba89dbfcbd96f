use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::platform::{TargetBits, TargetPlatform};

/// Parameters for a whole release run that do not vary by component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildOptions {
    pub jobs: usize,
    pub strip: bool,
    pub with_pdf: bool,
    pub with_html: bool,
    pub develop: bool,
    pub debug: bool,
}

impl BuildOptions {
    /// Debug builds keep their symbols regardless of `strip`.
    pub fn should_strip(&self) -> bool {
        self.strip && !self.debug
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            strip: true,
            with_pdf: false,
            with_html: false,
            develop: false,
            debug: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildEnvVar {
    pub key: String,
    pub value: String,
}

impl BuildEnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub const CACHE_DIR_NAME: &str = "cache";
pub const SOURCES_DIR_NAME: &str = "sources";
pub const BUILD_DIR_NAME: &str = "build";
pub const INSTALL_DIR_NAME: &str = "install";
pub const LOGS_DIR_NAME: &str = "logs";
pub const PACKAGE_DIR_NAME: &str = "package";
pub const DEPLOY_DIR_NAME: &str = "deploy";

/// On-disk work tree for one platform/bits combination.
///
/// Sources and downloads are shared between platforms; everything else lives
/// under `<work>/<platform>-<bits>/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactTree {
    pub work_root: PathBuf,
    pub platform_root: PathBuf,
    pub install_prefix: PathBuf,
    pub package_root: PathBuf,
    pub deploy_dir: PathBuf,
}

impl ArtifactTree {
    pub fn new(
        work_root: &Path,
        install_root: Option<&Path>,
        platform: TargetPlatform,
        bits: TargetBits,
        package_folder: &str,
    ) -> Self {
        let platform_root = work_root.join(format!("{}-{}", platform, bits));
        let install_prefix = install_root
            .map(Path::to_path_buf)
            .unwrap_or_else(|| platform_root.join(INSTALL_DIR_NAME));
        Self {
            work_root: work_root.to_path_buf(),
            package_root: platform_root.join(PACKAGE_DIR_NAME).join(package_folder),
            deploy_dir: platform_root.join(DEPLOY_DIR_NAME),
            install_prefix,
            platform_root,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.work_root.join(CACHE_DIR_NAME)
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.work_root.join(SOURCES_DIR_NAME)
    }

    pub fn source_dir(&self, folder: &str) -> PathBuf {
        self.sources_dir().join(folder)
    }

    pub fn build_dir(&self, folder: &str) -> PathBuf {
        self.platform_root.join(BUILD_DIR_NAME).join(folder)
    }

    pub fn logs_dir(&self, component: &str) -> PathBuf {
        self.platform_root.join(LOGS_DIR_NAME).join(component)
    }

    pub fn install_lib_dir(&self) -> PathBuf {
        self.install_prefix.join("lib")
    }

    pub fn install_include_dir(&self) -> PathBuf {
        self.install_prefix.join("include")
    }

    pub fn pkg_config_dir(&self) -> PathBuf {
        self.install_lib_dir().join("pkgconfig")
    }
}
