use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::platform::{FeatureTable, PerPlatform, TargetPlatform};

/// Where a component's sources come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceLocation {
    /// Cloned at `branch`, then pinned to `commit` (a commit id or tag).
    Git {
        url: String,
        branch: String,
        commit: String,
    },
    /// Downloaded once into the cache and extracted; `folder_name` is the
    /// top level folder inside the archive.
    Archive {
        url: String,
        file_name: String,
        folder_name: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSystem {
    /// `configure` + `make`; `bootstrap` is run first when the tree has no
    /// configure script (git checkouts).
    Autotools { bootstrap: Option<&'static str> },
    Cmake,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRole {
    /// Installed into the shared prefix so later components can find it.
    Dependency,
    /// Installed straight into the package tree.
    Application,
}

/// Static catalog description of a buildable component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentSpec {
    pub name: &'static str,
    pub version: &'static str,
    pub source: SourceLocation,
    pub build_system: BuildSystem,
    pub role: ComponentRole,
    pub availability: PerPlatform<bool>,
    pub configure_args: PlatformArgs,
    pub features: Option<FeatureTable>,
    pub license_files: &'static [&'static str],
    pub has_docs: bool,
    pub executables: &'static [&'static str],
}

impl ComponentSpec {
    pub fn folder_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    pub fn is_available(&self, platform: TargetPlatform) -> bool {
        *self.availability.get(platform)
    }

    /// Configure arguments for one platform: fixed arguments first, then one
    /// explicit switch per feature.
    pub fn configure_args_for(&self, platform: TargetPlatform) -> Vec<String> {
        let mut args: Vec<String> = self
            .configure_args
            .get(platform)
            .iter()
            .map(|arg| arg.to_string())
            .collect();
        if let Some(features) = &self.features {
            args.extend(features.configure_args(platform));
        }
        args
    }

    pub fn target(&self, output_folder: &Path) -> BuildTarget {
        BuildTarget {
            name: self.name.to_string(),
            version: self.version.to_string(),
            source: self.source.clone(),
            output_folder: output_folder.to_path_buf(),
        }
    }
}

pub type PlatformArgs = PerPlatform<&'static [&'static str]>;

pub const fn platform_args(
    linux: &'static [&'static str],
    darwin: &'static [&'static str],
    win32: &'static [&'static str],
) -> PlatformArgs {
    PerPlatform::new(linux, darwin, win32)
}

/// One buildable component, fixed for the duration of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildTarget {
    pub name: String,
    pub version: String,
    pub source: SourceLocation,
    pub output_folder: PathBuf,
}

impl BuildTarget {
    pub fn folder_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}
