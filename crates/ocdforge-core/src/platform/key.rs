use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::naming::ArchiveKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    Linux,
    Darwin,
    Win32,
}

impl TargetPlatform {
    pub const ALL: [TargetPlatform; 3] = [
        TargetPlatform::Linux,
        TargetPlatform::Darwin,
        TargetPlatform::Win32,
    ];

    pub fn as_str(self) -> &'static str {
        self.descriptor().key_str
    }

    pub fn executable_suffix(self) -> &'static str {
        self.descriptor().executable_suffix
    }

    pub fn shared_library_extension(self) -> &'static str {
        self.descriptor().shared_library_extension
    }

    pub fn archive_kind(self) -> ArchiveKind {
        self.descriptor().archive_kind
    }

    pub fn executable_name(self, stem: &str) -> String {
        format!("{}{}", stem, self.executable_suffix())
    }

    pub fn descriptor(self) -> &'static PlatformDescriptor {
        match self {
            TargetPlatform::Linux => &LINUX,
            TargetPlatform::Darwin => &DARWIN,
            TargetPlatform::Win32 => &WIN32,
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetPlatform {
    type Err = PlatformError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TargetPlatform::ALL
            .into_iter()
            .find(|platform| platform.as_str() == value)
            .ok_or_else(|| PlatformError::Unsupported(value.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetBits {
    #[serde(rename = "32")]
    B32,
    #[serde(rename = "64")]
    B64,
}

impl TargetBits {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetBits::B32 => "32",
            TargetBits::B64 => "64",
        }
    }

    /// Architecture label used in archive names.
    pub fn arch_label(self) -> &'static str {
        match self {
            TargetBits::B32 => "x32",
            TargetBits::B64 => "x64",
        }
    }
}

impl fmt::Display for TargetBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetBits {
    type Err = PlatformError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "32" => Ok(TargetBits::B32),
            "64" => Ok(TargetBits::B64),
            _ => Err(PlatformError::UnsupportedBits(value.to_string())),
        }
    }
}

/// One value per supported platform. Lookups are exhaustive, so catalog data
/// cannot leave a platform out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerPlatform<T> {
    pub linux: T,
    pub darwin: T,
    pub win32: T,
}

impl<T> PerPlatform<T> {
    pub const fn new(linux: T, darwin: T, win32: T) -> Self {
        Self {
            linux,
            darwin,
            win32,
        }
    }

    pub fn get(&self, platform: TargetPlatform) -> &T {
        match platform {
            TargetPlatform::Linux => &self.linux,
            TargetPlatform::Darwin => &self.darwin,
            TargetPlatform::Win32 => &self.win32,
        }
    }
}

impl<T: Copy> PerPlatform<T> {
    pub const fn all(value: T) -> Self {
        Self::new(value, value, value)
    }
}

pub struct PlatformDescriptor {
    pub platform: TargetPlatform,
    pub key_str: &'static str,
    pub executable_suffix: &'static str,
    pub shared_library_extension: &'static str,
    pub archive_kind: ArchiveKind,
}

static LINUX: PlatformDescriptor = PlatformDescriptor {
    platform: TargetPlatform::Linux,
    key_str: "linux",
    executable_suffix: "",
    shared_library_extension: "so",
    archive_kind: ArchiveKind::TarGz,
};

static DARWIN: PlatformDescriptor = PlatformDescriptor {
    platform: TargetPlatform::Darwin,
    key_str: "darwin",
    executable_suffix: "",
    shared_library_extension: "dylib",
    archive_kind: ArchiveKind::TarGz,
};

static WIN32: PlatformDescriptor = PlatformDescriptor {
    platform: TargetPlatform::Win32,
    key_str: "win32",
    executable_suffix: ".exe",
    shared_library_extension: "dll",
    archive_kind: ArchiveKind::Zip,
};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("unsupported target platform '{0}' (expected linux, darwin or win32)")]
    Unsupported(String),
    #[error("unsupported target bits '{0}' (expected 32 or 64)")]
    UnsupportedBits(String),
    #[error("{platform} does not support {bits}-bit builds")]
    UnsupportedCombination {
        platform: TargetPlatform,
        bits: TargetBits,
    },
}
