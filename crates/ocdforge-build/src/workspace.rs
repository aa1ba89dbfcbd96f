//! Guards a platform work tree against reuse by an incompatible host.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use ocdforge_core::platform::PlatformProfile;
use tracing::{info, warn};

use crate::stage::BuildError;

pub const HOST_STAMP_FILE: &str = ".ocdforge-host";

/// Identity of the machine and toolchain that populated a platform tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostStamp {
    pub host_os: String,
    pub host_arch: String,
    pub target: String,
    pub cc: String,
}

impl HostStamp {
    pub fn current(profile: &PlatformProfile) -> Self {
        Self {
            host_os: std::env::consts::OS.to_string(),
            host_arch: std::env::consts::ARCH.to_string(),
            target: format!("{}-{}", profile.platform, profile.bits),
            cc: profile.toolchain.cc.clone(),
        }
    }

    pub fn parse(contents: &str) -> Option<Self> {
        let mut stamp = HostStamp {
            host_os: String::new(),
            host_arch: String::new(),
            target: String::new(),
            cc: String::new(),
        };
        for line in contents.lines() {
            let (key, value) = line.split_once('=')?;
            let slot = match key.trim() {
                "host_os" => &mut stamp.host_os,
                "host_arch" => &mut stamp.host_arch,
                "target" => &mut stamp.target,
                "cc" => &mut stamp.cc,
                _ => continue,
            };
            *slot = value.trim().to_string();
        }
        if stamp.host_os.is_empty() || stamp.target.is_empty() {
            return None;
        }
        Some(stamp)
    }
}

impl fmt::Display for HostStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "host_os={}", self.host_os)?;
        writeln!(f, "host_arch={}", self.host_arch)?;
        writeln!(f, "target={}", self.target)?;
        writeln!(f, "cc={}", self.cc)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeStatus {
    Fresh,
    Reused,
    /// A tree stamped by another host or toolchain was deleted.
    Replaced,
}

/// Makes `platform_root` safe to build into. A tree without a stamp is
/// adopted as is; a tree stamped differently is deleted first.
pub fn prepare_platform_tree(
    platform_root: &Path,
    stamp: &HostStamp,
) -> Result<TreeStatus, BuildError> {
    let stamp_path = platform_root.join(HOST_STAMP_FILE);
    let status = if !platform_root.exists() {
        TreeStatus::Fresh
    } else {
        match fs::read_to_string(&stamp_path) {
            Ok(contents) if HostStamp::parse(&contents).as_ref() == Some(stamp) => {
                TreeStatus::Reused
            }
            Ok(contents) => {
                let previous = contents.lines().collect::<Vec<_>>().join(" ");
                warn!(
                    path = %platform_root.display(),
                    %previous,
                    "work tree was built for another host, deleting it"
                );
                fs::remove_dir_all(platform_root)
                    .map_err(|err| io_error(platform_root, err))?;
                TreeStatus::Replaced
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => TreeStatus::Reused,
            Err(err) => return Err(io_error(&stamp_path, err)),
        }
    };
    fs::create_dir_all(platform_root).map_err(|err| io_error(platform_root, err))?;
    fs::write(&stamp_path, stamp.to_string()).map_err(|err| io_error(&stamp_path, err))?;
    info!(path = %platform_root.display(), ?status, "platform work tree ready");
    Ok(status)
}

fn io_error(path: &Path, source: io::Error) -> BuildError {
    BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}
