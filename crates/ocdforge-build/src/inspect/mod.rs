//! Binary inspection and rewriting through the platform's native tools.

use std::io;
use std::path::{Path, PathBuf};

use ocdforge_core::platform::{PlatformProfile, TargetPlatform};
use thiserror::Error;

use crate::runner::{CapturedOutput, CommandRunner, Invocation};

mod elf;
mod macho;
mod pe;

pub use elf::{parse_readelf_needed, ElfInspector};
pub use macho::{parse_otool_libraries, MachOInspector};
pub use pe::{parse_objdump_dlls, PeInspector};

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("cannot run '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("'{tool}' failed on '{}' ({}): {stderr}", path.display(), describe(*code))]
    ToolFailed {
        tool: String,
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

pub trait BinaryInspector {
    /// Shared library references as recorded in the binary (names or
    /// install paths), in file order.
    fn list_shared_libraries(&self, path: &Path) -> Result<Vec<String>, InspectError>;

    fn rewrite_search_path(&self, path: &Path, search_path: &str) -> Result<(), InspectError>;

    /// Points a recorded dependency reference at `new`. Only meaningful where
    /// references are paths rather than bare names.
    fn relink_dependency(&self, _path: &Path, _old: &str, _new: &str) -> Result<(), InspectError> {
        Ok(())
    }

    /// Sets the identity a library advertises to the binaries linking it.
    fn set_library_id(&self, _path: &Path, _id: &str) -> Result<(), InspectError> {
        Ok(())
    }

    fn strip_symbols(&self, path: &Path) -> Result<(), InspectError>;
}

pub fn inspector_for<'r>(
    profile: &PlatformProfile,
    runner: &'r dyn CommandRunner,
) -> Box<dyn BinaryInspector + 'r> {
    match profile.platform {
        TargetPlatform::Linux => {
            Box::new(ElfInspector::new(runner, profile.toolchain.tool("strip")))
        }
        TargetPlatform::Darwin => Box::new(MachOInspector::new(runner)),
        TargetPlatform::Win32 => Box::new(PeInspector::new(
            runner,
            profile.toolchain.tool("objdump"),
            profile.toolchain.tool("strip"),
        )),
    }
}

/// Runs a tool on `path` and fails unless it exits with status zero.
pub(crate) fn run_tool(
    runner: &dyn CommandRunner,
    tool: &str,
    args: &[&str],
    path: &Path,
) -> Result<CapturedOutput, InspectError> {
    let working_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let invocation = Invocation::new(tool, working_dir)
        .args(args.iter().copied())
        .arg(path.display().to_string());
    let output = runner
        .capture(&invocation)
        .map_err(|source| InspectError::Spawn {
            tool: tool.to_string(),
            source,
        })?;
    if !output.status.is_success() {
        return Err(InspectError::ToolFailed {
            tool: tool.to_string(),
            path: path.to_path_buf(),
            code: output.status.code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}
