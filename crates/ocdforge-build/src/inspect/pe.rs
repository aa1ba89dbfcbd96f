use std::path::Path;

use tracing::debug;

use super::{run_tool, BinaryInspector, InspectError};
use crate::runner::CommandRunner;

/// Cross binutils for PE images. DLLs are found beside the executable, so
/// there is no search path to rewrite.
pub struct PeInspector<'r> {
    runner: &'r dyn CommandRunner,
    objdump: String,
    strip: String,
}

impl<'r> PeInspector<'r> {
    pub fn new(runner: &'r dyn CommandRunner, objdump: String, strip: String) -> Self {
        Self {
            runner,
            objdump,
            strip,
        }
    }
}

impl BinaryInspector for PeInspector<'_> {
    fn list_shared_libraries(&self, path: &Path) -> Result<Vec<String>, InspectError> {
        let output = run_tool(self.runner, &self.objdump, &["-x"], path)?;
        Ok(parse_objdump_dlls(&output.stdout))
    }

    fn rewrite_search_path(&self, path: &Path, _search_path: &str) -> Result<(), InspectError> {
        debug!(path = %path.display(), "PE images have no search path");
        Ok(())
    }

    fn strip_symbols(&self, path: &Path) -> Result<(), InspectError> {
        run_tool(self.runner, &self.strip, &[], path)?;
        Ok(())
    }
}

/// `DLL Name:` entries of `objdump -x` output.
pub fn parse_objdump_dlls(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("DLL Name:"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
