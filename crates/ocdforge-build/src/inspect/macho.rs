use std::path::Path;

use super::{run_tool, BinaryInspector, InspectError};
use crate::runner::CommandRunner;

/// otool / install_name_tool / strip.
pub struct MachOInspector<'r> {
    runner: &'r dyn CommandRunner,
}

impl<'r> MachOInspector<'r> {
    pub fn new(runner: &'r dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl BinaryInspector for MachOInspector<'_> {
    fn list_shared_libraries(&self, path: &Path) -> Result<Vec<String>, InspectError> {
        let output = run_tool(self.runner, "otool", &["-L"], path)?;
        Ok(parse_otool_libraries(&output.stdout, path))
    }

    fn rewrite_search_path(&self, path: &Path, search_path: &str) -> Result<(), InspectError> {
        run_tool(self.runner, "install_name_tool", &["-add_rpath", search_path], path)?;
        Ok(())
    }

    fn relink_dependency(&self, path: &Path, old: &str, new: &str) -> Result<(), InspectError> {
        run_tool(self.runner, "install_name_tool", &["-change", old, new], path)?;
        Ok(())
    }

    fn set_library_id(&self, path: &Path, id: &str) -> Result<(), InspectError> {
        run_tool(self.runner, "install_name_tool", &["-id", id], path)?;
        Ok(())
    }

    fn strip_symbols(&self, path: &Path) -> Result<(), InspectError> {
        run_tool(self.runner, "strip", &["-S"], path)?;
        Ok(())
    }
}

/// Install names listed by `otool -L`, without the library's own id.
pub fn parse_otool_libraries(output: &str, inspected: &Path) -> Vec<String> {
    let own_name = inspected
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let line = line.trim();
            let end = line.find(" (").unwrap_or(line.len());
            let name = line[..end].trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .filter(|name| {
            let file_name = name.rsplit('/').next();
            own_name.as_deref() != file_name
        })
        .collect()
}
