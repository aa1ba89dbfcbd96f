use std::path::Path;

use super::{run_tool, BinaryInspector, InspectError};
use crate::runner::CommandRunner;

/// readelf / patchelf / strip.
pub struct ElfInspector<'r> {
    runner: &'r dyn CommandRunner,
    strip: String,
}

impl<'r> ElfInspector<'r> {
    pub fn new(runner: &'r dyn CommandRunner, strip: String) -> Self {
        Self { runner, strip }
    }
}

impl BinaryInspector for ElfInspector<'_> {
    fn list_shared_libraries(&self, path: &Path) -> Result<Vec<String>, InspectError> {
        let output = run_tool(self.runner, "readelf", &["-d"], path)?;
        Ok(parse_readelf_needed(&output.stdout))
    }

    fn rewrite_search_path(&self, path: &Path, search_path: &str) -> Result<(), InspectError> {
        run_tool(self.runner, "patchelf", &["--set-rpath", search_path], path)?;
        Ok(())
    }

    fn strip_symbols(&self, path: &Path) -> Result<(), InspectError> {
        run_tool(self.runner, &self.strip, &[], path)?;
        Ok(())
    }
}

/// `NEEDED` entries of `readelf -d` output.
pub fn parse_readelf_needed(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("(NEEDED)"))
        .filter_map(|line| {
            let start = line.find('[')?;
            let end = line[start..].find(']')?;
            Some(line[start + 1..start + end].to_string())
        })
        .collect()
}
