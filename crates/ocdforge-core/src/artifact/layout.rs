use std::collections::HashSet;

use thiserror::Error;

use crate::platform::TargetPlatform;

pub const BIN_DIR_NAME: &str = "bin";
pub const LIBEXEC_DIR_NAME: &str = "libexec";
pub const LICENSES_DIR_NAME: &str = "licenses";
pub const BUILD_INFO_FILE_NAME: &str = "build-info.json";

/// Where binaries and their bundled shared libraries live inside the package,
/// and how the copies find each other at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackageLayout {
    pub platform: TargetPlatform,
    pub executable_dir: &'static str,
    pub library_dir: &'static str,
    /// Search path written into executables, `None` where the loader already
    /// looks beside the executable.
    pub executable_search_path: Option<&'static str>,
    pub library_search_path: Option<&'static str>,
    /// Prefix used to relink dependency references (Mach-O install names).
    pub relink_prefix: Option<&'static str>,
}

pub fn package_layout(platform: TargetPlatform) -> PackageLayout {
    match platform {
        TargetPlatform::Linux => PackageLayout {
            platform,
            executable_dir: BIN_DIR_NAME,
            library_dir: LIBEXEC_DIR_NAME,
            executable_search_path: Some("$ORIGIN/../libexec"),
            library_search_path: Some("$ORIGIN"),
            relink_prefix: None,
        },
        TargetPlatform::Darwin => PackageLayout {
            platform,
            executable_dir: BIN_DIR_NAME,
            library_dir: LIBEXEC_DIR_NAME,
            executable_search_path: Some("@loader_path/../libexec"),
            library_search_path: Some("@loader_path"),
            relink_prefix: Some("@rpath/"),
        },
        TargetPlatform::Win32 => PackageLayout {
            platform,
            executable_dir: BIN_DIR_NAME,
            library_dir: BIN_DIR_NAME,
            executable_search_path: None,
            library_search_path: None,
            relink_prefix: None,
        },
    }
}

pub fn license_dir(component: &str, version: &str) -> String {
    format!("{}/{}-{}", LICENSES_DIR_NAME, component, version)
}

/// Entries every finished package must contain, relative to its root.
pub fn required_entries(platform: TargetPlatform, executables: &[&str]) -> Vec<String> {
    let layout = package_layout(platform);
    let mut entries = vec![BUILD_INFO_FILE_NAME.to_string()];
    for executable in executables {
        entries.push(format!(
            "{}/{}",
            layout.executable_dir,
            platform.executable_name(executable)
        ));
    }
    entries
}

pub fn validate_package_entries<I>(
    platform: TargetPlatform,
    executables: &[&str],
    entries: I,
) -> Result<(), LayoutValidationError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let present: HashSet<String> = entries
        .into_iter()
        .map(|entry| entry.as_ref().to_string())
        .collect();
    for required in required_entries(platform, executables) {
        if !present.contains(&required) {
            return Err(LayoutValidationError::MissingEntry(required));
        }
    }
    if !present
        .iter()
        .any(|entry| entry.starts_with(&format!("{}/", LICENSES_DIR_NAME)))
    {
        return Err(LayoutValidationError::MissingEntry(
            LICENSES_DIR_NAME.to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LayoutValidationError {
    #[error("package missing required entry '{0}'")]
    MissingEntry(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_keeps_libraries_beside_executable() {
        let layout = package_layout(TargetPlatform::Win32);
        assert_eq!(layout.library_dir, layout.executable_dir);
        assert!(layout.executable_search_path.is_none());
    }

    #[test]
    fn linux_uses_origin_relative_paths() {
        let layout = package_layout(TargetPlatform::Linux);
        assert_eq!(layout.library_dir, "libexec");
        assert_eq!(layout.executable_search_path, Some("$ORIGIN/../libexec"));
    }

    #[test]
    fn package_validation_requires_entries() {
        let entries = vec![
            "build-info.json",
            "bin/openocd.exe",
            "licenses/libusb-1.0.24/COPYING",
        ];
        assert!(validate_package_entries(TargetPlatform::Win32, &["openocd"], entries).is_ok());
    }

    #[test]
    fn package_validation_reports_missing_executable() {
        let entries = vec!["build-info.json", "licenses/openocd-0.11.0/COPYING"];
        let result = validate_package_entries(TargetPlatform::Linux, &["openocd"], entries);
        assert_eq!(
            result,
            Err(LayoutValidationError::MissingEntry("bin/openocd".to_string()))
        );
    }
}
