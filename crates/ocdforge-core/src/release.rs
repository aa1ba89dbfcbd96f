//! Catalog of supported releases and the components each one is built from.

use thiserror::Error;

use crate::component::{
    platform_args, BuildSystem, ComponentRole, ComponentSpec, SourceLocation,
};
use crate::platform::{PerPlatform, TargetPlatform, OPENOCD_FEATURE_TABLE};

pub const APP_NAME: &str = "openocd";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Release {
    pub version: &'static str,
    /// Build order: dependencies first, the application last.
    pub components: Vec<ComponentSpec>,
}

impl Release {
    pub fn application(&self) -> Option<&ComponentSpec> {
        self.components
            .iter()
            .find(|component| component.role == ComponentRole::Application)
    }

    pub fn components_for(&self, platform: TargetPlatform) -> Vec<&ComponentSpec> {
        self.components
            .iter()
            .filter(|component| component.is_available(platform))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ReleaseError> {
        let applications = self
            .components
            .iter()
            .filter(|component| component.role == ComponentRole::Application)
            .count();
        if applications != 1 {
            return Err(ReleaseError::ApplicationCount {
                version: self.version.to_string(),
                count: applications,
            });
        }
        if self.components.last().map(|component| component.role)
            != Some(ComponentRole::Application)
        {
            return Err(ReleaseError::ApplicationNotLast {
                version: self.version.to_string(),
            });
        }
        for component in &self.components {
            if let Some(features) = &component.features {
                features
                    .validate()
                    .map_err(|source| ReleaseError::Features {
                        component: component.name.to_string(),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReleaseError {
    #[error("unsupported release version '{version}' (supported: {supported})")]
    Unsupported { version: String, supported: String },
    #[error("release {version} must contain exactly one application, found {count}")]
    ApplicationCount { version: String, count: usize },
    #[error("release {version} must build its application last")]
    ApplicationNotLast { version: String },
    #[error("component {component}: {source}")]
    Features {
        component: String,
        #[source]
        source: crate::platform::FeatureError,
    },
}

pub const SUPPORTED_RELEASES: &[&str] = &["0.10.0-15", "0.11.0-1"];

pub fn release(version: &str) -> Result<Release, ReleaseError> {
    let (version, versions) = match version {
        "0.10.0-15" => (
            "0.10.0-15",
            ComponentVersions {
                libiconv: "1.15",
                libusb: "1.0.22",
                libusb_compat: "0.1.5",
                libftdi: "1.4",
                hidapi: "0.8.0-rc1",
                openocd: "0.10.0",
            },
        ),
        "0.11.0-1" => (
            "0.11.0-1",
            ComponentVersions {
                libiconv: "1.16",
                libusb: "1.0.24",
                libusb_compat: "0.1.7",
                libftdi: "1.5",
                hidapi: "0.10.1",
                openocd: "0.11.0",
            },
        ),
        other => {
            return Err(ReleaseError::Unsupported {
                version: other.to_string(),
                supported: SUPPORTED_RELEASES.join(", "),
            })
        }
    };
    let release = Release {
        version,
        components: versions.components(),
    };
    release.validate()?;
    Ok(release)
}

struct ComponentVersions {
    libiconv: &'static str,
    libusb: &'static str,
    libusb_compat: &'static str,
    libftdi: &'static str,
    hidapi: &'static str,
    openocd: &'static str,
}

impl ComponentVersions {
    fn components(&self) -> Vec<ComponentSpec> {
        vec![
            ComponentSpec {
                name: "libiconv",
                version: self.libiconv,
                source: SourceLocation::Archive {
                    url: format!(
                        "https://ftp.gnu.org/pub/gnu/libiconv/libiconv-{}.tar.gz",
                        self.libiconv
                    ),
                    file_name: format!("libiconv-{}.tar.gz", self.libiconv),
                    folder_name: format!("libiconv-{}", self.libiconv),
                },
                build_system: BuildSystem::Autotools { bootstrap: None },
                role: ComponentRole::Dependency,
                // glibc ships iconv.
                availability: PerPlatform::new(false, true, true),
                configure_args: platform_args(
                    &["--disable-nls"],
                    &["--disable-nls"],
                    &["--disable-nls", "--enable-static", "--disable-shared"],
                ),
                features: None,
                license_files: &["COPYING", "COPYING.LIB"],
                has_docs: false,
                executables: &[],
            },
            ComponentSpec {
                name: "libusb",
                version: self.libusb,
                source: SourceLocation::Git {
                    url: "https://github.com/libusb/libusb.git".to_string(),
                    branch: "master".to_string(),
                    commit: format!("v{}", self.libusb),
                },
                build_system: BuildSystem::Autotools {
                    bootstrap: Some("./bootstrap.sh"),
                },
                role: ComponentRole::Dependency,
                availability: PerPlatform::all(true),
                configure_args: platform_args(&["--disable-udev"], &[], &[]),
                features: None,
                license_files: &["COPYING"],
                has_docs: false,
                executables: &[],
            },
            ComponentSpec {
                name: "libusb-compat",
                version: self.libusb_compat,
                source: SourceLocation::Git {
                    url: "https://github.com/libusb/libusb-compat-0.1.git".to_string(),
                    branch: "master".to_string(),
                    commit: format!("v{}", self.libusb_compat),
                },
                build_system: BuildSystem::Autotools {
                    bootstrap: Some("./autogen.sh"),
                },
                role: ComponentRole::Dependency,
                // Windows builds go through libusb directly.
                availability: PerPlatform::new(true, true, false),
                configure_args: platform_args(&[], &[], &[]),
                features: None,
                license_files: &["COPYING"],
                has_docs: false,
                executables: &[],
            },
            ComponentSpec {
                name: "libftdi",
                version: self.libftdi,
                source: SourceLocation::Git {
                    url: "git://developer.intra2net.com/libftdi".to_string(),
                    branch: "master".to_string(),
                    commit: format!("v{}", self.libftdi),
                },
                build_system: BuildSystem::Cmake,
                role: ComponentRole::Dependency,
                availability: PerPlatform::all(true),
                configure_args: platform_args(
                    LIBFTDI_CMAKE_ARGS,
                    LIBFTDI_CMAKE_ARGS,
                    &[
                        "-DCMAKE_SYSTEM_NAME=Windows",
                        "-DPYTHON_BINDINGS=OFF",
                        "-DEXAMPLES=OFF",
                        "-DDOCUMENTATION=OFF",
                        "-DFTDI_EEPROM=OFF",
                        "-DFTDIPP=OFF",
                    ],
                ),
                features: None,
                license_files: &["COPYING.GPL", "COPYING.LIB", "LICENSE"],
                has_docs: false,
                executables: &[],
            },
            ComponentSpec {
                name: "hidapi",
                version: self.hidapi,
                source: SourceLocation::Git {
                    url: "https://github.com/libusb/hidapi.git".to_string(),
                    branch: "master".to_string(),
                    commit: format!("hidapi-{}", self.hidapi),
                },
                build_system: BuildSystem::Autotools {
                    bootstrap: Some("./bootstrap"),
                },
                role: ComponentRole::Dependency,
                availability: PerPlatform::all(true),
                configure_args: platform_args(&["--disable-testgui"], &["--disable-testgui"], &[]),
                features: None,
                license_files: &["LICENSE.txt", "LICENSE-bsd.txt", "LICENSE-gpl3.txt"],
                has_docs: false,
                executables: &[],
            },
            ComponentSpec {
                name: APP_NAME,
                version: self.openocd,
                source: SourceLocation::Git {
                    url: "https://git.code.sf.net/p/openocd/code".to_string(),
                    branch: "master".to_string(),
                    commit: format!("v{}", self.openocd),
                },
                build_system: BuildSystem::Autotools {
                    bootstrap: Some("./bootstrap"),
                },
                role: ComponentRole::Application,
                availability: PerPlatform::all(true),
                configure_args: platform_args(
                    &["--enable-shared=no"],
                    &["--enable-shared=no"],
                    &["--enable-shared=no"],
                ),
                features: Some(OPENOCD_FEATURE_TABLE),
                license_files: &["COPYING"],
                has_docs: true,
                executables: &[APP_NAME],
            },
        ]
    }
}

const LIBFTDI_CMAKE_ARGS: &[&str] = &[
    "-DPYTHON_BINDINGS=OFF",
    "-DEXAMPLES=OFF",
    "-DDOCUMENTATION=OFF",
    "-DFTDI_EEPROM=OFF",
    "-DFTDIPP=OFF",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_release_validates() {
        for version in SUPPORTED_RELEASES {
            let release = release(version).expect("release");
            assert_eq!(release.version, *version);
            assert_eq!(
                release.application().map(|app| app.name),
                Some(APP_NAME)
            );
        }
    }

    #[test]
    fn unknown_release_is_rejected() {
        let error = release("0.9.0-1").expect_err("should fail");
        assert!(error.to_string().contains("unsupported release version"));
    }

    #[test]
    fn dependencies_precede_application() {
        let release = release("0.11.0-1").expect("release");
        for platform in TargetPlatform::ALL {
            let components = release.components_for(platform);
            let last = components.last().expect("components");
            assert_eq!(last.role, ComponentRole::Application);
            assert!(components[..components.len() - 1]
                .iter()
                .all(|component| component.role == ComponentRole::Dependency));
        }
    }

    #[test]
    fn platform_specific_dependencies() {
        let release = release("0.11.0-1").expect("release");
        let linux: Vec<&str> = release
            .components_for(TargetPlatform::Linux)
            .iter()
            .map(|component| component.name)
            .collect();
        assert!(!linux.contains(&"libiconv"));
        assert!(linux.contains(&"libusb-compat"));
        let win32: Vec<&str> = release
            .components_for(TargetPlatform::Win32)
            .iter()
            .map(|component| component.name)
            .collect();
        assert!(win32.contains(&"libiconv"));
        assert!(!win32.contains(&"libusb-compat"));
    }

    #[test]
    fn application_last_is_enforced() {
        let mut release = release("0.11.0-1").expect("release");
        release.components.rotate_right(1);
        assert!(matches!(
            release.validate(),
            Err(ReleaseError::ApplicationNotLast { .. })
        ));
    }
}
