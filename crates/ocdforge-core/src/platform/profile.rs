use serde::Serialize;

use super::features::{FeatureTable, ResolvedFeature};
use super::key::{PlatformError, TargetBits, TargetPlatform};
use crate::artifact::naming::ArchiveKind;
use crate::build_plan::BuildEnvVar;

const MACOS_DEPLOYMENT_TARGET: &str = "10.13";

/// Compiler selection that overrides the platform defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolchainOverrides {
    pub cc: Option<String>,
    pub cxx: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolchainEnv {
    pub cc: String,
    pub cxx: String,
    pub cflags: String,
    pub cxxflags: String,
    pub ldflags: String,
    /// Cross prefix, also passed to configure as `--host`.
    pub cross_prefix: Option<String>,
}

impl ToolchainEnv {
    pub fn env(&self) -> Vec<BuildEnvVar> {
        vec![
            BuildEnvVar::new("CC", &self.cc),
            BuildEnvVar::new("CXX", &self.cxx),
            BuildEnvVar::new("CFLAGS", &self.cflags),
            BuildEnvVar::new("CXXFLAGS", &self.cxxflags),
            BuildEnvVar::new("LDFLAGS", &self.ldflags),
        ]
    }

    /// Binutils tool name, prefixed when cross compiling.
    pub fn tool(&self, name: &str) -> String {
        match &self.cross_prefix {
            Some(prefix) => format!("{}-{}", prefix, name),
            None => name.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    pub platform: TargetPlatform,
    pub bits: TargetBits,
    pub toolchain: ToolchainEnv,
    /// Unoptimised build with symbols; every stage reads it from here.
    pub debug: bool,
    pub executable_suffix: &'static str,
    pub shared_library_extension: &'static str,
    #[serde(skip)]
    pub archive_kind: ArchiveKind,
}

impl PlatformProfile {
    pub fn features(&self, table: &FeatureTable) -> Vec<ResolvedFeature> {
        table.resolve(self.platform)
    }

    pub fn executable_name(&self, stem: &str) -> String {
        self.platform.executable_name(stem)
    }
}

/// Resolves the profile for a platform. Fails for combinations that have
/// no toolchain rather than falling back to another platform.
pub fn profile(
    platform: TargetPlatform,
    bits: TargetBits,
    overrides: &ToolchainOverrides,
    debug: bool,
) -> Result<PlatformProfile, PlatformError> {
    let optimize = if debug { "-O0 -g" } else { "-O2" };
    let base_cflags = format!("-ffunction-sections -fdata-sections -pipe {}", optimize);
    let toolchain = match platform {
        TargetPlatform::Linux => {
            let arch_flag = match bits {
                TargetBits::B32 => " -m32",
                TargetBits::B64 => "",
            };
            ToolchainEnv {
                cc: "gcc".to_string(),
                cxx: "g++".to_string(),
                cflags: format!("{}{}", base_cflags, arch_flag),
                cxxflags: format!("{}{}", base_cflags, arch_flag),
                ldflags: format!("-Wl,--gc-sections{}", arch_flag),
                cross_prefix: None,
            }
        }
        TargetPlatform::Darwin => {
            if bits == TargetBits::B32 {
                return Err(PlatformError::UnsupportedCombination { platform, bits });
            }
            let min = format!("-mmacosx-version-min={}", MACOS_DEPLOYMENT_TARGET);
            ToolchainEnv {
                cc: "clang".to_string(),
                cxx: "clang++".to_string(),
                cflags: format!("{} {}", base_cflags, min),
                cxxflags: format!("{} {}", base_cflags, min),
                ldflags: format!("-Wl,-dead_strip {}", min),
                cross_prefix: None,
            }
        }
        TargetPlatform::Win32 => {
            let prefix = match bits {
                TargetBits::B32 => "i686-w64-mingw32",
                TargetBits::B64 => "x86_64-w64-mingw32",
            };
            ToolchainEnv {
                cc: format!("{}-gcc", prefix),
                cxx: format!("{}-g++", prefix),
                cflags: base_cflags.clone(),
                cxxflags: base_cflags,
                ldflags: "-Wl,--gc-sections -static-libgcc".to_string(),
                cross_prefix: Some(prefix.to_string()),
            }
        }
    };
    let toolchain = ToolchainEnv {
        cc: overrides.cc.clone().unwrap_or(toolchain.cc),
        cxx: overrides.cxx.clone().unwrap_or(toolchain.cxx),
        ..toolchain
    };
    let descriptor = platform.descriptor();
    Ok(PlatformProfile {
        platform,
        bits,
        toolchain,
        debug,
        executable_suffix: descriptor.executable_suffix,
        shared_library_extension: descriptor.shared_library_extension,
        archive_kind: descriptor.archive_kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::features::OPENOCD_FEATURE_TABLE;

    #[test]
    fn win32_profile_cross_compiles() {
        let profile = profile(
            TargetPlatform::Win32,
            TargetBits::B64,
            &ToolchainOverrides::default(),
            false,
        )
        .expect("profile");
        assert_eq!(profile.toolchain.cc, "x86_64-w64-mingw32-gcc");
        assert_eq!(profile.toolchain.tool("objdump"), "x86_64-w64-mingw32-objdump");
        assert_eq!(profile.executable_suffix, ".exe");
        assert_eq!(profile.archive_kind, ArchiveKind::Zip);
    }

    #[test]
    fn darwin_has_no_32_bit_toolchain() {
        let result = profile(
            TargetPlatform::Darwin,
            TargetBits::B32,
            &ToolchainOverrides::default(),
            false,
        );
        assert!(matches!(
            result,
            Err(PlatformError::UnsupportedCombination { .. })
        ));
    }

    #[test]
    fn overrides_replace_compilers() {
        let overrides = ToolchainOverrides {
            cc: Some("gcc-9".to_string()),
            cxx: None,
        };
        let profile =
            profile(TargetPlatform::Linux, TargetBits::B64, &overrides, true).expect("profile");
        assert_eq!(profile.toolchain.cc, "gcc-9");
        assert_eq!(profile.toolchain.cxx, "g++");
        assert!(profile.debug);
        assert!(profile.toolchain.cflags.contains("-O0 -g"));
        assert_eq!(profile.toolchain.tool("strip"), "strip");
    }

    #[test]
    fn every_profile_resolves_every_feature() {
        for platform in TargetPlatform::ALL {
            let profile = profile(
                platform,
                TargetBits::B64,
                &ToolchainOverrides::default(),
                false,
            )
            .expect("profile");
            let features = profile.features(&OPENOCD_FEATURE_TABLE);
            assert_eq!(features.len(), OPENOCD_FEATURE_TABLE.rows().len());
        }
    }
}
