use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::artifact::naming::{archive_name, package_folder_name, ArtifactNameError};
use crate::build_plan::{ArtifactTree, BuildOptions};
use crate::platform::{
    profile, PlatformError, PlatformProfile, TargetBits, TargetPlatform, ToolchainOverrides,
};
use crate::release::{release, Release, ReleaseError, APP_NAME, SUPPORTED_RELEASES};

pub const CONFIG_FILE_NAME: &str = "ocdforge.yaml";
pub const DEFAULT_DISTRO: &str = "xpack";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config '{path}': {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Release(#[from] ReleaseError),
    #[error(transparent)]
    Naming(#[from] ArtifactNameError),
    #[error("cannot infer target platform from host os '{0}'; pass --platform")]
    UnknownHost(String),
    #[error("--jobs must be at least 1")]
    InvalidJobs,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub distro: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub library_search_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ToolchainConfig {
    #[serde(default)]
    pub cc: Option<String>,
    #[serde(default)]
    pub cxx: Option<String>,
}

/// Raw values collected from flags and the environment, before validation.
#[derive(Clone, Debug, Default)]
pub struct ConfigInputs {
    pub platform: Option<String>,
    pub bits: Option<String>,
    pub release: Option<String>,
    pub work_dir: PathBuf,
    pub install_root: Option<PathBuf>,
    pub cc: Option<String>,
    pub cxx: Option<String>,
    pub options: BuildOptions,
}

/// Fully resolved, immutable configuration for one pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub distro: String,
    pub release: Release,
    pub profile: PlatformProfile,
    pub tree: ArtifactTree,
    pub options: BuildOptions,
    pub library_search_dirs: Vec<PathBuf>,
    pub archive_name: String,
}

impl PipelineConfig {
    pub fn platform(&self) -> TargetPlatform {
        self.profile.platform
    }

    pub fn bits(&self) -> TargetBits {
        self.profile.bits
    }

    pub fn resolve(inputs: ConfigInputs) -> Result<Self, ConfigError> {
        // Platform problems are reported before the config file is even read.
        let platform = match inputs.platform.as_deref() {
            Some(value) => value.parse::<TargetPlatform>()?,
            None => host_platform()?,
        };
        let bits = match inputs.bits.as_deref() {
            Some(value) => value.parse::<TargetBits>()?,
            None => TargetBits::B64,
        };
        if inputs.options.jobs == 0 {
            return Err(ConfigError::InvalidJobs);
        }
        let file = read_optional_config(&inputs.work_dir)?.unwrap_or_default();
        let release_version = inputs
            .release
            .or(file.release)
            .unwrap_or_else(|| latest_release().to_string());
        let release = release(&release_version)?;
        let overrides = ToolchainOverrides {
            cc: inputs.cc.or(file.toolchain.cc),
            cxx: inputs.cxx.or(file.toolchain.cxx),
        };
        let profile = profile(platform, bits, &overrides, inputs.options.debug)?;
        let distro = file.distro.unwrap_or_else(|| DEFAULT_DISTRO.to_string());
        let archive_name = archive_name(&distro, APP_NAME, release.version, platform, bits)?;
        let tree = ArtifactTree::new(
            &inputs.work_dir,
            inputs.install_root.as_deref(),
            platform,
            bits,
            &package_folder_name(APP_NAME, release.version),
        );
        Ok(Self {
            distro,
            release,
            profile,
            tree,
            options: inputs.options,
            library_search_dirs: file.library_search_dirs,
            archive_name,
        })
    }
}

pub fn latest_release() -> &'static str {
    SUPPORTED_RELEASES[SUPPORTED_RELEASES.len() - 1]
}

pub fn host_platform() -> Result<TargetPlatform, ConfigError> {
    match std::env::consts::OS {
        "linux" => Ok(TargetPlatform::Linux),
        "macos" => Ok(TargetPlatform::Darwin),
        "windows" => Ok(TargetPlatform::Win32),
        other => Err(ConfigError::UnknownHost(other.to_string())),
    }
}

pub fn read_optional_config(work_dir: &Path) -> Result<Option<FileConfig>, ConfigError> {
    let yaml_path = work_dir.join(CONFIG_FILE_NAME);
    if !yaml_path.exists() {
        return Ok(None);
    }

    debug!(path = %yaml_path.display(), "reading config file");
    let contents = std::fs::read_to_string(&yaml_path)?;
    let config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
        path: yaml_path.display().to_string(),
        source,
    })?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(work_dir: &Path) -> ConfigInputs {
        ConfigInputs {
            platform: Some("linux".to_string()),
            bits: Some("64".to_string()),
            work_dir: work_dir.to_path_buf(),
            ..ConfigInputs::default()
        }
    }

    fn with_jobs(mut inputs: ConfigInputs) -> ConfigInputs {
        inputs.options.jobs = 2;
        inputs
    }

    #[test]
    fn defaults_to_latest_release_without_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = PipelineConfig::resolve(with_jobs(inputs(dir.path()))).expect("config");
        assert_eq!(config.release.version, latest_release());
        assert_eq!(config.distro, DEFAULT_DISTRO);
        assert_eq!(config.archive_name, "xpack-openocd-0.11.0-1-linux-x64.tar.gz");
    }

    #[test]
    fn reads_overrides_from_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "distro: acme\nrelease: 0.10.0-15\nlibrary_search_dirs:\n  - /opt/gcc/lib64\ntoolchain:\n  cc: gcc-9\n",
        )
        .expect("write config");
        let config = PipelineConfig::resolve(with_jobs(inputs(dir.path()))).expect("config");
        assert_eq!(config.distro, "acme");
        assert_eq!(config.release.version, "0.10.0-15");
        assert_eq!(config.profile.toolchain.cc, "gcc-9");
        assert_eq!(config.library_search_dirs, vec![PathBuf::from("/opt/gcc/lib64")]);
    }

    #[test]
    fn flags_win_over_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "release: 0.10.0-15\n")
            .expect("write config");
        let mut inputs = with_jobs(inputs(dir.path()));
        inputs.release = Some("0.11.0-1".to_string());
        let config = PipelineConfig::resolve(inputs).expect("config");
        assert_eq!(config.release.version, "0.11.0-1");
    }

    #[test]
    fn unsupported_platform_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut inputs = with_jobs(inputs(dir.path()));
        inputs.platform = Some("plan9".to_string());
        let error = PipelineConfig::resolve(inputs).expect_err("error");
        assert!(matches!(
            error,
            ConfigError::Platform(PlatformError::Unsupported(_))
        ));
    }

    #[test]
    fn unsupported_release_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut inputs = with_jobs(inputs(dir.path()));
        inputs.release = Some("1.0.0-1".to_string());
        let error = PipelineConfig::resolve(inputs).expect_err("error");
        assert!(error.to_string().contains("unsupported release version"));
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "relase: 0.11.0-1\n")
            .expect("write config");
        let error = PipelineConfig::resolve(with_jobs(inputs(dir.path()))).expect_err("error");
        assert!(matches!(error, ConfigError::Yaml { .. }));
    }
}
