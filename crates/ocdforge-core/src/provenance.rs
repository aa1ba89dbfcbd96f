//! `build-info.json`: what went into a package.
//!
//! The document carries no timestamps or absolute paths, so two runs with the
//! same inputs write byte-identical files.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::build_plan::BuildOptions;
use crate::component::SourceLocation;
use crate::config::PipelineConfig;
use crate::platform::{ResolvedFeature, TargetBits, TargetPlatform, ToolchainEnv};
use crate::release::APP_NAME;

pub const BUILD_INFO_SCHEMA_VERSION: u32 = 1;
const FINGERPRINT_VERSION: &str = "c1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentRecord {
    pub name: String,
    pub version: String,
    pub source: SourceLocation,
    pub configure_args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub schema_version: u32,
    pub distro: String,
    pub app: String,
    pub release: String,
    pub platform: TargetPlatform,
    pub bits: TargetBits,
    pub fingerprint: String,
    pub options: BuildOptions,
    pub toolchain: ToolchainEnv,
    pub components: Vec<ComponentRecord>,
    pub features: Vec<ResolvedFeature>,
}

impl BuildInfo {
    pub fn from_config(config: &PipelineConfig) -> serde_json::Result<Self> {
        let platform = config.platform();
        let components: Vec<ComponentRecord> = config
            .release
            .components_for(platform)
            .into_iter()
            .map(|component| ComponentRecord {
                name: component.name.to_string(),
                version: component.version.to_string(),
                source: component.source.clone(),
                configure_args: component.configure_args_for(platform),
            })
            .collect();
        let features = config
            .release
            .application()
            .and_then(|app| app.features.as_ref())
            .map(|table| config.profile.features(table))
            .unwrap_or_default();
        let mut info = Self {
            schema_version: BUILD_INFO_SCHEMA_VERSION,
            distro: config.distro.clone(),
            app: APP_NAME.to_string(),
            release: config.release.version.to_string(),
            platform,
            bits: config.bits(),
            fingerprint: String::new(),
            options: config.options.clone(),
            toolchain: config.profile.toolchain.clone(),
            components,
            features,
        };
        info.fingerprint = fingerprint(&info)?;
        Ok(info)
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// Hash of the canonical (key-sorted) document with the fingerprint itself
/// and the job count left out.
pub fn fingerprint(info: &BuildInfo) -> serde_json::Result<String> {
    let mut value = serde_json::to_value(info)?;
    if let Value::Object(map) = &mut value {
        map.remove("fingerprint");
        if let Some(Value::Object(options)) = map.get_mut("options") {
            options.remove("jobs");
        }
    }
    let canonical = serde_json::to_string(&canonicalize(value))?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("{}-{}", FINGERPRINT_VERSION, hex::encode(digest)))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigInputs, PipelineConfig};

    fn config(platform: &str, jobs: usize) -> PipelineConfig {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut inputs = ConfigInputs {
            platform: Some(platform.to_string()),
            bits: Some("64".to_string()),
            release: Some("0.11.0-1".to_string()),
            work_dir: dir.path().to_path_buf(),
            ..ConfigInputs::default()
        };
        inputs.options.jobs = jobs;
        PipelineConfig::resolve(inputs).expect("config")
    }

    #[test]
    fn build_info_lists_platform_components_and_features() {
        let info = BuildInfo::from_config(&config("linux", 2)).expect("info");
        assert_eq!(info.app, "openocd");
        assert_eq!(info.components.last().map(|c| c.name.as_str()), Some("openocd"));
        assert!(info.components.iter().all(|c| c.name != "libiconv"));
        assert!(info
            .features
            .iter()
            .any(|feature| feature.name == "sysfsgpio"));
        assert!(info.fingerprint.starts_with("c1-"));
    }

    #[test]
    fn fingerprint_ignores_job_count() {
        let a = BuildInfo::from_config(&config("linux", 1)).expect("info");
        let b = BuildInfo::from_config(&config("linux", 8)).expect("info");
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn fingerprint_changes_with_platform() {
        let linux = BuildInfo::from_config(&config("linux", 1)).expect("info");
        let win32 = BuildInfo::from_config(&config("win32", 1)).expect("info");
        assert_ne!(linux.fingerprint, win32.fingerprint);
    }

    #[test]
    fn pretty_json_round_trips_as_value() {
        let info = BuildInfo::from_config(&config("darwin", 1)).expect("info");
        let json = info.to_pretty_json().expect("json");
        assert!(json.ends_with('\n'));
        let value: Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["platform"], "darwin");
        assert_eq!(value["bits"], "64");
    }
}
